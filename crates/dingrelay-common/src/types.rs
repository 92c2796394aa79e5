use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label or annotation set. Ordered so rendered output is stable.
pub type LabelSet = BTreeMap<String, String>;

/// Label that carries the alert name.
pub const ALERT_NAME_LABEL: &str = "alertname";

/// Alert lifecycle state as seen at notification time.
///
/// # Examples
///
/// ```
/// use dingrelay_common::types::AlertStatus;
///
/// let status: AlertStatus = "Resolved".parse().unwrap();
/// assert_eq!(status, AlertStatus::Resolved);
/// assert_eq!(status.to_string(), "resolved");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Firing,
    Resolved,
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertStatus::Firing => write!(f, "firing"),
            AlertStatus::Resolved => write!(f, "resolved"),
        }
    }
}

impl std::str::FromStr for AlertStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "firing" => Ok(AlertStatus::Firing),
            "resolved" => Ok(AlertStatus::Resolved),
            _ => Err(format!("unknown alert status: {s}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    #[serde(default)]
    pub labels: LabelSet,
    #[serde(default)]
    pub annotations: LabelSet,
    pub starts_at: DateTime<Utc>,
    /// Unset while the alert is still firing.
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub generator_url: String,
}

impl Alert {
    pub fn new(labels: LabelSet, starts_at: DateTime<Utc>) -> Self {
        Self {
            labels,
            annotations: LabelSet::new(),
            starts_at,
            ends_at: None,
            generator_url: String::new(),
        }
    }

    /// Value of the `alertname` label, empty when unset.
    pub fn name(&self) -> &str {
        self.labels
            .get(ALERT_NAME_LABEL)
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> AlertStatus {
        match self.ends_at {
            Some(ends_at) if ends_at <= now => AlertStatus::Resolved,
            _ => AlertStatus::Firing,
        }
    }

    pub fn status(&self) -> AlertStatus {
        self.status_at(Utc::now())
    }

    pub fn resolved(&self) -> bool {
        self.status() == AlertStatus::Resolved
    }
}

/// Format a label set into a human-readable string.
///
/// # Examples
///
/// ```
/// use dingrelay_common::types::{format_labels, LabelSet};
///
/// let mut labels = LabelSet::new();
/// labels.insert("instance".to_string(), "db-1".to_string());
/// labels.insert("alertname".to_string(), "HighLoad".to_string());
/// assert_eq!(format_labels(&labels), "alertname=HighLoad, instance=db-1");
/// ```
pub fn format_labels(labels: &LabelSet) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Pairs present with the same value in every set. Empty input yields an
/// empty set.
pub fn intersect_labels<'a, I>(sets: I) -> LabelSet
where
    I: IntoIterator<Item = &'a LabelSet>,
{
    let mut iter = sets.into_iter();
    let Some(first) = iter.next() else {
        return LabelSet::new();
    };
    let mut common = first.clone();
    for set in iter {
        common.retain(|k, v| set.get(k) == Some(v));
        if common.is_empty() {
            break;
        }
    }
    common
}
