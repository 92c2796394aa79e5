//! Message template data and rendering.
//!
//! Templates use `{{name}}` placeholders. Every substituted value is escaped
//! for a JSON string context, so a template that is valid JSON before
//! rendering stays valid JSON after it.
//!
//! | Placeholder                 | Value                                        |
//! |-----------------------------|----------------------------------------------|
//! | `status`                    | `firing` if any alert fires, else `resolved` |
//! | `receiver`                  | receiver name from the context               |
//! | `group_key`                 | group key from the context                   |
//! | `external_url`              | alertmanager external URL                    |
//! | `alert_count`               | number of alerts in the batch                |
//! | `firing_count`              | number of firing alerts                      |
//! | `resolved_count`            | number of resolved alerts                    |
//! | `labels.<name>`             | common label value, empty when absent        |
//! | `group_labels.<name>`       | group label value, empty when absent         |
//! | `annotations.<name>`        | common annotation value, empty when absent   |
//! | `common_labels`             | `k=v, ...` of the common labels              |
//! | `group_labels`              | `k=v, ...` of the group labels               |
//! | `alerts`                    | one markdown bullet per alert                |

use crate::context::NotifyContext;
use crate::error::{NotifyError, Result};
use chrono::{DateTime, Utc};
use dingrelay_common::types::{
    format_labels, intersect_labels, Alert, AlertStatus, LabelSet, ALERT_NAME_LABEL,
};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct AlertData {
    pub status: AlertStatus,
    pub labels: LabelSet,
    pub annotations: LabelSet,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub generator_url: String,
}

/// Everything a template can refer to for one batch.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateData {
    pub receiver: String,
    pub status: AlertStatus,
    pub alerts: Vec<AlertData>,
    pub group_labels: LabelSet,
    pub common_labels: LabelSet,
    pub common_annotations: LabelSet,
    pub external_url: String,
    pub group_key: String,
}

impl TemplateData {
    pub fn new(ctx: &NotifyContext, alerts: &[Alert]) -> Self {
        Self::at(ctx, alerts, Utc::now())
    }

    /// Same as [`TemplateData::new`] with alert status evaluated at `now`.
    pub fn at(ctx: &NotifyContext, alerts: &[Alert], now: DateTime<Utc>) -> Self {
        let alerts: Vec<AlertData> = alerts
            .iter()
            .map(|a| AlertData {
                status: a.status_at(now),
                labels: a.labels.clone(),
                annotations: a.annotations.clone(),
                starts_at: a.starts_at,
                ends_at: a.ends_at,
                generator_url: a.generator_url.clone(),
            })
            .collect();

        let status = if alerts.iter().any(|a| a.status == AlertStatus::Firing) {
            AlertStatus::Firing
        } else {
            AlertStatus::Resolved
        };

        Self {
            receiver: ctx.receiver().to_string(),
            status,
            common_labels: intersect_labels(alerts.iter().map(|a| &a.labels)),
            common_annotations: intersect_labels(alerts.iter().map(|a| &a.annotations)),
            alerts,
            group_labels: ctx.group_labels().clone(),
            external_url: ctx.external_url().to_string(),
            group_key: ctx.group_key().unwrap_or_default().to_string(),
        }
    }

    pub fn firing(&self) -> impl Iterator<Item = &AlertData> {
        self.alerts
            .iter()
            .filter(|a| a.status == AlertStatus::Firing)
    }

    pub fn resolved(&self) -> impl Iterator<Item = &AlertData> {
        self.alerts
            .iter()
            .filter(|a| a.status == AlertStatus::Resolved)
    }
}

/// Renders a message template against [`TemplateData`].
pub trait TemplateRenderer: Send + Sync {
    /// # Errors
    ///
    /// Returns [`NotifyError::Template`] if the template is malformed or
    /// refers to unknown data.
    fn render(&self, template: &str, data: &TemplateData) -> Result<String>;
}

/// The built-in `{{placeholder}}` renderer.
///
/// ```
/// use dingrelay_notify::context::NotifyContext;
/// use dingrelay_notify::template::{PlaceholderRenderer, TemplateData, TemplateRenderer};
///
/// let ctx = NotifyContext::new().with_receiver("ops");
/// let data = TemplateData::new(&ctx, &[]);
/// let out = PlaceholderRenderer.render(r#"{"text":"{{receiver}}: {{alert_count}}"}"#, &data).unwrap();
/// assert_eq!(out, r#"{"text":"ops: 0"}"#);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderRenderer;

impl TemplateRenderer for PlaceholderRenderer {
    fn render(&self, template: &str, data: &TemplateData) -> Result<String> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after.find("}}").ok_or_else(|| {
                let offset = template.len() - rest.len() + start;
                NotifyError::Template(format!("unterminated placeholder at byte {offset}"))
            })?;
            let name = after[..end].trim();
            let value = resolve(name, data)
                .ok_or_else(|| NotifyError::Template(format!("unknown placeholder '{name}'")))?;
            out.push_str(&json_escape(&value));
            rest = &after[end + 2..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

fn resolve(name: &str, data: &TemplateData) -> Option<String> {
    let lookup = |set: &LabelSet, key: &str| set.get(key).cloned().unwrap_or_default();

    if let Some(key) = name.strip_prefix("labels.") {
        return Some(lookup(&data.common_labels, key));
    }
    if let Some(key) = name.strip_prefix("group_labels.") {
        return Some(lookup(&data.group_labels, key));
    }
    if let Some(key) = name.strip_prefix("annotations.") {
        return Some(lookup(&data.common_annotations, key));
    }

    let value = match name {
        "status" => data.status.to_string(),
        "receiver" => data.receiver.clone(),
        "group_key" => data.group_key.clone(),
        "external_url" => data.external_url.clone(),
        "alert_count" => data.alerts.len().to_string(),
        "firing_count" => data.firing().count().to_string(),
        "resolved_count" => data.resolved().count().to_string(),
        "common_labels" => format_labels(&data.common_labels),
        "group_labels" => format_labels(&data.group_labels),
        "alerts" => data
            .alerts
            .iter()
            .map(format_alert_line)
            .collect::<Vec<_>>()
            .join("\n"),
        _ => return None,
    };
    Some(value)
}

fn format_alert_line(alert: &AlertData) -> String {
    let name = alert
        .labels
        .get(ALERT_NAME_LABEL)
        .map(String::as_str)
        .unwrap_or("alert");
    let mut labels = alert.labels.clone();
    labels.remove(ALERT_NAME_LABEL);

    let mut line = format!("- **{name}** [{}]", alert.status);
    if !labels.is_empty() {
        line.push(' ');
        line.push_str(&format_labels(&labels));
    }
    let summary = alert
        .annotations
        .get("summary")
        .or_else(|| alert.annotations.get("description"));
    if let Some(summary) = summary {
        line.push_str(": ");
        line.push_str(summary);
    }
    line.push_str(&format!(" (since {})", alert.starts_at.format("%Y-%m-%d %H:%M:%S UTC")));
    line
}

/// Escape `value` for the inside of a JSON string literal.
fn json_escape(value: &str) -> String {
    let quoted = serde_json::Value::String(value.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}
