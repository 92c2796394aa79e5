//! Per-call context handed to a notifier by the pipeline.

use crate::error::{NotifyError, Result};
use dingrelay_common::types::LabelSet;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why [`NotifyContext::run`] stopped waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ContextDone {
    #[error("context canceled")]
    Canceled,
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Data scoped to one notification attempt for one alert group.
///
/// Cloning is cheap and clones share the cancellation token.
#[derive(Debug, Clone, Default)]
pub struct NotifyContext {
    group_key: Option<String>,
    receiver: String,
    group_labels: LabelSet,
    external_url: String,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl NotifyContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group_key(mut self, key: impl Into<String>) -> Self {
        self.group_key = Some(key.into());
        self
    }

    pub fn with_receiver(mut self, receiver: impl Into<String>) -> Self {
        self.receiver = receiver.into();
        self
    }

    pub fn with_group_labels(mut self, labels: LabelSet) -> Self {
        self.group_labels = labels;
        self
    }

    pub fn with_external_url(mut self, url: impl Into<String>) -> Self {
        self.external_url = url.into();
        self
    }

    /// Use `token` instead of the context's own token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Deadline `timeout` from now. A timeout too large to represent leaves
    /// the context without a deadline.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    /// Group key used to correlate log lines of one alert group.
    pub fn group_key(&self) -> Result<&str> {
        self.group_key
            .as_deref()
            .ok_or_else(|| NotifyError::Context("group key missing".into()))
    }

    pub fn receiver(&self) -> &str {
        &self.receiver
    }

    pub fn group_labels(&self) -> &LabelSet {
        &self.group_labels
    }

    pub fn external_url(&self) -> &str {
        &self.external_url
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Reports why the context is finished, if it is.
    pub fn done(&self) -> Option<ContextDone> {
        if self.cancel.is_cancelled() {
            Some(ContextDone::Canceled)
        } else if self.deadline.is_some_and(|d| d <= Instant::now()) {
            Some(ContextDone::DeadlineExceeded)
        } else {
            None
        }
    }

    /// Drive `fut` until it completes or the context finishes, whichever
    /// comes first. `fut` is dropped when the context wins.
    pub async fn run<F: Future>(&self, fut: F) -> std::result::Result<F::Output, ContextDone> {
        if let Some(done) = self.done() {
            return Err(done);
        }
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ContextDone::Canceled),
            _ = deadline => Err(ContextDone::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }
}
