//! Alert notification delivery to DingTalk custom robots.
//!
//! A [`Notifier`] receives one batch of alerts per alert group from the
//! notification pipeline, renders the configured message template, and posts
//! it to the robot endpoint. Failures carry a retry hint
//! ([`error::NotifyError::is_retryable`]); retry scheduling itself belongs to
//! the pipeline.

pub mod channels;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod template;
pub mod utils;


use async_trait::async_trait;
use context::NotifyContext;
use dingrelay_common::types::Alert;

pub use channels::dingtalk::DingTalkNotifier;
pub use config::{DingTalkConfig, Secret};
pub use error::{NotifyError, Result};

/// Delivers a batch of alerts to an external service.
///
/// Calls are independent of each other and may run concurrently on one
/// shared instance.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends `alerts` for the group identified by `ctx`.
    ///
    /// # Errors
    ///
    /// Returns a [`NotifyError`]; `is_retryable()` tells the caller whether
    /// the same batch may succeed on another attempt. `Ok(())` means the
    /// batch was accepted and must not be retried.
    async fn notify(&self, ctx: &NotifyContext, alerts: &[Alert]) -> Result<()>;

    /// Integration type name (e.g., `"dingtalk"`).
    fn integration_name(&self) -> &str;
}
