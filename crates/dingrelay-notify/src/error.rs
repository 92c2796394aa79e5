/// Errors returned by a notification attempt.
///
/// Every variant carries a retry classification, see
/// [`NotifyError::is_retryable`]. The pipeline uses it to decide whether the
/// same batch should be sent again.
///
/// Error text never contains the robot access token. Transport errors are
/// built from a redacted URL before they reach this type.
///
/// # Examples
///
/// ```rust
/// use dingrelay_notify::error::NotifyError;
///
/// let err = NotifyError::UnexpectedStatus { status: 502 };
/// assert!(err.is_retryable());
/// assert!(err.to_string().contains("502"));
///
/// let err = NotifyError::Remote { code: 310000, message: "keywords not in content".into() };
/// assert!(!err.is_retryable());
/// ```
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The notifier could not be built from its configuration.
    #[error("Notify: invalid configuration: {0}")]
    Config(String),

    /// The call context lacks data the notifier needs (e.g. the group key).
    #[error("Notify: invalid context: {0}")]
    Context(String),

    /// Rendering the message template failed.
    #[error("Notify: template rendering error: {0}")]
    Template(String),

    /// The request never produced a response: DNS, connect, timeout or
    /// cancellation.
    #[error("Notify: HTTP request failed: {0}")]
    Transport(String),

    /// The endpoint answered with a status other than 200.
    #[error("Notify: unexpected status code {status}")]
    UnexpectedStatus { status: u16 },

    /// The response body could not be read to the end.
    #[error("Notify: failed to read response body: {0}")]
    Read(String),

    /// The response body is not a valid status envelope.
    #[error("Notify: failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The endpoint rejected the message with a non-zero `errcode`.
    #[error("Notify: remote error {code}: {message}")]
    Remote { code: i64, message: String },
}

impl NotifyError {
    /// Whether sending the same batch again might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            NotifyError::Transport(_)
                | NotifyError::UnexpectedStatus { .. }
                | NotifyError::Read(_)
                | NotifyError::Decode(_)
        )
    }
}

/// Convenience `Result` alias for notification operations.
pub type Result<T> = std::result::Result<T, NotifyError>;
