use crate::client::HttpClientConfig;
use crate::error::{NotifyError, Result};
use crate::utils::{redact_sensitive_json, REDACTED};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::path::Path;
use url::Url;

/// Default DingTalk open API base.
pub const DEFAULT_API_URL: &str = "https://oapi.dingtalk.com/";

/// Markdown message posted when no `message` template is configured.
pub const DEFAULT_MESSAGE: &str = r####"{
  "msgtype": "markdown",
  "markdown": {
    "title": "[{{status}}] {{labels.alertname}}",
    "text": "### [{{status}}] {{labels.alertname}}\n\n{{alerts}}\n\n> {{external_url}}"
  }
}"####;

/// A credential that is never printed.
///
/// `Debug` and `Serialize` both emit [`REDACTED`]; only [`Secret::expose`]
/// gives access to the value.
///
/// ```
/// use dingrelay_notify::config::Secret;
///
/// let token = Secret::new("abc123");
/// assert_eq!(format!("{token:?}"), "Secret(***)");
/// assert_eq!(token.expose(), "abc123");
/// ```
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret({REDACTED})")
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(REDACTED)
    }
}

/// Configuration of one DingTalk robot receiver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DingTalkConfig {
    #[serde(default = "default_api_url")]
    pub api_url: Url,
    pub access_token: Secret,
    /// Signing secret for robots with the "sign" security setting.
    #[serde(default)]
    pub secret: Option<Secret>,
    /// Message template, rendered by the notifier's template renderer.
    #[serde(default = "default_message")]
    pub message: String,
    #[serde(default = "default_send_resolved")]
    pub send_resolved: bool,
    #[serde(default)]
    pub http_config: HttpClientConfig,
}

fn default_api_url() -> Url {
    Url::parse(DEFAULT_API_URL).expect("default api url is valid")
}

fn default_message() -> String {
    DEFAULT_MESSAGE.to_string()
}

fn default_send_resolved() -> bool {
    true
}

impl DingTalkConfig {
    pub fn new(api_url: Url, access_token: impl Into<String>) -> Self {
        Self {
            api_url,
            access_token: Secret::new(access_token),
            secret: None,
            message: default_message(),
            send_resolved: default_send_resolved(),
            http_config: HttpClientConfig::default(),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            NotifyError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML document.
    ///
    /// Parse errors report only the message, never the offending source
    /// line, which may hold the token.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| NotifyError::Config(format!("invalid TOML: {}", e.message())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !matches!(self.api_url.scheme(), "http" | "https") {
            return Err(NotifyError::Config(format!(
                "api_url must use http or https, got '{}'",
                self.api_url.scheme()
            )));
        }
        if self.api_url.cannot_be_a_base() {
            return Err(NotifyError::Config("api_url cannot be a base URL".into()));
        }
        if self.access_token.is_empty() {
            return Err(NotifyError::Config("access_token must not be empty".into()));
        }
        if self.secret.as_ref().is_some_and(Secret::is_empty) {
            return Err(NotifyError::Config("secret must not be empty when set".into()));
        }
        if self.message.trim().is_empty() {
            return Err(NotifyError::Config("message template must not be empty".into()));
        }
        Ok(())
    }

    /// JSON view for diagnostics with every credential replaced.
    pub fn redacted_json(&self) -> Value {
        let value = serde_json::to_value(self).unwrap_or(Value::Null);
        redact_sensitive_json(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = DingTalkConfig::from_toml_str(r#"access_token = "abc123""#).unwrap();
        assert_eq!(config.api_url.as_str(), DEFAULT_API_URL);
        assert_eq!(config.access_token.expose(), "abc123");
        assert_eq!(config.message, DEFAULT_MESSAGE);
        assert!(config.send_resolved);
        assert!(config.secret.is_none());
        assert_eq!(config.http_config, HttpClientConfig::default());
    }

    #[test]
    fn full_toml() {
        let config = DingTalkConfig::from_toml_str(
            r#"
            api_url = "https://dingtalk-gateway.internal/api/"
            access_token = "abc123"
            secret = "SEC000"
            message = '{"msgtype":"text","text":{"content":"{{status}}"}}'
            send_resolved = false

            [http_config]
            timeout = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.api_url.path(), "/api/");
        assert_eq!(config.secret.as_ref().map(Secret::expose), Some("SEC000"));
        assert!(!config.send_resolved);
        assert_eq!(config.http_config.timeout, Some(5));
    }

    #[test]
    fn missing_token_is_rejected() {
        let err = DingTalkConfig::from_toml_str(r#"api_url = "https://oapi.dingtalk.com/""#)
            .unwrap_err();
        assert!(matches!(err, NotifyError::Config(_)));

        let err = DingTalkConfig::from_toml_str("access_token = ''").unwrap_err();
        assert!(err.to_string().contains("access_token"));
    }

    #[test]
    fn parse_error_does_not_echo_source() {
        let err = DingTalkConfig::from_toml_str("access_token = \"abc123\"\nsend_resolved = \"nope\"")
            .unwrap_err();
        assert!(!err.to_string().contains("abc123"), "{err}");
    }

    #[test]
    fn non_http_scheme_is_rejected() {
        let config = DingTalkConfig::new(Url::parse("ftp://oapi.dingtalk.com/").unwrap(), "abc123");
        assert!(config.validate().is_err());
    }

    #[test]
    fn token_never_printed() {
        let mut config = DingTalkConfig::new(default_api_url(), "abc123");
        config.secret = Some(Secret::new("SEC000"));

        let debug = format!("{config:?}");
        assert!(!debug.contains("abc123"));
        assert!(!debug.contains("SEC000"));

        let json = config.redacted_json();
        assert_eq!(json["access_token"], REDACTED);
        assert_eq!(json["secret"], REDACTED);
        assert_eq!(json["api_url"], DEFAULT_API_URL);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"access_token = "abc123""#).unwrap();
        writeln!(file, r#"api_url = "http://127.0.0.1:8060/""#).unwrap();
        let config = DingTalkConfig::load(file.path()).unwrap();
        assert_eq!(config.api_url.as_str(), "http://127.0.0.1:8060/");

        let err = DingTalkConfig::load("/nonexistent/dingrelay.toml").unwrap_err();
        assert!(matches!(err, NotifyError::Config(_)));
    }
}
