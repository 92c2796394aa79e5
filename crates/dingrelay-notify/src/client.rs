//! HTTP client construction from named transport options.

use crate::error::{NotifyError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TlsConfig {
    /// PEM bundle added to the trusted roots.
    #[serde(default)]
    pub ca_file: Option<PathBuf>,
    #[serde(default)]
    pub insecure_skip_verify: bool,
}

/// Transport settings for the robot endpoint, read from configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpClientConfig {
    /// Whole-request timeout in seconds, body included.
    #[serde(default)]
    pub timeout: Option<u64>,
    /// Connect timeout in seconds.
    #[serde(default)]
    pub connect_timeout: Option<u64>,
    #[serde(default)]
    pub proxy_url: Option<String>,
    #[serde(default)]
    pub tls_config: TlsConfig,
    #[serde(default)]
    pub user_agent: Option<String>,
}

/// Programmatic overrides applied after [`HttpClientConfig`].
#[derive(Debug, Clone, PartialEq)]
pub enum HttpClientOption {
    UserAgent(String),
    Timeout(Duration),
    ConnectTimeout(Duration),
    PoolIdleTimeout(Duration),
    /// Ignore proxies from the environment and the configuration.
    NoProxy,
}

fn default_user_agent() -> String {
    format!("dingrelay/{}", env!("CARGO_PKG_VERSION"))
}

/// Build the client used by one notifier instance.
///
/// `name` only appears in error messages.
///
/// # Errors
///
/// Returns [`NotifyError::Config`] when the CA file cannot be read or parsed,
/// the proxy URL is invalid, or the TLS backend rejects the settings.
pub fn build_client(
    name: &str,
    config: &HttpClientConfig,
    options: &[HttpClientOption],
) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .user_agent(config.user_agent.clone().unwrap_or_else(default_user_agent));

    if let Some(secs) = config.timeout {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    if let Some(secs) = config.connect_timeout {
        builder = builder.connect_timeout(Duration::from_secs(secs));
    }

    let no_proxy = options.contains(&HttpClientOption::NoProxy);
    if let (Some(proxy_url), false) = (&config.proxy_url, no_proxy) {
        let proxy = reqwest::Proxy::all(proxy_url.as_str()).map_err(|e| {
            NotifyError::Config(format!("{name}: invalid proxy_url: {}", e.without_url()))
        })?;
        builder = builder.proxy(proxy);
    }

    if let Some(ca_file) = &config.tls_config.ca_file {
        let pem = std::fs::read(ca_file).map_err(|e| {
            NotifyError::Config(format!(
                "{name}: failed to read ca_file {}: {e}",
                ca_file.display()
            ))
        })?;
        let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
            NotifyError::Config(format!(
                "{name}: invalid certificate in {}: {e}",
                ca_file.display()
            ))
        })?;
        builder = builder.add_root_certificate(cert);
    }
    if config.tls_config.insecure_skip_verify {
        tracing::warn!(client = name, "TLS certificate verification is disabled");
        builder = builder.danger_accept_invalid_certs(true);
    }

    for option in options {
        builder = match option {
            HttpClientOption::UserAgent(ua) => builder.user_agent(ua.clone()),
            HttpClientOption::Timeout(timeout) => builder.timeout(*timeout),
            HttpClientOption::ConnectTimeout(timeout) => builder.connect_timeout(*timeout),
            HttpClientOption::PoolIdleTimeout(timeout) => builder.pool_idle_timeout(*timeout),
            HttpClientOption::NoProxy => builder.no_proxy(),
        };
    }

    builder
        .build()
        .map_err(|e| NotifyError::Config(format!("{name}: failed to build HTTP client: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_builds() {
        assert!(build_client("dingtalk", &HttpClientConfig::default(), &[]).is_ok());
    }

    #[test]
    fn options_are_applied() {
        let options = [
            HttpClientOption::UserAgent("alertmanager-relay".into()),
            HttpClientOption::Timeout(Duration::from_secs(5)),
            HttpClientOption::ConnectTimeout(Duration::from_secs(1)),
            HttpClientOption::PoolIdleTimeout(Duration::from_secs(30)),
            HttpClientOption::NoProxy,
        ];
        let config = HttpClientConfig {
            proxy_url: Some("http://proxy.internal:3128".into()),
            ..Default::default()
        };
        assert!(build_client("dingtalk", &config, &options).is_ok());
    }

    #[test]
    fn missing_ca_file_is_config_error() {
        let config = HttpClientConfig {
            tls_config: TlsConfig {
                ca_file: Some(PathBuf::from("/nonexistent/dingrelay/ca.pem")),
                insecure_skip_verify: false,
            },
            ..Default::default()
        };
        let err = build_client("dingtalk", &config, &[]).unwrap_err();
        assert!(matches!(err, NotifyError::Config(_)), "{err}");
        assert!(err.to_string().contains("ca_file"));
    }

    #[test]
    fn invalid_proxy_is_config_error() {
        let config = HttpClientConfig {
            proxy_url: Some("http://[::1".into()),
            ..Default::default()
        };
        let err = build_client("dingtalk", &config, &[]).unwrap_err();
        assert!(matches!(err, NotifyError::Config(_)), "{err}");
    }

    #[test]
    fn http_config_from_toml() {
        let config: HttpClientConfig = toml::from_str(
            r#"
            timeout = 10
            connect_timeout = 2
            proxy_url = "http://proxy.internal:3128"

            [tls_config]
            insecure_skip_verify = true
            "#,
        )
        .unwrap();
        assert_eq!(config.timeout, Some(10));
        assert_eq!(config.connect_timeout, Some(2));
        assert!(config.tls_config.insecure_skip_verify);
    }
}
