use crate::client::{build_client, HttpClientOption};
use crate::config::DingTalkConfig;
use crate::context::NotifyContext;
use crate::error::{NotifyError, Result};
use crate::template::{TemplateData, TemplateRenderer};
use crate::utils::{redact_url, scrub_secret, truncate_string, MAX_BODY_LENGTH};
use crate::Notifier;
use async_trait::async_trait;
use base64::Engine;
use dingrelay_common::types::Alert;
use hmac::{Hmac, Mac};
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use url::Url;

type HmacSha256 = Hmac<Sha256>;

/// Path of the robot send endpoint, relative to the configured API URL.
pub const ROBOT_SEND_PATH: &str = "robot/send";

const ACCESS_TOKEN_PARAM: &str = "access_token";
const TIMESTAMP_PARAM: &str = "timestamp";
const SIGN_PARAM: &str = "sign";

/// Status envelope returned by the robot API.
#[derive(Debug, Deserialize)]
struct DingTalkResponse {
    #[serde(rename = "errcode")]
    code: i64,
    #[serde(rename = "errmsg", default)]
    message: String,
}

/// Sends alert batches to a DingTalk custom robot.
///
/// One instance owns one HTTP client and is shared by every pipeline worker
/// for its receiver. Nothing is mutated after construction.
pub struct DingTalkNotifier {
    config: DingTalkConfig,
    renderer: Arc<dyn TemplateRenderer>,
    client: reqwest::Client,
}

impl DingTalkNotifier {
    pub fn new(config: DingTalkConfig, renderer: Arc<dyn TemplateRenderer>) -> Result<Self> {
        Self::with_client_options(config, renderer, &[])
    }

    /// # Errors
    ///
    /// Returns [`NotifyError::Config`] if the configuration is invalid or the
    /// HTTP client cannot be built from it.
    pub fn with_client_options(
        config: DingTalkConfig,
        renderer: Arc<dyn TemplateRenderer>,
        options: &[HttpClientOption],
    ) -> Result<Self> {
        config.validate()?;
        let client = build_client("dingtalk", &config.http_config, options)?;
        Ok(Self {
            config,
            renderer,
            client,
        })
    }

    /// Configured base URL. Sending never modifies it.
    pub fn api_url(&self) -> &Url {
        &self.config.api_url
    }

    /// Whether batches made only of resolved alerts should be sent.
    pub fn send_resolved(&self) -> bool {
        self.config.send_resolved
    }

    /// Target URL for one send: the API URL with [`ROBOT_SEND_PATH`] appended
    /// and the access token in the query. With a signing secret, `timestamp`
    /// and `sign` are added too.
    pub fn post_message_url(&self) -> Result<Url> {
        self.post_message_url_at(chrono::Utc::now().timestamp_millis())
    }

    fn post_message_url_at(&self, timestamp_ms: i64) -> Result<Url> {
        let mut url = self.config.api_url.clone();

        let mut path = url.path().to_string();
        if !path.ends_with('/') {
            path.push('/');
        }
        path.push_str(ROBOT_SEND_PATH);
        url.set_path(&path);

        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| !matches!(&**k, ACCESS_TOKEN_PARAM | TIMESTAMP_PARAM | SIGN_PARAM))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        let signature = match &self.config.secret {
            Some(secret) => Some(sign(secret.expose(), timestamp_ms)?),
            None => None,
        };

        {
            let mut query = url.query_pairs_mut();
            query.clear().extend_pairs(kept);
            query.append_pair(ACCESS_TOKEN_PARAM, self.config.access_token.expose());
            if let Some(signature) = &signature {
                query.append_pair(TIMESTAMP_PARAM, &timestamp_ms.to_string());
                query.append_pair(SIGN_PARAM, signature);
            }
        }
        Ok(url)
    }

    /// Build a transport error that carries no credentials.
    fn transport_error(&self, err: reqwest::Error) -> NotifyError {
        let url = err.url().map(redact_url);
        let mut message = error_chain(&err.without_url());
        if let Some(url) = url {
            message = format!("{message} (url: {url})");
        }
        NotifyError::Transport(self.scrub(&message))
    }

    fn scrub(&self, text: &str) -> String {
        let text = scrub_secret(text, self.config.access_token.expose());
        match &self.config.secret {
            Some(secret) => scrub_secret(&text, secret.expose()),
            None => text,
        }
    }
}

/// Robot signature: base64 HMAC-SHA256 over `"{timestamp}\n{secret}"`,
/// keyed by the secret.
fn sign(secret: &str, timestamp_ms: i64) -> Result<String> {
    let string_to_sign = format!("{timestamp_ms}\n{secret}");
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| NotifyError::Config(format!("invalid signing secret: {e}")))?;
    mac.update(string_to_sign.as_bytes());
    let result = mac.finalize();
    Ok(base64::engine::general_purpose::STANDARD.encode(result.into_bytes()))
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[async_trait]
impl Notifier for DingTalkNotifier {
    async fn notify(&self, ctx: &NotifyContext, alerts: &[Alert]) -> Result<()> {
        let key = ctx.group_key()?;
        tracing::debug!(incident = %key, alerts = alerts.len(), "Sending DingTalk notification");

        let data = TemplateData::new(ctx, alerts);
        let message = self.renderer.render(&self.config.message, &data)?;
        let url = self.post_message_url()?;

        let request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(message);

        let resp = match ctx.run(request.send()).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => {
                let err = self.transport_error(e);
                tracing::warn!(incident = %key, error = %err, "DingTalk request failed");
                return Err(err);
            }
            Err(done) => {
                tracing::warn!(incident = %key, reason = %done, "DingTalk request aborted");
                return Err(NotifyError::Transport(done.to_string()));
            }
        };

        // Read the body on every path so the connection goes back to the pool.
        let status = resp.status();
        let body = match ctx.run(resp.bytes()).await {
            Ok(Ok(body)) => Ok(body),
            Ok(Err(e)) => Err(self.scrub(&error_chain(&e.without_url()))),
            Err(done) => Err(done.to_string()),
        };

        if status != StatusCode::OK {
            tracing::warn!(
                incident = %key,
                status = status.as_u16(),
                "DingTalk returned unexpected status"
            );
            return Err(NotifyError::UnexpectedStatus {
                status: status.as_u16(),
            });
        }

        let body = body.map_err(NotifyError::Read)?;
        tracing::debug!(
            incident = %key,
            response = %truncate_string(&String::from_utf8_lossy(&body), MAX_BODY_LENGTH),
            "DingTalk response"
        );

        let resp: DingTalkResponse = serde_json::from_slice(&body)?;
        if resp.code == 0 {
            return Ok(());
        }

        Err(NotifyError::Remote {
            code: resp.code,
            message: resp.message,
        })
    }

    fn integration_name(&self) -> &str {
        "dingtalk"
    }
}
