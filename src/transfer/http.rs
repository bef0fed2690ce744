use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::{Delivery, Envelope, RESPONSE_PREVIEW_CHARS};
use crate::types::{string_pairs, Map, Value};
use crate::{EtlError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum HttpMethod {
    #[default]
    Post,
    Put,
    Patch,
}

impl TryFrom<String> for HttpMethod {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        match value.to_ascii_uppercase().as_str() {
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            _ => Err(format!("unsupported HTTP method: {value}")),
        }
    }
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
        }
    }

    fn to_reqwest(self) -> Method {
        match self {
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
        }
    }
}

/// Webhook delivery: the value travels inside the transfer envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    pub webhook_url: String,
    #[serde(default)]
    pub method: HttpMethod,
    /// Replaces the default `Content-Type: application/json` when it names one.
    #[serde(default, deserialize_with = "string_pairs")]
    pub headers: Vec<(String, String)>,
    /// Seconds; the configured webhook timeout when absent.
    #[serde(default)]
    pub timeout: Option<f64>,
    /// Merged over the envelope keys.
    #[serde(default)]
    pub custom_fields: Map<String, Value>,
}

/// Generic API delivery with optional auth and an unwrapped body.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub api_endpoint: String,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default, deserialize_with = "string_pairs")]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub auth: Option<ApiAuth>,
    #[serde(default = "default_wrap")]
    pub wrap_data: bool,
    #[serde(default)]
    pub timeout: Option<f64>,
}

#[derive(Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ApiAuth {
    Basic { username: String, password: String },
    Bearer { token: String },
}

impl std::fmt::Debug for ApiAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiAuth::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            ApiAuth::Bearer { .. } => f.debug_struct("Bearer").field("token", &"<redacted>").finish(),
        }
    }
}

fn default_wrap() -> bool {
    true
}

impl WebhookConfig {
    pub fn validate(&self) -> Result<()> {
        check_url(&self.webhook_url, "webhook_url")?;
        if self.method == HttpMethod::Patch {
            return Err(EtlError::validation(
                "unsupported HTTP method for webhook: PATCH (use POST or PUT)",
            ));
        }
        header_map(&self.headers)?;
        timeout_from(self.timeout, Duration::ZERO)?;
        Ok(())
    }
}

impl ApiConfig {
    pub fn validate(&self) -> Result<()> {
        check_url(&self.api_endpoint, "api_endpoint")?;
        header_map(&self.headers)?;
        timeout_from(self.timeout, Duration::ZERO)?;
        Ok(())
    }
}

fn check_url(raw: &str, field: &str) -> Result<()> {
    url::Url::parse(raw)
        .map(|_| ())
        .map_err(|e| EtlError::validation(format!("invalid {field} '{raw}': {e}")))
}

fn header_map(pairs: &[(String, String)]) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| EtlError::validation(format!("invalid header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| EtlError::validation(format!("invalid value for header '{name}': {e}")))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

fn timeout_from(seconds: Option<f64>, default: Duration) -> Result<Duration> {
    match seconds {
        None => Ok(default),
        Some(secs) if secs > 0.0 => Duration::try_from_secs_f64(secs)
            .map_err(|e| EtlError::validation(format!("invalid timeout {secs}: {e}"))),
        Some(secs) => Err(EtlError::validation(format!(
            "timeout must be positive, got {secs}"
        ))),
    }
}

pub(crate) async fn send_webhook(
    client: &Client,
    default_timeout: Duration,
    config: &WebhookConfig,
    envelope: &Envelope,
    data: &Value,
) -> Result<Delivery> {
    let payload = envelope.wrap(data, Some(&config.custom_fields));
    let body = serde_json::to_vec(&payload)?;
    let bytes = body.len() as u64;

    let request = client
        .request(config.method.to_reqwest(), &config.webhook_url)
        .header(CONTENT_TYPE, "application/json")
        .headers(header_map(&config.headers)?)
        .timeout(timeout_from(config.timeout, default_timeout)?)
        .body(body);
    let (status, response_body) = execute(request).await?;

    Ok(Delivery {
        bytes,
        details: json!({
            "webhook_url": config.webhook_url,
            "status_code": status.as_u16(),
            "response_body": preview(&response_body),
        }),
    })
}

pub(crate) async fn send_api(
    client: &Client,
    default_timeout: Duration,
    config: &ApiConfig,
    envelope: &Envelope,
    data: &Value,
) -> Result<Delivery> {
    let body = if config.wrap_data {
        serde_json::to_vec(&envelope.wrap(data, None))?
    } else {
        serde_json::to_vec(data)?
    };
    let bytes = body.len() as u64;

    let mut request = client
        .request(config.method.to_reqwest(), &config.api_endpoint)
        .header(CONTENT_TYPE, "application/json")
        .headers(header_map(&config.headers)?)
        .timeout(timeout_from(config.timeout, default_timeout)?)
        .body(body);
    request = match &config.auth {
        Some(ApiAuth::Basic { username, password }) => request.basic_auth(username, Some(password)),
        Some(ApiAuth::Bearer { token }) => request.bearer_auth(token),
        None => request,
    };
    let (status, response_body) = execute(request).await?;

    Ok(Delivery {
        bytes,
        details: json!({
            "api_endpoint": config.api_endpoint,
            "method": config.method.as_str(),
            "status_code": status.as_u16(),
            "response_body": preview(&response_body),
        }),
    })
}

async fn execute(request: RequestBuilder) -> Result<(StatusCode, String)> {
    let response = request.send().await.map_err(|e| {
        let message = if e.is_timeout() {
            format!("request timed out: {e}")
        } else {
            format!("request failed: {e}")
        };
        EtlError::delivery(e.status().map(|s| s.as_u16()), message)
    })?;

    let status = response.status();
    let body = match response.text().await {
        Ok(body) => body,
        Err(err) => {
            warn!(status = status.as_u16(), "failed to read destination response body: {err}");
            String::new()
        }
    };
    debug!(status = status.as_u16(), "destination responded");

    if status.is_success() {
        return Ok((status, body));
    }
    Err(EtlError::delivery(
        Some(status.as_u16()),
        error_message(status, &body),
    ))
}

fn error_message(status: StatusCode, body: &str) -> String {
    let from_body = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            ["error", "message", "detail"]
                .iter()
                .find_map(|key| value.get(*key).and_then(Value::as_str).map(str::to_owned))
        });
    match from_body {
        Some(message) => message,
        None if body.trim().is_empty() => {
            format!("destination returned status {}", status.as_u16())
        }
        None => format!(
            "destination returned status {}: {}",
            status.as_u16(),
            preview(body.trim())
        ),
    }
}

fn preview(body: &str) -> String {
    body.chars().take(RESPONSE_PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn method_parsing_is_case_insensitive() {
        let config: WebhookConfig =
            serde_json::from_value(json!({"webhook_url": "http://x.test", "method": "put"})).unwrap();
        assert_eq!(config.method, HttpMethod::Put);
        assert!(serde_json::from_value::<WebhookConfig>(
            json!({"webhook_url": "http://x.test", "method": "DELETE"})
        )
        .is_err());
    }

    #[test]
    fn webhook_rejects_patch() {
        let config: WebhookConfig = serde_json::from_value(
            json!({"webhook_url": "http://x.test", "method": "PATCH"}),
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(EtlError::Validation(_))));
    }

    #[test]
    fn api_defaults_to_wrapped_post() {
        let config: ApiConfig =
            serde_json::from_value(json!({"api_endpoint": "https://api.test/v1"})).unwrap();
        assert!(config.wrap_data);
        assert_eq!(config.method, HttpMethod::Post);
        assert!(config.auth.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn auth_debug_hides_secrets() {
        let auth: ApiAuth =
            serde_json::from_value(json!({"type": "bearer", "token": "s3cret"})).unwrap();
        assert!(!format!("{auth:?}").contains("s3cret"));
    }

    #[test]
    fn invalid_headers_and_timeouts_are_rejected() {
        assert!(header_map(&[("bad header".into(), "x".into())]).is_err());
        assert!(header_map(&[("X-Token".into(), "ok".into())]).is_ok());
        assert!(timeout_from(Some(0.0), Duration::from_secs(1)).is_err());
        assert_eq!(
            timeout_from(Some(1.5), Duration::from_secs(1)).unwrap(),
            Duration::from_millis(1500)
        );
        assert_eq!(
            timeout_from(None, Duration::from_secs(9)).unwrap(),
            Duration::from_secs(9)
        );
    }

    #[test]
    fn error_message_prefers_body_fields() {
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, r#"{"error":"bad payload"}"#),
            "bad payload"
        );
        assert_eq!(
            error_message(StatusCode::INTERNAL_SERVER_ERROR, ""),
            "destination returned status 500"
        );
        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, "upstream down"),
            "destination returned status 502: upstream down"
        );
    }
}
