use super::{Operation, TransportError, VisionClient};
use crate::error_code::RemoteErrorCode;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use keyring::Entry;
use serde_json::Value;
use std::env;
use std::time::Duration;
use tracing::{debug, info};

const JSON_CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const KEYRING_SERVICE: &str = "rekognition-batch";

#[derive(Debug, Clone)]
pub struct HttpVisionClientConfig {
    /// Base URL of the service endpoint, e.g. `https://rekognition.eu-west-1.amazonaws.com`.
    pub endpoint: String,
    pub region: Option<String>,
    /// Explicit credential; when absent the keyring and `REKOGNITION_API_KEY` are consulted.
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl HttpVisionClientConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            region: None,
            api_key: None,
            timeout: Duration::from_secs(30),
        }
    }

    /// Default regional endpoint.
    pub fn for_region(region: &str) -> Self {
        let mut cfg = Self::new(format!("https://rekognition.{}.amazonaws.com", region));
        cfg.region = Some(region.to_string());
        cfg
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// JSON 1.1 client authenticated with a bearer key. Requests are not SigV4-signed.
pub struct HttpVisionClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpVisionClient {
    pub fn new(config: HttpVisionClientConfig) -> Result<Self> {
        let endpoint = url::Url::parse(&config.endpoint).map_err(|e| {
            Error::configuration_with_context(
                format!("Invalid endpoint URL: {}", e),
                ErrorContext::new()
                    .with_field_path("endpoint")
                    .with_details(config.endpoint.clone())
                    .with_source("http_client"),
            )
        })?;

        // Env override wins over the configured timeout.
        let timeout = env::var("REKOGNITION_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(config.timeout);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(
                env::var("REKOGNITION_HTTP_POOL_MAX_IDLE_PER_HOST")
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .unwrap_or(32),
            )
            .build()
            .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))?;

        let api_key = config
            .api_key
            .clone()
            .or_else(|| Self::get_api_key(config.region.as_deref().unwrap_or("default")));
        info!(
            endpoint = %endpoint,
            credentials = api_key.is_some(),
            "Vision API client initialized"
        );

        Ok(Self {
            client,
            endpoint: endpoint.as_str().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn get_api_key(region: &str) -> Option<String> {
        // 1. Try Keyring
        if let Ok(entry) = Entry::new(KEYRING_SERVICE, region) {
            if let Ok(key) = entry.get_password() {
                return Some(key);
            }
        }

        // 2. Try Environment Variable
        env::var("REKOGNITION_API_KEY").ok()
    }

    fn remote_error(status: u16, body: &str) -> Error {
        let parsed: Option<Value> = serde_json::from_str(body).ok();
        let type_field = parsed
            .as_ref()
            .and_then(|v| v.get("__type").or_else(|| v.get("code")))
            .and_then(Value::as_str);
        let message = parsed
            .as_ref()
            .and_then(|v| v.get("message").or_else(|| v.get("Message")))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| body.chars().take(512).collect());

        let code = match type_field {
            Some(t) => RemoteErrorCode::from_type_field(t),
            None => RemoteErrorCode::from_http_status(status),
        };
        // Keep the provider's own code name when we do not know it.
        let code_name = match (code, type_field) {
            (RemoteErrorCode::Unknown, Some(t)) => t.rsplit('#').next().unwrap_or(t).to_string(),
            _ => code.name().to_string(),
        };

        Error::Remote {
            status,
            code: code_name,
            message,
            retryable: code.retryable(),
        }
    }
}

#[async_trait]
impl VisionClient for HttpVisionClient {
    async fn invoke(&self, operation: Operation, body: Value) -> Result<Value> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let mut req = self
            .client
            .post(format!("{}/", self.endpoint))
            .header("content-type", JSON_CONTENT_TYPE)
            .header("x-amz-target", operation.target())
            .header("x-client-request-id", &request_id)
            .json(&body);

        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req
            .send()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))?;
        debug!(%operation, status = status.as_u16(), %request_id, "remote call finished");

        if !status.is_success() {
            return Err(Self::remote_error(status.as_u16(), &text));
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_from_typed_body() {
        let err = HttpVisionClient::remote_error(
            400,
            r#"{"__type":"com.amazonaws.rekognition#ThrottlingException","message":"Rate exceeded"}"#,
        );
        match err {
            Error::Remote {
                status,
                code,
                message,
                retryable,
            } => {
                assert_eq!(status, 400);
                assert_eq!(code, "ThrottlingException");
                assert_eq!(message, "Rate exceeded");
                assert!(retryable);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_remote_error_unknown_code_is_kept() {
        let err = HttpVisionClient::remote_error(400, r#"{"__type":"x#BrandNewException"}"#);
        assert_eq!(err.kind_name(), "BrandNewException");
        assert!(!err.is_transient());
    }

    #[test]
    fn test_remote_error_without_body_uses_status() {
        let err = HttpVisionClient::remote_error(503, "upstream unavailable");
        assert_eq!(err.kind_name(), "ServiceUnavailableException");
        assert!(err.is_transient());
    }

    #[test]
    fn test_invalid_endpoint_is_configuration_error() {
        let err = HttpVisionClient::new(HttpVisionClientConfig::new("not a url")).err();
        assert!(matches!(err, Some(Error::Configuration { .. })));
    }
}
