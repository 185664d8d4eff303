use crate::transport::TransportError;
use std::time::Duration;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Configuration key or column that caused the error (e.g., "parallel_workers", "object_api_response")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected range, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "config_validator", "column_registry")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for the connectors.
///
/// Variants follow the failure classes the batch layer cares about: configuration
/// problems stop a run before any call, transient failures are retried, permanent
/// remote failures and decode failures are isolated to their row or image.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Rate limit exceeded, retry after {} ms", .retry_after.as_millis())]
    RateLimitExceeded { retry_after: Duration },

    #[error("Network transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Remote error: HTTP {status} ({code}): {message}")]
    Remote {
        status: u16,
        code: String,
        message: String,
        retryable: bool,
    },

    #[error("Malformed response: {message}{}", format_context(.context))]
    MalformedResponse {
        message: String,
        context: ErrorContext,
    },

    #[error("Image decode error for '{path}': {message}")]
    ImageDecode { path: String, message: String },

    #[error("Batch aborted at row {index}: {kind}: {message}")]
    BatchAborted {
        index: usize,
        kind: String,
        message: String,
    },

    #[error("Runtime error: {message}{}", format_context(.context))]
    Runtime {
        message: String,
        context: ErrorContext,
    },
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Create a configuration error pointing at a single config key
    pub fn configuration(field: &str, msg: impl Into<String>) -> Self {
        Self::configuration_with_context(
            msg,
            ErrorContext::new()
                .with_field_path(field)
                .with_source("config_validator"),
        )
    }

    /// Create a new runtime error with structured context
    pub fn runtime_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Runtime {
            message: msg.into(),
            context,
        }
    }

    pub fn malformed_response(msg: impl Into<String>, column: &str) -> Self {
        Error::MalformedResponse {
            message: msg.into(),
            context: ErrorContext::new()
                .with_field_path(column)
                .with_source("response_formatter"),
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. }
            | Error::MalformedResponse { context, .. }
            | Error::Runtime { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Whether a retry after the quota period may succeed.
    ///
    /// Rate-limit signals, transport hiccups and I/O failures are transient. Remote
    /// errors carry their own classification (see [`crate::error_code::RemoteErrorCode`]).
    pub fn is_transient(&self) -> bool {
        match self {
            Error::RateLimitExceeded { .. } | Error::Transport(_) | Error::Io(_) => true,
            Error::Remote { retryable, .. } => *retryable,
            _ => false,
        }
    }

    /// Short kind name written to the error type column of a failed row.
    pub fn kind_name(&self) -> String {
        match self {
            Error::Configuration { .. } => "ConfigurationError".to_string(),
            Error::RateLimitExceeded { .. } => "RateLimitExceeded".to_string(),
            Error::Transport(_) => "TransportError".to_string(),
            Error::Io(_) => "IOError".to_string(),
            Error::Serialization(_) => "SerializationError".to_string(),
            Error::Remote { code, .. } => code.clone(),
            Error::MalformedResponse { .. } => "MalformedResponseError".to_string(),
            Error::ImageDecode { .. } => "ImageDecodeError".to_string(),
            Error::BatchAborted { kind, .. } => kind.clone(),
            Error::Runtime { .. } => "RuntimeError".to_string(),
        }
    }

    /// Bare message without the variant prefix, for the error message column.
    pub fn message(&self) -> String {
        match self {
            Error::Configuration { message, .. }
            | Error::Remote { message, .. }
            | Error::MalformedResponse { message, .. }
            | Error::ImageDecode { message, .. }
            | Error::BatchAborted { message, .. }
            | Error::Runtime { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_display_includes_context() {
        let err = Error::configuration("parallel_workers", "Concurrency must be between 1 and 100");
        let text = err.to_string();
        assert!(text.contains("Concurrency must be between 1 and 100"));
        assert!(text.contains("field: parallel_workers"));
        assert!(text.contains("source: config_validator"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(Error::RateLimitExceeded {
            retry_after: Duration::from_secs(1)
        }
        .is_transient());
        assert!(Error::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe")).is_transient());
        assert!(!Error::configuration("x", "bad").is_transient());

        let throttled = Error::Remote {
            status: 400,
            code: "ThrottlingException".into(),
            message: "slow down".into(),
            retryable: true,
        };
        assert!(throttled.is_transient());
        assert_eq!(throttled.kind_name(), "ThrottlingException");
        assert_eq!(throttled.message(), "slow down");
    }
}
