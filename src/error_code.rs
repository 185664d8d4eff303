//! Remote error codes for the image recognition API.
//!
//! The remote service reports failures as `{"__type": "<namespace>#<Code>", "message": ...}`.
//! This module maps those codes (and bare HTTP statuses, when the body carries no code)
//! onto a small classification used by the retry layer.
//!
//! | Category    | Retryable | Examples                                              |
//! |-------------|-----------|-------------------------------------------------------|
//! | `throttle`  | yes       | ThrottlingException, ProvisionedThroughputExceeded    |
//! | `server`    | yes       | InternalServerError, ServiceUnavailable               |
//! | `auth`      | no        | AccessDeniedException, UnrecognizedClientException    |
//! | `request`   | no        | InvalidParameterException, InvalidImageFormat         |
//! | `unknown`   | no        | anything else                                         |
//!
//! ## Example
//!
//! ```rust
//! use rekognition_batch::error_code::RemoteErrorCode;
//!
//! let code = RemoteErrorCode::from_type_field("com.amazonaws.rekognition#ThrottlingException");
//! assert_eq!(code, RemoteErrorCode::Throttling);
//! assert!(code.retryable());
//! assert_eq!(code.category(), "throttle");
//! ```

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteErrorCode {
    /// Request rate above the account's transactions-per-second limit
    Throttling,
    /// Provisioned throughput for the account has been exceeded
    ProvisionedThroughputExceeded,
    /// Service-side limit (e.g. concurrent jobs) reached
    LimitExceeded,
    /// Internal failure on the provider side
    InternalServerError,
    /// Provider temporarily unavailable
    ServiceUnavailable,
    /// Credentials are valid but not allowed to perform the operation
    AccessDenied,
    /// Credentials not recognized, expired or badly signed
    Authentication,
    /// Malformed request or invalid parameter value
    InvalidParameter,
    /// Image bytes are not a supported format
    InvalidImageFormat,
    /// Image exceeds the inline size limit
    ImageTooLarge,
    /// Referenced bucket object cannot be read
    InvalidS3Object,
    /// Requested resource does not exist
    ResourceNotFound,
    /// Error could not be classified
    Unknown,
}

impl RemoteErrorCode {
    /// Canonical code string as written to the error type column.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Throttling => "ThrottlingException",
            Self::ProvisionedThroughputExceeded => "ProvisionedThroughputExceededException",
            Self::LimitExceeded => "LimitExceededException",
            Self::InternalServerError => "InternalServerError",
            Self::ServiceUnavailable => "ServiceUnavailableException",
            Self::AccessDenied => "AccessDeniedException",
            Self::Authentication => "UnrecognizedClientException",
            Self::InvalidParameter => "InvalidParameterException",
            Self::InvalidImageFormat => "InvalidImageFormatException",
            Self::ImageTooLarge => "ImageTooLargeException",
            Self::InvalidS3Object => "InvalidS3ObjectException",
            Self::ResourceNotFound => "ResourceNotFoundException",
            Self::Unknown => "UnknownError",
        }
    }

    #[inline]
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::Throttling
                | Self::ProvisionedThroughputExceeded
                | Self::LimitExceeded
                | Self::InternalServerError
                | Self::ServiceUnavailable
        )
    }

    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Throttling | Self::ProvisionedThroughputExceeded | Self::LimitExceeded => {
                "throttle"
            }
            Self::InternalServerError | Self::ServiceUnavailable => "server",
            Self::AccessDenied | Self::Authentication => "auth",
            Self::InvalidParameter
            | Self::InvalidImageFormat
            | Self::ImageTooLarge
            | Self::InvalidS3Object
            | Self::ResourceNotFound => "request",
            Self::Unknown => "unknown",
        }
    }

    /// Maps a provider error code to the corresponding `RemoteErrorCode`.
    pub fn from_provider_code(code: &str) -> Option<Self> {
        let code = match code {
            "ThrottlingException" | "Throttling" => Self::Throttling,
            "ProvisionedThroughputExceededException" => Self::ProvisionedThroughputExceeded,
            "LimitExceededException" => Self::LimitExceeded,
            "InternalServerError" | "InternalFailure" => Self::InternalServerError,
            "ServiceUnavailableException" | "ServiceUnavailable" => Self::ServiceUnavailable,
            "AccessDeniedException" => Self::AccessDenied,
            "UnrecognizedClientException"
            | "InvalidSignatureException"
            | "ExpiredTokenException"
            | "MissingAuthenticationTokenException" => Self::Authentication,
            "InvalidParameterException" | "ValidationException" => Self::InvalidParameter,
            "InvalidImageFormatException" => Self::InvalidImageFormat,
            "ImageTooLargeException" => Self::ImageTooLarge,
            "InvalidS3ObjectException" => Self::InvalidS3Object,
            "ResourceNotFoundException" => Self::ResourceNotFound,
            _ => return None,
        };
        Some(code)
    }

    /// Parses the `__type` field, which may carry a `namespace#` prefix.
    pub fn from_type_field(type_field: &str) -> Self {
        let code = type_field.rsplit('#').next().unwrap_or(type_field);
        Self::from_provider_code(code).unwrap_or(Self::Unknown)
    }

    /// Fallback mapping when the body does not name a code.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            400 => Self::InvalidParameter,
            401 => Self::Authentication,
            403 => Self::AccessDenied,
            404 => Self::ResourceNotFound,
            413 => Self::ImageTooLarge,
            429 => Self::Throttling,
            500 => Self::InternalServerError,
            502..=504 => Self::ServiceUnavailable,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for RemoteErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
