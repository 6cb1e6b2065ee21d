//! Error types for Nutrilog sync operations
//!
//! [`ApiError`] is the single typed error every network-facing layer returns.
//! It is `Clone` so that one failed single-flight operation can hand the same
//! error to every caller that joined it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error envelope the remote API uses for non-2xx responses:
/// `{"error": {"code": "...", "message": "..."}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// Coarse classification of an [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request never produced an HTTP status.
    Network,
    /// 401 that was not recovered by a session refresh.
    Unauthorized,
    /// Any other non-2xx response.
    Http,
    /// A body could not be encoded or decoded into the expected type.
    Codec,
}

/// Typed error for every request that leaves the client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("Network error: {message}")]
    Network { message: String },

    #[error("HTTP {status}: {message}")]
    Http {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Codec error: {message}")]
    Codec { message: String },
}

impl ApiError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn http(status: u16, code: Option<String>, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Build the error for a non-2xx response.
    ///
    /// The body is decoded as an [`ErrorEnvelope`] first. Anything else falls
    /// back to the status line (`reason`), or `HTTP <status>` when the status
    /// has no canonical reason.
    pub fn from_response(status: u16, reason: Option<&str>, body: &[u8]) -> Self {
        match serde_json::from_slice::<ErrorEnvelope>(body) {
            Ok(envelope) => Self::http(status, Some(envelope.error.code), envelope.error.message),
            Err(_) => {
                let message = reason
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("HTTP {}", status));
                Self::http(status, None, message)
            }
        }
    }

    /// HTTP status, absent for network and codec failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Network { .. } | Self::Codec { .. } => None,
        }
    }

    /// Machine-readable code from the error envelope, if the server sent one.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Http { code, .. } => code.as_deref(),
            Self::Network { .. } | Self::Codec { .. } => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Network { message } | Self::Http { message, .. } | Self::Codec { message } => {
                message
            }
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network { .. } => ErrorKind::Network,
            Self::Http { status: 401, .. } => ErrorKind::Unauthorized,
            Self::Http { .. } => ErrorKind::Http,
            Self::Codec { .. } => ErrorKind::Codec,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::codec(err.to_string())
    }
}

/// Result type alias for Nutrilog network operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Call-site mapping of statuses that are domain outcomes rather than failures.
pub trait ApiResultExt<T> {
    /// Treat 404 as "resource absent".
    fn not_found_as_none(self) -> ApiResult<Option<T>>;
}

impl<T> ApiResultExt<T> for ApiResult<T> {
    fn not_found_as_none(self) -> ApiResult<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
