//! Error types for the device event bridge.
//!
//! Native failures are carried verbatim (code and message) from the native
//! subsystem up to the consumer. Teardown paths never produce errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a native subsystem failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NativeErrorKind {
    /// The sensor or service does not exist on this device.
    NotSupported,
    /// The caller lacks the privilege required by the native API.
    PermissionDenied,
    /// The native lookup did not find the requested object.
    NotFound,
    /// Any other native failure.
    Other,
}

/// An error reported by the native subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("native error {code}: {message}")]
pub struct NativeError {
    pub code: i32,
    pub message: String,
    pub kind: NativeErrorKind,
}

impl NativeError {
    pub const CODE_NOT_SUPPORTED: i32 = 95;
    pub const CODE_PERMISSION_DENIED: i32 = 13;
    pub const CODE_NO_SUCH_APP: i32 = 2;

    pub fn new(code: i32, message: impl Into<String>, kind: NativeErrorKind) -> Self {
        Self {
            code,
            message: message.into(),
            kind,
        }
    }

    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::new(
            Self::CODE_NOT_SUPPORTED,
            message,
            NativeErrorKind::NotSupported,
        )
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(
            Self::CODE_PERMISSION_DENIED,
            message,
            NativeErrorKind::PermissionDenied,
        )
    }

    pub fn no_such_app(app_id: &str) -> Self {
        Self::new(
            Self::CODE_NO_SUCH_APP,
            format!("no such application: {app_id}"),
            NativeErrorKind::NotFound,
        )
    }
}

/// Errors surfaced by the bridge to its callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// Sensor or service absent, or permission denied.
    #[error("native subsystem unavailable ({code}): {message}")]
    NativeUnavailable { code: i32, message: String },

    /// Unknown application id.
    #[error("application not found: {app_id} ({code}): {message}")]
    NotFound {
        app_id: String,
        code: i32,
        message: String,
    },

    /// A source is already bound to a consumer.
    #[error("source is already attached")]
    AlreadyAttached,

    /// Any other failure of a native call.
    #[error("native call failed ({code}): {message}")]
    NativeCallFailure { code: i32, message: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unknown channel: {0}")]
    UnknownChannel(String),

    #[error("method not implemented: {0}")]
    NotImplemented(String),

    #[error("failed to encode response: {0}")]
    Encoding(String),
}

impl BridgeError {
    /// Classify a native failure that happened while acquiring a source.
    pub fn from_native(err: NativeError) -> Self {
        match err.kind {
            NativeErrorKind::NotSupported | NativeErrorKind::PermissionDenied => {
                BridgeError::NativeUnavailable {
                    code: err.code,
                    message: err.message,
                }
            }
            _ => BridgeError::NativeCallFailure {
                code: err.code,
                message: err.message,
            },
        }
    }

    /// Classify a native failure of a query about `app_id`.
    pub fn from_app_query(app_id: &str, err: NativeError) -> Self {
        match err.kind {
            NativeErrorKind::NotFound => BridgeError::NotFound {
                app_id: app_id.to_string(),
                code: err.code,
                message: err.message,
            },
            _ => Self::from_native(err),
        }
    }

    /// Short name of the error kind.
    pub fn kind_name(&self) -> &'static str {
        match self {
            BridgeError::NativeUnavailable { .. } => "NativeUnavailable",
            BridgeError::NotFound { .. } => "NotFound",
            BridgeError::AlreadyAttached => "AlreadyAttached",
            BridgeError::NativeCallFailure { .. } => "NativeCallFailure",
            BridgeError::InvalidArgument(_) => "InvalidArgument",
            BridgeError::UnknownChannel(_) => "UnknownChannel",
            BridgeError::NotImplemented(_) => "NotImplemented",
            BridgeError::Encoding(_) => "Encoding",
        }
    }

    /// The native error code, if this error came from the native subsystem.
    pub fn native_code(&self) -> Option<i32> {
        match self {
            BridgeError::NativeUnavailable { code, .. }
            | BridgeError::NotFound { code, .. }
            | BridgeError::NativeCallFailure { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Error value delivered to a consumer on a stream or as a method response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelError {
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl ChannelError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }
}

impl From<&BridgeError> for ChannelError {
    fn from(err: &BridgeError) -> Self {
        let code = match err.native_code() {
            Some(code) => code.to_string(),
            None => err.kind_name().to_string(),
        };
        let message = match err {
            BridgeError::NativeUnavailable { message, .. }
            | BridgeError::NotFound { message, .. }
            | BridgeError::NativeCallFailure { message, .. } => message.clone(),
            other => other.to_string(),
        };
        Self {
            code,
            message,
            details: Some(serde_json::json!({ "kind": err.kind_name() })),
        }
    }
}

impl From<BridgeError> for ChannelError {
    fn from(err: BridgeError) -> Self {
        ChannelError::from(&err)
    }
}

impl std::fmt::Display for ChannelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ChannelError {}
