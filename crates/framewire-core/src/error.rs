//! Shared error type across framewire crates.

use serde_json::Value;
use thiserror::Error;

/// Numeric codes surfaced to provider callers (stable API).
///
/// Provider-lifecycle codes follow EIP-1193, request-shape codes follow
/// JSON-RPC 2.0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Malformed request arguments.
    InvalidRequest,
    /// Method has no synchronous answer.
    MethodNotSupported,
    /// User rejected the request (closed popup, declined confirmation).
    UserRejected,
    /// Transport to the wallet frame is down.
    Disconnected,
    /// Internal failure.
    Internal,
}

impl ErrorCode {
    /// Numeric representation used in RPC error payloads.
    pub fn as_i64(self) -> i64 {
        match self {
            ErrorCode::InvalidRequest => -32600,
            ErrorCode::MethodNotSupported => -32601,
            ErrorCode::UserRejected => 4001,
            ErrorCode::Disconnected => 4900,
            ErrorCode::Internal => -32603,
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, FramewireError>;

/// Unified error type used by core and embed.
///
/// `Clone` is required because a single login flow can be awaited by several
/// coalesced callers, each of which receives the outcome.
#[derive(Debug, Clone, Error)]
pub enum FramewireError {
    #[error("invalid request args: {0}")]
    InvalidRequestArgs(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("synchronous calls are not supported for method {0}")]
    UnsupportedSync(String),
    #[error("lost connection to the wallet frame")]
    Disconnected,
    #[error("disconnected from the wallet frame; page reload required")]
    PermanentlyDisconnected,
    #[error("rpc error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<Value>,
    },
    #[error("already initialized")]
    AlreadyInitialized,
    #[error("call init() first")]
    NotInitialized,
    #[error("not logged in")]
    NotLoggedIn,
    #[error("popup window could not be opened; ask the user to allow popups")]
    PopupBlocked,
    #[error("user rejected: {0}")]
    UserRejected(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl FramewireError {
    /// Map internal error to a stable caller-facing code.
    pub fn code(&self) -> i64 {
        match self {
            FramewireError::InvalidRequestArgs(_) | FramewireError::InvalidConfig(_) => {
                ErrorCode::InvalidRequest.as_i64()
            }
            FramewireError::UnsupportedSync(_) => ErrorCode::MethodNotSupported.as_i64(),
            FramewireError::Disconnected | FramewireError::PermanentlyDisconnected => {
                ErrorCode::Disconnected.as_i64()
            }
            FramewireError::Rpc { code, .. } => *code,
            FramewireError::UserRejected(_) => ErrorCode::UserRejected.as_i64(),
            FramewireError::AlreadyInitialized
            | FramewireError::NotInitialized
            | FramewireError::NotLoggedIn
            | FramewireError::PopupBlocked
            | FramewireError::Internal(_) => ErrorCode::Internal.as_i64(),
        }
    }
}
