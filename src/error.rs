//! Error types for slap-client.

use thiserror::Error;

use crate::protocol::RequestKind;

/// Error conditions the remote interpreter can report in an Error frame.
///
/// Wire codes this build does not know decode to [`ErrorCode::UnknownError`]
/// so a newer remote cannot wedge the receive loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    UnknownError,
    InvalidLineNumber,
    MethodNotFound,
    AssistClassUnavailable,
    ThreadNotSuspended,
    RequestTooShort,
    UnknownRequest,
    NativeMethod,
    NoLineNumberInfo,
    EvaluationFailed,
    ThreadAlreadySuspended,
    BreakpointAlreadySet,
}

impl ErrorCode {
    /// Decode a wire error code.
    pub fn from_u32(code: u32) -> Self {
        match code {
            1 => Self::InvalidLineNumber,
            2 => Self::MethodNotFound,
            3 => Self::AssistClassUnavailable,
            4 => Self::ThreadNotSuspended,
            5 => Self::RequestTooShort,
            6 => Self::UnknownRequest,
            7 => Self::NativeMethod,
            8 => Self::NoLineNumberInfo,
            9 => Self::EvaluationFailed,
            10 => Self::ThreadAlreadySuspended,
            11 => Self::BreakpointAlreadySet,
            _ => Self::UnknownError,
        }
    }

    /// Wire code for this condition.
    pub fn code(self) -> u32 {
        match self {
            Self::UnknownError => 0,
            Self::InvalidLineNumber => 1,
            Self::MethodNotFound => 2,
            Self::AssistClassUnavailable => 3,
            Self::ThreadNotSuspended => 4,
            Self::RequestTooShort => 5,
            Self::UnknownRequest => 6,
            Self::NativeMethod => 7,
            Self::NoLineNumberInfo => 8,
            Self::EvaluationFailed => 9,
            Self::ThreadAlreadySuspended => 10,
            Self::BreakpointAlreadySet => 11,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::UnknownError => "unknown error",
            Self::InvalidLineNumber => "invalid line number",
            Self::MethodNotFound => "method not found",
            Self::AssistClassUnavailable => "assist class unavailable",
            Self::ThreadNotSuspended => "thread not suspended",
            Self::RequestTooShort => "request too short",
            Self::UnknownRequest => "unknown request",
            Self::NativeMethod => "native method",
            Self::NoLineNumberInfo => "no line number information",
            Self::EvaluationFailed => "evaluation failed",
            Self::ThreadAlreadySuspended => "thread already suspended",
            Self::BreakpointAlreadySet => "breakpoint already set at location",
        };
        f.write_str(text)
    }
}

/// An error reported by the remote side for a specific request.
///
/// This is the only error category that reaches a caller through a
/// [`ReplyHandle`](crate::ReplyHandle); transport anomalies are recovered
/// inside the receive loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("remote error for {kind:?}: {code}")]
pub struct RemoteError {
    /// Request kind the error frame named.
    pub kind: RequestKind,
    /// Remote-reported condition.
    pub code: ErrorCode,
}

/// Main error type for all slap-client operations.
#[derive(Debug, Error)]
pub enum SlapError {
    /// I/O error on the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Handshake failure; the connection never becomes usable.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// Malformed frame or primitive (truncated length, bad header, bad UTF-8).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A kind-specific payload decoder rejected its input.
    #[error("payload decode error: {0}")]
    Decode(String),

    /// Error-class frame correlated to the caller's request.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// The connection is closed or the engine has been dropped.
    #[error("connection closed")]
    ConnectionClosed,
}

/// Result type alias using SlapError.
pub type Result<T> = std::result::Result<T, SlapError>;
