//! UDS error types.

use thiserror::Error;

use cs_isotp::IsoTpError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UdsError {
    #[error("transport message has no payload")]
    EmptyPayload,

    #[error("negative response truncated to {len} bytes (need 3)")]
    TruncatedNegativeResponse { len: usize },

    #[error("sub-function length {len} exceeds 4 bytes")]
    SubFunctionTooLong { len: usize },

    #[error("transport error: {0}")]
    Transport(#[from] IsoTpError),
}

/// Convenience alias for UDS results.
pub type UdsResult<T> = Result<T, UdsError>;
