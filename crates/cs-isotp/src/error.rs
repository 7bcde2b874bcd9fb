//! ISO-TP error types.
//!
//! Only the send path and the async service surface errors. Malformed
//! inbound frames are dropped inside the engine and never reach callers.

use thiserror::Error;

/// Errors reported to callers of `send_message` and the service handle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IsoTpError {
    #[error("payload is empty")]
    EmptyPayload,

    #[error("payload of {len} bytes exceeds the ISO-TP maximum of {max}")]
    PayloadTooLong { len: usize, max: usize },

    #[error("bus {bus} is out of range ({bus_count} buses available)")]
    InvalidBus { bus: u8, bus_count: usize },

    #[error("identifier 0x{id:X} is not a valid CAN id")]
    InvalidId { id: u64 },

    #[error("a transfer to 0x{id:X} on bus {bus} is already in progress")]
    TransferInProgress { bus: u8, id: u64 },

    #[error("no flow control received within {timeout_ms}ms")]
    FlowControlTimeout { timeout_ms: u64 },

    #[error("receiver reported buffer overflow")]
    Overflow,

    #[error("receiver sent {waits} consecutive wait frames")]
    WaitLimitExceeded { waits: u8 },

    #[error("addressing mode changed while the transfer was in progress")]
    AddressingChanged,

    #[error("CAN interface error: {0}")]
    Interface(String),

    #[error("ISO-TP service has shut down")]
    Closed,
}

/// Convenience alias for ISO-TP results.
pub type IsoTpResult<T> = Result<T, IsoTpError>;
