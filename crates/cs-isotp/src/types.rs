//! ISO-TP protocol constants and the events the engine emits.

use serde::{Deserialize, Serialize};

use cs_protocol::IsoTpMessage;

use crate::error::IsoTpError;

// ── PCI frame type nibbles (upper nibble of the PCI byte) ──────

/// Single Frame.
pub const ISOTP_SF: u8 = 0x0;
/// First Frame.
pub const ISOTP_FF: u8 = 0x1;
/// Consecutive Frame.
pub const ISOTP_CF: u8 = 0x2;
/// Flow Control.
pub const ISOTP_FC: u8 = 0x3;

/// Largest length a First Frame's 12-bit length field can announce.
pub const MAX_MESSAGE_LEN: usize = 0xFFF;

/// Flow status carried in the low nibble of a Flow Control PCI byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStatus {
    /// Clear to send.
    ContinueToSend,
    /// Receiver not ready, wait for another FC.
    Wait,
    /// Receiver cannot buffer the announced length.
    Overflow,
}

impl FlowStatus {
    pub fn from_nibble(nibble: u8) -> Option<Self> {
        match nibble {
            0x0 => Some(Self::ContinueToSend),
            0x1 => Some(Self::Wait),
            0x2 => Some(Self::Overflow),
            _ => None,
        }
    }

    pub fn nibble(self) -> u8 {
        match self {
            Self::ContinueToSend => 0x0,
            Self::Wait => 0x1,
            Self::Overflow => 0x2,
        }
    }
}

/// Identifies one outbound `send_message` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransferId(pub u64);

/// Everything the engine reports to its observer.
#[derive(Debug, Clone, PartialEq)]
pub enum IsoTpEvent {
    /// A reassembled (or flushed partial) transport message.
    Message(IsoTpMessage),
    /// All frames of an outbound transfer were handed to the frame sink.
    TransferComplete { transfer: TransferId, bus: u8, id: u64 },
    /// An outbound transfer was abandoned.
    TransferFailed {
        transfer: TransferId,
        bus: u8,
        id: u64,
        error: IsoTpError,
    },
}
