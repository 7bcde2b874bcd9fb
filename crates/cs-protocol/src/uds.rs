//! Decoded UDS (ISO 14229) diagnostic messages.

use serde::{Deserialize, Serialize};

use crate::hex::hex_bytes;

/// Service byte that marks a negative response (`7F <service> <nrc>`).
pub const NEGATIVE_RESPONSE_SID: u8 = 0x7F;

/// Offset between a request service id and its positive response id.
pub const POSITIVE_RESPONSE_OFFSET: u8 = 0x40;

/// One diagnostic message, split into service / sub-function / data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UdsMessage {
    pub bus: u8,
    /// Transport identifier the message came from.
    pub source_id: u64,
    /// Service id. For negative responses this is the rejected request's service.
    pub service: u8,
    /// Second payload byte, or the negative response code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_function: Option<u8>,
    /// Bytes after the service byte (empty for negative responses).
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
    pub negative_response: bool,
    pub timestamp_us: u64,
    /// Mirrors `IsoTpMessage::is_complete` of the carrying transport message.
    pub complete: bool,
}

impl UdsMessage {
    /// Negative response code, if this is a negative response.
    pub fn nrc(&self) -> Option<u8> {
        if self.negative_response {
            self.sub_function
        } else {
            None
        }
    }

    /// Whether the service id sits in the positive-response range (0x40..0x7F, 0xC0..).
    pub fn is_positive_response(&self) -> bool {
        !self.negative_response && self.service & POSITIVE_RESPONSE_OFFSET != 0
    }
}
