//! Reassembled ISO-TP (ISO 15765-2) transport messages.

use serde::{Deserialize, Serialize};

use crate::hex::hex_bytes;

/// Fold a raw CAN id and an extended-addressing target address into one
/// transport identifier: `(can_id << 8) | target_address`.
pub fn compose_extended_id(can_id: u32, target_address: u8) -> u64 {
    (u64::from(can_id) << 8) | u64::from(target_address)
}

/// Inverse of [`compose_extended_id`].
pub fn split_extended_id(id: u64) -> (u32, u8) {
    ((id >> 8) as u32, (id & 0xFF) as u8)
}

/// A transport-layer message rebuilt from one or more CAN frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsoTpMessage {
    /// Bus the message arrived on.
    pub bus: u8,
    /// Transport identifier. Under extended addressing this is the composite
    /// `(can_id << 8) | target_address`; otherwise the plain CAN id.
    pub id: u64,
    /// Whether the underlying CAN frames used 29-bit identifiers.
    pub extended: bool,
    /// `false` when the frames were our own transmissions.
    pub received: bool,
    /// Timestamp of the frame that started the message (SF or FF).
    pub timestamp_us: u64,
    /// Length announced by the sender.
    pub reported_len: usize,
    /// Bytes actually collected.
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
    /// Whether the message came from a First/Consecutive Frame exchange.
    pub multiframe: bool,
}

impl IsoTpMessage {
    /// A flushed session can be emitted short of its announced length.
    pub fn is_complete(&self) -> bool {
        self.data.len() >= self.reported_len
    }

    /// CAN id part of an extended-addressing identifier.
    pub fn can_id(&self) -> u32 {
        split_extended_id(self.id).0
    }

    /// Target-address byte of an extended-addressing identifier.
    pub fn target_address(&self) -> u8 {
        split_extended_id(self.id).1
    }
}
