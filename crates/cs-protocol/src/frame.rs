use serde::{Deserialize, Serialize};

use crate::hex::{hex_bytes, to_hex};

/// Largest payload a classic CAN frame can carry.
pub const CAN_MAX_DLC: usize = 8;

/// Highest 11-bit (CAN 2.0A) identifier.
pub const STANDARD_ID_MAX: u32 = 0x7FF;

/// A raw classic CAN frame as seen on (or sent to) one bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanFrame {
    /// Bus index the frame travelled on.
    pub bus: u8,
    /// Arbitration ID (11-bit standard or 29-bit extended).
    pub id: u32,
    /// Whether `id` is a 29-bit extended identifier.
    pub extended: bool,
    /// Data payload (0–8 bytes).
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
    /// Monotonic capture timestamp in microseconds.
    pub timestamp_us: u64,
    /// `true` for frames received from the bus, `false` for frames we transmitted.
    pub received: bool,
}

impl CanFrame {
    /// A received frame on bus 0. The extended flag follows the id width.
    pub fn new(id: u32, data: Vec<u8>) -> Self {
        Self {
            bus: 0,
            id,
            extended: id > STANDARD_ID_MAX,
            data,
            timestamp_us: 0,
            received: true,
        }
    }

    pub fn on_bus(mut self, bus: u8) -> Self {
        self.bus = bus;
        self
    }

    pub fn at(mut self, timestamp_us: u64) -> Self {
        self.timestamp_us = timestamp_us;
        self
    }

    /// Mark the frame as locally transmitted rather than received.
    pub fn transmitted(mut self) -> Self {
        self.received = false;
        self
    }

    /// Payload rendered as `"02 DE AD"`.
    pub fn hex_data(&self) -> String {
        to_hex(&self.data)
    }
}
