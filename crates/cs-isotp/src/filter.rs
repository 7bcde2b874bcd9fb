//! Identifier filtering and request/response pairing.
//!
//! Mask filters decide which identifiers are processed when the engine runs
//! in `FilterMode::RegisteredOnly`. Id pairs additionally tell the engine
//! where Flow Control replies go and which inbound FC belongs to which
//! outbound transfer.

use serde::{Deserialize, Serialize};

/// Accept ids where `(id & mask) == (filter.id & mask)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdMaskFilter {
    /// `None` matches every bus.
    #[serde(default)]
    pub bus: Option<u8>,
    pub id: u64,
    pub mask: u64,
}

impl IdMaskFilter {
    pub fn matches(&self, bus: u8, id: u64) -> bool {
        self.bus.is_none_or(|b| b == bus) && (id & self.mask) == (self.id & self.mask)
    }
}

/// A tester/ECU identifier pair on one bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdPair {
    pub bus: u8,
    /// Identifier we (the tester) transmit on.
    pub request_id: u64,
    /// Identifier the peer answers on.
    pub response_id: u64,
}

/// Registered filters and pairs.
#[derive(Debug, Clone, Default)]
pub struct IdFilter {
    filters: Vec<IdMaskFilter>,
    pairs: Vec<IdPair>,
}

impl IdFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_filter(&mut self, filter: IdMaskFilter) {
        if !self.filters.contains(&filter) {
            self.filters.push(filter);
        }
    }

    /// Returns whether a matching filter was registered.
    pub fn remove_filter(&mut self, filter: &IdMaskFilter) -> bool {
        let before = self.filters.len();
        self.filters.retain(|f| f != filter);
        self.filters.len() != before
    }

    pub fn register_pair(&mut self, pair: IdPair) {
        if !self.pairs.contains(&pair) {
            self.pairs.push(pair);
        }
    }

    pub fn unregister_pair(&mut self, pair: &IdPair) -> bool {
        let before = self.pairs.len();
        self.pairs.retain(|p| p != pair);
        self.pairs.len() != before
    }

    /// Drop every filter and pair.
    pub fn clear(&mut self) {
        self.filters.clear();
        self.pairs.clear();
    }

    pub fn filters(&self) -> &[IdMaskFilter] {
        &self.filters
    }

    pub fn pairs(&self) -> &[IdPair] {
        &self.pairs
    }

    /// Whether an identifier is registered through a filter or either side of a pair.
    pub fn accepts(&self, bus: u8, id: u64) -> bool {
        self.filters.iter().any(|f| f.matches(bus, id))
            || self
                .pairs
                .iter()
                .any(|p| p.bus == bus && (p.request_id == id || p.response_id == id))
    }

    /// Where to send Flow Control for a First Frame received on `response_id`.
    pub fn request_for(&self, bus: u8, response_id: u64) -> Option<u64> {
        self.pairs
            .iter()
            .find(|p| p.bus == bus && p.response_id == response_id)
            .map(|p| p.request_id)
    }
}
