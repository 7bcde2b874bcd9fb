//! candump log parser (`candump -l` / `candump -L` format).
//!
//! `(1700000000.123456) can0 7E8#0322F190AAAAAAAA`

use regex::Regex;
use std::sync::LazyLock;

use cs_protocol::{CAN_MAX_DLC, CanFrame};

// (SECS.USECS) IFACE ID#DATA [T|R], or ID#R for remote frames
static RE_CANDUMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\((\d+)\.(\d{1,9})\)\s+(\S+)\s+([0-9A-Fa-f]{1,8})#(R\d?|[0-9A-Fa-f]*)(?:\s+([TR]))?\s*$").unwrap()
});

/// One parsed log line. The bus index is assigned later by `BusMap`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandumpRecord {
    pub timestamp_us: u64,
    pub interface: String,
    pub id: u32,
    pub extended: bool,
    pub data: Vec<u8>,
    /// `false` for lines flagged `T` (transmitted by the logging host).
    pub received: bool,
}

impl CandumpRecord {
    pub fn into_frame(self, bus: u8) -> CanFrame {
        CanFrame {
            bus,
            id: self.id,
            extended: self.extended,
            data: self.data,
            timestamp_us: self.timestamp_us,
            received: self.received,
        }
    }
}

/// Parse one line. Comments, blank lines, CAN FD (`##`) frames and malformed
/// lines yield `None`.
pub fn parse_line(line: &str) -> Option<CandumpRecord> {
    let caps = RE_CANDUMP.captures(line)?;

    let secs: u64 = caps[1].parse().ok()?;
    let fraction = &caps[2];
    // Normalize the fractional part to microseconds.
    let usecs: u64 = format!("{fraction:0<6}")[..6].parse().ok()?;
    let timestamp_us = secs.checked_mul(1_000_000)?.checked_add(usecs)?;

    let id_str = &caps[4];
    let id = u32::from_str_radix(id_str, 16).ok()?;
    let extended = id_str.len() > 3;
    if extended && id > 0x1FFF_FFFF {
        return None;
    }

    let payload = &caps[5];
    let data = if payload.starts_with('R') {
        Vec::new()
    } else {
        parse_hex(payload)?
    };
    if data.len() > CAN_MAX_DLC {
        return None;
    }

    Some(CandumpRecord {
        timestamp_us,
        interface: caps[3].to_string(),
        id,
        extended,
        data,
        received: caps.get(6).is_none_or(|m| m.as_str() == "R"),
    })
}

fn parse_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

/// Assigns bus indices to interface names in order of first appearance.
#[derive(Debug, Clone)]
pub struct BusMap {
    names: Vec<String>,
    bus_count: usize,
}

impl BusMap {
    pub fn new(bus_count: usize) -> Self {
        Self {
            names: Vec::new(),
            bus_count,
        }
    }

    /// `None` once `bus_count` interfaces are known and this is a new one.
    pub fn bus_for(&mut self, interface: &str) -> Option<u8> {
        if let Some(index) = self.names.iter().position(|n| n == interface) {
            return u8::try_from(index).ok();
        }
        if self.names.len() >= self.bus_count.min(usize::from(u8::MAX) + 1) {
            return None;
        }
        self.names.push(interface.to_string());
        u8::try_from(self.names.len() - 1).ok()
    }

    pub fn interfaces(&self) -> &[String] {
        &self.names
    }
}
