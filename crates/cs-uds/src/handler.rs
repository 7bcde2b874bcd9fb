//! Transport message to diagnostic message decoding.

use cs_isotp::IdPair;
use cs_protocol::{IsoTpMessage, NEGATIVE_RESPONSE_SID, UdsMessage, hex::to_hex};

use crate::config::{UdsConfig, UdsFilterMode};
use crate::error::{UdsError, UdsResult};
use crate::tables;

/// Split a transport payload into service, sub-function and data.
///
/// `7F <service> <nrc>` becomes a negative response with the NRC in
/// `sub_function` and no data. Anything else keeps every byte after the
/// service id as data, with the first of them mirrored into `sub_function`.
pub fn decode(message: &IsoTpMessage) -> UdsResult<UdsMessage> {
    let payload = &message.data;
    let &service = payload.first().ok_or(UdsError::EmptyPayload)?;

    let (service, sub_function, data, negative_response) = if service == NEGATIVE_RESPONSE_SID {
        match payload.as_slice() {
            [_, rejected, nrc, ..] => (*rejected, Some(*nrc), Vec::new(), true),
            _ => return Err(UdsError::TruncatedNegativeResponse { len: payload.len() }),
        }
    } else {
        (service, payload.get(1).copied(), payload[1..].to_vec(), false)
    };

    Ok(UdsMessage {
        bus: message.bus,
        source_id: message.id,
        service,
        sub_function,
        data,
        negative_response,
        timestamp_us: message.timestamp_us,
        complete: message.is_complete(),
    })
}

/// Stateless per message. Only the filter settings persist.
#[derive(Debug, Clone, Default)]
pub struct UdsHandler {
    config: UdsConfig,
}

impl UdsHandler {
    pub fn new(config: UdsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &UdsConfig {
        &self.config
    }

    pub fn set_filter_mode(&mut self, mode: UdsFilterMode) {
        self.config.filter_mode = mode;
    }

    pub fn register_pair(&mut self, pair: IdPair) {
        if !self.config.pairs.contains(&pair) {
            self.config.pairs.push(pair);
        }
    }

    pub fn clear_pairs(&mut self) {
        self.config.pairs.clear();
    }

    fn accepts(&self, message: &IsoTpMessage) -> bool {
        match self.config.filter_mode {
            UdsFilterMode::ProcessAll => true,
            UdsFilterMode::RegisteredPairs => self.config.pairs.iter().any(|p| {
                p.bus == message.bus && (p.request_id == message.id || p.response_id == message.id)
            }),
        }
    }

    /// Decode one reassembled transport message. Filtered and undecodable
    /// messages yield `None`.
    pub fn on_transport_message(&self, message: &IsoTpMessage) -> Option<UdsMessage> {
        if !self.accepts(message) {
            return None;
        }
        match decode(message) {
            Ok(uds) => {
                tracing::debug!(
                    bus = uds.bus,
                    id = format!("0x{:X}", uds.source_id),
                    service = format!("0x{:02X}", uds.service),
                    negative = uds.negative_response,
                    "UDS message"
                );
                Some(uds)
            }
            Err(e) => {
                tracing::debug!(error = %e, id = format!("0x{:X}", message.id), "not a UDS message");
                None
            }
        }
    }
}

/// Human-readable one-line rendering for logs and the monitor.
pub fn describe(message: &UdsMessage) -> String {
    let service = match tables::service_entry(message.service) {
        Some(entry) => format!("{} ({})", entry.name, entry.description),
        None => "UNKNOWN".to_string(),
    };
    let mut out = format!("0x{:X} ", message.source_id);

    if message.negative_response {
        let nrc = message.sub_function.unwrap_or_default();
        let reason = match tables::negative_response_entry(nrc) {
            Some(entry) => format!("{}: {}", entry.name, entry.description),
            None => "unknown reason".to_string(),
        };
        out.push_str(&format!(
            "NEGATIVE 0x{:02X} {service} NRC 0x{nrc:02X} {reason}",
            message.service
        ));
        return out;
    }

    let direction = if message.is_positive_response() {
        "RESPONSE"
    } else {
        "REQUEST"
    };
    out.push_str(&format!("{direction} 0x{:02X} {service}", message.service));
    if !message.data.is_empty() {
        out.push_str(&format!(" [{}]", to_hex(&message.data)));
        if message.data.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            out.push_str(&format!(" \"{}\"", String::from_utf8_lossy(&message.data)));
        }
    }
    if !message.complete {
        out.push_str(" (incomplete)");
    }
    out
}
