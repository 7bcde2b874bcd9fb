//! ISO-TP protocol control information: frame classification and encoding.
//!
//! `decode` never fails loudly. Anything that cannot be a valid PDU for the
//! configured addressing mode comes back as `None` and is dropped upstream.

use std::time::Duration;

use cs_protocol::CAN_MAX_DLC;

use crate::config::Addressing;
use crate::types::*;

/// One classified ISO-TP protocol data unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pdu {
    Single {
        data: Vec<u8>,
    },
    First {
        total_len: usize,
        data: Vec<u8>,
    },
    Consecutive {
        seq: u8,
        data: Vec<u8>,
    },
    FlowControl {
        status: FlowStatus,
        block_size: u8,
        separation_time: Duration,
    },
}

/// A PDU plus the target address byte that preceded it, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub target_address: Option<u8>,
    pub pdu: Pdu,
}

/// Classify a CAN payload.
pub fn decode(data: &[u8], addressing: Addressing) -> Option<Decoded> {
    let offset = addressing.pci_offset();
    let pci = *data.get(offset)?;
    let target_address = match addressing {
        Addressing::Normal => None,
        Addressing::Extended => Some(data[0]),
    };
    let low = pci & 0x0F;

    let pdu = match pci >> 4 {
        ISOTP_SF => {
            let len = low as usize;
            if len == 0 || len > addressing.single_frame_max() {
                return None;
            }
            let payload = data.get(offset + 1..offset + 1 + len)?;
            Pdu::Single {
                data: payload.to_vec(),
            }
        }
        ISOTP_FF => {
            let len_low = *data.get(offset + 1)?;
            let total_len = ((low as usize) << 8) | len_low as usize;
            if total_len == 0 {
                // Escape sequence for 32-bit lengths, CAN-FD only.
                return None;
            }
            let take = addressing.first_frame_capacity().min(total_len);
            let payload = &data[offset + 2..];
            Pdu::First {
                total_len,
                data: payload[..payload.len().min(take)].to_vec(),
            }
        }
        ISOTP_CF => {
            let payload = &data[offset + 1..];
            let take = payload.len().min(addressing.consecutive_frame_capacity());
            Pdu::Consecutive {
                seq: low,
                data: payload[..take].to_vec(),
            }
        }
        ISOTP_FC => {
            let status = FlowStatus::from_nibble(low)?;
            let block_size = *data.get(offset + 1)?;
            let st_min = *data.get(offset + 2)?;
            Pdu::FlowControl {
                status,
                block_size,
                separation_time: decode_st_min(st_min),
            }
        }
        _ => return None,
    };

    Some(Decoded {
        target_address,
        pdu,
    })
}

/// Decode a raw STmin byte (ISO 15765-2 table 20).
pub fn decode_st_min(raw: u8) -> Duration {
    match raw {
        0x00..=0x7F => Duration::from_millis(raw as u64),
        0xF1..=0xF9 => Duration::from_micros((raw - 0xF0) as u64 * 100),
        // Reserved values: use the longest defined separation.
        _ => Duration::from_millis(0x7F),
    }
}

fn start_frame(target_address: Option<u8>) -> Vec<u8> {
    let mut buf = Vec::with_capacity(CAN_MAX_DLC);
    if let Some(ta) = target_address {
        buf.push(ta);
    }
    buf
}

fn pad(mut buf: Vec<u8>, padding: u8) -> Vec<u8> {
    buf.resize(CAN_MAX_DLC, padding);
    buf
}

/// Single Frame: `[TA] 0L data… pad`.
pub fn encode_single(payload: &[u8], target_address: Option<u8>, padding: u8) -> Vec<u8> {
    let mut buf = start_frame(target_address);
    buf.push((ISOTP_SF << 4) | (payload.len() as u8 & 0x0F));
    buf.extend_from_slice(payload);
    pad(buf, padding)
}

/// First Frame: `[TA] 1L LL data… pad` with a 12-bit total length.
pub fn encode_first(
    total_len: usize,
    chunk: &[u8],
    target_address: Option<u8>,
    padding: u8,
) -> Vec<u8> {
    let mut buf = start_frame(target_address);
    buf.push((ISOTP_FF << 4) | ((total_len >> 8) as u8 & 0x0F));
    buf.push((total_len & 0xFF) as u8);
    buf.extend_from_slice(chunk);
    pad(buf, padding)
}

/// Consecutive Frame: `[TA] 2N data… pad`.
pub fn encode_consecutive(
    seq: u8,
    chunk: &[u8],
    target_address: Option<u8>,
    padding: u8,
) -> Vec<u8> {
    let mut buf = start_frame(target_address);
    buf.push((ISOTP_CF << 4) | (seq & 0x0F));
    buf.extend_from_slice(chunk);
    pad(buf, padding)
}

/// Flow Control: `[TA] 3S BS ST 00…`.
pub fn encode_flow_control(
    status: FlowStatus,
    block_size: u8,
    separation_time: u8,
    target_address: Option<u8>,
) -> Vec<u8> {
    let mut buf = start_frame(target_address);
    buf.push((ISOTP_FC << 4) | status.nibble());
    buf.push(block_size);
    buf.push(separation_time);
    pad(buf, 0x00)
}
