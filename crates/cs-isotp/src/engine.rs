//! ISO-TP reassembly and segmentation state machine.
//!
//! `IsoTpEngine` is synchronous and owns no threads or timers. Inbound frames
//! arrive through `ingest`, outbound payloads through `send_message`, and a
//! driver calls `poll` (at `next_deadline()`) to pace Consecutive Frames and
//! expire stale state. Every method has an `_at` twin taking the current
//! instant so replays and tests can run on their own clock.
//!
//! The session table, the transfer table and the last-sender record are
//! owned here and never handed out. Callers that share one engine between an
//! ingest path and a send path must serialize access (see `service.rs`).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use cs_protocol::{CanFrame, IsoTpMessage, STANDARD_ID_MAX, compose_extended_id, split_extended_id};

use crate::codec::{self, Pdu};
use crate::config::{Addressing, FilterMode, FlowControlRole, IsoTpConfig};
use crate::error::{IsoTpError, IsoTpResult};
use crate::filter::{IdFilter, IdMaskFilter, IdPair};
use crate::sink::{EventSink, FrameSink};
use crate::types::{FlowStatus, IsoTpEvent, MAX_MESSAGE_LEN, TransferId};

/// Highest 29-bit CAN identifier.
const EXTENDED_ID_MAX: u64 = 0x1FFF_FFFF;

/// (bus, transport identifier). The identifier already includes the target
/// address under extended addressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Key {
    bus: u8,
    id: u64,
}

/// Resolved destination of outbound frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Address {
    bus: u8,
    can_id: u32,
    target_address: Option<u8>,
}

impl Address {
    /// The key inbound traffic for this destination is tracked under.
    fn key(self) -> Key {
        let id = match self.target_address {
            Some(ta) => compose_extended_id(self.can_id, ta),
            None => u64::from(self.can_id),
        };
        Key { bus: self.bus, id }
    }

    /// A leading target address byte shifts the PCI and shrinks every frame by one.
    fn layout(self) -> Addressing {
        match self.target_address {
            Some(_) => Addressing::Extended,
            None => Addressing::Normal,
        }
    }
}

/// One in-progress reassembly, created by a First Frame.
struct RxSession {
    message: IsoTpMessage,
    next_seq: u8,
    last_activity: Instant,
    /// Where our Flow Control goes, if we answer this exchange.
    flow_control: Option<Address>,
    /// Consecutive Frames left in the current block.
    block_remaining: u8,
}

/// One in-progress segmented send.
struct TxTransfer {
    transfer: TransferId,
    key: Key,
    address: Address,
    payload: Vec<u8>,
    offset: usize,
    next_seq: u8,
    state: TxState,
}

enum TxState {
    AwaitingFlowControl {
        deadline: Instant,
        waits: u8,
    },
    Sending {
        /// Frames left in the current block. `None` means unlimited.
        block_remaining: Option<u8>,
        separation: Duration,
        next_at: Instant,
    },
}

impl TxTransfer {
    fn is_done(&self) -> bool {
        self.offset >= self.payload.len()
    }

    fn is_awaiting_flow_control(&self) -> bool {
        matches!(self.state, TxState::AwaitingFlowControl { .. })
    }
}

/// The ISO-TP transport engine.
pub struct IsoTpEngine {
    config: IsoTpConfig,
    filter: IdFilter,
    sessions: HashMap<Key, RxSession>,
    transfers: HashMap<Key, TxTransfer>,
    /// Destination of our most recent `send_message`, used to address
    /// Flow Control replies when no id pair is registered.
    last_sender: Option<Address>,
    next_transfer: u64,
    /// Instant of the first outbound frame; transmitted timestamps count from here.
    epoch: Option<Instant>,
    frames: Box<dyn FrameSink>,
    events: Box<dyn EventSink>,
}

impl IsoTpEngine {
    pub fn new(
        config: IsoTpConfig,
        frames: impl FrameSink + 'static,
        events: impl EventSink + 'static,
    ) -> Self {
        Self {
            config,
            filter: IdFilter::new(),
            sessions: HashMap::new(),
            transfers: HashMap::new(),
            last_sender: None,
            next_transfer: 0,
            epoch: None,
            frames: Box::new(frames),
            events: Box::new(events),
        }
    }

    pub fn config(&self) -> &IsoTpConfig {
        &self.config
    }

    pub fn filter(&self) -> &IdFilter {
        &self.filter
    }

    /// Reassembly sessions currently waiting for Consecutive Frames.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Outbound transfers not yet completed or failed.
    pub fn pending_transfers(&self) -> usize {
        self.transfers.len()
    }

    // ── Configuration ───────────────────────────────────────────

    /// Switching modes discards open sessions and fails pending transfers:
    /// their keys and frame layout belong to the old mode.
    pub fn set_addressing(&mut self, addressing: Addressing) {
        if self.config.addressing == addressing {
            return;
        }
        tracing::debug!(
            ?addressing,
            sessions = self.sessions.len(),
            transfers = self.transfers.len(),
            "addressing mode changed"
        );
        self.sessions.clear();
        self.config.addressing = addressing;

        let mut pending: Vec<TxTransfer> = self.transfers.drain().map(|(_, tx)| tx).collect();
        pending.sort_by_key(|tx| tx.transfer);
        for tx in pending {
            self.fail(tx, IsoTpError::AddressingChanged);
        }
    }

    /// Applies to transfers started after the call.
    pub fn set_target_address(&mut self, target_address: Option<u8>) {
        self.config.target_address = target_address;
    }

    pub fn set_flow_control_role(&mut self, role: FlowControlRole) {
        self.config.flow_control = role;
    }

    /// With reception off, only Flow Control for our own transfers is processed.
    pub fn set_reception(&mut self, enabled: bool) {
        if self.config.reception != enabled {
            tracing::debug!(enabled, "ISO-TP reception toggled");
            self.config.reception = enabled;
        }
    }

    pub fn set_filter_mode(&mut self, mode: FilterMode) {
        self.config.filter_mode = mode;
    }

    /// Applies to transfers started after the call.
    pub fn set_honor_flow_control(&mut self, honor: bool) {
        self.config.honor_flow_control = honor;
    }

    pub fn add_filter(&mut self, filter: IdMaskFilter) {
        self.filter.add_filter(filter);
    }

    pub fn remove_filter(&mut self, filter: &IdMaskFilter) -> bool {
        self.filter.remove_filter(filter)
    }

    pub fn clear_filters(&mut self) {
        self.filter.clear();
    }

    pub fn register_pair(&mut self, pair: IdPair) {
        self.filter.register_pair(pair);
    }

    pub fn unregister_pair(&mut self, pair: &IdPair) -> bool {
        self.filter.unregister_pair(pair)
    }

    // ── Inbound ─────────────────────────────────────────────────

    pub fn ingest(&mut self, frames: &[CanFrame]) {
        self.ingest_at(frames, Instant::now());
    }

    /// Classify a batch of frames in order.
    pub fn ingest_at(&mut self, frames: &[CanFrame], now: Instant) {
        self.expire(now);
        let bus_count = self.frames.bus_count();
        for frame in frames {
            if frame.bus as usize >= bus_count {
                tracing::trace!(bus = frame.bus, bus_count, "frame on unknown bus ignored");
                continue;
            }
            self.process_frame(frame, now);
        }
    }

    fn process_frame(&mut self, frame: &CanFrame, now: Instant) {
        let Some(decoded) = codec::decode(&frame.data, self.config.addressing) else {
            tracing::trace!(bus = frame.bus, id = format!("0x{:X}", frame.id), "not an ISO-TP frame");
            return;
        };

        let id = match decoded.target_address {
            Some(ta) => compose_extended_id(frame.id, ta),
            None => u64::from(frame.id),
        };
        let key = Key { bus: frame.bus, id };

        if let Pdu::FlowControl {
            status,
            block_size,
            separation_time,
        } = decoded.pdu
        {
            if frame.received {
                self.on_flow_control(key, status, block_size, separation_time, now);
            }
            return;
        }

        if !self.config.reception {
            return;
        }
        if self.config.filter_mode == FilterMode::RegisteredOnly && !self.filter.accepts(key.bus, key.id) {
            return;
        }

        match decoded.pdu {
            Pdu::Single { data } => self.on_single(frame, key, data),
            Pdu::First { total_len, data } => self.on_first(frame, key, total_len, data, now),
            Pdu::Consecutive { seq, data } => self.on_consecutive(key, seq, data, now),
            Pdu::FlowControl { .. } => {}
        }
    }

    fn on_single(&mut self, frame: &CanFrame, key: Key, data: Vec<u8>) {
        self.flush(key);
        tracing::debug!(bus = key.bus, id = format!("0x{:X}", key.id), len = data.len(), "single frame message");
        let message = IsoTpMessage {
            bus: key.bus,
            id: key.id,
            extended: frame.extended,
            received: frame.received,
            timestamp_us: frame.timestamp_us,
            reported_len: data.len(),
            data,
            multiframe: false,
        };
        self.events.emit(IsoTpEvent::Message(message));
    }

    fn on_first(&mut self, frame: &CanFrame, key: Key, total_len: usize, data: Vec<u8>, now: Instant) {
        self.flush(key);

        let mut buffer = Vec::with_capacity(total_len);
        buffer.extend_from_slice(&data);
        let message = IsoTpMessage {
            bus: key.bus,
            id: key.id,
            extended: frame.extended,
            received: frame.received,
            timestamp_us: frame.timestamp_us,
            reported_len: total_len,
            data: buffer,
            multiframe: true,
        };

        if message.is_complete() {
            // Announced length fits in the First Frame itself.
            self.events.emit(IsoTpEvent::Message(message));
            return;
        }

        tracing::debug!(bus = key.bus, id = format!("0x{:X}", key.id), total_len, "first frame opened session");
        let flow_control = if frame.received && self.config.flow_control == FlowControlRole::Respond {
            self.flow_control_destination(key)
        } else {
            None
        };
        self.sessions.insert(
            key,
            RxSession {
                message,
                next_seq: 1,
                last_activity: now,
                flow_control,
                block_remaining: self.config.fc_block_size,
            },
        );

        if let Some(target) = flow_control {
            self.send_flow_control(target, now);
        }
    }

    fn on_consecutive(&mut self, key: Key, seq: u8, data: Vec<u8>, now: Instant) {
        let block_size = self.config.fc_block_size;
        let Some(session) = self.sessions.get_mut(&key) else {
            tracing::trace!(bus = key.bus, id = format!("0x{:X}", key.id), seq, "consecutive frame without session");
            return;
        };

        if seq != session.next_seq {
            tracing::warn!(
                bus = key.bus,
                id = format!("0x{:X}", key.id),
                expected = session.next_seq,
                got = seq,
                "sequence mismatch, discarding session"
            );
            self.sessions.remove(&key);
            return;
        }

        let remaining = session.message.reported_len - session.message.data.len();
        session.message.data.extend_from_slice(&data[..data.len().min(remaining)]);
        session.next_seq = (session.next_seq + 1) & 0x0F;
        session.last_activity = now;

        if session.message.is_complete() {
            if let Some(done) = self.sessions.remove(&key) {
                tracing::debug!(
                    bus = key.bus,
                    id = format!("0x{:X}", key.id),
                    len = done.message.data.len(),
                    "multi-frame message complete"
                );
                self.events.emit(IsoTpEvent::Message(done.message));
            }
            return;
        }

        // The sender stops after each block until we send another FC.
        let Some(target) = session.flow_control else {
            return;
        };
        if block_size == 0 {
            return;
        }
        session.block_remaining = session.block_remaining.saturating_sub(1);
        if session.block_remaining == 0 {
            session.block_remaining = block_size;
            self.send_flow_control(target, now);
        }
    }

    /// Emit a pending session as-is before its key is reused.
    fn flush(&mut self, key: Key) {
        if let Some(stale) = self.sessions.remove(&key) {
            tracing::debug!(
                bus = key.bus,
                id = format!("0x{:X}", key.id),
                have = stale.message.data.len(),
                want = stale.message.reported_len,
                "flushing partial message"
            );
            self.events.emit(IsoTpEvent::Message(stale.message));
        }
    }

    /// The paired request id if one is registered, else our last destination.
    fn flow_control_destination(&self, key: Key) -> Option<Address> {
        let target = self
            .filter
            .request_for(key.bus, key.id)
            .and_then(|id| self.pair_address(key.bus, id))
            .or(self.last_sender);
        if target.is_none() {
            tracing::debug!(bus = key.bus, id = format!("0x{:X}", key.id), "no known sender to address flow control to");
        }
        target
    }

    /// Pair ids are transport ids: composite under extended addressing.
    fn pair_address(&self, bus: u8, id: u64) -> Option<Address> {
        let (can_id, target_address) = match self.config.addressing {
            Addressing::Normal => (u32::try_from(id).ok()?, None),
            Addressing::Extended => {
                let (can_id, ta) = split_extended_id(id);
                (can_id, Some(ta))
            }
        };
        (u64::from(can_id) <= EXTENDED_ID_MAX).then_some(Address {
            bus,
            can_id,
            target_address,
        })
    }

    fn send_flow_control(&mut self, target: Address, now: Instant) {
        let ta = match self.config.addressing {
            Addressing::Normal => None,
            Addressing::Extended => target.target_address,
        };
        let can_id = target.can_id;
        let data = codec::encode_flow_control(
            FlowStatus::ContinueToSend,
            self.config.fc_block_size,
            self.config.fc_separation_time,
            ta,
        );
        tracing::trace!(bus = target.bus, id = format!("0x{can_id:X}"), "sending flow control");
        let frame = self.outbound_frame(target.bus, can_id, data, now);
        self.frames.send_frame(frame);
    }

    fn on_flow_control(
        &mut self,
        key: Key,
        status: FlowStatus,
        block_size: u8,
        separation: Duration,
        now: Instant,
    ) {
        let Some(target) = self.flow_control_target(key) else {
            tracing::trace!(bus = key.bus, id = format!("0x{:X}", key.id), "flow control with no transfer awaiting it");
            return;
        };
        let Some(mut tx) = self.transfers.remove(&target) else {
            return;
        };

        match status {
            FlowStatus::ContinueToSend => {
                tracing::trace!(block_size, ?separation, "flow control: continue to send");
                tx.state = TxState::Sending {
                    block_remaining: (block_size != 0).then_some(block_size),
                    separation,
                    next_at: now,
                };
                self.pump(tx, now);
            }
            FlowStatus::Wait => {
                let waits = match tx.state {
                    TxState::AwaitingFlowControl { waits, .. } => waits.saturating_add(1),
                    TxState::Sending { .. } => 1,
                };
                if waits > self.config.max_wait_frames {
                    self.fail(tx, IsoTpError::WaitLimitExceeded { waits });
                } else {
                    tx.state = TxState::AwaitingFlowControl {
                        deadline: now + self.config.flow_control_timeout(),
                        waits,
                    };
                    self.transfers.insert(target, tx);
                }
            }
            FlowStatus::Overflow => self.fail(tx, IsoTpError::Overflow),
        }
    }

    /// Which of our transfers an inbound FC unblocks: the paired request id
    /// if one is registered, else the oldest transfer on that bus.
    fn flow_control_target(&self, key: Key) -> Option<Key> {
        if let Some(request_id) = self.filter.request_for(key.bus, key.id) {
            let target = Key {
                bus: key.bus,
                id: request_id,
            };
            return self
                .transfers
                .get(&target)
                .filter(|tx| tx.is_awaiting_flow_control())
                .map(|_| target);
        }

        self.transfers
            .values()
            .filter(|tx| tx.key.bus == key.bus && tx.key.id != key.id && tx.is_awaiting_flow_control())
            .min_by_key(|tx| tx.transfer)
            .map(|tx| tx.key)
    }

    // ── Outbound ────────────────────────────────────────────────

    pub fn send_message(&mut self, bus: u8, id: u64, payload: &[u8]) -> IsoTpResult<TransferId> {
        self.send_message_at(bus, id, payload, Instant::now())
    }

    /// Segment `payload` for transmission to CAN id `id` on `bus`.
    ///
    /// Under extended addressing every frame leads with the configured
    /// `target_address`, if any, and the transfer is tracked under the
    /// composite id.
    ///
    /// Single Frames and transfers that ignore Flow Control finish inside
    /// this call. Otherwise the First Frame goes out now and the rest waits
    /// for the receiver's Flow Control. Either way the outcome is reported
    /// as a `TransferComplete`/`TransferFailed` event carrying the returned id.
    pub fn send_message_at(
        &mut self,
        bus: u8,
        id: u64,
        payload: &[u8],
        now: Instant,
    ) -> IsoTpResult<TransferId> {
        if payload.is_empty() {
            return Err(IsoTpError::EmptyPayload);
        }
        if payload.len() > MAX_MESSAGE_LEN {
            return Err(IsoTpError::PayloadTooLong {
                len: payload.len(),
                max: MAX_MESSAGE_LEN,
            });
        }
        let bus_count = self.frames.bus_count();
        if bus as usize >= bus_count {
            return Err(IsoTpError::InvalidBus { bus, bus_count });
        }
        let can_id = u32::try_from(id)
            .ok()
            .filter(|&can_id| u64::from(can_id) <= EXTENDED_ID_MAX)
            .ok_or(IsoTpError::InvalidId { id })?;
        let ta = match self.config.addressing {
            Addressing::Normal => None,
            Addressing::Extended => self.config.target_address,
        };
        let address = Address {
            bus,
            can_id,
            target_address: ta,
        };

        let key = address.key();
        if self.transfers.contains_key(&key) {
            return Err(IsoTpError::TransferInProgress { bus, id });
        }

        self.last_sender = Some(address);
        let transfer = TransferId(self.next_transfer);
        self.next_transfer += 1;

        let layout = address.layout();
        if payload.len() <= layout.single_frame_max() {
            let data = codec::encode_single(payload, ta, self.config.padding);
            let frame = self.outbound_frame(bus, can_id, data, now);
            self.frames.send_frame(frame);
            self.events.emit(IsoTpEvent::TransferComplete {
                transfer,
                bus,
                id: key.id,
            });
            return Ok(transfer);
        }

        let first_len = layout.first_frame_capacity();
        let data = codec::encode_first(payload.len(), &payload[..first_len], ta, self.config.padding);
        let frame = self.outbound_frame(bus, can_id, data, now);
        self.frames.send_frame(frame);
        tracing::debug!(bus, id = format!("0x{id:X}"), len = payload.len(), "first frame sent");

        let state = if self.config.honor_flow_control {
            TxState::AwaitingFlowControl {
                deadline: now + self.config.flow_control_timeout(),
                waits: 0,
            }
        } else {
            TxState::Sending {
                block_remaining: None,
                separation: Duration::ZERO,
                next_at: now,
            }
        };
        let tx = TxTransfer {
            transfer,
            key,
            address,
            payload: payload.to_vec(),
            offset: first_len,
            next_seq: 1,
            state,
        };

        if self.config.honor_flow_control {
            self.transfers.insert(key, tx);
        } else {
            self.pump(tx, now);
        }
        Ok(transfer)
    }

    /// Send every Consecutive Frame that is due, then park, finish or
    /// re-await Flow Control.
    fn pump(&mut self, mut tx: TxTransfer, now: Instant) {
        loop {
            if tx.is_done() {
                tracing::debug!(bus = tx.key.bus, id = format!("0x{:X}", tx.key.id), "transfer complete");
                self.events.emit(IsoTpEvent::TransferComplete {
                    transfer: tx.transfer,
                    bus: tx.key.bus,
                    id: tx.key.id,
                });
                return;
            }

            let TxState::Sending {
                block_remaining,
                separation,
                next_at,
            } = tx.state
            else {
                self.transfers.insert(tx.key, tx);
                return;
            };
            if next_at > now {
                self.transfers.insert(tx.key, tx);
                return;
            }

            self.send_consecutive(&mut tx, now);
            if tx.is_done() {
                continue;
            }

            tx.state = match block_remaining {
                Some(1) => TxState::AwaitingFlowControl {
                    deadline: now + self.config.flow_control_timeout(),
                    waits: 0,
                },
                remaining => TxState::Sending {
                    block_remaining: remaining.map(|n| n - 1),
                    separation,
                    next_at: now + separation,
                },
            };
        }
    }

    /// Always advances `tx.offset`, so `pump` terminates.
    fn send_consecutive(&mut self, tx: &mut TxTransfer, now: Instant) {
        let Address {
            bus,
            can_id,
            target_address,
        } = tx.address;
        let capacity = tx.address.layout().consecutive_frame_capacity();
        let end = (tx.offset + capacity).min(tx.payload.len());
        let data = codec::encode_consecutive(tx.next_seq, &tx.payload[tx.offset..end], target_address, self.config.padding);
        tx.offset = end;
        tx.next_seq = (tx.next_seq + 1) & 0x0F;
        let frame = self.outbound_frame(bus, can_id, data, now);
        self.frames.send_frame(frame);
    }

    fn fail(&mut self, tx: TxTransfer, error: IsoTpError) {
        tracing::warn!(
            bus = tx.key.bus,
            id = format!("0x{:X}", tx.key.id),
            sent = tx.offset,
            len = tx.payload.len(),
            %error,
            "transfer abandoned"
        );
        self.events.emit(IsoTpEvent::TransferFailed {
            transfer: tx.transfer,
            bus: tx.key.bus,
            id: tx.key.id,
            error,
        });
    }

    fn outbound_frame(&mut self, bus: u8, can_id: u32, data: Vec<u8>, now: Instant) -> CanFrame {
        let epoch = *self.epoch.get_or_insert(now);
        CanFrame {
            bus,
            id: can_id,
            extended: can_id > STANDARD_ID_MAX,
            data,
            timestamp_us: now.saturating_duration_since(epoch).as_micros() as u64,
            received: false,
        }
    }

    // ── Timers ──────────────────────────────────────────────────

    pub fn poll(&mut self) {
        self.poll_at(Instant::now());
    }

    /// Expire idle sessions and overdue transfers, and send paced frames that are due.
    pub fn poll_at(&mut self, now: Instant) {
        self.expire(now);

        let due: Vec<Key> = self
            .transfers
            .values()
            .filter(|tx| matches!(tx.state, TxState::Sending { next_at, .. } if next_at <= now))
            .map(|tx| tx.key)
            .collect();
        for key in due {
            if let Some(tx) = self.transfers.remove(&key) {
                self.pump(tx, now);
            }
        }
    }

    /// Earliest instant at which `poll` has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        let timeout = self.config.session_timeout();
        let sessions = self.sessions.values().map(|s| s.last_activity + timeout);
        let transfers = self.transfers.values().map(|tx| match tx.state {
            TxState::AwaitingFlowControl { deadline, .. } => deadline,
            TxState::Sending { next_at, .. } => next_at,
        });
        sessions.chain(transfers).min()
    }

    fn expire(&mut self, now: Instant) {
        let timeout = self.config.session_timeout();
        self.sessions.retain(|key, session| {
            let alive = now.saturating_duration_since(session.last_activity) < timeout;
            if !alive {
                tracing::warn!(
                    bus = key.bus,
                    id = format!("0x{:X}", key.id),
                    have = session.message.data.len(),
                    want = session.message.reported_len,
                    "reassembly session timed out"
                );
            }
            alive
        });

        let overdue: Vec<Key> = self
            .transfers
            .values()
            .filter(|tx| matches!(tx.state, TxState::AwaitingFlowControl { deadline, .. } if deadline <= now))
            .map(|tx| tx.key)
            .collect();
        for key in overdue {
            if let Some(tx) = self.transfers.remove(&key) {
                let timeout_ms = self.config.flow_control_timeout_ms;
                self.fail(tx, IsoTpError::FlowControlTimeout { timeout_ms });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{EventRecorder, FrameRecorder};

    fn engine(config: IsoTpConfig) -> (IsoTpEngine, FrameRecorder, EventRecorder) {
        let frames = FrameRecorder::new();
        let events = EventRecorder::new();
        let engine = IsoTpEngine::new(config, frames.clone(), events.clone());
        (engine, frames, events)
    }

    fn frame(id: u32, data: &[u8]) -> CanFrame {
        CanFrame::new(id, data.to_vec())
    }

    fn respond_config() -> IsoTpConfig {
        IsoTpConfig {
            flow_control: FlowControlRole::Respond,
            ..IsoTpConfig::default()
        }
    }

    #[test]
    fn single_frame_emits_immediately() {
        let (mut engine, _, events) = engine(IsoTpConfig::default());
        engine.ingest(&[frame(0x123, &[0x02, 0xDE, 0xAD, 0, 0, 0, 0, 0])]);

        let messages = events.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, 0x123);
        assert_eq!(messages[0].data, vec![0xDE, 0xAD]);
        assert_eq!(messages[0].reported_len, 2);
        assert!(!messages[0].multiframe);
        assert_eq!(engine.session_count(), 0);
    }

    #[test]
    fn invalid_single_frames_are_dropped() {
        let (mut engine, _, events) = engine(IsoTpConfig::default());
        engine.ingest(&[
            frame(0x123, &[0x00, 0xDE]),
            frame(0x123, &[0x08, 1, 2, 3, 4, 5, 6, 7]),
            frame(0x123, &[]),
        ]);
        assert!(events.events().is_empty());
    }

    #[test]
    fn first_and_consecutive_frames_reassemble() {
        let (mut engine, frames, events) = engine(IsoTpConfig::default());
        engine.ingest(&[frame(0x456, &[0x10, 0x08, 0xCA, 0xFE, 0xBA, 0xBE, 0xAF, 0xFE])]);
        assert_eq!(engine.session_count(), 1);
        assert!(events.messages().is_empty());

        engine.ingest(&[frame(0x456, &[0x21, 0xEF, 0xAC, 0, 0, 0, 0, 0])]);
        let messages = events.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, 0x456);
        assert_eq!(messages[0].reported_len, 8);
        assert_eq!(messages[0].data, vec![0xCA, 0xFE, 0xBA, 0xBE, 0xAF, 0xFE, 0xEF, 0xAC]);
        assert!(messages[0].multiframe);
        assert_eq!(engine.session_count(), 0);
        // Passive role never transmits.
        assert!(frames.frames().is_empty());
    }

    #[test]
    fn sequence_wraps_from_fifteen_to_zero() {
        let (mut engine, _, events) = engine(IsoTpConfig::default());
        // 6 + 16 * 7 = 118 bytes needs CF sequence 1..=15 then 0.
        let payload: Vec<u8> = (0..118u8).collect();
        let mut batch = vec![frame(0x7E8, &[0x10, 118, 0, 1, 2, 3, 4, 5])];
        let mut offset = 6;
        let mut seq = 1u8;
        while offset < payload.len() {
            let end = (offset + 7).min(payload.len());
            let mut data = vec![0x20 | seq];
            data.extend_from_slice(&payload[offset..end]);
            batch.push(frame(0x7E8, &data));
            offset = end;
            seq = (seq + 1) & 0x0F;
        }
        engine.ingest(&batch);

        let messages = events.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].data, payload);
    }

    #[test]
    fn wrong_sequence_discards_session() {
        let (mut engine, _, events) = engine(IsoTpConfig::default());
        engine.ingest(&[
            frame(0x7E8, &[0x10, 0x14, 1, 2, 3, 4, 5, 6]),
            frame(0x7E8, &[0x22, 7, 8, 9, 10, 11, 12, 13]),
        ]);
        assert_eq!(engine.session_count(), 0);

        // Follow-up frames of the broken exchange go nowhere.
        engine.ingest(&[frame(0x7E8, &[0x21, 7, 8, 9, 10, 11, 12, 13])]);
        assert!(events.messages().is_empty());
    }

    #[test]
    fn consecutive_frame_without_session_is_dropped() {
        let (mut engine, _, events) = engine(IsoTpConfig::default());
        engine.ingest(&[frame(0x7E8, &[0x21, 1, 2, 3, 4, 5, 6, 7])]);
        assert!(events.events().is_empty());
        assert_eq!(engine.session_count(), 0);
    }

    #[test]
    fn overshooting_consecutive_frame_is_truncated() {
        let (mut engine, _, events) = engine(IsoTpConfig::default());
        engine.ingest(&[
            frame(0x7E8, &[0x10, 0x09, 1, 2, 3, 4, 5, 6]),
            frame(0x7E8, &[0x21, 7, 8, 9, 0xAA, 0xAA, 0xAA, 0xAA]),
        ]);
        let messages = events.messages();
        assert_eq!(messages[0].data, vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn new_first_frame_flushes_stale_session() {
        let (mut engine, _, events) = engine(IsoTpConfig::default());
        engine.ingest(&[
            frame(0x7E8, &[0x10, 0x14, 1, 2, 3, 4, 5, 6]),
            frame(0x7E8, &[0x10, 0x08, 9, 9, 9, 9, 9, 9]),
        ]);

        let messages = events.messages();
        assert_eq!(messages.len(), 1);
        assert!(!messages[0].is_complete());
        assert_eq!(messages[0].reported_len, 20);
        assert_eq!(messages[0].data, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(engine.session_count(), 1);
    }

    #[test]
    fn single_frame_flushes_pending_session() {
        let (mut engine, _, events) = engine(IsoTpConfig::default());
        engine.ingest(&[
            frame(0x7E8, &[0x10, 0x14, 1, 2, 3, 4, 5, 6]),
            frame(0x7E8, &[0x02, 0x7E, 0x00, 0, 0, 0, 0, 0]),
        ]);

        let messages = events.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].data, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(messages[0].reported_len, 0x14);
        assert!(!messages[0].is_complete());
        assert_eq!(messages[1].data, vec![0x7E, 0x00]);
        assert!(!messages[1].multiframe);
        assert_eq!(engine.session_count(), 0);
    }

    #[test]
    fn sessions_are_keyed_per_bus_and_id() {
        let frames = FrameRecorder::with_bus_count(2);
        let events = EventRecorder::new();
        let mut engine = IsoTpEngine::new(IsoTpConfig::default(), frames, events.clone());
        engine.ingest(&[
            frame(0x7E8, &[0x10, 0x08, 1, 2, 3, 4, 5, 6]),
            frame(0x7E8, &[0x10, 0x08, 9, 9, 9, 9, 9, 9]).on_bus(1),
            frame(0x7E9, &[0x10, 0x08, 5, 5, 5, 5, 5, 5]),
        ]);
        assert_eq!(engine.session_count(), 3);
        assert!(events.messages().is_empty());
    }

    #[test]
    fn frames_on_unknown_bus_are_ignored() {
        let (mut engine, _, events) = engine(IsoTpConfig::default());
        engine.ingest(&[frame(0x123, &[0x01, 0x3E]).on_bus(3)]);
        assert!(events.events().is_empty());
    }

    #[test]
    fn idle_sessions_expire_without_emission() {
        let (mut engine, _, events) = engine(IsoTpConfig::default());
        let start = Instant::now();
        engine.ingest_at(&[frame(0x7E8, &[0x10, 0x14, 1, 2, 3, 4, 5, 6])], start);
        assert!(engine.next_deadline().is_some());

        engine.poll_at(start + Duration::from_millis(999));
        assert_eq!(engine.session_count(), 1);

        engine.poll_at(start + Duration::from_millis(1000));
        assert_eq!(engine.session_count(), 0);

        engine.ingest_at(
            &[frame(0x7E8, &[0x21, 7, 8, 9, 10, 11, 12, 13])],
            start + Duration::from_millis(1001),
        );
        assert!(events.events().is_empty());
    }

    #[test]
    fn respond_role_sends_one_flow_control_to_last_sender() {
        let (mut engine, frames, _) = engine(respond_config());
        engine.send_message(0, 0x451, &[0xAF, 0xFE, 0xBA, 0xBE]).unwrap();
        engine.ingest(&[frame(0x456, &[0x10, 0x08, 0xCA, 0xFE, 0xBA, 0xBE, 0xAF, 0xFE])]);

        let sent = frames.frames();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].id, 0x451);
        assert_eq!(sent[0].data, vec![0x04, 0xAF, 0xFE, 0xBA, 0xBE, 0xAA, 0xAA, 0xAA]);
        assert_eq!(sent[1].id, 0x451);
        assert_eq!(sent[1].data, vec![0x30, 0x00, 0x03, 0, 0, 0, 0, 0]);
        assert!(!sent[1].received);
    }

    #[test]
    fn flow_control_reply_prefers_registered_pair() {
        let (mut engine, frames, _) = engine(respond_config());
        engine.send_message(0, 0x111, &[0x3E, 0x00]).unwrap();
        engine.register_pair(IdPair {
            bus: 0,
            request_id: 0x7E0,
            response_id: 0x7E8,
        });
        frames.take();

        engine.ingest(&[frame(0x7E8, &[0x10, 0x14, 0x62, 0xF1, 0x90, 0x57, 0x56, 0x57])]);
        let sent = frames.frames();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].id, 0x7E0);
    }

    #[test]
    fn receiver_repeats_flow_control_per_block() {
        let config = IsoTpConfig {
            fc_block_size: 2,
            ..respond_config()
        };
        let (mut engine, frames, events) = engine(config);
        engine.register_pair(IdPair {
            bus: 0,
            request_id: 0x7E0,
            response_id: 0x7E8,
        });

        // 6 + 5 * 7 = 41 bytes.
        engine.ingest(&[frame(0x7E8, &[0x10, 41, 0, 0, 0, 0, 0, 0])]);
        for seq in 1..=5u8 {
            engine.ingest(&[frame(0x7E8, &[0x20 | seq, 0, 0, 0, 0, 0, 0, 0])]);
        }

        // After the FF, after CF 2 and after CF 4. CF 5 completes the message.
        let sent = frames.frames();
        assert_eq!(sent.len(), 3);
        assert!(sent.iter().all(|f| f.id == 0x7E0 && f.data[..3] == [0x30, 0x02, 0x03]));
        assert_eq!(events.messages()[0].data.len(), 41);
    }

    #[test]
    fn outbound_timestamps_count_from_first_transmission() {
        let (mut engine, frames, _) = engine(IsoTpConfig::default());
        let start = Instant::now();
        engine.send_message_at(0, 0x7E0, &[0x3E, 0x00], start).unwrap();
        engine
            .send_message_at(0, 0x7E0, &[0x3E, 0x00], start + Duration::from_millis(2))
            .unwrap();
        let sent = frames.frames();
        assert_eq!(sent[0].timestamp_us, 0);
        assert_eq!(sent[1].timestamp_us, 2_000);
    }

    #[test]
    fn no_flow_control_without_known_sender() {
        let (mut engine, frames, _) = engine(respond_config());
        engine.ingest(&[frame(0x456, &[0x10, 0x08, 1, 2, 3, 4, 5, 6])]);
        assert!(frames.frames().is_empty());
        assert_eq!(engine.session_count(), 1);
    }

    #[test]
    fn own_first_frame_echo_gets_no_flow_control() {
        let (mut engine, frames, _) = engine(respond_config());
        engine.send_message(0, 0x451, &[0x01]).unwrap();
        frames.take();
        engine.ingest(&[frame(0x456, &[0x10, 0x08, 1, 2, 3, 4, 5, 6]).transmitted()]);
        assert!(frames.frames().is_empty());
    }

    #[test]
    fn flow_control_frames_never_emit_messages() {
        let (mut engine, _, events) = engine(IsoTpConfig::default());
        engine.ingest(&[frame(0x7E8, &[0x30, 0x00, 0x00, 0, 0, 0, 0, 0])]);
        assert!(events.events().is_empty());
    }

    #[test]
    fn extended_addressing_without_target_address_sends_plain_frames() {
        let config = IsoTpConfig {
            addressing: Addressing::Extended,
            ..respond_config()
        };
        let (mut engine, frames, events) = engine(config);
        engine.send_message(0, 0x451, &[0xAF, 0xFE, 0xBA, 0xBE]).unwrap();
        engine.ingest(&[frame(0x456, &[0xFB, 0x10, 0x08, 0xCA, 0xFE, 0xBA, 0xBE, 0xAF])]);

        let sent = frames.frames();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].id, 0x451);
        assert_eq!(sent[0].data, vec![0x04, 0xAF, 0xFE, 0xBA, 0xBE, 0xAA, 0xAA, 0xAA]);
        assert_eq!(sent[1].id, 0x451);
        assert_eq!(sent[1].data, vec![0x30, 0x00, 0x03, 0, 0, 0, 0, 0]);

        engine.ingest(&[frame(0x456, &[0xFB, 0x21, 0xFE, 0xEF, 0xAC, 0, 0, 0])]);
        let messages = events.messages();
        assert_eq!(messages.len(), 1);
        let msg = &messages[0];
        assert_eq!((msg.id >> 8, msg.id & 0xFF), (0x456, 0xFB));
        assert_eq!(msg.reported_len, 8);
        assert_eq!(msg.data, vec![0xCA, 0xFE, 0xBA, 0xBE, 0xAF, 0xFE, 0xEF, 0xAC]);
    }

    #[test]
    fn extended_addressing_stamps_configured_target_address() {
        let config = IsoTpConfig {
            addressing: Addressing::Extended,
            target_address: Some(0x10),
            ..IsoTpConfig::default()
        };
        let (mut engine, frames, events) = engine(config);
        let start = Instant::now();
        engine.send_message_at(0, 0x451, &[0xAF, 0xFE], start).unwrap();
        engine.send_message_at(0, 0x452, &[0x55; 8], start).unwrap();

        let sent = frames.take();
        assert_eq!(sent[0].id, 0x451);
        assert_eq!(sent[0].data, vec![0x10, 0x02, 0xAF, 0xFE, 0xAA, 0xAA, 0xAA, 0xAA]);
        assert_eq!(sent[1].data, vec![0x10, 0x10, 0x08, 0x55, 0x55, 0x55, 0x55, 0x55]);

        // The peer's FC arrives with its own address byte.
        engine.ingest_at(&[frame(0x45A, &[0xF1, 0x30, 0x00, 0x00, 0, 0, 0, 0])], start);
        let sent = frames.frames();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].data, vec![0x10, 0x21, 0x55, 0x55, 0x55, 0xAA, 0xAA, 0xAA]);
        assert!(matches!(
            events.events()[1],
            IsoTpEvent::TransferComplete { id, .. } if id == compose_extended_id(0x452, 0x10)
        ));
    }

    #[test]
    fn addressing_switch_fails_pending_transfers() {
        let config = IsoTpConfig {
            addressing: Addressing::Extended,
            target_address: Some(0x10),
            ..IsoTpConfig::default()
        };
        let (mut engine, frames, events) = engine(config);
        engine.send_message(0, 0x18DA_10F1, &[0x55; 20]).unwrap();
        assert_eq!(engine.pending_transfers(), 1);

        engine.set_addressing(Addressing::Normal);
        assert_eq!(engine.pending_transfers(), 0);
        assert!(matches!(
            &events.events()[..],
            [IsoTpEvent::TransferFailed { error: IsoTpError::AddressingChanged, .. }]
        ));

        // A late FC finds nothing to resume.
        frames.take();
        engine.ingest(&[frame(0x18DA_F110, &[0x30, 0x00, 0x00, 0, 0, 0, 0, 0])]);
        assert!(frames.frames().is_empty());
        assert_eq!(engine.next_deadline(), None);
    }

    #[test]
    fn addressing_switch_drops_open_sessions() {
        let (mut engine, _, events) = engine(IsoTpConfig::default());
        engine.ingest(&[frame(0x7E8, &[0x10, 0x14, 1, 2, 3, 4, 5, 6])]);
        assert_eq!(engine.session_count(), 1);

        engine.set_addressing(Addressing::Extended);
        assert_eq!(engine.session_count(), 0);
        assert_eq!(engine.config().addressing, Addressing::Extended);

        // The rest of the old exchange is now read with an address byte and
        // has no session to join.
        engine.ingest(&[frame(0x7E8, &[0x21, 7, 8, 9, 10, 11, 12, 13])]);
        assert!(events.events().is_empty());

        // Setting the same mode again keeps new state.
        engine.ingest(&[frame(0x7E8, &[0xF1, 0x10, 0x0A, 1, 2, 3, 4, 5])]);
        engine.set_addressing(Addressing::Extended);
        assert_eq!(engine.session_count(), 1);
    }

    #[test]
    fn registered_only_mode_skips_unknown_ids() {
        let config = IsoTpConfig {
            filter_mode: FilterMode::RegisteredOnly,
            ..IsoTpConfig::default()
        };
        let (mut engine, _, events) = engine(config);
        engine.add_filter(IdMaskFilter {
            bus: None,
            id: 0x7E8,
            mask: 0x7FF,
        });
        engine.ingest(&[
            frame(0x123, &[0x02, 0xDE, 0xAD]),
            frame(0x7E8, &[0x02, 0x50, 0x03]),
        ]);
        let messages = events.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, 0x7E8);

        engine.set_filter_mode(FilterMode::ProcessAll);
        engine.ingest(&[frame(0x123, &[0x02, 0xDE, 0xAD])]);
        assert_eq!(events.messages().len(), 2);
    }

    #[test]
    fn reception_disabled_ignores_data_frames() {
        let (mut engine, _, events) = engine(IsoTpConfig::default());
        engine.set_reception(false);
        engine.ingest(&[frame(0x123, &[0x02, 0xDE, 0xAD])]);
        assert!(events.events().is_empty());

        engine.set_reception(true);
        engine.ingest(&[frame(0x123, &[0x02, 0xDE, 0xAD])]);
        assert_eq!(events.messages().len(), 1);
    }

    #[test]
    fn send_single_frame_completes_immediately() {
        let (mut engine, frames, events) = engine(IsoTpConfig::default());
        let transfer = engine.send_message(0, 0x7E0, &[0x22, 0xF1, 0x90]).unwrap();

        assert_eq!(frames.frames()[0].data, vec![0x03, 0x22, 0xF1, 0x90, 0xAA, 0xAA, 0xAA, 0xAA]);
        assert_eq!(
            events.events(),
            vec![IsoTpEvent::TransferComplete {
                transfer,
                bus: 0,
                id: 0x7E0
            }]
        );
        assert_eq!(engine.pending_transfers(), 0);
    }

    #[test]
    fn send_without_flow_control_is_back_to_back() {
        let config = IsoTpConfig {
            honor_flow_control: false,
            ..IsoTpConfig::default()
        };
        let (mut engine, frames, events) = engine(config);
        let payload: Vec<u8> = (1..=20).collect();
        engine.send_message(0, 0x7E0, &payload).unwrap();

        let sent = frames.frames();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].data, vec![0x10, 0x14, 1, 2, 3, 4, 5, 6]);
        assert_eq!(sent[1].data, vec![0x21, 7, 8, 9, 10, 11, 12, 13]);
        assert_eq!(sent[2].data, vec![0x22, 14, 15, 16, 17, 18, 19, 20]);
        assert!(matches!(events.events()[0], IsoTpEvent::TransferComplete { .. }));
    }

    #[test]
    fn send_waits_for_flow_control_then_paces() {
        let (mut engine, frames, events) = engine(IsoTpConfig::default());
        let start = Instant::now();
        let payload: Vec<u8> = (1..=27).collect();
        engine.send_message_at(0, 0x7E0, &payload, start).unwrap();
        assert_eq!(frames.frames().len(), 1);
        assert_eq!(engine.pending_transfers(), 1);

        // ECU answers: CTS, block size 0, STmin 10ms.
        engine.ingest_at(&[frame(0x7E8, &[0x30, 0x00, 0x0A, 0, 0, 0, 0, 0])], start);
        assert_eq!(frames.frames().len(), 2);
        assert_eq!(engine.next_deadline(), Some(start + Duration::from_millis(10)));

        engine.poll_at(start + Duration::from_millis(5));
        assert_eq!(frames.frames().len(), 2);

        engine.poll_at(start + Duration::from_millis(10));
        engine.poll_at(start + Duration::from_millis(20));
        let sent = frames.frames();
        assert_eq!(sent.len(), 4);
        assert_eq!(sent[3].data, vec![0x23, 0x1B, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA]);
        assert!(matches!(events.events()[0], IsoTpEvent::TransferComplete { .. }));
        assert_eq!(engine.pending_transfers(), 0);
    }

    #[test]
    fn block_size_requests_new_flow_control() {
        let (mut engine, frames, events) = engine(IsoTpConfig::default());
        let start = Instant::now();
        let payload: Vec<u8> = (0..30).collect();
        engine.send_message_at(0, 0x7E0, &payload, start).unwrap();

        engine.ingest_at(&[frame(0x7E8, &[0x30, 0x02, 0x00])], start);
        assert_eq!(frames.frames().len(), 3);
        assert_eq!(engine.pending_transfers(), 1);
        assert!(events.events().is_empty());

        engine.ingest_at(&[frame(0x7E8, &[0x30, 0x00, 0x00])], start);
        assert_eq!(frames.frames().len(), 5);
        assert!(matches!(events.events()[0], IsoTpEvent::TransferComplete { .. }));
    }

    #[test]
    fn flow_control_timeout_fails_transfer() {
        let (mut engine, _, events) = engine(IsoTpConfig::default());
        let start = Instant::now();
        let transfer = engine.send_message_at(0, 0x7E0, &[0; 20], start).unwrap();

        engine.poll_at(start + Duration::from_millis(1000));
        assert_eq!(
            events.events(),
            vec![IsoTpEvent::TransferFailed {
                transfer,
                bus: 0,
                id: 0x7E0,
                error: IsoTpError::FlowControlTimeout { timeout_ms: 1000 }
            }]
        );
        assert_eq!(engine.pending_transfers(), 0);
    }

    #[test]
    fn wait_and_overflow_flow_status() {
        let config = IsoTpConfig {
            max_wait_frames: 1,
            ..IsoTpConfig::default()
        };
        let (mut engine, _, events) = engine(config);
        let start = Instant::now();
        engine.send_message_at(0, 0x7E0, &[0; 20], start).unwrap();
        engine.ingest_at(&[frame(0x7E8, &[0x31, 0, 0])], start);
        assert_eq!(engine.pending_transfers(), 1);
        engine.ingest_at(&[frame(0x7E8, &[0x31, 0, 0])], start);
        assert!(matches!(
            &events.events()[0],
            IsoTpEvent::TransferFailed { error: IsoTpError::WaitLimitExceeded { waits: 2 }, .. }
        ));

        engine.send_message_at(0, 0x7E0, &[0; 20], start).unwrap();
        engine.ingest_at(&[frame(0x7E8, &[0x32, 0, 0])], start);
        assert!(matches!(
            &events.events()[1],
            IsoTpEvent::TransferFailed { error: IsoTpError::Overflow, .. }
        ));
    }

    #[test]
    fn flow_control_routes_through_pairs() {
        let (mut engine, frames, _) = engine(IsoTpConfig::default());
        engine.register_pair(IdPair {
            bus: 0,
            request_id: 0x7E0,
            response_id: 0x7E8,
        });
        engine.send_message(0, 0x7E0, &[0; 20]).unwrap();
        engine.send_message(0, 0x7E1, &[0; 20]).unwrap();

        // A paired FC only unblocks the transfer on its request id.
        engine.ingest(&[frame(0x7E8, &[0x30, 0, 0])]);
        let to_7e0 = frames.frames().iter().filter(|f| f.id == 0x7E0).count();
        let to_7e1 = frames.frames().iter().filter(|f| f.id == 0x7E1).count();
        assert_eq!(to_7e0, 3);
        assert_eq!(to_7e1, 1);
    }

    #[test]
    fn send_rejects_bad_input() {
        let (mut engine, _, _) = engine(IsoTpConfig::default());
        assert_eq!(engine.send_message(0, 0x7E0, &[]), Err(IsoTpError::EmptyPayload));
        assert_eq!(
            engine.send_message(0, 0x7E0, &[0; 4096]),
            Err(IsoTpError::PayloadTooLong { len: 4096, max: 4095 })
        );
        assert_eq!(
            engine.send_message(1, 0x7E0, &[1]),
            Err(IsoTpError::InvalidBus { bus: 1, bus_count: 1 })
        );
        assert_eq!(
            engine.send_message(0, 0x2000_0000, &[1]),
            Err(IsoTpError::InvalidId { id: 0x2000_0000 })
        );

        engine.send_message(0, 0x7E0, &[0; 20]).unwrap();
        assert_eq!(
            engine.send_message(0, 0x7E0, &[0; 20]),
            Err(IsoTpError::TransferInProgress { bus: 0, id: 0x7E0 })
        );
    }

    #[test]
    fn outbound_29_bit_ids_are_flagged_extended() {
        let (mut engine, frames, _) = engine(IsoTpConfig::default());
        engine.send_message(0, 0x18DA_10F1, &[0x3E, 0x00]).unwrap();
        assert!(frames.frames()[0].extended);
    }

    #[test]
    fn round_trip_through_two_engines() {
        let (mut tx_engine, tx_frames, _) = engine(IsoTpConfig {
            honor_flow_control: false,
            ..IsoTpConfig::default()
        });
        let (mut rx_engine, _, rx_events) = engine(IsoTpConfig::default());

        for len in [1usize, 7, 8, 62, 4095] {
            let payload: Vec<u8> = (0..len).map(|i| (i * 7) as u8).collect();
            tx_engine.send_message(0, 0x7E0, &payload).unwrap();
            let wire: Vec<CanFrame> = tx_frames
                .take()
                .into_iter()
                .map(|f| CanFrame { received: true, ..f })
                .collect();
            rx_engine.ingest(&wire);

            let messages = rx_events.messages();
            let last = messages.last().unwrap();
            assert_eq!(last.data, payload);
            assert_eq!(last.reported_len, len);
            assert_eq!(last.multiframe, len > 7);
        }
    }
}
