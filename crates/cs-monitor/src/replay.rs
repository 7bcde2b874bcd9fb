//! Offline replay of a candump log through the ISO-TP engine and UDS handler.
//!
//! The engine runs on a synthetic clock derived from the log's timestamps,
//! so session timeouts behave as they did on the bus rather than as fast as
//! the file can be read.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::DateTime;
use serde::Serialize;
use tokio::sync::mpsc;

use cs_isotp::{FrameSink, IsoTpEngine, IsoTpEvent};
use cs_protocol::{CanFrame, IsoTpMessage, UdsMessage, hex::to_hex};
use cs_uds::{UdsHandler, describe};

use crate::candump::{self, BusMap};
use crate::config::MonitorConfig;

/// One line of monitor output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Transport(IsoTpMessage),
    Diagnostic(UdsMessage),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplayStats {
    pub lines: u64,
    pub frames: u64,
    pub malformed: u64,
    /// Frames from interfaces beyond `bus_count`.
    pub unmapped: u64,
    pub transport_messages: u64,
    pub diagnostic_messages: u64,
    pub negative_responses: u64,
    /// Flow Control frames the engine would have transmitted.
    pub flow_control_sent: u64,
}

/// Counts what the engine transmits. Nothing goes on a bus during replay.
struct TransmitCounter {
    sent: Arc<AtomicU64>,
    bus_count: usize,
}

impl FrameSink for TransmitCounter {
    fn send_frame(&mut self, frame: CanFrame) {
        tracing::trace!(bus = frame.bus, id = format!("0x{:X}", frame.id), data = %frame.hex_data(), "replay suppressed transmit");
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    fn bus_count(&self) -> usize {
        self.bus_count
    }
}

/// Maps log timestamps onto `Instant`s.
struct ReplayClock {
    base: Instant,
    first_us: Option<u64>,
}

impl ReplayClock {
    fn at(&mut self, timestamp_us: u64) -> Instant {
        let first = *self.first_us.get_or_insert(timestamp_us);
        self.base + Duration::from_micros(timestamp_us.saturating_sub(first))
    }
}

pub struct Replay {
    engine: IsoTpEngine,
    events: mpsc::UnboundedReceiver<IsoTpEvent>,
    handler: UdsHandler,
    buses: BusMap,
    clock: ReplayClock,
    transmitted: Arc<AtomicU64>,
    show_transport: bool,
    stats: ReplayStats,
}

impl Replay {
    pub fn new(config: &MonitorConfig) -> Self {
        let (event_tx, events) = mpsc::unbounded_channel();
        let transmitted = Arc::new(AtomicU64::new(0));
        let sink = TransmitCounter {
            sent: transmitted.clone(),
            bus_count: config.bus_count,
        };

        let mut engine = IsoTpEngine::new(config.isotp.clone(), sink, event_tx);
        for pair in &config.uds.pairs {
            engine.register_pair(*pair);
        }

        Self {
            engine,
            events,
            handler: UdsHandler::new(config.uds.clone()),
            buses: BusMap::new(config.bus_count),
            clock: ReplayClock {
                base: Instant::now(),
                first_us: None,
            },
            transmitted,
            show_transport: config.show_transport,
            stats: ReplayStats::default(),
        }
    }

    /// Process one log line, returning whatever it completed.
    pub fn feed_line(&mut self, line: &str) -> Vec<Record> {
        self.stats.lines += 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Vec::new();
        }

        let Some(record) = candump::parse_line(trimmed) else {
            self.stats.malformed += 1;
            tracing::debug!(line = self.stats.lines, "unparseable candump line");
            return Vec::new();
        };
        let Some(bus) = self.buses.bus_for(&record.interface) else {
            self.stats.unmapped += 1;
            return Vec::new();
        };

        self.stats.frames += 1;
        let now = self.clock.at(record.timestamp_us);
        self.engine.ingest_at(&[record.into_frame(bus)], now);
        self.drain()
    }

    /// Final statistics. Sessions still open at end of log are not emitted.
    pub fn finish(mut self) -> ReplayStats {
        if self.engine.session_count() > 0 {
            tracing::info!(open = self.engine.session_count(), "log ended mid-transfer");
        }
        self.stats.flow_control_sent = self.transmitted.load(Ordering::Relaxed);
        self.stats
    }

    pub fn stats(&self) -> &ReplayStats {
        &self.stats
    }

    pub fn interfaces(&self) -> &[String] {
        self.buses.interfaces()
    }

    fn drain(&mut self) -> Vec<Record> {
        let mut records = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            let IsoTpEvent::Message(message) = event else {
                continue;
            };
            self.stats.transport_messages += 1;

            let diagnostic = self.handler.on_transport_message(&message);
            if self.show_transport {
                records.push(Record::Transport(message));
            }
            if let Some(uds) = diagnostic {
                self.stats.diagnostic_messages += 1;
                if uds.negative_response {
                    self.stats.negative_responses += 1;
                }
                records.push(Record::Diagnostic(uds));
            }
        }
        records
    }
}

/// Format a log timestamp as UTC wall-clock time.
pub fn format_timestamp(timestamp_us: u64) -> String {
    let Ok(micros) = i64::try_from(timestamp_us) else {
        return timestamp_us.to_string();
    };
    match DateTime::from_timestamp_micros(micros) {
        Some(ts) => ts.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
        None => timestamp_us.to_string(),
    }
}

/// Render a record as one line of text.
pub fn render(record: &Record) -> String {
    match record {
        Record::Transport(msg) => {
            let mut line = format!(
                "{} bus{} ISO-TP 0x{:X} len={} [{}]",
                format_timestamp(msg.timestamp_us),
                msg.bus,
                msg.id,
                msg.reported_len,
                to_hex(&msg.data)
            );
            if !msg.is_complete() {
                line.push_str(&format!(" (partial {}/{})", msg.data.len(), msg.reported_len));
            }
            line
        }
        Record::Diagnostic(msg) => format!(
            "{} bus{} UDS {}",
            format_timestamp(msg.timestamp_us),
            msg.bus,
            describe(msg)
        ),
    }
}
