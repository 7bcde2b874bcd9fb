//! ISO-TP (ISO 15765-2) transport engine.
//!
//! `IsoTpEngine` is the synchronous core: it reassembles Single, First and
//! Consecutive Frames into messages and segments outbound payloads, honoring
//! Flow Control. `IsoTpService` wraps it in a tokio task for use against a
//! live `CanInterface`.

pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod interface;
pub mod mock;
pub mod service;
pub mod sink;
pub mod types;

pub use config::{Addressing, FilterMode, FlowControlRole, IsoTpConfig};
pub use engine::IsoTpEngine;
pub use error::{IsoTpError, IsoTpResult};
pub use filter::{IdFilter, IdMaskFilter, IdPair};
pub use interface::CanInterface;
pub use mock::{EventRecorder, FrameRecorder, MockCanInterface};
pub use service::{IsoTpHandle, IsoTpService};
pub use sink::{EventSink, FrameSink};
pub use types::{FlowStatus, IsoTpEvent, TransferId};
