//! Mock collaborators for testing.
//!
//! `MockCanInterface` stands in for a CAN connection in async tests.
//! `FrameRecorder` and `EventRecorder` are cloneable handles that plug into
//! the synchronous engine and let a test inspect what it emitted.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use cs_protocol::{CanFrame, IsoTpMessage};

use crate::error::{IsoTpError, IsoTpResult};
use crate::interface::CanInterface;
use crate::sink::{EventSink, FrameSink};
use crate::types::IsoTpEvent;

/// Mock CAN interface with frame recording.
pub struct MockCanInterface {
    sent_frames: Mutex<Vec<CanFrame>>,
    bus_count: usize,
    fail_sends: bool,
}

impl MockCanInterface {
    /// A single-bus mock that accepts every frame.
    pub fn new() -> Self {
        Self {
            sent_frames: Mutex::new(Vec::new()),
            bus_count: 1,
            fail_sends: false,
        }
    }

    /// A mock whose `send_frame` always errors.
    pub fn failing() -> Self {
        Self {
            fail_sends: true,
            ..Self::new()
        }
    }

    /// Get copies of all frames that were sent.
    pub fn sent_frames(&self) -> Vec<CanFrame> {
        self.sent_frames.lock().unwrap().clone()
    }

    /// Get the last sent frame, if any.
    pub fn last_sent(&self) -> Option<CanFrame> {
        self.sent_frames.lock().unwrap().last().cloned()
    }
}

impl Default for MockCanInterface {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CanInterface for MockCanInterface {
    async fn send_frame(&self, frame: &CanFrame) -> IsoTpResult<()> {
        if self.fail_sends {
            return Err(IsoTpError::Interface("mock interface is offline".into()));
        }
        self.sent_frames.lock().unwrap().push(frame.clone());
        Ok(())
    }

    fn bus_count(&self) -> usize {
        self.bus_count
    }
}

/// Shared recorder for frames the engine transmits.
#[derive(Clone)]
pub struct FrameRecorder {
    frames: Arc<Mutex<Vec<CanFrame>>>,
    bus_count: usize,
}

impl FrameRecorder {
    pub fn new() -> Self {
        Self::with_bus_count(1)
    }

    pub fn with_bus_count(bus_count: usize) -> Self {
        Self {
            frames: Arc::new(Mutex::new(Vec::new())),
            bus_count,
        }
    }

    pub fn frames(&self) -> Vec<CanFrame> {
        self.frames.lock().unwrap().clone()
    }

    /// Remove and return everything recorded so far.
    pub fn take(&self) -> Vec<CanFrame> {
        std::mem::take(&mut *self.frames.lock().unwrap())
    }
}

impl Default for FrameRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSink for FrameRecorder {
    fn send_frame(&mut self, frame: CanFrame) {
        self.frames.lock().unwrap().push(frame);
    }

    fn bus_count(&self) -> usize {
        self.bus_count
    }
}

/// Shared recorder for engine events.
#[derive(Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<IsoTpEvent>>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<IsoTpEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Only the reassembled messages, in emission order.
    pub fn messages(&self) -> Vec<IsoTpMessage> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                IsoTpEvent::Message(msg) => Some(msg.clone()),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for EventRecorder {
    fn emit(&mut self, event: IsoTpEvent) {
        self.events.lock().unwrap().push(event);
    }
}
