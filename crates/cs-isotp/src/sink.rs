//! Outbound seams of the engine: where frames and events go.

use tokio::sync::mpsc;

use cs_protocol::CanFrame;

use crate::types::IsoTpEvent;

/// Receives every CAN frame the engine wants transmitted, and answers the
/// "how many buses exist" query used to validate bus indices.
pub trait FrameSink: Send {
    fn send_frame(&mut self, frame: CanFrame);

    fn bus_count(&self) -> usize {
        1
    }
}

/// Receives reassembled messages and transfer outcomes.
pub trait EventSink: Send {
    fn emit(&mut self, event: IsoTpEvent);
}

impl EventSink for mpsc::UnboundedSender<IsoTpEvent> {
    fn emit(&mut self, event: IsoTpEvent) {
        if self.send(event).is_err() {
            tracing::trace!("event receiver dropped, discarding ISO-TP event");
        }
    }
}
