//! CAN connection abstraction used by the async service.
//!
//! The hardware side (SocketCAN, serial adapters, log playback) lives outside
//! this crate. It only has to accept frames for transmission and report how
//! many buses it drives. `MockCanInterface` (in `mock.rs`) records frames.

use async_trait::async_trait;

use cs_protocol::CanFrame;

use crate::error::IsoTpResult;

/// Outbound half of a CAN connection.
#[async_trait]
pub trait CanInterface: Send + Sync {
    /// Transmit one frame on `frame.bus`.
    async fn send_frame(&self, frame: &CanFrame) -> IsoTpResult<()>;

    /// Number of buses this connection drives.
    fn bus_count(&self) -> usize {
        1
    }
}
