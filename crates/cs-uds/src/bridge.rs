//! Async glue from the ISO-TP service's message stream to UDS messages.

use tokio::sync::broadcast;

use cs_protocol::{IsoTpMessage, UdsMessage};

use crate::handler::UdsHandler;

const UDS_BUFFER: usize = 1024;

/// Spawn a task decoding every transport message from `messages`. The task
/// ends when the transport side closes.
pub fn bridge(handler: UdsHandler, mut messages: broadcast::Receiver<IsoTpMessage>) -> broadcast::Receiver<UdsMessage> {
    let (tx, rx) = broadcast::channel(UDS_BUFFER);

    tokio::spawn(async move {
        loop {
            match messages.recv().await {
                Ok(message) => {
                    if let Some(uds) = handler.on_transport_message(&message) {
                        let _ = tx.send(uds);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "UDS bridge lagged behind transport messages");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        tracing::debug!("UDS bridge stopped");
    });

    rx
}
