//! Async front end for the engine.
//!
//! `IsoTpService::spawn` moves an `IsoTpEngine` into a background task that
//! owns it exclusively. Everything else talks to that task through a cloneable
//! `IsoTpHandle`: frames in, payloads out, configuration changes, and a
//! broadcast subscription for reassembled messages. The task also drives the
//! engine's timers, so paced Consecutive Frames and timeouts need no caller
//! involvement.

use std::collections::HashMap;
use std::future;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{self, Instant};

use cs_protocol::{CanFrame, IsoTpMessage};

use crate::config::{Addressing, FilterMode, FlowControlRole, IsoTpConfig};
use crate::engine::IsoTpEngine;
use crate::error::{IsoTpError, IsoTpResult};
use crate::filter::{IdMaskFilter, IdPair};
use crate::interface::CanInterface;
use crate::sink::FrameSink;
use crate::types::{IsoTpEvent, TransferId};

/// Commands queued between handles and the engine task.
const COMMAND_QUEUE: usize = 256;

/// Reassembled messages buffered per subscriber before it starts lagging.
const MESSAGE_BUFFER: usize = 1024;

enum Command {
    Ingest(Vec<CanFrame>),
    Send {
        bus: u8,
        id: u64,
        payload: Vec<u8>,
        reply: oneshot::Sender<IsoTpResult<()>>,
    },
    SetAddressing(Addressing),
    SetTargetAddress(Option<u8>),
    SetFlowControlRole(FlowControlRole),
    SetReception(bool),
    SetFilterMode(FilterMode),
    SetHonorFlowControl(bool),
    AddFilter(IdMaskFilter),
    RemoveFilter(IdMaskFilter),
    ClearFilters,
    RegisterPair(IdPair),
    UnregisterPair(IdPair),
    Shutdown,
}

/// Forwards engine output to the writer task, in order.
struct ChannelFrameSink {
    frames: mpsc::UnboundedSender<CanFrame>,
    bus_count: usize,
}

impl FrameSink for ChannelFrameSink {
    fn send_frame(&mut self, frame: CanFrame) {
        if self.frames.send(frame).is_err() {
            tracing::warn!("CAN writer stopped, dropping outbound frame");
        }
    }

    fn bus_count(&self) -> usize {
        self.bus_count
    }
}

pub struct IsoTpService;

impl IsoTpService {
    /// Start the engine and writer tasks on the current tokio runtime.
    pub fn spawn(config: IsoTpConfig, interface: Arc<dyn CanInterface>) -> IsoTpHandle {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE);
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (message_tx, _) = broadcast::channel(MESSAGE_BUFFER);

        let sink = ChannelFrameSink {
            frames: frame_tx,
            bus_count: interface.bus_count(),
        };
        let engine = IsoTpEngine::new(config, sink, event_tx);

        tokio::spawn(write_frames(interface, frame_rx));
        tokio::spawn(run(engine, command_rx, event_rx, message_tx.clone()));

        IsoTpHandle {
            commands: command_tx,
            messages: message_tx,
        }
    }
}

/// Cloneable access to a running `IsoTpService`.
#[derive(Clone)]
pub struct IsoTpHandle {
    commands: mpsc::Sender<Command>,
    messages: broadcast::Sender<IsoTpMessage>,
}

impl IsoTpHandle {
    /// Receive every message reassembled from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<IsoTpMessage> {
        self.messages.subscribe()
    }

    pub async fn ingest(&self, frames: Vec<CanFrame>) -> IsoTpResult<()> {
        self.command(Command::Ingest(frames)).await
    }

    /// Send a payload and wait until the last frame is handed to the interface,
    /// or the transfer fails.
    pub async fn send_message(&self, bus: u8, id: u64, payload: &[u8]) -> IsoTpResult<()> {
        let (reply, outcome) = oneshot::channel();
        self.command(Command::Send {
            bus,
            id,
            payload: payload.to_vec(),
            reply,
        })
        .await?;
        outcome.await.map_err(|_| IsoTpError::Closed)?
    }

    pub async fn set_addressing(&self, addressing: Addressing) -> IsoTpResult<()> {
        self.command(Command::SetAddressing(addressing)).await
    }

    pub async fn set_target_address(&self, target_address: Option<u8>) -> IsoTpResult<()> {
        self.command(Command::SetTargetAddress(target_address)).await
    }

    pub async fn set_flow_control_role(&self, role: FlowControlRole) -> IsoTpResult<()> {
        self.command(Command::SetFlowControlRole(role)).await
    }

    pub async fn set_reception(&self, enabled: bool) -> IsoTpResult<()> {
        self.command(Command::SetReception(enabled)).await
    }

    pub async fn set_filter_mode(&self, mode: FilterMode) -> IsoTpResult<()> {
        self.command(Command::SetFilterMode(mode)).await
    }

    pub async fn set_honor_flow_control(&self, honor: bool) -> IsoTpResult<()> {
        self.command(Command::SetHonorFlowControl(honor)).await
    }

    pub async fn add_filter(&self, filter: IdMaskFilter) -> IsoTpResult<()> {
        self.command(Command::AddFilter(filter)).await
    }

    pub async fn remove_filter(&self, filter: IdMaskFilter) -> IsoTpResult<()> {
        self.command(Command::RemoveFilter(filter)).await
    }

    pub async fn clear_filters(&self) -> IsoTpResult<()> {
        self.command(Command::ClearFilters).await
    }

    pub async fn register_pair(&self, pair: IdPair) -> IsoTpResult<()> {
        self.command(Command::RegisterPair(pair)).await
    }

    pub async fn unregister_pair(&self, pair: IdPair) -> IsoTpResult<()> {
        self.command(Command::UnregisterPair(pair)).await
    }

    /// Stop the engine task. Pending sends resolve with `Closed`.
    pub async fn shutdown(&self) -> IsoTpResult<()> {
        self.command(Command::Shutdown).await
    }

    async fn command(&self, command: Command) -> IsoTpResult<()> {
        self.commands.send(command).await.map_err(|_| IsoTpError::Closed)
    }
}

async fn write_frames(interface: Arc<dyn CanInterface>, mut frames: mpsc::UnboundedReceiver<CanFrame>) {
    while let Some(frame) = frames.recv().await {
        if let Err(e) = interface.send_frame(&frame).await {
            tracing::warn!(error = %e, bus = frame.bus, id = format!("0x{:X}", frame.id), "failed to send CAN frame");
        }
    }
}

async fn run(
    mut engine: IsoTpEngine,
    mut commands: mpsc::Receiver<Command>,
    mut events: mpsc::UnboundedReceiver<IsoTpEvent>,
    messages: broadcast::Sender<IsoTpMessage>,
) {
    let mut pending: HashMap<TransferId, oneshot::Sender<IsoTpResult<()>>> = HashMap::new();
    tracing::debug!("ISO-TP service started");

    loop {
        let deadline = engine.next_deadline();

        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else { break };
                let now = Instant::now().into_std();
                match command {
                    Command::Shutdown => break,
                    Command::Ingest(frames) => engine.ingest_at(&frames, now),
                    Command::Send { bus, id, payload, reply } => {
                        match engine.send_message_at(bus, id, &payload, now) {
                            Ok(transfer) => {
                                pending.insert(transfer, reply);
                            }
                            Err(e) => {
                                let _ = reply.send(Err(e));
                            }
                        }
                    }
                    Command::SetAddressing(addressing) => engine.set_addressing(addressing),
                    Command::SetTargetAddress(ta) => engine.set_target_address(ta),
                    Command::SetFlowControlRole(role) => engine.set_flow_control_role(role),
                    Command::SetReception(enabled) => engine.set_reception(enabled),
                    Command::SetFilterMode(mode) => engine.set_filter_mode(mode),
                    Command::SetHonorFlowControl(honor) => engine.set_honor_flow_control(honor),
                    Command::AddFilter(filter) => engine.add_filter(filter),
                    Command::RemoveFilter(filter) => {
                        engine.remove_filter(&filter);
                    }
                    Command::ClearFilters => engine.clear_filters(),
                    Command::RegisterPair(pair) => engine.register_pair(pair),
                    Command::UnregisterPair(pair) => {
                        engine.unregister_pair(&pair);
                    }
                }
            }
            () = sleep_until(deadline) => {
                engine.poll_at(Instant::now().into_std());
            }
        }

        while let Ok(event) = events.try_recv() {
            dispatch(event, &messages, &mut pending);
        }
    }

    for (_, reply) in pending.drain() {
        let _ = reply.send(Err(IsoTpError::Closed));
    }
    tracing::debug!("ISO-TP service stopped");
}

fn dispatch(
    event: IsoTpEvent,
    messages: &broadcast::Sender<IsoTpMessage>,
    pending: &mut HashMap<TransferId, oneshot::Sender<IsoTpResult<()>>>,
) {
    match event {
        IsoTpEvent::Message(message) => {
            // No subscribers is not an error.
            let _ = messages.send(message);
        }
        IsoTpEvent::TransferComplete { transfer, .. } => {
            if let Some(reply) = pending.remove(&transfer) {
                let _ = reply.send(Ok(()));
            }
        }
        IsoTpEvent::TransferFailed { transfer, error, .. } => {
            if let Some(reply) = pending.remove(&transfer) {
                let _ = reply.send(Err(error));
            }
        }
    }
}

async fn sleep_until(deadline: Option<std::time::Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(Instant::from_std(deadline)).await,
        None => future::pending().await,
    }
}
