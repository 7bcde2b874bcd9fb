//! Shared test harness for E2E integration tests.
//!
//! Connects a tester and an ECU `IsoTpService` through a loopback bus so
//! every frame one side transmits is ingested by the other, exercising the
//! real engine, service and UDS code on both ends.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use cs_isotp::{CanInterface, FlowControlRole, IdPair, IsoTpConfig, IsoTpHandle, IsoTpResult, IsoTpService};
use cs_protocol::{CanFrame, UdsMessage, compose_extended_id};
use cs_uds::{UdsRequest, decode};

pub const TESTER_ID: u64 = 0x7E0;
pub const ECU_ID: u64 = 0x7E8;
pub const VIN: &[u8] = b"WVW1234567801234X";

/// Which side put a frame on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Tester,
    Ecu,
}

/// Every frame seen on the loopback bus, in transmission order.
pub type WireLog = Arc<Mutex<Vec<(Side, CanFrame)>>>;

/// Hands transmitted frames to a forwarder task feeding the peer.
struct LoopbackInterface {
    side: Side,
    peer: mpsc::UnboundedSender<CanFrame>,
    wire: WireLog,
}

#[async_trait]
impl CanInterface for LoopbackInterface {
    async fn send_frame(&self, frame: &CanFrame) -> IsoTpResult<()> {
        self.wire.lock().unwrap().push((self.side, frame.clone()));
        let _ = self.peer.send(CanFrame {
            received: true,
            ..frame.clone()
        });
        Ok(())
    }
}

fn forward(mut frames: mpsc::UnboundedReceiver<CanFrame>, target: IsoTpHandle) {
    tokio::spawn(async move {
        while let Some(frame) = frames.recv().await {
            if target.ingest(vec![frame]).await.is_err() {
                break;
            }
        }
    });
}

/// Tester and ECU wired back to back.
pub struct TestHarness {
    pub tester: IsoTpHandle,
    pub ecu: IsoTpHandle,
    pub wire: WireLog,
}

impl TestHarness {
    /// Both sides answer First Frames and know the 0x7E0/0x7E8 pairing.
    pub async fn new() -> Self {
        let config = IsoTpConfig {
            flow_control: FlowControlRole::Respond,
            ..IsoTpConfig::default()
        };
        Self::with_configs(config.clone(), config).await
    }

    pub async fn with_configs(tester_config: IsoTpConfig, ecu_config: IsoTpConfig) -> Self {
        let wire: WireLog = Arc::new(Mutex::new(Vec::new()));
        let (to_ecu, ecu_inbox) = mpsc::unbounded_channel();
        let (to_tester, tester_inbox) = mpsc::unbounded_channel();

        let tester = IsoTpService::spawn(
            tester_config,
            Arc::new(LoopbackInterface {
                side: Side::Tester,
                peer: to_ecu,
                wire: wire.clone(),
            }),
        );
        let ecu = IsoTpService::spawn(
            ecu_config,
            Arc::new(LoopbackInterface {
                side: Side::Ecu,
                peer: to_tester,
                wire: wire.clone(),
            }),
        );
        forward(ecu_inbox, ecu.clone());
        forward(tester_inbox, tester.clone());

        tester
            .register_pair(IdPair {
                bus: 0,
                request_id: TESTER_ID,
                response_id: ECU_ID,
            })
            .await
            .unwrap();
        ecu.register_pair(IdPair {
            bus: 0,
            request_id: ECU_ID,
            response_id: TESTER_ID,
        })
        .await
        .unwrap();

        Self { tester, ecu, wire }
    }

    /// Same wiring with extended addressing: both sides stamp
    /// `target_address` on their frames and pair on the composite ids.
    pub async fn extended(target_address: u8) -> Self {
        let config = IsoTpConfig {
            addressing: cs_isotp::Addressing::Extended,
            target_address: Some(target_address),
            flow_control: FlowControlRole::Respond,
            ..IsoTpConfig::default()
        };
        let harness = Self::with_configs(config.clone(), config).await;
        let tester_id = compose_extended_id(TESTER_ID as u32, target_address);
        let ecu_id = compose_extended_id(ECU_ID as u32, target_address);
        harness
            .tester
            .register_pair(IdPair {
                bus: 0,
                request_id: tester_id,
                response_id: ecu_id,
            })
            .await
            .unwrap();
        harness
            .ecu
            .register_pair(IdPair {
                bus: 0,
                request_id: ecu_id,
                response_id: tester_id,
            })
            .await
            .unwrap();
        harness
    }

    pub fn wire(&self) -> Vec<(Side, CanFrame)> {
        self.wire.lock().unwrap().clone()
    }

    pub fn frames_from(&self, side: Side) -> Vec<CanFrame> {
        self.wire()
            .into_iter()
            .filter(|(s, _)| *s == side)
            .map(|(_, f)| f)
            .collect()
    }

    /// Run a minimal ECU answering ReadDataByIdentifier 0xF190 with `VIN`
    /// and everything else with a negative response.
    pub fn spawn_ecu_responder(&self) {
        let ecu = self.ecu.clone();
        let mut requests = ecu.subscribe();
        tokio::spawn(async move {
            while let Ok(message) = requests.recv().await {
                if message.id != TESTER_ID {
                    continue;
                }
                let Ok(request) = decode(&message) else {
                    continue;
                };
                let response = respond(&request);
                if ecu.send_message(0, ECU_ID, &response).await.is_err() {
                    break;
                }
            }
        });
    }
}

fn respond(request: &UdsMessage) -> Vec<u8> {
    match (request.service, request.data.as_slice()) {
        (0x22, [0xF1, 0x90]) => {
            let mut response = vec![0x62, 0xF1, 0x90];
            response.extend_from_slice(VIN);
            response
        }
        (0x3E, _) => vec![0x7E, 0x00],
        (service, _) => vec![0x7F, service, 0x31],
    }
}

pub fn read_vin_request() -> UdsRequest {
    UdsRequest::new(0x22).with_sub_function(0xF190, 2)
}

/// Let every task run until the virtual clock has moved by `ms`.
pub async fn settle(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

/// Render captured frames the way `candump -l` writes them.
pub fn to_candump(frames: &[CanFrame], interface: &str) -> Vec<String> {
    frames
        .iter()
        .map(|f| {
            let id = if f.extended {
                format!("{:08X}", f.id)
            } else {
                format!("{:03X}", f.id)
            };
            let data: String = f.data.iter().map(|b| format!("{b:02X}")).collect();
            format!(
                "({}.{:06}) {interface} {id}#{data}",
                f.timestamp_us / 1_000_000,
                f.timestamp_us % 1_000_000
            )
        })
        .collect()
}
