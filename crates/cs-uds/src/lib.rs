//! UDS (ISO 14229) diagnostic layer.
//!
//! Decodes reassembled ISO-TP messages into service / sub-function / data,
//! renders them for humans, and encodes outbound requests.

pub mod bridge;
pub mod config;
pub mod error;
pub mod handler;
pub mod request;
pub mod tables;

pub use bridge::bridge;
pub use config::{UdsConfig, UdsFilterMode};
pub use error::{UdsError, UdsResult};
pub use handler::{UdsHandler, decode, describe};
pub use request::{UdsRequest, send_request};
pub use tables::{CodeEntry, NEGATIVE_RESPONSES, SERVICES};
