//! Outbound diagnostic requests.

use cs_isotp::IsoTpHandle;

use crate::error::{UdsError, UdsResult};
use crate::tables;

/// A request to encode as `service [sub-function bytes] data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdsRequest {
    pub service: u8,
    pub sub_function: Option<u32>,
    /// Bytes the sub-function occupies on the wire, big-endian. Usually 1;
    /// 2 for a DID.
    pub sub_function_len: usize,
    pub data: Vec<u8>,
}

impl UdsRequest {
    pub fn new(service: u8) -> Self {
        Self {
            service,
            sub_function: None,
            sub_function_len: 1,
            data: Vec::new(),
        }
    }

    pub fn with_sub_function(mut self, sub_function: u32, len: usize) -> Self {
        self.sub_function = Some(sub_function);
        self.sub_function_len = len;
        self
    }

    pub fn with_data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.data = data.into();
        self
    }

    pub fn to_bytes(&self) -> UdsResult<Vec<u8>> {
        let mut bytes = vec![self.service];
        if let Some(sub_function) = self.sub_function {
            if self.sub_function_len > 4 {
                return Err(UdsError::SubFunctionTooLong {
                    len: self.sub_function_len,
                });
            }
            let be = sub_function.to_be_bytes();
            bytes.extend_from_slice(&be[4 - self.sub_function_len..]);
        }
        bytes.extend_from_slice(&self.data);
        Ok(bytes)
    }
}

/// Encode `request` and send it through the ISO-TP service, waiting for
/// the transfer to finish.
pub async fn send_request(handle: &IsoTpHandle, bus: u8, id: u64, request: &UdsRequest) -> UdsResult<()> {
    let bytes = request.to_bytes()?;
    handle.send_message(bus, id, &bytes).await?;
    tracing::debug!(
        bus,
        id = format!("0x{id:X}"),
        service = tables::service_name(request.service).unwrap_or("UNKNOWN"),
        "UDS request sent"
    );
    Ok(())
}
