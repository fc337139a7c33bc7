//! Channel-backed forwarding sink.
//!
//! Workers never wait on the message bus: [`ChannelSink::send`] uses
//! `try_send`, so a full or closed queue surfaces as a [`SinkError`] and the
//! flow is dropped. The daemon drains the receiving side into the producer.

use std::net::IpAddr;

use bytes::Bytes;
use ironflow_core::error::SinkError;
use ironflow_core::pipeline::FlowSink;
use ironflow_core::types::{EnrichedFlow, FlowRecord};
use tokio::sync::mpsc;

/// Encode an enriched flow for `topic`, keyed by the exporter address.
pub fn encode_flow(topic: &str, flow: &EnrichedFlow) -> Result<FlowRecord, SinkError> {
    let payload = serde_json::to_vec(flow).map_err(|e| SinkError::Encode(e.to_string()))?;
    let key = match flow.flow.exporter_address.to_canonical() {
        IpAddr::V4(v4) => Bytes::copy_from_slice(&v4.octets()),
        IpAddr::V6(v6) => Bytes::copy_from_slice(&v6.octets()),
    };
    Ok(FlowRecord {
        topic: topic.to_owned(),
        key,
        payload: Bytes::from(payload),
    })
}

#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<FlowRecord>,
}

impl ChannelSink {
    /// Create a sink and the receiver the producer side drains.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<FlowRecord>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    pub fn from_sender(tx: mpsc::Sender<FlowRecord>) -> Self {
        Self { tx }
    }
}

impl FlowSink for ChannelSink {
    fn send(&self, record: FlowRecord) -> Result<(), SinkError> {
        self.tx.try_send(record).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SinkError::Full,
            mpsc::error::TrySendError::Closed(_) => SinkError::Closed,
        })
    }
}
