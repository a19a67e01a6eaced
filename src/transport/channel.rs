//! In-process transport backed by tokio channels
//!
//! The far end is a [`ChannelPeer`] that reads requests and writes responses.
//! The transport counts requests that have not yet been answered so callers
//! can check that a client never pipelines requests.

use super::types::{Transport, TransportReceiver, TransportSender};
use crate::error::{Error, Result};
use crate::types::JsonValue;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Default)]
struct Counters {
    outstanding: AtomicUsize,
    max_outstanding: AtomicUsize,
    sent: AtomicUsize,
    closes: AtomicUsize,
}

/// Transport connected to a [`ChannelPeer`]
pub struct ChannelTransport {
    requests: mpsc::UnboundedSender<JsonValue>,
    responses: mpsc::UnboundedReceiver<Result<JsonValue>>,
    counters: Arc<Counters>,
}

impl ChannelTransport {
    /// Create a connected transport and peer
    pub fn pair() -> (Self, ChannelPeer) {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (response_tx, response_rx) = mpsc::unbounded_channel();
        let counters = Arc::new(Counters::default());
        (
            Self {
                requests: request_tx,
                responses: response_rx,
                counters: Arc::clone(&counters),
            },
            ChannelPeer {
                requests: request_rx,
                responses: Some(response_tx),
                counters,
            },
        )
    }
}

impl Transport for ChannelTransport {
    type Sender = ChannelSender;
    type Receiver = ChannelReceiver;

    fn split(self) -> (Self::Sender, Self::Receiver) {
        (
            ChannelSender {
                requests: Some(self.requests),
                counters: Arc::clone(&self.counters),
            },
            ChannelReceiver {
                responses: self.responses,
                counters: self.counters,
            },
        )
    }
}

/// Outbound half of a [`ChannelTransport`]
pub struct ChannelSender {
    requests: Option<mpsc::UnboundedSender<JsonValue>>,
    counters: Arc<Counters>,
}

#[async_trait]
impl TransportSender for ChannelSender {
    async fn send(&mut self, message: JsonValue) -> Result<()> {
        let Some(requests) = &self.requests else {
            return Err(Error::TransportClosed);
        };
        let outstanding = self.counters.outstanding.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters
            .max_outstanding
            .fetch_max(outstanding, Ordering::SeqCst);
        self.counters.sent.fetch_add(1, Ordering::SeqCst);
        requests
            .send(message)
            .map_err(|_| Error::transport("peer dropped"))
    }

    async fn close(&mut self) -> Result<()> {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        self.requests = None;
        Ok(())
    }
}

/// Inbound half of a [`ChannelTransport`]
pub struct ChannelReceiver {
    responses: mpsc::UnboundedReceiver<Result<JsonValue>>,
    counters: Arc<Counters>,
}

#[async_trait]
impl TransportReceiver for ChannelReceiver {
    async fn recv(&mut self) -> Option<Result<JsonValue>> {
        let message = self.responses.recv().await?;
        // saturating: the peer may push unsolicited messages
        let _ = self
            .counters
            .outstanding
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        Some(message)
    }
}

/// Far end of a [`ChannelTransport`]
pub struct ChannelPeer {
    requests: mpsc::UnboundedReceiver<JsonValue>,
    responses: Option<mpsc::UnboundedSender<Result<JsonValue>>>,
    counters: Arc<Counters>,
}

impl ChannelPeer {
    /// Next request, `None` once the transport is closed
    pub async fn next_request(&mut self) -> Option<JsonValue> {
        self.requests.recv().await
    }

    /// Push a response
    pub fn respond(&self, message: JsonValue) -> Result<()> {
        self.push(Ok(message))
    }

    /// Push a stream error
    pub fn fail(&self, error: Error) -> Result<()> {
        self.push(Err(error))
    }

    /// End the inbound stream
    pub fn hang_up(&mut self) {
        self.responses = None;
    }

    /// Highest number of unanswered requests seen at once
    pub fn max_in_flight(&self) -> usize {
        self.counters.max_outstanding.load(Ordering::SeqCst)
    }

    /// Requests sent so far
    pub fn requests_sent(&self) -> usize {
        self.counters.sent.load(Ordering::SeqCst)
    }

    /// Times the transport was closed
    pub fn close_count(&self) -> usize {
        self.counters.closes.load(Ordering::SeqCst)
    }

    fn push(&self, message: Result<JsonValue>) -> Result<()> {
        self.responses
            .as_ref()
            .ok_or(Error::TransportClosed)?
            .send(message)
            .map_err(|_| Error::transport("transport dropped"))
    }
}
