//! Transport traits and inbound message types

use crate::error::Result;
use crate::types::{JsonValue, Record};
use async_trait::async_trait;

/// Outbound half of a connection
#[async_trait]
pub trait TransportSender: Send {
    /// Send one JSON request
    async fn send(&mut self, message: JsonValue) -> Result<()>;

    /// Close the connection; further sends fail
    async fn close(&mut self) -> Result<()>;
}

/// Inbound half of a connection, yielding responses in order
#[async_trait]
pub trait TransportReceiver: Send {
    /// Next inbound message, `None` once the stream has ended
    async fn recv(&mut self) -> Option<Result<JsonValue>>;
}

/// A bidirectional message connection that can be split into halves
pub trait Transport: Send {
    /// Outbound half
    type Sender: TransportSender;
    /// Inbound half
    type Receiver: TransportReceiver;

    /// Split into independently usable halves
    fn split(self) -> (Self::Sender, Self::Receiver);
}

/// One page of results
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Page key the page belongs to
    pub page_key: u64,
    /// Cursor for the next page, `None` when the sequence is exhausted
    pub cursor: Option<JsonValue>,
    /// Records on this page
    pub items: Vec<Record>,
    /// Items dropped because they were not objects
    pub skipped: usize,
}

impl Page {
    /// Whether this is the last page of its sequence
    pub fn is_last(&self) -> bool {
        self.cursor.is_none()
    }
}

/// Classification of one inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// The source reported a non-success status
    Failure {
        /// Reported status, or `missing`
        status: String,
        /// Error text reported alongside the status
        error: Option<String>,
    },
    /// Echo of a resolve request carrying the resolved page key
    Ack {
        /// Resolved page key
        page_key: u64,
    },
    /// A page of results
    Page(Page),
    /// A success message missing required fields
    Malformed(String),
}
