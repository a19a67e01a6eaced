//! Transport module
//!
//! Message connections to a paged data source and the codec that builds
//! page requests and classifies responses.
//!
//! # Overview
//!
//! - [`Transport`] splits into a sender and a receiver so requests and
//!   responses can be driven by separate duties
//! - [`WebSocketTransport`] speaks JSON over a WebSocket
//! - [`ChannelTransport`] is an in-process connection for tests and embedding
//! - [`PageLayout`] encodes requests and classifies inbound messages

mod channel;
mod layout;
mod types;
mod websocket;

pub use channel::{ChannelPeer, ChannelReceiver, ChannelSender, ChannelTransport};
pub use layout::{LayoutConfig, LayoutPreset, PageLayout};
pub use types::{Inbound, Page, Transport, TransportReceiver, TransportSender};
pub use websocket::{WebSocketReceiver, WebSocketSender, WebSocketTransport};

#[cfg(test)]
mod tests;
