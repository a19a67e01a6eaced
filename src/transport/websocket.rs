//! WebSocket transport

use super::types::{Transport, TransportReceiver, TransportSender};
use crate::error::{Error, Result};
use crate::types::JsonValue;
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// JSON-over-WebSocket connection to a ledger node
pub struct WebSocketTransport {
    stream: WsStream,
}

impl WebSocketTransport {
    /// Connect to `url` (`ws://` or `wss://`)
    pub async fn connect(url: &str) -> Result<Self> {
        let parsed = Url::parse(url)?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(Error::invalid_value(
                "source.url",
                format!("expected ws:// or wss://, got {}", parsed.scheme()),
            ));
        }

        let (stream, _) = connect_async(parsed.as_str()).await?;
        info!(url = %parsed, "websocket connected");
        Ok(Self { stream })
    }
}

impl Transport for WebSocketTransport {
    type Sender = WebSocketSender;
    type Receiver = WebSocketReceiver;

    fn split(self) -> (Self::Sender, Self::Receiver) {
        let (sink, stream) = self.stream.split();
        (
            WebSocketSender {
                sink,
                closed: false,
            },
            WebSocketReceiver { stream },
        )
    }
}

/// Outbound half of a [`WebSocketTransport`]
pub struct WebSocketSender {
    sink: SplitSink<WsStream, Message>,
    closed: bool,
}

#[async_trait]
impl TransportSender for WebSocketSender {
    async fn send(&mut self, message: JsonValue) -> Result<()> {
        if self.closed {
            return Err(Error::TransportClosed);
        }
        let text = serde_json::to_string(&message)?;
        self.sink.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        debug!("closing websocket");
        self.sink.close().await?;
        Ok(())
    }
}

/// Inbound half of a [`WebSocketTransport`]
pub struct WebSocketReceiver {
    stream: SplitStream<WsStream>,
}

#[async_trait]
impl TransportReceiver for WebSocketReceiver {
    async fn recv(&mut self) -> Option<Result<JsonValue>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(e.into())),
            };
            match message {
                Message::Text(text) => {
                    return Some(
                        serde_json::from_str(&text).map_err(|e| Error::malformed(e.to_string())),
                    );
                }
                Message::Binary(bytes) => {
                    return Some(
                        serde_json::from_slice(&bytes).map_err(|e| Error::malformed(e.to_string())),
                    );
                }
                Message::Close(frame) => {
                    debug!(?frame, "websocket closed by peer");
                    return None;
                }
                // pings are answered by tungstenite on the next write
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }
}
