//! Log-forwarding agent sink
//!
//! Speaks the JSON mode of the forward protocol: each event is the array
//! `[tag, unix_time, record]` written to a TCP connection. The connection is
//! opened lazily and re-opened after a write failure.

use super::types::{ForwardConfig, Sink};
use crate::error::{Error, Result};
use crate::types::{PageKey, Record};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Sink forwarding `(tag, timestamp, record)` events to an agent
pub struct ForwardSink {
    config: ForwardConfig,
    tag: String,
    stream: Mutex<Option<TcpStream>>,
}

impl ForwardSink {
    /// Create a sink for the given agent; no connection is made yet
    pub fn new(config: ForwardConfig) -> Self {
        let tag = config.full_tag();
        Self {
            config,
            tag,
            stream: Mutex::new(None),
        }
    }

    /// Full tag attached to every event
    pub fn tag(&self) -> &str {
        &self.tag
    }

    async fn connect(&self) -> Result<TcpStream> {
        let address = self.config.address();
        let timeout = Duration::from_millis(self.config.connect_timeout_ms);
        debug!(%address, "connecting to forwarding agent");
        match tokio::time::timeout(timeout, TcpStream::connect(&address)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(Error::sink("forward", format!("connect {address}: {e}"))),
            Err(_) => Err(Error::Timeout {
                timeout_ms: self.config.connect_timeout_ms,
            }),
        }
    }

    fn encode(&self, record: &Record) -> Result<Vec<u8>> {
        let event = serde_json::json!([self.tag, chrono::Utc::now().timestamp(), record]);
        let mut bytes = serde_json::to_vec(&event)?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

#[async_trait]
impl Sink for ForwardSink {
    fn name(&self) -> &str {
        "forward"
    }

    async fn deliver(&self, record: &Record) -> Result<()> {
        let bytes = self.encode(record)?;
        let mut guard = self.stream.lock().await;
        if guard.is_none() {
            *guard = Some(self.connect().await?);
        }
        let Some(stream) = guard.as_mut() else {
            return Err(Error::sink("forward", "no connection"));
        };

        if let Err(e) = stream.write_all(&bytes).await {
            // reconnect on the next record
            *guard = None;
            return Err(Error::sink("forward", format!("write failed: {e}")));
        }
        Ok(())
    }

    async fn done(&self, page_key: PageKey) {
        let mut guard = self.stream.lock().await;
        if let Some(mut stream) = guard.take() {
            if let Err(e) = stream.shutdown().await {
                debug!(error = %e, "forwarding connection shutdown failed");
            }
        }
        info!(tag = %self.tag, %page_key, "forwarding sink finished");
    }
}
