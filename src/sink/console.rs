//! Console sink

use super::types::Sink;
use crate::error::{Error, Result};
use crate::types::Record;
use async_trait::async_trait;
use std::io::{Stdout, Write};
use std::sync::Mutex;

/// Writes one JSON document per record to a writer, stdout by default
pub struct ConsoleSink<W = Stdout> {
    writer: Mutex<W>,
    pretty: bool,
}

impl ConsoleSink<Stdout> {
    /// Sink printing to stdout
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    /// Sink writing to `writer`
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
            pretty: false,
        }
    }

    /// Enable pretty printing
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Recover the writer
    pub fn into_inner(self) -> W {
        match self.writer.into_inner() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl<W: Write + Send> Sink for ConsoleSink<W> {
    fn name(&self) -> &str {
        "console"
    }

    async fn deliver(&self, record: &Record) -> Result<()> {
        let line = if self.pretty {
            serde_json::to_string_pretty(record)?
        } else {
            serde_json::to_string(record)?
        };
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| Error::sink("console", "writer lock poisoned"))?;
        writeln!(writer, "{line}")?;
        writer.flush()?;
        Ok(())
    }
}
