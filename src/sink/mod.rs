//! Sink module
//!
//! Destinations for transformed records: stdout, a log-forwarding agent, and
//! an ordered fan-out over several sinks. Sinks absorb their own failures so
//! that one bad destination never stalls a run.

mod console;
mod fanout;
mod forward;
mod types;

pub use console::ConsoleSink;
pub use fanout::{FanOutSink, MemorySink};
pub use forward::ForwardSink;
pub use types::{
    ForwardConfig, Sink, SinkConfig, DEFAULT_FORWARD_HOST, DEFAULT_FORWARD_PORT,
    DEFAULT_FORWARD_TAG,
};

use crate::error::{Error, Result};

/// Build the sink described by a config section
///
/// A single destination is returned as-is; several are wrapped in a
/// [`FanOutSink`] with the console first.
pub fn build_sink(config: &SinkConfig) -> Result<Box<dyn Sink>> {
    let mut sinks: Vec<Box<dyn Sink>> = Vec::new();
    if config.console {
        sinks.push(Box::new(ConsoleSink::stdout().with_pretty(config.pretty)));
    }
    if let Some(forward) = &config.forward {
        sinks.push(Box::new(ForwardSink::new(forward.clone())));
    }

    match sinks.len() {
        0 => Err(Error::config("at least one sink must be enabled")),
        1 => Ok(sinks.remove(0)),
        _ => {
            let mut fan_out = FanOutSink::new();
            for sink in sinks {
                fan_out.push(sink);
            }
            Ok(Box::new(fan_out))
        }
    }
}

#[cfg(test)]
mod tests;
