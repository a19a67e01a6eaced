//! Entry processor trait and composition

use crate::types::{PageKey, Record};
use async_trait::async_trait;

/// A stage that consumes raw records
///
/// Processors never fail: stages that can fail log and carry on, so one
/// branch of a pipeline cannot block another.
#[async_trait]
pub trait EntryProcessor: Send {
    /// Handle one record
    async fn process(&mut self, record: &Record);

    /// Called once when the run completes at `page_key`
    async fn done(&mut self, page_key: PageKey);
}

#[async_trait]
impl<P: EntryProcessor + ?Sized> EntryProcessor for Box<P> {
    async fn process(&mut self, record: &Record) {
        (**self).process(record).await;
    }

    async fn done(&mut self, page_key: PageKey) {
        (**self).done(page_key).await;
    }
}

/// Runs every child processor, in order, on each record
#[derive(Default)]
pub struct AggregateProcessor {
    processors: Vec<Box<dyn EntryProcessor>>,
}

impl AggregateProcessor {
    /// Create an empty aggregate
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a child
    pub fn with_processor(mut self, processor: impl EntryProcessor + 'static) -> Self {
        self.processors.push(Box::new(processor));
        self
    }

    /// Number of children
    pub fn len(&self) -> usize {
        self.processors.len()
    }

    /// Whether there are no children
    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}

#[async_trait]
impl EntryProcessor for AggregateProcessor {
    async fn process(&mut self, record: &Record) {
        for processor in &mut self.processors {
            processor.process(record).await;
        }
    }

    async fn done(&mut self, page_key: PageKey) {
        for processor in &mut self.processors {
            processor.done(page_key).await;
        }
    }
}
