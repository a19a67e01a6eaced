//! Paged fetch coordinator
//!
//! Two duties share one connection. The requester takes `(page_key, cursor)`
//! pairs off a FIFO queue and sends one request per pair; the consumer reads
//! the responses, decides what to fetch next and feeds the records to an
//! entry processor. A one-permit semaphore keeps exactly one request in
//! flight: the requester spends the permit on every send and the consumer
//! returns it for every response.

use super::retry::Backoff;
use super::shard::ShardedPageKeys;
use super::types::{
    CompletionSignal, CoordinatorConfig, CursorSignal, FetchState, PipelineContext, QueueItem,
    RunOutcome, RunStats, RunSummary,
};
use crate::error::{Error, Result};
use crate::pipeline::EntryProcessor;
use crate::transport::{Inbound, Page, PageLayout, Transport, TransportReceiver, TransportSender};
use crate::types::PageKey;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Drives paged requests over a transport and hands records to a processor
pub struct PagedFetchCoordinator {
    config: CoordinatorConfig,
    state: watch::Sender<FetchState>,
}

impl PagedFetchCoordinator {
    /// Create a coordinator
    pub fn new(config: CoordinatorConfig) -> Self {
        let (state, _) = watch::channel(FetchState::default());
        Self { config, state }
    }

    /// Coordinator settings
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Observe state transitions
    pub fn subscribe(&self) -> watch::Receiver<FetchState> {
        self.state.subscribe()
    }

    /// Current state
    pub fn state(&self) -> FetchState {
        *self.state.borrow()
    }

    /// Run until every sequence is exhausted, the run is cancelled, or a
    /// failure exhausts the retry budget
    ///
    /// The transport is closed exactly once before this returns, whatever the
    /// outcome. `processor.done` is called once with the terminal page key
    /// whenever at least one page was fetched, including runs that end in an
    /// error; a failed run reports the last page it received.
    pub async fn run<T, P>(
        &self,
        transport: T,
        processor: &mut P,
        cancel: &CancellationToken,
    ) -> Result<RunSummary>
    where
        T: Transport,
        P: EntryProcessor + ?Sized,
    {
        let started = Instant::now();
        let mut context = PipelineContext::new(self.config.context.clone());
        let execution_id = context.execution_id().to_string();
        let mut page_keys = self.config.page_keys.clone();
        let (mut sender, mut receiver) = transport.split();
        let mut stats = RunStats::new();

        let first = match page_keys.as_mut() {
            Some(keys) => keys.next().map(PageKey::Index),
            None => Some(self.config.start),
        };
        let Some(first) = first else {
            info!(%execution_id, "no page keys to fetch");
            close_transport(&mut sender).await;
            self.state.send_replace(FetchState::Done);
            return Ok(RunSummary {
                execution_id,
                outcome: RunOutcome::Empty,
                stats,
            });
        };

        self.state.send_replace(FetchState::AwaitingCursor);
        let (queue_tx, mut queue_rx) = mpsc::unbounded_channel();
        let permits = Semaphore::new(1);
        let mut last_page_key = None;
        info!(%execution_id, start = %first, "starting paged fetch");

        let joined = {
            let mut consumer = Consumer {
                layout: &self.config.layout,
                receiver: &mut receiver,
                queue: &queue_tx,
                permits: &permits,
                state: &self.state,
                cancel,
                processor: &mut *processor,
                context: &mut context,
                backoff: Backoff::new(self.config.retry.clone()),
                page_keys,
                repeat: self.config.repeat,
                repeat_delay: Duration::from_millis(self.config.repeat_delay_ms),
                pending: CursorSignal::start(first),
                last_page_key: &mut last_page_key,
                stats: &mut stats,
            };
            match consumer.enqueue(CursorSignal::start(first)) {
                Ok(()) => {
                    tokio::try_join!(
                        request_pages(
                            &mut sender,
                            &mut queue_rx,
                            &permits,
                            &self.config.layout,
                            &execution_id,
                            &self.state,
                            cancel,
                        ),
                        consumer.run(),
                    )
                }
                Err(e) => Err(e),
            }
        };

        close_transport(&mut sender).await;
        self.state.send_replace(FetchState::Done);
        #[allow(clippy::cast_possible_truncation)]
        stats.set_duration(started.elapsed().as_millis() as u64);

        let (requests, outcome) = match joined {
            Ok(done) => done,
            Err(e) => {
                error!(%execution_id, error = %e, pages = stats.pages, records = stats.records, "paged fetch failed");
                if let Some(page_key) = last_page_key {
                    processor.done(page_key).await;
                }
                return Err(e);
            }
        };
        stats.requests = requests;

        if let Some(page_key) = outcome.terminal_page_key() {
            processor.done(page_key).await;
        }

        info!(
            %execution_id,
            outcome = ?outcome,
            requests = stats.requests,
            pages = stats.pages,
            records = stats.records,
            retries = stats.retries,
            duration_ms = stats.duration_ms,
            "paged fetch finished"
        );

        Ok(RunSummary {
            execution_id,
            outcome,
            stats,
        })
    }
}

async fn close_transport<S: TransportSender>(sender: &mut S) {
    if let Err(e) = sender.close().await {
        warn!(error = %e, "failed to close transport");
    }
}

/// Requester duty: one request per queued cursor, never two in flight
///
/// Returns the number of requests sent.
async fn request_pages<S: TransportSender>(
    sender: &mut S,
    queue: &mut mpsc::UnboundedReceiver<QueueItem>,
    permits: &Semaphore,
    layout: &PageLayout,
    execution_id: &str,
    state: &watch::Sender<FetchState>,
    cancel: &CancellationToken,
) -> Result<u64> {
    let mut sent = 0;
    loop {
        let item = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(sent),
            item = queue.recv() => item,
        };

        let signal = match item {
            Some(QueueItem::Fetch(signal)) => signal,
            Some(QueueItem::Complete(CompletionSignal { page_key })) => {
                debug!(%page_key, "requester received completion signal");
                return Ok(sent);
            }
            None => return Ok(sent),
        };

        let permit = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(sent),
            permit = permits.acquire() => permit.map_err(|_| Error::transport("request permits closed"))?,
        };
        // returned by the consumer when the response arrives
        permit.forget();

        let request = match signal.page_key {
            PageKey::Current => layout.resolve_request(execution_id),
            PageKey::Index(index) => layout.page_request(index, signal.cursor.as_ref()),
        };
        debug!(page_key = %signal.page_key, cursor = ?signal.cursor, "sending request");
        sender.send(request).await?;
        sent += 1;
        state.send_replace(FetchState::RequestSent);
    }
}

/// What follows an exhausted sequence
enum NextSequence {
    Start(PageKey),
    Repeat,
    Finish,
}

/// Consumer duty state
struct Consumer<'a, R, P: ?Sized> {
    layout: &'a PageLayout,
    receiver: &'a mut R,
    queue: &'a mpsc::UnboundedSender<QueueItem>,
    permits: &'a Semaphore,
    state: &'a watch::Sender<FetchState>,
    cancel: &'a CancellationToken,
    processor: &'a mut P,
    context: &'a mut PipelineContext,
    backoff: Backoff,
    page_keys: Option<ShardedPageKeys>,
    repeat: bool,
    repeat_delay: Duration,
    pending: CursorSignal,
    last_page_key: &'a mut Option<PageKey>,
    stats: &'a mut RunStats,
}

impl<R, P> Consumer<'_, R, P>
where
    R: TransportReceiver,
    P: EntryProcessor + ?Sized,
{
    async fn run(mut self) -> Result<RunOutcome> {
        loop {
            let message = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Ok(self.cancelled()),
                message = self.receiver.recv() => message,
            };
            let Some(message) = message else {
                return Err(Error::TransportClosed);
            };

            // at most one permit exists, even if the source sends extra messages
            if self.permits.available_permits() == 0 {
                self.permits.add_permits(1);
            }
            self.state.send_replace(FetchState::PageReceived);

            let message = match message {
                Ok(message) => message,
                Err(e) if e.is_retryable() => {
                    self.stats.add_failure();
                    if let Some(outcome) = self.retry(e).await? {
                        return Ok(outcome);
                    }
                    continue;
                }
                Err(e) => return Err(e),
            };

            let step = match self.layout.classify(&message) {
                Inbound::Failure { status, error } => {
                    self.stats.add_failure();
                    warn!(
                        page_key = %self.pending.page_key,
                        %status,
                        error = error.as_deref().unwrap_or_default(),
                        "source reported a failure"
                    );
                    let failure = Error::transport_status(self.pending.page_key.to_string(), status);
                    self.retry(failure).await?
                }
                Inbound::Malformed(reason) => {
                    self.stats.add_failure();
                    self.retry(Error::malformed(reason)).await?
                }
                Inbound::Ack { page_key } if self.pending.page_key.is_current() => {
                    self.backoff.reset();
                    info!(page_key, "resolved current page key");
                    self.enqueue(CursorSignal::start(PageKey::Index(page_key)))?;
                    None
                }
                Inbound::Ack { page_key } => {
                    self.stats.add_failure();
                    let reason = format!("unexpected acknowledgment for page key {page_key}");
                    self.retry(Error::malformed(reason)).await?
                }
                Inbound::Page(page) => {
                    self.backoff.reset();
                    self.handle_page(page).await?
                }
            };

            if let Some(outcome) = step {
                return Ok(outcome);
            }
        }
    }

    async fn handle_page(&mut self, page: Page) -> Result<Option<RunOutcome>> {
        let page_key = PageKey::Index(page.page_key);
        *self.last_page_key = Some(page_key);
        self.stats.add_page(page.items.len(), page.skipped);
        info!(
            %page_key,
            cursor = ?page.cursor,
            items = page.items.len(),
            "page received"
        );
        if page.skipped > 0 {
            warn!(%page_key, skipped = page.skipped, "skipped page items that are not records");
        }

        let mut items = page.items;
        for item in &mut items {
            self.context.enrich(item);
        }

        // the next request goes out while this page is processed
        let next = match page.cursor {
            Some(cursor) => {
                self.enqueue(CursorSignal {
                    page_key,
                    cursor: Some(cursor),
                })?;
                None
            }
            None => {
                self.stats.sequences += 1;
                match self.next_sequence() {
                    NextSequence::Start(next_key) => {
                        self.enqueue(CursorSignal::start(next_key))?;
                        None
                    }
                    NextSequence::Repeat => Some(false),
                    NextSequence::Finish => {
                        self.queue
                            .send(QueueItem::Complete(CompletionSignal { page_key }))
                            .map_err(|_| Error::transport("requester stopped"))?;
                        Some(true)
                    }
                }
            }
        };

        for item in &items {
            self.processor.process(item).await;
        }

        match next {
            Some(true) => {
                info!(%page_key, "all sequences exhausted");
                Ok(Some(RunOutcome::Completed { page_key }))
            }
            Some(false) => {
                debug!(delay = ?self.repeat_delay, "re-resolving current page key");
                tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => return Ok(Some(self.cancelled())),
                    () = tokio::time::sleep(self.repeat_delay) => {}
                }
                self.enqueue(CursorSignal::start(PageKey::Current))?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn next_sequence(&mut self) -> NextSequence {
        if let Some(keys) = self.page_keys.as_mut() {
            return match keys.next() {
                Some(key) => NextSequence::Start(PageKey::Index(key)),
                None => NextSequence::Finish,
            };
        }
        if self.repeat {
            NextSequence::Repeat
        } else {
            NextSequence::Finish
        }
    }

    /// Back off, then re-issue the pending request
    async fn retry(&mut self, failure: Error) -> Result<Option<RunOutcome>> {
        let delay = match self.backoff.next_delay(&failure) {
            Ok(delay) => delay,
            Err(exhausted) => {
                error!(page_key = %self.pending.page_key, error = %failure, "retry budget exhausted");
                return Err(exhausted);
            }
        };
        self.stats.retries += 1;
        warn!(
            page_key = %self.pending.page_key,
            attempt = self.backoff.consecutive(),
            delay = ?delay,
            error = %failure,
            "retrying request"
        );

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Ok(Some(self.cancelled())),
            () = tokio::time::sleep(delay) => {}
        }
        self.enqueue(self.pending.clone())?;
        Ok(None)
    }

    fn enqueue(&mut self, signal: CursorSignal) -> Result<()> {
        self.pending = signal.clone();
        self.queue
            .send(QueueItem::Fetch(signal))
            .map_err(|_| Error::transport("requester stopped"))?;
        self.state.send_replace(FetchState::AwaitingCursor);
        Ok(())
    }

    fn cancelled(&self) -> RunOutcome {
        info!(last_page_key = ?self.last_page_key, "paged fetch cancelled");
        RunOutcome::Cancelled {
            last_page_key: *self.last_page_key,
        }
    }
}
