//! Coordinator tests

use super::*;
use crate::error::Error;
use crate::pipeline::{EntryProcessingPipeline, EntryProcessor, EtlProcessor, SchemaDiscoveryProcessor};
use crate::schema::SchemaMapping;
use crate::sink::MemorySink;
use crate::transform::PassthroughTransformer;
use crate::transport::{ChannelPeer, ChannelTransport, PageLayout};
use crate::types::{Kind, PageKey, Record};
use crate::validate::PassthroughValidator;
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Helpers
// ============================================================================

#[derive(Default)]
struct Recorder {
    records: Vec<Record>,
    completions: Vec<PageKey>,
    cancel_after: Option<(usize, CancellationToken)>,
    delay: Option<Duration>,
}

#[async_trait]
impl EntryProcessor for Recorder {
    async fn process(&mut self, record: &Record) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.records.push(record.clone());
        if let Some((after, token)) = &self.cancel_after {
            if self.records.len() >= *after {
                token.cancel();
            }
        }
    }

    async fn done(&mut self, page_key: PageKey) {
        self.completions.push(page_key);
    }
}

fn page(index: u64, marker: Option<&str>, items: Value) -> Value {
    json!({
        "status": "success",
        "type": "response",
        "result": {"ledger_index": index, "marker": marker, "state": items}
    })
}

fn ack(request: &Value, index: &str) -> Value {
    json!({
        "id": request["id"],
        "status": "success",
        "result": {"ledger": {"ledger_index": index}, "validated": true}
    })
}

fn failure() -> Value {
    json!({"status": "error", "error": "lgrNotFound", "type": "response"})
}

/// Answer requests with `respond` until the transport closes
fn serve<F>(mut peer: ChannelPeer, mut respond: F) -> JoinHandle<(Vec<Value>, ChannelPeer)>
where
    F: FnMut(&Value) -> Option<Value> + Send + 'static,
{
    tokio::spawn(async move {
        let mut requests = Vec::new();
        while let Some(request) = peer.next_request().await {
            if let Some(response) = respond(&request) {
                peer.respond(response).unwrap();
            }
            requests.push(request);
        }
        (requests, peer)
    })
}

/// Answer requests with a fixed script, in order
fn serve_script(peer: ChannelPeer, script: Vec<Value>) -> JoinHandle<(Vec<Value>, ChannelPeer)> {
    let mut script = script.into_iter();
    serve(peer, move |_| script.next())
}

fn config(start: PageKey) -> CoordinatorConfig {
    CoordinatorConfig::default()
        .with_start(start)
        .with_retry(RetryPolicy::immediate(3))
}

// ============================================================================
// Runs
// ============================================================================

#[tokio::test]
async fn test_three_pages_complete_once() {
    let (transport, peer) = ChannelTransport::pair();
    let server = serve_script(
        peer,
        vec![
            page(100, Some("m1"), json!([{"Index": "A"}, {"Index": "B"}])),
            page(100, Some("m2"), json!([{"Index": "C"}])),
            page(100, None, json!([{"Index": "D"}])),
        ],
    );

    let coordinator = PagedFetchCoordinator::new(config(PageKey::Index(100)));
    let mut recorder = Recorder::default();
    let summary = coordinator
        .run(transport, &mut recorder, &CancellationToken::new())
        .await
        .unwrap();

    let (requests, peer) = server.await.unwrap();
    assert_eq!(
        requests,
        vec![
            json!({"command": "ledger_data", "ledger_index": 100}),
            json!({"command": "ledger_data", "ledger_index": 100, "marker": "m1"}),
            json!({"command": "ledger_data", "ledger_index": 100, "marker": "m2"}),
        ]
    );
    assert_eq!(
        summary.outcome,
        RunOutcome::Completed {
            page_key: PageKey::Index(100)
        }
    );
    assert_eq!(recorder.completions, vec![PageKey::Index(100)]);
    assert_eq!(summary.stats.requests, 3);
    assert_eq!(summary.stats.pages, 3);
    assert_eq!(summary.stats.records, 4);
    assert_eq!(summary.stats.sequences, 1);
    assert_eq!(peer.requests_sent(), 3);
    assert_eq!(peer.max_in_flight(), 1);
    assert_eq!(peer.close_count(), 1);
    assert_eq!(coordinator.state(), FetchState::Done);
}

#[tokio::test]
async fn test_records_are_enriched_in_order() {
    let (transport, peer) = ChannelTransport::pair();
    let server = serve_script(
        peer,
        vec![
            page(7, Some("m"), json!([{"n": 0}, {"n": 1}])),
            page(7, None, json!([{"n": 2}])),
        ],
    );

    let mut recorder = Recorder::default();
    let summary = PagedFetchCoordinator::new(config(PageKey::Index(7)))
        .run(transport, &mut recorder, &CancellationToken::new())
        .await
        .unwrap();
    server.await.unwrap();

    assert_eq!(recorder.records.len(), 3);
    for (expected, record) in recorder.records.iter().enumerate() {
        assert_eq!(record["n"], json!(expected));
        assert_eq!(record["_Sequence"], json!(expected));
        assert_eq!(record["_ExecutionID"], json!(summary.execution_id));
    }
}

#[tokio::test]
async fn test_never_two_requests_in_flight_with_slow_processing() {
    let (transport, peer) = ChannelTransport::pair();
    let mut pages: Vec<Value> = (0..5)
        .map(|i| page(3, Some(&format!("m{i}")), json!([{"i": i}, {"i": i}])))
        .collect();
    pages.push(page(3, None, json!([])));
    let server = serve_script(peer, pages);

    let mut recorder = Recorder {
        delay: Some(Duration::from_millis(5)),
        ..Recorder::default()
    };
    let summary = PagedFetchCoordinator::new(config(PageKey::Index(3)))
        .run(transport, &mut recorder, &CancellationToken::new())
        .await
        .unwrap();

    let (requests, peer) = server.await.unwrap();
    assert_eq!(requests.len(), 6);
    assert_eq!(peer.max_in_flight(), 1);
    assert_eq!(summary.stats.records, 10);
}

#[tokio::test]
async fn test_failed_status_is_retried() {
    let (transport, peer) = ChannelTransport::pair();
    let server = serve_script(
        peer,
        vec![
            page(50, Some("m1"), json!([{"a": 1}])),
            failure(),
            page(50, None, json!([{"a": 2}])),
        ],
    );

    let mut recorder = Recorder::default();
    let summary = PagedFetchCoordinator::new(config(PageKey::Index(50)))
        .run(transport, &mut recorder, &CancellationToken::new())
        .await
        .unwrap();

    let (requests, _) = server.await.unwrap();
    assert_eq!(requests.len(), 3);
    // the failed request is re-issued unchanged
    assert_eq!(requests[1], requests[2]);
    assert_eq!(summary.stats.failures, 1);
    assert_eq!(summary.stats.retries, 1);
    assert_eq!(recorder.records.len(), 2);
}

#[tokio::test]
async fn test_malformed_message_is_retried() {
    let (transport, peer) = ChannelTransport::pair();
    let server = serve_script(
        peer,
        vec![
            json!({"status": "success", "result": {}}),
            page(50, None, json!([{"a": 1}])),
        ],
    );

    let mut recorder = Recorder::default();
    let summary = PagedFetchCoordinator::new(config(PageKey::Index(50)))
        .run(transport, &mut recorder, &CancellationToken::new())
        .await
        .unwrap();
    server.await.unwrap();

    assert_eq!(summary.stats.failures, 1);
    assert_eq!(recorder.records.len(), 1);
}

#[tokio::test]
async fn test_retry_budget_exhausted() {
    let (transport, peer) = ChannelTransport::pair();
    let server = serve(peer, |_| Some(failure()));

    let coordinator = PagedFetchCoordinator::new(
        CoordinatorConfig::default()
            .with_start(PageKey::Index(9))
            .with_retry(RetryPolicy::immediate(2)),
    );
    let mut recorder = Recorder::default();
    let result = coordinator
        .run(transport, &mut recorder, &CancellationToken::new())
        .await;

    assert!(matches!(
        result,
        Err(Error::MaxRetriesExceeded { max_retries: 2, .. })
    ));
    let (requests, peer) = server.await.unwrap();
    assert_eq!(requests.len(), 3);
    assert_eq!(peer.close_count(), 1);
    assert!(recorder.completions.is_empty());
}

#[tokio::test]
async fn test_failed_run_still_completes_last_page() {
    let (transport, peer) = ChannelTransport::pair();
    let mut first = true;
    let server = serve(peer, move |_| {
        if std::mem::take(&mut first) {
            Some(page(30, Some("m1"), json!([{"Index": "A"}])))
        } else {
            Some(failure())
        }
    });

    let coordinator = PagedFetchCoordinator::new(
        CoordinatorConfig::default()
            .with_start(PageKey::Index(30))
            .with_retry(RetryPolicy::immediate(1)),
    );
    let mut recorder = Recorder::default();
    let result = coordinator
        .run(transport, &mut recorder, &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(Error::MaxRetriesExceeded { .. })));
    let (_, peer) = server.await.unwrap();
    assert_eq!(peer.close_count(), 1);
    assert_eq!(recorder.records.len(), 1);
    assert_eq!(recorder.completions, vec![PageKey::Index(30)]);
}

#[tokio::test]
async fn test_failure_counter_resets_after_success() {
    let (transport, peer) = ChannelTransport::pair();
    // two failures before each page, with a budget of two
    let server = serve_script(
        peer,
        vec![
            failure(),
            failure(),
            page(4, Some("m"), json!([])),
            failure(),
            failure(),
            page(4, None, json!([])),
        ],
    );

    let summary = PagedFetchCoordinator::new(
        CoordinatorConfig::default()
            .with_start(PageKey::Index(4))
            .with_retry(RetryPolicy::immediate(2)),
    )
    .run(transport, &mut Recorder::default(), &CancellationToken::new())
    .await
    .unwrap();
    server.await.unwrap();

    assert_eq!(summary.stats.retries, 4);
    assert_eq!(summary.stats.pages, 2);
}

#[tokio::test]
async fn test_current_resolved_through_acknowledgment() {
    let (transport, peer) = ChannelTransport::pair();
    let server = serve(peer, |request| {
        if request.get("id").is_some() {
            Some(ack(request, "500"))
        } else {
            Some(page(500, None, json!([{"x": 1}])))
        }
    });

    let mut recorder = Recorder::default();
    let summary = PagedFetchCoordinator::new(config(PageKey::Current))
        .run(transport, &mut recorder, &CancellationToken::new())
        .await
        .unwrap();

    let (requests, _) = server.await.unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0]["command"], "ledger");
    assert_eq!(requests[0]["ledger_index"], "validated");
    assert_eq!(requests[0]["id"], json!(summary.execution_id));
    assert_eq!(
        requests[1],
        json!({"command": "ledger_data", "ledger_index": 500})
    );
    assert_eq!(
        summary.outcome,
        RunOutcome::Completed {
            page_key: PageKey::Index(500)
        }
    );
}

#[tokio::test]
async fn test_cancellation_between_pages() {
    let (transport, peer) = ChannelTransport::pair();
    let server = serve(peer, |request| match request.get("marker") {
        None => Some(page(80, Some("m1"), json!([{"a": 1}, {"a": 2}]))),
        // never answer the second page
        Some(_) => None,
    });

    let token = CancellationToken::new();
    let mut recorder = Recorder {
        cancel_after: Some((1, token.clone())),
        ..Recorder::default()
    };
    let summary = PagedFetchCoordinator::new(config(PageKey::Index(80)))
        .run(transport, &mut recorder, &token)
        .await
        .unwrap();

    let (_, peer) = server.await.unwrap();
    assert_eq!(
        summary.outcome,
        RunOutcome::Cancelled {
            last_page_key: Some(PageKey::Index(80))
        }
    );
    // the page being processed is finished before stopping
    assert_eq!(recorder.records.len(), 2);
    assert_eq!(recorder.completions, vec![PageKey::Index(80)]);
    assert_eq!(peer.close_count(), 1);
}

#[tokio::test]
async fn test_transport_closed_is_fatal() {
    let (transport, mut peer) = ChannelTransport::pair();
    let server = tokio::spawn(async move {
        let request = peer.next_request().await;
        peer.hang_up();
        // drain until closed
        while peer.next_request().await.is_some() {}
        (request, peer)
    });

    let result = PagedFetchCoordinator::new(config(PageKey::Index(1)))
        .run(transport, &mut Recorder::default(), &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(Error::TransportClosed)));
    let (request, peer) = server.await.unwrap();
    assert!(request.is_some());
    assert_eq!(peer.close_count(), 1);
}

#[tokio::test]
async fn test_sharded_page_keys() {
    let (transport, peer) = ChannelTransport::pair();
    let server = serve(peer, |request| {
        let index = request["ledger_index"].as_u64().unwrap();
        Some(json!({
            "status": "success",
            "result": {
                "ledger_index": index,
                "ledger": {"ledger_index": index.to_string(), "transactions": [{"hash": index}]}
            }
        }))
    });

    let coordinator = PagedFetchCoordinator::new(
        CoordinatorConfig::default()
            .with_layout(PageLayout::ledger_transactions())
            .with_page_keys(ShardedPageKeys::new(20, 1, 5).unwrap())
            .with_retry(RetryPolicy::immediate(0)),
    );
    let mut recorder = Recorder::default();
    let summary = coordinator
        .run(transport, &mut recorder, &CancellationToken::new())
        .await
        .unwrap();

    let (requests, _) = server.await.unwrap();
    let visited: Vec<u64> = requests
        .iter()
        .map(|r| r["ledger_index"].as_u64().unwrap())
        .collect();
    assert_eq!(visited, vec![16, 11, 6, 1]);
    assert_eq!(summary.stats.sequences, 4);
    assert_eq!(recorder.records.len(), 4);
    assert_eq!(recorder.completions, vec![PageKey::Index(1)]);
}

/// Answer `ledger` requests with one transaction tagged by parity
fn serve_transactions(peer: ChannelPeer) -> JoinHandle<(Vec<Value>, ChannelPeer)> {
    serve(peer, |request| {
        let index = request["ledger_index"].as_u64().unwrap();
        let parity = if index % 2 == 0 { "Even" } else { "Odd" };
        let mut transaction = json!({"hash": index.to_string()});
        transaction[parity] = json!(true);
        Some(json!({
            "status": "success",
            "result": {"ledger_index": index, "ledger": {"transactions": [transaction]}}
        }))
    })
}

fn discovering_pipeline(sink: &MemorySink) -> EntryProcessingPipeline {
    let etl = EtlProcessor::new(
        Box::new(PassthroughValidator),
        Box::new(PassthroughTransformer),
        Box::new(sink.clone()),
    );
    EntryProcessingPipeline::new(etl)
        .with_discovery(SchemaDiscoveryProcessor::new().with_report_on_done(false))
}

#[tokio::test]
async fn test_sharded_fetch_runs_shards_concurrently() {
    let sink = MemorySink::new();
    let mut shards = Vec::new();
    let mut servers = Vec::new();
    for _ in 0..2 {
        let (transport, peer) = ChannelTransport::pair();
        servers.push(serve_transactions(peer));
        shards.push((transport, discovering_pipeline(&sink)));
    }

    let config = CoordinatorConfig::default()
        .with_layout(PageLayout::ledger_transactions())
        .with_retry(RetryPolicy::immediate(0));
    let fetch = ShardedFetch::new(config, 6, 2).unwrap();
    let outcomes = fetch.run(shards, &CancellationToken::new()).await.unwrap();

    let mut merged = SchemaMapping::new();
    for outcome in &outcomes {
        let summary = outcome.result.as_ref().unwrap();
        assert!(matches!(summary.outcome, RunOutcome::Completed { .. }));
        merged.merge(outcome.processor.observed().unwrap());
    }
    assert_eq!(outcomes[0].shard_index, 0);
    assert_eq!(outcomes[1].shard_index, 1);
    // each shard saw only its own parity
    assert!(!outcomes[0].processor.observed().unwrap().contains_path("Odd"));
    assert!(merged.allows("Even", Kind::Boolean));
    assert!(merged.allows("Odd", Kind::Boolean));
    assert!(merged.allows("hash", Kind::String));

    let mut visited = Vec::new();
    for server in servers {
        let (requests, peer) = server.await.unwrap();
        assert_eq!(peer.max_in_flight(), 1);
        assert_eq!(peer.close_count(), 1);
        visited.push(
            requests
                .iter()
                .map(|r| r["ledger_index"].as_u64().unwrap())
                .collect::<Vec<_>>(),
        );
    }
    assert_eq!(visited, vec![vec![6, 4, 2], vec![5, 3, 1]]);
    assert_eq!(sink.records().len(), 6);
    // shards finish in any order
    let completions = sink.completions();
    assert_eq!(completions.len(), 2);
    assert!(completions.contains(&PageKey::Index(2)));
    assert!(completions.contains(&PageKey::Index(1)));
}

#[test]
fn test_sharded_fetch_rejects_bad_shapes() {
    assert!(ShardedFetch::new(CoordinatorConfig::default(), 10, 0).is_err());

    let fetch = ShardedFetch::new(CoordinatorConfig::default(), 10, 3).unwrap();
    let keys: Vec<u64> = fetch.shard_config(2).unwrap().page_keys.unwrap().collect();
    assert_eq!(keys, vec![8, 5, 2]);
    assert!(fetch.shard_config(3).is_err());
}

#[tokio::test]
async fn test_sharded_fetch_needs_one_connection_per_shard() {
    let (transport, _peer) = ChannelTransport::pair();
    let fetch = ShardedFetch::new(CoordinatorConfig::default(), 10, 2).unwrap();
    let result = fetch
        .run(vec![(transport, Recorder::default())], &CancellationToken::new())
        .await;
    assert!(matches!(result, Err(Error::Config { .. })));
}

#[tokio::test]
async fn test_no_page_keys_is_empty_run() {
    let (transport, peer) = ChannelTransport::pair();
    let server = serve(peer, |_| None);

    let summary = PagedFetchCoordinator::new(
        CoordinatorConfig::default().with_page_keys(ShardedPageKeys::new(3, 4, 5).unwrap()),
    )
    .run(transport, &mut Recorder::default(), &CancellationToken::new())
    .await
    .unwrap();

    let (requests, peer) = server.await.unwrap();
    assert_eq!(summary.outcome, RunOutcome::Empty);
    assert!(requests.is_empty());
    assert_eq!(peer.close_count(), 1);
}

#[tokio::test]
async fn test_repeat_re_resolves_current() {
    let (transport, peer) = ChannelTransport::pair();
    let mut next_index = 10u64;
    let server = serve(peer, move |request| {
        if request.get("id").is_some() {
            let response = ack(request, &next_index.to_string());
            next_index += 1;
            Some(response)
        } else {
            let index = request["ledger_index"].as_u64().unwrap();
            Some(page(index, None, json!([{"ledger": index}])))
        }
    });

    let token = CancellationToken::new();
    let mut recorder = Recorder {
        cancel_after: Some((2, token.clone())),
        ..Recorder::default()
    };
    let mut config = config(PageKey::Current).with_repeat(true);
    config.repeat_delay_ms = 0;
    let summary = PagedFetchCoordinator::new(config)
        .run(transport, &mut recorder, &token)
        .await
        .unwrap();
    server.await.unwrap();

    assert_eq!(recorder.records[0]["ledger"], 10);
    assert_eq!(recorder.records[1]["ledger"], 11);
    assert_eq!(
        summary.outcome,
        RunOutcome::Cancelled {
            last_page_key: Some(PageKey::Index(11))
        }
    );
}

// ============================================================================
// Parts
// ============================================================================

#[test]
fn test_retry_policy_delays() {
    let policy = RetryPolicy {
        jitter: false,
        ..RetryPolicy::default()
    };
    assert_eq!(policy.delay(0), Duration::from_secs(1));
    assert_eq!(policy.delay(1), Duration::from_secs(2));
    assert_eq!(policy.delay(5), Duration::from_secs(32));
    assert_eq!(policy.delay(6), Duration::from_secs(60));
    assert_eq!(policy.delay(40), Duration::from_secs(60));

    let jittered = RetryPolicy::default();
    for attempt in 0..8 {
        let base = jittered.base_delay(attempt);
        let delay = jittered.delay(attempt);
        assert!(delay >= base && delay <= base + base / 2);
    }
}

#[test]
fn test_backoff_budget_and_reset() {
    let mut backoff = Backoff::new(RetryPolicy::immediate(2));
    let failure = Error::malformed("bad");
    assert!(backoff.next_delay(&failure).is_ok());
    assert!(backoff.next_delay(&failure).is_ok());
    assert!(matches!(
        backoff.next_delay(&failure),
        Err(Error::MaxRetriesExceeded { max_retries: 2, .. })
    ));

    backoff.reset();
    assert_eq!(backoff.consecutive(), 0);
    assert!(backoff.next_delay(&failure).is_ok());
    assert_eq!(backoff.total(), 4);
}

#[test]
fn test_sharded_page_keys_iteration() {
    let keys: Vec<u64> = ShardedPageKeys::new(20, 1, 5).unwrap().collect();
    assert_eq!(keys, vec![16, 11, 6, 1]);

    for key in ShardedPageKeys::new(100, 3, 7).unwrap() {
        assert_eq!(key % 7, 3);
    }

    let keys: Vec<u64> = ShardedPageKeys::descending(3).collect();
    assert_eq!(keys, vec![3, 2, 1]);

    let keys: Vec<u64> = ShardedPageKeys::with_step(10, 0, 1, -4).unwrap().collect();
    assert_eq!(keys, vec![10, 6, 2]);

    assert!(ShardedPageKeys::new(10, 5, 5).is_err());
    assert!(ShardedPageKeys::new(10, 0, 0).is_err());
    assert!(ShardedPageKeys::with_step(10, 0, 1, 0).is_err());
}

#[test]
fn test_pipeline_context_enrich() {
    let mut context = PipelineContext::with_execution_id("exec-1", ContextConfig::default());
    let mut first = Record::new();
    let mut second = Record::new();
    context.enrich(&mut first);
    context.enrich(&mut second);

    assert_eq!(first["_ExecutionID"], "exec-1");
    assert_eq!(first["_Sequence"], 0);
    assert_eq!(second["_Sequence"], 1);
    assert_eq!(context.next_sequence(), 2);

    let mut bare = PipelineContext::with_execution_id(
        "exec-2",
        ContextConfig {
            attach_execution_id: false,
            attach_sequence: false,
            ..ContextConfig::default()
        },
    );
    let mut record = Record::new();
    bare.enrich(&mut record);
    assert!(record.is_empty());
}

#[test]
fn test_execution_ids_are_unique() {
    let a = PipelineContext::new(ContextConfig::default());
    let b = PipelineContext::new(ContextConfig::default());
    assert_ne!(a.execution_id(), b.execution_id());
}
