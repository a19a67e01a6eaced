//! Sink tests

use super::*;
use crate::error::Result;
use crate::types::{Environment, PageKey, Record};
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tokio::io::AsyncBufReadExt;
use tokio::net::TcpListener;

fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

struct FailingSink;

#[async_trait]
impl Sink for FailingSink {
    fn name(&self) -> &str {
        "failing"
    }

    async fn deliver(&self, _record: &Record) -> Result<()> {
        Err(crate::error::Error::sink("failing", "agent unreachable"))
    }
}

#[tokio::test]
async fn test_fan_out_continues_past_failing_child() {
    let first = MemorySink::new();
    let third = MemorySink::new();
    let fan_out = FanOutSink::new()
        .with_sink(first.clone())
        .with_sink(FailingSink)
        .with_sink(third.clone());

    let entry = record(json!({"Account": "rA", "Balance": "10"}));
    fan_out.ingest(&entry).await;

    assert_eq!(first.records(), vec![entry.clone()]);
    assert_eq!(third.records(), vec![entry.clone()]);
    assert_eq!(fan_out.failures(), 1);

    assert!(fan_out.deliver(&entry).await.is_err());
    assert_eq!(third.records().len(), 2);
}

#[tokio::test]
async fn test_fan_out_done_reaches_every_child() {
    let first = MemorySink::new();
    let second = MemorySink::new();
    let fan_out = FanOutSink::new()
        .with_sink(first.clone())
        .with_sink(FailingSink)
        .with_sink(second.clone());

    fan_out.done(PageKey::Index(7)).await;

    assert_eq!(first.completions(), vec![PageKey::Index(7)]);
    assert_eq!(second.completions(), vec![PageKey::Index(7)]);
}

#[tokio::test]
async fn test_ingest_swallows_errors() {
    // must not panic or propagate
    FailingSink.ingest(&Record::new()).await;
}

#[tokio::test]
async fn test_console_sink_writes_json_lines() {
    let sink = ConsoleSink::new(Vec::new());
    sink.deliver(&record(json!({"a": 1}))).await.unwrap();
    sink.deliver(&record(json!({"b": "two"}))).await.unwrap();

    let output = String::from_utf8(sink.into_inner()).unwrap();
    assert_eq!(output, "{\"a\":1}\n{\"b\":\"two\"}\n");
}

#[tokio::test]
async fn test_forward_sink_sends_tagged_events() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut lines = tokio::io::BufReader::new(socket).lines();
        let mut events = Vec::new();
        while let Some(line) = lines.next_line().await.unwrap() {
            events.push(serde_json::from_str::<Value>(&line).unwrap());
        }
        events
    });

    let sink = ForwardSink::new(ForwardConfig {
        host: "127.0.0.1".to_string(),
        port,
        tag: "ledger_objects".to_string(),
        environment: Environment::Test,
        ..ForwardConfig::default()
    });
    assert_eq!(sink.tag(), "test.ledger_objects");

    sink.deliver(&record(json!({"Account": "rA"}))).await.unwrap();
    sink.deliver(&record(json!({"Account": "rB"}))).await.unwrap();
    sink.done(PageKey::Index(3)).await;

    let events = server.await.unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0][0], "test.ledger_objects");
    assert!(events[0][1].is_i64());
    assert_eq!(events[0][2], json!({"Account": "rA"}));
    assert_eq!(events[1][2], json!({"Account": "rB"}));
}

#[tokio::test]
async fn test_forward_sink_unreachable_agent_fails_delivery() {
    // bind then drop so the port is closed
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let sink = ForwardSink::new(ForwardConfig {
        host: "127.0.0.1".to_string(),
        port,
        ..ForwardConfig::default()
    });

    assert!(sink.deliver(&record(json!({"a": 1}))).await.is_err());
    sink.ingest(&record(json!({"a": 1}))).await;
}

#[test]
fn test_build_sink() {
    assert_eq!(build_sink(&SinkConfig::default()).unwrap().name(), "console");

    let both = SinkConfig {
        forward: Some(ForwardConfig::default()),
        ..SinkConfig::default()
    };
    assert_eq!(build_sink(&both).unwrap().name(), "fan-out");

    let forward_only = SinkConfig {
        console: false,
        forward: Some(ForwardConfig::default()),
        ..SinkConfig::default()
    };
    assert_eq!(build_sink(&forward_only).unwrap().name(), "forward");

    let none = SinkConfig {
        console: false,
        ..SinkConfig::default()
    };
    assert!(build_sink(&none).is_err());
}

#[test]
fn test_forward_config_defaults() {
    let config: ForwardConfig = serde_yaml::from_str("environment: prod").unwrap();
    assert_eq!(config.address(), "0.0.0.0:22522");
    assert_eq!(config.full_tag(), "prod.ledger_objects");
}
