//! Transport and layout tests

use super::*;
use pretty_assertions::assert_eq;
use serde_json::json;

// ============================================================================
// Layout
// ============================================================================

#[test]
fn test_page_request_shapes() {
    let layout = PageLayout::ledger_data();
    assert_eq!(
        layout.page_request(100, None),
        json!({"command": "ledger_data", "ledger_index": 100})
    );
    assert_eq!(
        layout.page_request(100, Some(&json!("ABC"))),
        json!({"command": "ledger_data", "ledger_index": 100, "marker": "ABC"})
    );

    let layout = LayoutConfig {
        preset: LayoutPreset::LedgerTransactions,
        limit: Some(50),
        ..LayoutConfig::default()
    }
    .build();
    assert_eq!(
        layout.page_request(7, None),
        json!({
            "command": "ledger",
            "ledger_index": 7,
            "limit": 50,
            "transactions": true,
            "expand": true
        })
    );
}

#[test]
fn test_resolve_request() {
    assert_eq!(
        PageLayout::ledger_data().resolve_request("abc"),
        json!({"id": "abc", "command": "ledger", "ledger_index": "validated"})
    );
}

#[test]
fn test_classify_page() {
    let layout = PageLayout::ledger_data();
    let message = json!({
        "status": "success",
        "type": "response",
        "result": {
            "ledger_index": 71698271,
            "marker": "F0",
            "state": [{"LedgerEntryType": "AccountRoot"}, "junk"]
        }
    });

    let Inbound::Page(page) = layout.classify(&message) else {
        panic!("expected page");
    };
    assert_eq!(page.page_key, 71698271);
    assert_eq!(page.cursor, Some(json!("F0")));
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.skipped, 1);
    assert!(!page.is_last());
}

#[test]
fn test_classify_last_page() {
    let layout = PageLayout::ledger_data();
    for cursor in [json!(null), json!("")] {
        let message = json!({
            "status": "success",
            "result": {"ledger_index": 5, "marker": cursor, "state": []}
        });
        let Inbound::Page(page) = layout.classify(&message) else {
            panic!("expected page");
        };
        assert!(page.is_last());
    }

    let message = json!({"status": "success", "result": {"ledger_index": 5, "state": []}});
    assert!(matches!(layout.classify(&message), Inbound::Page(p) if p.is_last()));
}

#[test]
fn test_classify_failure() {
    let layout = PageLayout::ledger_data();
    assert_eq!(
        layout.classify(&json!({"status": "error", "error": "lgrNotFound"})),
        Inbound::Failure {
            status: "error".to_string(),
            error: Some("lgrNotFound".to_string()),
        }
    );
    assert_eq!(
        layout.classify(&json!({"result": {}})),
        Inbound::Failure {
            status: "missing".to_string(),
            error: None,
        }
    );
}

#[test]
fn test_classify_ack() {
    let layout = PageLayout::ledger_data();
    let ack = json!({
        "id": "run-1",
        "status": "success",
        "result": {"ledger": {"ledger_index": "71698272"}, "validated": true}
    });
    assert_eq!(layout.classify(&ack), Inbound::Ack { page_key: 71698272 });

    let broken = json!({"id": "run-1", "status": "success", "result": {}});
    assert!(matches!(layout.classify(&broken), Inbound::Malformed(_)));
}

#[test]
fn test_classify_malformed_page() {
    let layout = PageLayout::ledger_data();
    let no_key = json!({"status": "success", "result": {"state": []}});
    assert!(matches!(layout.classify(&no_key), Inbound::Malformed(_)));

    let no_items = json!({"status": "success", "result": {"ledger_index": 1}});
    assert!(matches!(layout.classify(&no_items), Inbound::Malformed(_)));
}

#[test]
fn test_classify_transactions_page() {
    let layout = PageLayout::ledger_transactions();
    let message = json!({
        "status": "success",
        "result": {
            "ledger_index": 9,
            "ledger": {"ledger_index": "9", "transactions": [{"hash": "A"}, {"hash": "B"}]}
        }
    });
    let Inbound::Page(page) = layout.classify(&message) else {
        panic!("expected page");
    };
    assert_eq!(page.items.len(), 2);
    assert!(page.is_last());
}

#[test]
fn test_layout_config_overrides() {
    let config: LayoutConfig = serde_yaml::from_str(
        r"
preset: ledger_data
items: result.objects
cursor: result.next
",
    )
    .unwrap();
    let layout = config.build();
    assert_eq!(layout.items, "result.objects");
    assert_eq!(layout.cursor, "result.next");
    assert_eq!(layout.page_key, "result.ledger_index");
}

// ============================================================================
// Channel transport
// ============================================================================

#[tokio::test]
async fn test_channel_transport_round_trip() {
    let (transport, mut peer) = ChannelTransport::pair();
    let (mut sender, mut receiver) = transport.split();

    sender.send(json!({"n": 1})).await.unwrap();
    assert_eq!(peer.next_request().await, Some(json!({"n": 1})));
    peer.respond(json!({"ok": true})).unwrap();
    assert_eq!(receiver.recv().await.unwrap().unwrap(), json!({"ok": true}));

    sender.send(json!({"n": 2})).await.unwrap();
    sender.send(json!({"n": 3})).await.unwrap();
    assert_eq!(peer.max_in_flight(), 2);
    assert_eq!(peer.requests_sent(), 3);

    sender.close().await.unwrap();
    assert!(sender.send(json!({})).await.is_err());
    assert_eq!(peer.close_count(), 1);

    peer.hang_up();
    assert!(receiver.recv().await.is_none());
}
