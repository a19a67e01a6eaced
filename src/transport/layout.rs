//! Request encoding and response classification
//!
//! A [`PageLayout`] names the request command and the dotted paths at which a
//! response carries its status, items, cursor and page key.

use super::types::{Inbound, Page};
use crate::types::{value_at_path, JsonValue, Record};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map};

/// Where a paged source puts things in its messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLayout {
    /// Command issued for each page
    pub command: String,
    /// Extra parameters added to every page request
    pub params: Record,
    /// Page size hint, omitted when `None`
    pub limit: Option<u32>,
    /// Path of the status field
    pub status: String,
    /// Status value meaning success
    pub success: String,
    /// Path of the error text on failure
    pub error: String,
    /// Path of the item list
    pub items: String,
    /// Path of the next cursor; empty when pages are never continued
    pub cursor: String,
    /// Path of the page key on a page
    pub page_key: String,
    /// Field echoing a request id
    pub id: String,
    /// Command issued to resolve the current page key
    pub resolve_command: String,
    /// Path of the resolved page key on an acknowledgment
    pub ack_page_key: String,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self::ledger_data()
    }
}

impl PageLayout {
    /// Ledger state objects via `ledger_data`, paged by marker
    pub fn ledger_data() -> Self {
        Self {
            command: "ledger_data".to_string(),
            params: Record::new(),
            limit: None,
            status: "status".to_string(),
            success: "success".to_string(),
            error: "error".to_string(),
            items: "result.state".to_string(),
            cursor: "result.marker".to_string(),
            page_key: "result.ledger_index".to_string(),
            id: "id".to_string(),
            resolve_command: "ledger".to_string(),
            ack_page_key: "result.ledger.ledger_index".to_string(),
        }
    }

    /// Expanded transactions of one ledger via `ledger`, a single page each
    pub fn ledger_transactions() -> Self {
        let mut params = Record::new();
        params.insert("transactions".to_string(), JsonValue::Bool(true));
        params.insert("expand".to_string(), JsonValue::Bool(true));
        Self {
            command: "ledger".to_string(),
            params,
            items: "result.ledger.transactions".to_string(),
            cursor: String::new(),
            ..Self::ledger_data()
        }
    }

    /// Request for one page; a `None` cursor starts a new sequence
    pub fn page_request(&self, page_key: u64, cursor: Option<&JsonValue>) -> JsonValue {
        let mut request = Map::new();
        request.insert("command".to_string(), json!(self.command));
        request.insert("ledger_index".to_string(), json!(page_key));
        if let Some(cursor) = cursor {
            request.insert("marker".to_string(), cursor.clone());
        }
        if let Some(limit) = self.limit {
            request.insert("limit".to_string(), json!(limit));
        }
        for (key, value) in &self.params {
            request.insert(key.clone(), value.clone());
        }
        JsonValue::Object(request)
    }

    /// Request resolving the latest validated page key
    pub fn resolve_request(&self, id: &str) -> JsonValue {
        let mut request = Map::new();
        request.insert(self.id.clone(), json!(id));
        request.insert("command".to_string(), json!(self.resolve_command));
        request.insert("ledger_index".to_string(), json!("validated"));
        JsonValue::Object(request)
    }

    /// Classify one inbound message
    pub fn classify(&self, message: &JsonValue) -> Inbound {
        let status = value_at_path(message, &self.status).and_then(JsonValue::as_str);
        if status != Some(self.success.as_str()) {
            return Inbound::Failure {
                status: status.unwrap_or("missing").to_string(),
                error: value_at_path(message, &self.error)
                    .and_then(JsonValue::as_str)
                    .map(str::to_string),
            };
        }

        let items = value_at_path(message, &self.items);
        let has_id = message.get(&self.id).is_some_and(|id| !id.is_null());
        if has_id && items.is_none() {
            return match value_at_path(message, &self.ack_page_key).and_then(page_key_of) {
                Some(page_key) => Inbound::Ack { page_key },
                None => Inbound::Malformed(format!(
                    "acknowledgment without page key at '{}'",
                    self.ack_page_key
                )),
            };
        }

        let Some(page_key) = value_at_path(message, &self.page_key).and_then(page_key_of) else {
            return Inbound::Malformed(format!("page without page key at '{}'", self.page_key));
        };
        let Some(JsonValue::Array(raw_items)) = items else {
            return Inbound::Malformed(format!("page without item list at '{}'", self.items));
        };

        let mut records = Vec::with_capacity(raw_items.len());
        let mut skipped = 0;
        for item in raw_items {
            match item {
                JsonValue::Object(record) => records.push(record.clone()),
                _ => skipped += 1,
            }
        }

        Inbound::Page(Page {
            page_key,
            cursor: self.cursor_of(message),
            items: records,
            skipped,
        })
    }

    fn cursor_of(&self, message: &JsonValue) -> Option<JsonValue> {
        if self.cursor.is_empty() {
            return None;
        }
        match value_at_path(message, &self.cursor)? {
            JsonValue::Null => None,
            JsonValue::String(s) if s.is_empty() => None,
            cursor => Some(cursor.clone()),
        }
    }
}

/// Page keys arrive as numbers or numeric strings
fn page_key_of(value: &JsonValue) -> Option<u64> {
    match value {
        JsonValue::Number(n) => n.as_u64(),
        JsonValue::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Named layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum LayoutPreset {
    #[default]
    LedgerData,
    LedgerTransactions,
}

impl LayoutPreset {
    /// Layout for this preset
    pub fn layout(self) -> PageLayout {
        match self {
            LayoutPreset::LedgerData => PageLayout::ledger_data(),
            LayoutPreset::LedgerTransactions => PageLayout::ledger_transactions(),
        }
    }
}

/// Layout section of a run configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Base layout
    pub preset: LayoutPreset,
    /// Page size hint
    pub limit: Option<u32>,
    /// Override of the item list path
    pub items: Option<String>,
    /// Override of the cursor path
    pub cursor: Option<String>,
    /// Override of the page key path
    pub page_key: Option<String>,
}

impl LayoutConfig {
    /// Resolve the preset and overrides into a layout
    pub fn build(&self) -> PageLayout {
        let mut layout = self.preset.layout();
        layout.limit = self.limit;
        if let Some(items) = &self.items {
            layout.items.clone_from(items);
        }
        if let Some(cursor) = &self.cursor {
            layout.cursor.clone_from(cursor);
        }
        if let Some(page_key) = &self.page_key {
            layout.page_key.clone_from(page_key);
        }
        layout
    }
}
