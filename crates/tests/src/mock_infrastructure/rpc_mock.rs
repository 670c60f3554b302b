//! RPC Mock Builder for the node's JSON-RPC surface
//!
//! Wraps mockito with helpers for the two calls the feed makes: the latest-block poll and
//! the by-hash lookup used for backfill. Matchers are kept disjoint (method plus hash) so
//! mock creation order never matters.

use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::{json, Value};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

pub const POLL_METHOD: &str = "quai_getBlockByNumber";
pub const LOOKUP_METHOD: &str = "quai_getBlockByHash";

fn method_matcher(method: &str) -> Matcher {
    Matcher::Regex(format!(r#""method"\s*:\s*"{method}""#))
}

fn lookup_matcher(hash: &str) -> Matcher {
    Matcher::AllOf(vec![
        method_matcher(LOOKUP_METHOD),
        Matcher::Regex(format!(r#""params"\s*:\s*\[\s*"{hash}""#)),
    ])
}

fn result_body(result: &Value) -> String {
    json!({ "jsonrpc": "2.0", "id": 1, "result": result }).to_string()
}

/// Builder for creating mock node responses.
pub struct RpcMockBuilder {
    server: ServerGuard,
    mocks: Vec<Mock>,
}

impl RpcMockBuilder {
    /// Creates a new RPC mock builder with a fresh mockito server.
    pub async fn new() -> Self {
        Self { server: Server::new_async().await, mocks: Vec::new() }
    }

    #[must_use]
    pub fn url(&self) -> String {
        self.server.url()
    }

    /// Every poll returns `block`.
    pub fn mock_latest_block(&mut self, block: &Value) -> &mut Self {
        let mock = self
            .server
            .mock("POST", "/")
            .match_body(method_matcher(POLL_METHOD))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(result_body(block))
            .create();

        self.mocks.push(mock);
        self
    }

    /// Successive polls walk through `blocks`; the last one repeats once exhausted.
    pub fn mock_latest_sequence(&mut self, blocks: Vec<Value>) -> &mut Self {
        let blocks = Arc::new(blocks);
        let calls = Arc::new(AtomicUsize::new(0));

        let mock = self
            .server
            .mock("POST", "/")
            .match_body(method_matcher(POLL_METHOD))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body_from_request(move |_request| {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                let index = call.min(blocks.len().saturating_sub(1));
                let block = blocks.get(index).cloned().unwrap_or(Value::Null);
                result_body(&block).into_bytes()
            })
            .create();

        self.mocks.push(mock);
        self
    }

    /// Mocks a by-hash lookup. The returned mock expects exactly `expected_hits` calls.
    pub fn mock_block_by_hash(&mut self, hash: &str, block: &Value, expected_hits: usize) -> Mock {
        self.server
            .mock("POST", "/")
            .match_body(lookup_matcher(hash))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(result_body(block))
            .expect(expected_hits)
            .create()
    }

    /// Mocks a JSON-RPC error object for every call to `method`.
    pub fn mock_rpc_error(&mut self, method: &str, code: i32, message: &str) -> &mut Self {
        let mock = self
            .server
            .mock("POST", "/")
            .match_body(method_matcher(method))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "error": { "code": code, "message": message }
                })
                .to_string(),
            )
            .create();

        self.mocks.push(mock);
        self
    }

    /// Mocks an HTTP 500 for every call to `method`.
    pub fn mock_server_error(&mut self, method: &str) -> &mut Self {
        let mock = self
            .server
            .mock("POST", "/")
            .match_body(method_matcher(method))
            .with_status(500)
            .with_body("Internal Server Error")
            .create();

        self.mocks.push(mock);
        self
    }

    #[must_use]
    pub fn verify_all_called(&self) -> bool {
        self.mocks.iter().all(Mock::matched)
    }
}

/// Builder for node block objects in the `woHeader`/`header` shape.
#[derive(Debug, Clone)]
pub struct BlockResponseBuilder {
    hash: String,
    number: Option<u64>,
    order: u64,
    zone_parent: String,
    header_parents: Option<(String, String)>,
    uncles: Vec<Value>,
    workshares: Vec<Value>,
    with_wo_header: bool,
}

impl BlockResponseBuilder {
    /// A zone-order block with a sentinel parent.
    #[must_use]
    pub fn new(hash: impl Into<String>, number: u64) -> Self {
        Self {
            hash: hash.into(),
            number: Some(number),
            order: 2,
            zone_parent: super::SENTINEL_HASH.to_string(),
            header_parents: None,
            uncles: Vec::new(),
            workshares: Vec::new(),
            with_wo_header: true,
        }
    }

    #[must_use]
    pub fn with_order(mut self, order: u64) -> Self {
        self.order = order;
        self
    }

    #[must_use]
    pub fn with_zone_parent(mut self, hash: impl Into<String>) -> Self {
        self.zone_parent = hash.into();
        self
    }

    /// Sets `header.parentHash` to `[prime, region]`.
    #[must_use]
    pub fn with_header_parents(
        mut self,
        prime: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        self.header_parents = Some((prime.into(), region.into()));
        self
    }

    #[must_use]
    pub fn without_number(mut self) -> Self {
        self.number = None;
        self
    }

    #[must_use]
    pub fn with_uncle(mut self, summary: Value) -> Self {
        self.uncles.push(summary);
        self
    }

    #[must_use]
    pub fn with_workshare(mut self, summary: Value) -> Self {
        self.workshares.push(summary);
        self
    }

    /// Drops `woHeader`, which makes the block malformed.
    #[must_use]
    pub fn without_wo_header(mut self) -> Self {
        self.with_wo_header = false;
        self
    }

    #[must_use]
    pub fn build(self) -> Value {
        let mut block = json!({
            "hash": self.hash,
            "order": format!("0x{:x}", self.order),
            "uncles": self.uncles,
            "workshares": self.workshares,
        });

        if self.with_wo_header {
            let mut wo_header = json!({ "parentHash": self.zone_parent });
            if let Some(number) = self.number {
                wo_header["number"] = json!(format!("0x{number:x}"));
            }
            block["woHeader"] = wo_header;
        }
        if let Some((prime, region)) = self.header_parents {
            block["header"] = json!({ "parentHash": [prime, region] });
        }
        block
    }
}

/// An uncle or workshare summary object.
#[must_use]
pub fn summary(hash: &str, parent_hash: &str, number: u64) -> Value {
    json!({
        "hash": hash,
        "parentHash": parent_hash,
        "number": format!("0x{number:x}"),
    })
}
