//! Mock infrastructure for driving the feed without a real node.
//!
//! - `RpcMockBuilder`: mockito server answering the poll and by-hash lookup calls
//! - `BlockResponseBuilder`: node block objects in the wire shape the parser expects
//! - `MockWebSocketServer`: push server for the workshare subscription
//!
//! ```ignore
//! use tests::mock_infrastructure::{hash_hex, BlockResponseBuilder, RpcMockBuilder};
//!
//! let mut mock = RpcMockBuilder::new().await;
//! mock.mock_latest_block(&BlockResponseBuilder::new(hash_hex(1), 1).build());
//! ```

pub mod rpc_mock;

pub use rpc_mock::{summary, BlockResponseBuilder, RpcMockBuilder, LOOKUP_METHOD, POLL_METHOD};
pub use test_helpers::*;
pub use websocket_mock::MockWebSocketServer;
