//! HTTP middleware for the read API.

pub mod request_id;

pub use request_id::{request_id_layers, UuidRequestId, X_REQUEST_ID};
