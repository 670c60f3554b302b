//! Parse/validate step from loosely-typed JSON payloads to [`RawBlock`] and [`RawSummary`].
//!
//! Every payload goes through one of the `parse_*` functions. Missing required fields and
//! malformed hex come back as [`ParseError`]; callers treat that as "no data this cycle".
//! Siblings in a polled block (uncles, workshares) are parsed independently so one bad
//! entry never hides the others.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::raw::{PolledBlock, RawBlock, RawSummary};
use crate::{types::BlockHash, utils::parse_hex_u64};

/// JSON-RPC method carried by subscription push messages.
pub const SUBSCRIPTION_METHOD: &str = "quai_subscription";

/// Errors produced while validating a notification payload.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParseError {
    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("invalid hash in {field}: {value}")]
    InvalidHash { field: &'static str, value: String },

    #[error("invalid hex number in {field}: {value}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireBlock {
    hash: Option<String>,
    order: Option<String>,
    wo_header: Option<WireWoHeader>,
    header: Option<WireHeader>,
    #[serde(default)]
    uncles: Option<Vec<Value>>,
    #[serde(default)]
    workshares: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireWoHeader {
    parent_hash: Option<String>,
    number: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireHeader {
    /// `[prime, region, ...]` parent hashes.
    #[serde(default)]
    parent_hash: Vec<Option<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSummary {
    hash: Option<String>,
    parent_hash: Option<String>,
    number: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WirePush {
    method: Option<String>,
    params: Option<WirePushParams>,
}

#[derive(Debug, Deserialize)]
struct WirePushParams {
    result: Option<Value>,
}

fn required_hash(field: &'static str, value: Option<&str>) -> Result<BlockHash, ParseError> {
    let value = value.ok_or(ParseError::MissingField(field))?;
    BlockHash::from_hex(value)
        .ok_or_else(|| ParseError::InvalidHash { field, value: value.to_string() })
}

fn optional_hash(
    field: &'static str,
    value: Option<&str>,
) -> Result<Option<BlockHash>, ParseError> {
    value.map(|v| required_hash(field, Some(v))).transpose()
}

/// Missing stays `None`; it is never read as zero.
fn optional_number(field: &'static str, value: Option<&str>) -> Result<Option<u64>, ParseError> {
    value
        .map(|v| {
            parse_hex_u64(v)
                .ok_or_else(|| ParseError::InvalidNumber { field, value: v.to_string() })
        })
        .transpose()
}

fn block_from_wire(wire: &WireBlock) -> Result<RawBlock, ParseError> {
    let hash = required_hash("hash", wire.hash.as_deref())?;
    let wo_header = wire.wo_header.as_ref().ok_or(ParseError::MissingField("woHeader"))?;
    let zone_parent_hash = required_hash("woHeader.parentHash", wo_header.parent_hash.as_deref())?;
    let number = optional_number("woHeader.number", wo_header.number.as_deref())?;

    let order_hex = wire.order.as_deref().ok_or(ParseError::MissingField("order"))?;
    let order = parse_hex_u64(order_hex)
        .ok_or_else(|| ParseError::InvalidNumber { field: "order", value: order_hex.to_string() })?;

    let (prime_parent_hash, region_parent_hash) = match &wire.header {
        Some(header) => (
            optional_hash(
                "header.parentHash[0]",
                header.parent_hash.first().and_then(Option::as_deref),
            )?,
            optional_hash(
                "header.parentHash[1]",
                header.parent_hash.get(1).and_then(Option::as_deref),
            )?,
        ),
        None => (None, None),
    };

    Ok(RawBlock { hash, zone_parent_hash, number, order, prime_parent_hash, region_parent_hash })
}

/// Parses a block object from a poll or point-lookup `result`.
///
/// # Errors
///
/// Returns [`ParseError`] if `hash`, `order` or `woHeader` is missing or malformed.
pub fn parse_block(value: &Value) -> Result<RawBlock, ParseError> {
    let wire = WireBlock::deserialize(value)?;
    block_from_wire(&wire)
}

/// Parses one uncle/workshare summary.
///
/// # Errors
///
/// Returns [`ParseError`] if `hash` or `parentHash` is missing or malformed, or if a present
/// `number` is not hex.
pub fn parse_summary(
    value: &Value,
    including_block_hash: Option<BlockHash>,
) -> Result<RawSummary, ParseError> {
    let wire = WireSummary::deserialize(value)?;
    Ok(RawSummary {
        hash: required_hash("hash", wire.hash.as_deref())?,
        parent_hash: required_hash("parentHash", wire.parent_hash.as_deref())?,
        number: optional_number("number", wire.number.as_deref())?,
        including_block_hash,
    })
}

fn parse_siblings(
    kind: &'static str,
    values: Option<&Vec<Value>>,
    including: BlockHash,
) -> Vec<RawSummary> {
    let Some(values) = values else { return Vec::new() };

    values
        .iter()
        .filter_map(|value| match parse_summary(value, Some(including)) {
            Ok(summary) => Some(summary),
            Err(e) => {
                debug!(kind = kind, including = %including, error = %e, "dropping malformed entry");
                None
            }
        })
        .collect()
}

/// Parses a poll `result`: the block plus the uncles and workshares it lists.
///
/// Malformed siblings are dropped individually; their including block hash is the polled
/// block's own hash.
///
/// # Errors
///
/// Returns [`ParseError`] only when the block itself is malformed.
pub fn parse_polled_block(value: &Value) -> Result<PolledBlock, ParseError> {
    let wire = WireBlock::deserialize(value)?;
    let block = block_from_wire(&wire)?;
    let uncles = parse_siblings("uncle", wire.uncles.as_ref(), block.hash);
    let workshares = parse_siblings("workshare", wire.workshares.as_ref(), block.hash);
    Ok(PolledBlock { block, uncles, workshares })
}

/// Parses a raw WebSocket text frame.
///
/// Returns `Ok(None)` for anything that is not a subscription push (confirmations, pongs,
/// unrelated responses).
///
/// # Errors
///
/// Returns [`ParseError`] if the frame is not JSON or the pushed workshare is malformed.
pub fn parse_push_message(text: &str) -> Result<Option<RawSummary>, ParseError> {
    let push: WirePush = serde_json::from_str(text)?;
    if push.method.as_deref() != Some(SUBSCRIPTION_METHOD) {
        return Ok(None);
    }

    let result = push
        .params
        .and_then(|params| params.result)
        .ok_or(ParseError::MissingField("params.result"))?;
    parse_summary(&result, None).map(Some)
}
