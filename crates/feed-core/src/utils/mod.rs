//! Small parsing helpers shared by the wire parser and the hash type.

pub mod hex;

pub use hex::{parse_hex_array, parse_hex_u64};
