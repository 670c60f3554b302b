/// Parses a hex string to `u64` with radix 16.
///
/// Accepts strings with or without "0x" prefix. Returns `None` if empty, invalid hex or
/// overflow. A bare `"0x"` is rejected rather than read as zero, since zero is a real height.
#[must_use]
pub fn parse_hex_u64(hex: &str) -> Option<u64> {
    let hex_str = hex.strip_prefix("0x").unwrap_or(hex);
    if hex_str.is_empty() {
        return None;
    }
    u64::from_str_radix(hex_str, 16).ok()
}

/// Parses a hex string to a fixed-size byte array.
///
/// Accepts strings with or without "0x" prefix. Returns `None` if length doesn't
/// match `N * 2` characters or contains invalid hex.
#[must_use]
pub fn parse_hex_array<const N: usize>(hex: &str) -> Option<[u8; N]> {
    let hex_str = hex.strip_prefix("0x").unwrap_or(hex);
    if hex_str.len() != N * 2 {
        return None;
    }

    let mut array = [0u8; N];
    ::hex::decode_to_slice(hex_str, &mut array).ok()?;
    Some(array)
}
