//! License key generation.

use rand::RngCore;
use rand::rngs::OsRng;

const KEY_BYTES: usize = 16;
const GROUP_LEN: usize = 8;

/// Length of a generated key without a prefix: 32 hex chars plus 3 dashes.
pub const KEY_BODY_LEN: usize = KEY_BYTES * 2 + 3;

/// Generate a license key in the form `XXXXXXXX-XXXXXXXX-XXXXXXXX-XXXXXXXX`,
/// or `PREFIX-XXXXXXXX-...` when a non-empty prefix is given.
///
/// The body is 16 bytes from the OS CSPRNG, hex-encoded and upper-cased.
pub fn generate_license_key(prefix: Option<&str>) -> String {
    let mut bytes = [0u8; KEY_BYTES];
    OsRng.fill_bytes(&mut bytes);
    format_key(&bytes, prefix)
}

fn format_key(bytes: &[u8; KEY_BYTES], prefix: Option<&str>) -> String {
    let hex = hex::encode_upper(bytes);
    let body = hex
        .as_bytes()
        .chunks(GROUP_LEN)
        .map(|chunk| std::str::from_utf8(chunk).unwrap_or_default())
        .collect::<Vec<_>>()
        .join("-");

    match prefix.filter(|p| !p.is_empty()) {
        Some(prefix) => format!("{}-{}", prefix, body),
        None => body,
    }
}
