// src/address.rs
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use regex::Regex;
use std::sync::LazyLock;

/// User-friendly form: 36 bytes base64url encoded
static FRIENDLY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{48}$").expect("friendly address pattern"));

/// Raw form: workchain, colon, 32-byte account id in hex
static RAW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?[0-9]{1,3}:[0-9a-fA-F]{64}$").expect("raw address pattern"));

/// Address-looking tokens inside free text (either form)
pub static ADDRESS_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^A-Za-z0-9_\-+/])(?:[A-Za-z0-9_-]{48}|-?[0-9]{1,3}:[0-9a-fA-F]{64})(?:$|[^A-Za-z0-9_\-+/=])")
        .expect("address token pattern")
});

/// Strict base64url user-friendly shape, as used in deep links.
pub fn is_friendly(s: &str) -> bool {
    FRIENDLY_RE.is_match(s)
}

pub fn is_raw(s: &str) -> bool {
    RAW_RE.is_match(s)
}

/// Either accepted shape.
pub fn is_valid(s: &str) -> bool {
    is_friendly(s) || is_raw(s)
}

/// Canonical `wc:hex` form used to compare addresses written differently.
/// The CRC16 tag of friendly addresses is not verified.
pub fn canonical(s: &str) -> Option<String> {
    let s = s.trim();
    if is_raw(s) {
        let (wc, hash) = s.split_once(':')?;
        let wc: i32 = wc.parse().ok()?;
        return Some(format!("{}:{}", wc, hash.to_ascii_lowercase()));
    }

    // API payloads sometimes carry the standard alphabet
    if s.len() != 48 {
        return None;
    }
    let bytes = URL_SAFE.decode(s).or_else(|_| STANDARD.decode(s)).ok()?;
    if bytes.len() != 36 {
        return None;
    }
    let wc = bytes[1] as i8;
    Some(format!("{}:{}", wc, hex::encode(&bytes[2..34])))
}

/// True when both strings denote the same account.
pub fn same(a: &str, b: &str) -> bool {
    match (canonical(a), canonical(b)) {
        (Some(x), Some(y)) => x == y,
        _ => !a.is_empty() && a.trim() == b.trim(),
    }
}
