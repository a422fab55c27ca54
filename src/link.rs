// src/link.rs
//! Wallet deep links: `scheme://action/address?key=value&...`

use crate::address;
use crate::amount::parse_units;
use crate::config::{self, Policy};
use crate::error::DecodeError;
use crate::models::{DecodedLink, Warnings};
use crate::sanitizer;
use crate::threat;
use chrono::DateTime;
use percent_encoding::percent_decode;
use std::collections::HashSet;
use tracing::debug;
use url::Url;

const MALFORMED: &str = "malformed link";

/// A query component after bounded percent-decoding
struct Component {
    bytes: Vec<u8>,
    layered: bool,
}

impl Component {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Decode up to `max_decode_passes` times. Flags layering when more passes than
/// the threshold changed the value, or when it would still change after the bound.
fn decode_component(raw: &str, policy: &Policy) -> Component {
    let mut current = raw.replace('+', " ").into_bytes();
    let mut changed = 0;
    let mut stable = false;

    for _ in 0..policy.max_decode_passes {
        let next: Vec<u8> = percent_decode(&current).collect();
        if next == current {
            stable = true;
            break;
        }
        current = next;
        changed += 1;
    }
    if !stable {
        stable = percent_decode(&current).eq(current.iter().copied());
    }

    Component {
        layered: changed > policy.encoding_layer_threshold || !stable,
        bytes: current,
    }
}

fn malformed() -> DecodedLink {
    DecodedLink {
        warning: Some(MALFORMED.to_string()),
        ..DecodedLink::default()
    }
}

/// Returns (action, address segment, extra segments present).
fn split_target(url: &Url, policy: &Policy) -> Option<(String, String, bool)> {
    let mut segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();

    let action = match url.scheme() {
        "ton" | "tonkeeper" => url.host_str()?.to_ascii_lowercase(),
        "https" => {
            let host = url.host_str()?.to_ascii_lowercase();
            if !policy.wallet_hosts.iter().any(|h| *h == host) || segments.is_empty() {
                return None;
            }
            segments.remove(0).to_ascii_lowercase()
        }
        _ => return None,
    };
    if action.is_empty() {
        return None;
    }

    let address = segments.first()?.to_string();
    Some((action, address, segments.len() > 1))
}

/// Path text exactly as written, before the URL parser resolves `.`/`..`.
fn raw_path(link: &str) -> &str {
    let rest = link.split_once(':').map_or(link, |(_, r)| r);
    let rest = rest.strip_prefix("//").unwrap_or(rest);
    let rest = &rest[..rest.find(['?', '#']).unwrap_or(rest.len())];
    rest.find(['/', '\\']).map_or("", |i| &rest[i..])
}

fn has_dot_segments(path: &str) -> bool {
    path.split(['/', '\\']).any(|seg| {
        let seg = seg.to_ascii_lowercase().replace("%2e", ".");
        seg == "." || seg == ".."
    })
}

/// Parse a deep link under the process-wide policy.
pub fn parse_ton_link(raw: &str) -> DecodedLink {
    parse_ton_link_with(raw, config::policy())
}

/// Parse raw bytes; only non-UTF-8 input is an error.
pub fn parse_ton_link_bytes(raw: &[u8]) -> Result<DecodedLink, DecodeError> {
    let text = std::str::from_utf8(raw)?;
    Ok(parse_ton_link(text))
}

pub fn parse_ton_link_with(raw: &str, policy: &Policy) -> DecodedLink {
    let mut warnings = Warnings::default();

    let (visible, invisible, control) = sanitizer::strip_hidden(raw);
    let compact = visible.trim();
    if compact.is_empty() {
        return malformed();
    }

    let url = match Url::parse(compact) {
        Ok(url) => url,
        Err(err) => {
            debug!(%err, "not a URL");
            return malformed();
        }
    };
    let Some((action, target, extra_segments)) = split_target(&url, policy) else {
        debug!(scheme = url.scheme(), "unsupported link target");
        return malformed();
    };

    if invisible || control {
        warnings.push("hidden characters removed from link");
    }

    let mut link = DecodedLink {
        action,
        ..DecodedLink::default()
    };

    if address::is_valid(&target) {
        link.destination = Some(target);
    } else {
        warnings.push("invalid address format");
    }
    if extra_segments || has_dot_segments(raw_path(compact)) {
        warnings.push("non-standard URL structure");
    }
    if url.fragment().is_some() {
        warnings.push("fragment ignored");
    }

    let mut seen = HashSet::new();
    for pair in url.query().unwrap_or("").split('&').filter(|p| !p.is_empty()) {
        let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_component(raw_key, policy);
        let value = decode_component(raw_value, policy);
        if key.layered || value.layered {
            warnings.push("multiple encoding layers detected");
        }

        let key = key.text().to_ascii_lowercase();
        if !seen.insert(key.clone()) {
            warnings.push(format!("duplicate parameter: {}", sanitizer::sanitize(&key).cleaned));
        }

        match key.as_str() {
            "amount" => match parse_units(&value.text()) {
                Some(n) => link.amount = Some(n),
                None => {
                    link.amount = None;
                    warnings.push("invalid amount");
                }
            },
            "text" | "comment" => {
                let sanitized = sanitizer::sanitize_bytes(&value.bytes);
                warnings.extend(threat::review(&sanitized, policy, "comment"));
                link.comment = sanitized.cleaned;
            }
            "bin" | "init" => {
                link.has_payload = true;
                warnings.push("binary payload detected");
                let body = value.text();
                if threat::is_malformed_payload(body.trim(), 4) {
                    warnings.push("malformed payload");
                }
            }
            "jetton" => {
                let jetton = value.text();
                if address::is_valid(&jetton) {
                    link.jetton = Some(jetton);
                } else {
                    warnings.push("invalid jetton address");
                }
            }
            "exp" => {
                let expiry = value
                    .text()
                    .trim()
                    .parse::<i64>()
                    .ok()
                    .and_then(|secs| DateTime::from_timestamp(secs, 0));
                match expiry {
                    Some(ts) => link.expires_at = Some(ts.to_rfc3339()),
                    None => warnings.push("invalid expiry"),
                }
            }
            other => debug!(key = other, "ignoring unknown link parameter"),
        }
    }

    link.warning = warnings.finish();
    if let Some(w) = &link.warning {
        debug!(warning = %w, "link decoded with warnings");
    }
    link
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "EQD4FPq-PRDieyQKkizFTRtSDyucUIqrj0v_zXJmqaDp6_0t";

    fn parse(raw: &str) -> DecodedLink {
        parse_ton_link_with(raw, &Policy::default())
    }

    #[test]
    fn clean_transfer_has_no_warning() {
        let link = parse(&format!(
            "ton://transfer/{}?amount=1000000000&text=Thanks%20for%20the%20pizza",
            ADDR
        ));
        assert_eq!(link.action, "transfer");
        assert_eq!(link.destination.as_deref(), Some(ADDR));
        assert_eq!(link.amount, Some(1_000_000_000));
        assert_eq!(link.comment, "Thanks for the pizza");
        assert_eq!(link.warning, None);
    }

    #[test]
    fn plus_is_a_space() {
        let link = parse(&format!("ton://transfer/{}?text=hello+world", ADDR));
        assert_eq!(link.comment, "hello world");
        assert_eq!(link.warning, None);
    }

    #[test]
    fn double_encoded_scheme_is_caught() {
        let link = parse(&format!(
            "ton://transfer/{}?amount=500000000&text=h%2574tps://scam.site",
            ADDR
        ));
        assert_eq!(link.amount, Some(500_000_000));
        assert!(link.comment.contains("hxxps://scam[.]site"));
        let w = link.warning.unwrap();
        assert!(w.contains("multiple encoding layers detected"));
        assert!(w.contains("hidden link in comment"));
    }

    #[test]
    fn unstable_decoding_keeps_last_value() {
        // three layers, two passes allowed
        let link = parse(&format!("ton://transfer/{}?text=%252541", ADDR));
        assert_eq!(link.comment, "%41");
        assert!(link
            .warning
            .unwrap()
            .contains("multiple encoding layers detected"));
    }

    #[test]
    fn layer_threshold_is_configurable() {
        let policy = Policy {
            encoding_layer_threshold: 2,
            ..Policy::default()
        };
        let link = parse_ton_link_with(&format!("ton://transfer/{}?text=h%2574i", ADDR), &policy);
        assert_eq!(link.comment, "hti");
        assert_eq!(link.warning, None);
    }

    #[test]
    fn bad_address_keeps_other_fields() {
        let link = parse("ton://transfer/EQabc...?amount=5");
        assert_eq!(link.destination, None);
        assert_eq!(link.amount, Some(5));
        assert_eq!(link.warning.as_deref(), Some("invalid address format"));
    }

    #[test]
    fn negative_amount_is_dropped() {
        let link = parse(&format!("ton://transfer/{}?amount=-5", ADDR));
        assert_eq!(link.amount, None);
        assert_eq!(link.warning.as_deref(), Some("invalid amount"));
    }

    #[test]
    fn malformed_inputs() {
        for raw in ["not-a-link", "", "ton://transfer", "ton:transfer/x", "ftp://transfer/x"] {
            let link = parse(raw);
            assert_eq!(link.destination, None, "{}", raw);
            assert_eq!(link.amount, None);
            assert_eq!(link.comment, "");
            assert_eq!(link.warning.as_deref(), Some("malformed link"));
        }
    }

    #[test]
    fn tonkeeper_web_link() {
        let link = parse(&format!("https://app.tonkeeper.com/transfer/{}?amount=1", ADDR));
        assert_eq!(link.action, "transfer");
        assert_eq!(link.destination.as_deref(), Some(ADDR));
        assert_eq!(link.warning, None);
    }

    #[test]
    fn unknown_https_host_is_malformed() {
        let link = parse(&format!("https://evil.example/transfer/{}", ADDR));
        assert_eq!(link.warning.as_deref(), Some("malformed link"));
    }

    #[test]
    fn payload_jetton_and_expiry() {
        let link = parse(&format!(
            "ton://transfer/{a}?bin=te6ccgEBAQE...&jetton={a}&exp=1700000000",
            a = ADDR
        ));
        assert!(link.has_payload);
        assert_eq!(link.jetton.as_deref(), Some(ADDR));
        assert_eq!(link.expires_at.as_deref(), Some("2023-11-14T22:13:20+00:00"));
        let w = link.warning.unwrap();
        assert!(w.contains("binary payload detected"));
        assert!(w.contains("malformed payload"));
    }

    #[test]
    fn dot_segments_are_reported() {
        for raw in [
            format!("ton://transfer/x/../{}?amount=1", ADDR),
            format!("ton://transfer/./{}?amount=1", ADDR),
        ] {
            let link = parse(&raw);
            assert_eq!(link.destination.as_deref(), Some(ADDR), "{}", raw);
            assert_eq!(link.warning.as_deref(), Some("non-standard URL structure"));
        }
    }

    #[test]
    fn extra_segment_is_reported() {
        let link = parse(&format!("ton://transfer/{}/more?amount=1", ADDR));
        assert_eq!(link.destination.as_deref(), Some(ADDR));
        assert_eq!(link.warning.as_deref(), Some("non-standard URL structure"));
    }

    #[test]
    fn fragment_is_reported() {
        let link = parse(&format!("ton://transfer/{}?amount=1#text=https://evil.com", ADDR));
        assert_eq!(link.amount, Some(1));
        assert_eq!(link.comment, "");
        assert_eq!(link.warning.as_deref(), Some("fragment ignored"));
    }

    #[test]
    fn encoded_dot_segment_counts() {
        assert!(has_dot_segments("/x/%2E%2e/y"));
        assert!(!has_dot_segments("/EQabc.../y"));
    }

    #[test]
    fn raw_path_stops_at_query() {
        assert_eq!(raw_path("ton://transfer/a/../b?x=/../"), "/a/../b");
        assert_eq!(raw_path("https://app.tonkeeper.com/transfer/a#/.."), "/transfer/a");
        assert_eq!(raw_path("ton://transfer"), "");
    }

    #[test]
    fn zero_width_in_link_is_reported() {
        let link = parse(&format!("ton://transfer/{}\u{200B}?amount=1", ADDR));
        assert_eq!(link.destination.as_deref(), Some(ADDR));
        assert_eq!(
            link.warning.as_deref(),
            Some("hidden characters removed from link")
        );
    }

    #[test]
    fn non_utf8_comment_degrades() {
        let link = parse(&format!("ton://transfer/{}?text=%FF%FE", ADDR));
        assert_eq!(link.comment, "");
        assert_eq!(link.warning.as_deref(), Some("undecodable comment"));
    }

    #[test]
    fn non_utf8_raw_is_an_error() {
        assert!(parse_ton_link_bytes(&[0x74, 0x6f, 0x6e, 0xff]).is_err());
        assert!(parse_ton_link_bytes(b"not-a-link").is_ok());
    }
}
