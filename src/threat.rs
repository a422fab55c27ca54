// src/threat.rs
//! Phishing heuristics over sanitized text. Checks and verdicts are tables;
//! `evaluate` and `assess_with` are the only code that walks them.

use crate::address::ADDRESS_TOKEN_RE;
use crate::config::{self, Policy};
use crate::sanitizer::{self, SanitizationResult, SanitizeFlag};
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatTag {
    TriggerWord,
    Link,
    AddressToken,
    Homograph,
    MalformedPayload,
}

struct Subject<'a> {
    skeleton: String,
    sanitized: &'a SanitizationResult,
    policy: &'a Policy,
}

struct Rule {
    tag: ThreatTag,
    test: fn(&Subject<'_>) -> bool,
}

const RULES: &[Rule] = &[
    Rule {
        tag: ThreatTag::TriggerWord,
        test: |s: &Subject<'_>| s.policy.scam_keywords.iter().any(|k| s.skeleton.contains(k.as_str())),
    },
    Rule {
        tag: ThreatTag::Link,
        test: |s: &Subject<'_>| !s.sanitized.links.is_empty(),
    },
    Rule {
        tag: ThreatTag::AddressToken,
        test: |s: &Subject<'_>| ADDRESS_TOKEN_RE.is_match(&s.sanitized.cleaned),
    },
    Rule {
        tag: ThreatTag::Homograph,
        test: |s: &Subject<'_>| s.sanitized.has(SanitizeFlag::Homograph),
    },
    Rule {
        tag: ThreatTag::MalformedPayload,
        test: |s: &Subject<'_>| {
            s.sanitized
                .cleaned
                .split_whitespace()
                .any(|t| is_malformed_payload(t, s.policy.min_payload_len))
        },
    },
];

/// Verdicts are tried in order; within a group only the first match is reported.
struct Verdict {
    group: u8,
    requires: &'static [ThreatTag],
    message: &'static str,
}

const VERDICTS: &[Verdict] = &[
    Verdict {
        group: 0,
        requires: &[ThreatTag::TriggerWord, ThreatTag::Link],
        message: "likely scam: giveaway wording with a hidden link",
    },
    Verdict {
        group: 0,
        requires: &[ThreatTag::TriggerWord, ThreatTag::AddressToken],
        message: "likely scam: giveaway wording with a wallet address",
    },
    Verdict {
        group: 0,
        requires: &[ThreatTag::TriggerWord],
        message: "caution: wording commonly used in scams",
    },
    Verdict {
        group: 1,
        requires: &[ThreatTag::Homograph],
        message: "look-alike characters in link",
    },
    Verdict {
        group: 2,
        requires: &[ThreatTag::MalformedPayload],
        message: "malformed payload",
    },
];

fn is_b64_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'-' | b'_')
}

/// Base64-looking token whose framing or content does not decode.
pub fn is_malformed_payload(token: &str, min_len: usize) -> bool {
    let token = token.trim_end_matches(['.', ',', ';', ':', '!', '?', ')']);
    let body_len = token.bytes().take_while(|&b| is_b64_byte(b)).count();
    if body_len < min_len {
        return false;
    }

    let body = &token[..body_len];
    let looks_encoded = body.bytes().any(|b| b.is_ascii_uppercase())
        && body.bytes().any(|b| b.is_ascii_lowercase())
        && body.bytes().any(|b| b.is_ascii_digit());
    if !looks_encoded {
        return false;
    }

    let rest = &token[body_len..];
    let pad = rest.bytes().take_while(|&b| b == b'=').count();
    if pad > 2 || pad < rest.len() {
        // junk after the payload or after its padding
        return true;
    }

    let framed = &token[..body_len + pad];
    if framed.len() % 4 != 0 {
        return true;
    }
    STANDARD.decode(framed).is_err() && URL_SAFE.decode(framed).is_err()
}

/// Run every rule against sanitized text.
pub fn evaluate(sanitized: &SanitizationResult, policy: &Policy) -> BTreeSet<ThreatTag> {
    let subject = Subject {
        skeleton: sanitizer::skeleton(&sanitized.cleaned),
        sanitized,
        policy,
    };
    RULES
        .iter()
        .filter(|r| (r.test)(&subject))
        .map(|r| r.tag)
        .collect()
}

fn verdicts(tags: &BTreeSet<ThreatTag>) -> Vec<String> {
    let mut seen_groups = BTreeSet::new();
    let mut out = Vec::new();
    for v in VERDICTS {
        if seen_groups.contains(&v.group) {
            continue;
        }
        if v.requires.iter().all(|t| tags.contains(t)) {
            seen_groups.insert(v.group);
            out.push(v.message.to_string());
        }
    }
    out
}

/// Warning for already-sanitized text, or `None` when nothing fired.
pub fn assess_with(sanitized: &SanitizationResult, policy: &Policy) -> Option<String> {
    let found = verdicts(&evaluate(sanitized, policy));
    if found.is_empty() {
        None
    } else {
        Some(found.join("; "))
    }
}

/// Warning for raw text under the process-wide policy.
pub fn assess(text: &str) -> Option<String> {
    assess_with(&sanitizer::sanitize(text), config::policy())
}

/// Every warning a sanitized free-text field deserves, in display order.
pub(crate) fn review(sanitized: &SanitizationResult, policy: &Policy, field: &str) -> Vec<String> {
    let mut out = Vec::new();
    if sanitized.has(SanitizeFlag::DecodeError) {
        out.push(format!("undecodable {}", field));
    }
    if sanitized.has(SanitizeFlag::InvisibleStripped) {
        out.push(format!("hidden characters removed from {}", field));
    }
    if !sanitized.links.is_empty() {
        out.push(format!("hidden link in {}", field));
    }
    out.extend(verdicts(&evaluate(sanitized, policy)));
    out
}
