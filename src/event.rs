// src/event.rs
//! Raw API events to flat, display-safe summaries.
//!
//! Input is decoded once into [`RawShape`] / [`Action`]; everything after that
//! works on typed values. Shapes that do not fit degrade to
//! [`Action::Unrecognized`] instead of failing.

use crate::address;
use crate::amount::{format_units, units_from_json, TON_DECIMALS};
use crate::config::{self, Policy};
use crate::error::DecodeError;
use crate::models::{ActionKind, DecodedEvent, Direction, Warnings};
use crate::sanitizer;
use crate::threat;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use chrono::DateTime;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// Known message opcodes
pub const OPCODES: &[(u32, &str, ActionKind)] = &[
    (0x0000_0000, "Text Comment", ActionKind::TonTransfer),
    (0x0f8a_7ea5, "Jetton Transfer", ActionKind::JettonTransfer),
    (0x178d_4519, "Jetton Internal Transfer", ActionKind::JettonTransfer),
    (0x642b_7d07, "Jetton Mint", ActionKind::JettonMint),
    (0x5fcc_3d14, "NFT Transfer", ActionKind::NftTransfer),
    (0x0513_8d91, "NFT Ownership Assigned", ActionKind::NftTransfer),
    (0x2593_8561, "DEX Swap", ActionKind::Swap),
    (0xea06_185d, "DEX Swap", ActionKind::Swap),
    (0xd532_76db, "Excesses", ActionKind::TonTransfer),
];

pub fn opcode_info(op: u32) -> Option<(&'static str, ActionKind)> {
    OPCODES
        .iter()
        .find(|(code, _, _)| *code == op)
        .map(|(_, name, kind)| (*name, *kind))
}

/// Opcodes arrive as `"0x0f8a7ea5"`, bare hex, decimal strings or numbers.
pub fn parse_opcode(v: &Value) -> Option<u32> {
    match v {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => {
            let s = s.trim();
            let digits = s
                .strip_prefix("0x")
                .or_else(|| s.strip_prefix("0X"))
                .unwrap_or(s);
            if digits.is_empty() || digits.len() > 8 {
                return None;
            }
            let padded = format!("{:0>8}", digits);
            let bytes: [u8; 4] = hex::decode(padded).ok()?.try_into().ok()?;
            Some(u32::from_be_bytes(bytes))
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Boundary types
// ---------------------------------------------------------------------------

/// Field decoders that never fail. A null or mistyped field reads as absent
/// instead of discarding the whole action.
mod lenient {
    use super::Account;
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Bool(b) => b,
            Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
            _ => false,
        })
    }

    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    /// Unix seconds as a number or a numeric string
    pub fn seconds<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }

    pub fn list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Value>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Array(items) => items,
            _ => Vec::new(),
        })
    }

    pub fn object<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        Ok(serde_json::from_value(Value::deserialize(d)?).ok())
    }

    /// Parties come as `{"address": ..}` objects or bare address strings.
    pub fn account<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Account>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => Some(Account {
                address: Some(s),
                is_scam: false,
            }),
            other @ Value::Object(_) => serde_json::from_value(other).ok(),
            _ => None,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Account {
    #[serde(deserialize_with = "lenient::text")]
    address: Option<String>,
    #[serde(deserialize_with = "lenient::flag")]
    is_scam: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Jetton {
    #[serde(deserialize_with = "lenient::text")]
    symbol: Option<String>,
    decimals: Option<Value>,
    #[serde(deserialize_with = "lenient::text")]
    verification: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TonTransfer {
    #[serde(deserialize_with = "lenient::account")]
    sender: Option<Account>,
    #[serde(deserialize_with = "lenient::account")]
    recipient: Option<Account>,
    amount: Option<Value>,
    #[serde(deserialize_with = "lenient::text")]
    comment: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    payload: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JettonTransfer {
    #[serde(deserialize_with = "lenient::account")]
    sender: Option<Account>,
    #[serde(deserialize_with = "lenient::account")]
    recipient: Option<Account>,
    amount: Option<Value>,
    #[serde(deserialize_with = "lenient::text")]
    comment: Option<String>,
    #[serde(deserialize_with = "lenient::object")]
    jetton: Option<Jetton>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JettonMint {
    #[serde(deserialize_with = "lenient::account")]
    recipient: Option<Account>,
    amount: Option<Value>,
    #[serde(deserialize_with = "lenient::object")]
    jetton: Option<Jetton>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NftTransfer {
    #[serde(deserialize_with = "lenient::account")]
    sender: Option<Account>,
    #[serde(deserialize_with = "lenient::account")]
    recipient: Option<Account>,
    #[serde(deserialize_with = "lenient::text")]
    comment: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Swap {
    amount_in: Option<Value>,
    ton_in: Option<Value>,
    #[serde(deserialize_with = "lenient::account")]
    user_wallet: Option<Account>,
    #[serde(deserialize_with = "lenient::account")]
    router: Option<Account>,
    #[serde(deserialize_with = "lenient::object")]
    jetton_master_in: Option<Jetton>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ContractExec {
    #[serde(deserialize_with = "lenient::account")]
    executor: Option<Account>,
    #[serde(deserialize_with = "lenient::account")]
    contract: Option<Account>,
    ton_attached: Option<Value>,
    #[serde(deserialize_with = "lenient::text")]
    operation: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawEvent {
    #[serde(deserialize_with = "lenient::text")]
    event_id: Option<String>,
    #[serde(deserialize_with = "lenient::seconds")]
    timestamp: Option<i64>,
    #[serde(deserialize_with = "lenient::flag")]
    is_scam: bool,
    #[serde(deserialize_with = "lenient::list")]
    actions: Vec<Value>,
}

/// A single internal message, as returned by message/transaction endpoints
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawMessage {
    #[serde(deserialize_with = "lenient::text")]
    hash: Option<String>,
    op_code: Option<Value>,
    #[serde(deserialize_with = "lenient::account")]
    source: Option<Account>,
    #[serde(deserialize_with = "lenient::account")]
    destination: Option<Account>,
    value: Option<Value>,
    #[serde(deserialize_with = "lenient::text")]
    comment: Option<String>,
    decoded_body: Option<Value>,
    #[serde(deserialize_with = "lenient::seconds")]
    created_at: Option<i64>,
}

enum RawShape {
    Event(RawEvent),
    Message(RawMessage),
    Unknown,
}

enum Action {
    Ton(TonTransfer),
    Jetton(JettonTransfer),
    Mint(JettonMint),
    Nft(NftTransfer),
    Swap(Swap),
    Exec(ContractExec),
    Message(RawMessage),
    Unrecognized,
}

fn from_body<T: DeserializeOwned>(kind: &str, body: Value) -> Option<T> {
    match serde_json::from_value(body) {
        Ok(v) => Some(v),
        Err(err) => {
            debug!(%err, kind, "action body does not match its type");
            None
        }
    }
}

fn classify(raw: &Value) -> RawShape {
    if raw.get("actions").is_some() {
        return from_body("event", raw.clone()).map_or(RawShape::Unknown, RawShape::Event);
    }
    if raw.get("op_code").is_some() || raw.get("destination").is_some() {
        return from_body("message", raw.clone()).map_or(RawShape::Unknown, RawShape::Message);
    }
    RawShape::Unknown
}

fn decode_action(v: &Value) -> Action {
    let Some(kind) = v.get("type").and_then(Value::as_str) else {
        return Action::Unrecognized;
    };
    // the body is nested under a key named after the type
    let body = match v.get(kind) {
        Some(Value::Null) | None => Value::Object(Default::default()),
        Some(b) => b.clone(),
    };
    let decoded = match kind {
        "TonTransfer" => from_body(kind, body).map(Action::Ton),
        "JettonTransfer" => from_body(kind, body).map(Action::Jetton),
        "JettonMint" => from_body(kind, body).map(Action::Mint),
        "NftItemTransfer" => from_body(kind, body).map(Action::Nft),
        "JettonSwap" => from_body(kind, body).map(Action::Swap),
        "SmartContractExec" => from_body(kind, body).map(Action::Exec),
        _ => None,
    };
    decoded.unwrap_or(Action::Unrecognized)
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Party-and-value view shared by every action kind
struct Flat {
    kind: ActionKind,
    label: Option<String>,
    sender: Option<Account>,
    recipient: Option<Account>,
    amount: Option<u128>,
    decimals: u32,
    symbol: Option<String>,
    verification: Option<String>,
    comment: Option<Vec<u8>>,
    opcode: Option<u32>,
    warnings: Warnings,
}

impl Flat {
    fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            label: None,
            sender: None,
            recipient: None,
            amount: None,
            decimals: TON_DECIMALS,
            symbol: None,
            verification: None,
            comment: None,
            opcode: None,
            warnings: Warnings::default(),
        }
    }

    fn jetton(&mut self, jetton: Option<Jetton>) {
        let Some(j) = jetton else {
            return;
        };
        self.symbol = j.symbol;
        self.verification = j.verification;
        match j.decimals.as_ref().map(units_from_json) {
            Some(Some(d)) => match u32::try_from(d) {
                Ok(d) => self.decimals = d,
                Err(_) => self.warnings.push("unsupported jetton decimals"),
            },
            Some(None) => self.warnings.push("unsupported jetton decimals"),
            None => {}
        }
    }
}

/// Text comments sometimes arrive only as a base64 body (op 0 + UTF-8).
fn comment_from_payload(payload: &str, warnings: &mut Warnings) -> Option<Vec<u8>> {
    let payload = payload.trim();
    if payload.is_empty() {
        return None;
    }
    match STANDARD.decode(payload).or_else(|_| URL_SAFE.decode(payload)) {
        Ok(bytes) if bytes.starts_with(&[0u8; 4]) => Some(bytes[4..].to_vec()),
        Ok(bytes) => Some(bytes),
        Err(_) => {
            warnings.push("malformed payload");
            None
        }
    }
}

fn flatten(action: Action) -> Flat {
    match action {
        Action::Ton(t) => {
            let mut f = Flat::new(ActionKind::TonTransfer);
            f.sender = t.sender;
            f.recipient = t.recipient;
            f.amount = t.amount.as_ref().and_then(units_from_json);
            f.comment = match t.comment {
                Some(c) if !c.is_empty() => Some(c.into_bytes()),
                _ => t
                    .payload
                    .as_deref()
                    .and_then(|p| comment_from_payload(p, &mut f.warnings)),
            };
            f
        }
        Action::Jetton(j) => {
            let mut f = Flat::new(ActionKind::JettonTransfer);
            f.sender = j.sender;
            f.recipient = j.recipient;
            f.amount = j.amount.as_ref().and_then(units_from_json);
            f.comment = j.comment.map(String::into_bytes);
            f.jetton(j.jetton);
            f
        }
        Action::Mint(m) => {
            let mut f = Flat::new(ActionKind::JettonMint);
            f.recipient = m.recipient;
            f.amount = m.amount.as_ref().and_then(units_from_json);
            f.jetton(m.jetton);
            f
        }
        Action::Nft(n) => {
            let mut f = Flat::new(ActionKind::NftTransfer);
            f.sender = n.sender;
            f.recipient = n.recipient;
            f.comment = n.comment.map(String::into_bytes);
            f
        }
        Action::Swap(s) => {
            let mut f = Flat::new(ActionKind::Swap);
            f.sender = s.user_wallet;
            f.recipient = s.router;
            match s.ton_in.as_ref().and_then(units_from_json) {
                Some(ton) => f.amount = Some(ton),
                None => {
                    f.amount = s.amount_in.as_ref().and_then(units_from_json);
                    f.jetton(s.jetton_master_in);
                }
            }
            f
        }
        Action::Exec(e) => {
            let mut f = Flat::new(ActionKind::ContractCall);
            f.sender = e.executor;
            f.recipient = e.contract;
            f.amount = e.ton_attached.as_ref().and_then(units_from_json);
            if let Some(op) = e.operation {
                match parse_opcode(&Value::String(op.clone())) {
                    Some(code) => f.opcode = Some(code),
                    // operation is sometimes a name rather than a code
                    None => {
                        let name = sanitizer::sanitize(&op).cleaned;
                        f.label = Some(format!("{}: {}", ActionKind::ContractCall.label(), name));
                    }
                }
            }
            if let Some((name, _)) = f.opcode.and_then(opcode_info) {
                f.label = Some(format!("{}: {}", ActionKind::ContractCall.label(), name));
            }
            f
        }
        Action::Message(m) => {
            let opcode = m.op_code.as_ref().and_then(parse_opcode);
            let (label, kind) = match (m.op_code.as_ref(), opcode.and_then(opcode_info)) {
                // no body at all is a plain transfer
                (None, _) | (Some(Value::Null), _) => (None, ActionKind::TonTransfer),
                (_, Some((name, kind))) => (Some(name.to_string()), kind),
                (_, None) => (None, ActionKind::Unrecognized),
            };
            let mut f = Flat::new(kind);
            f.label = label;
            f.opcode = opcode;
            f.sender = m.source;
            f.recipient = m.destination;
            f.amount = m.value.as_ref().and_then(units_from_json);
            let body_text = m
                .decoded_body
                .as_ref()
                .and_then(|b| b.get("text"))
                .and_then(Value::as_str)
                .map(str::to_string);
            f.comment = m.comment.or(body_text).map(String::into_bytes);
            f
        }
        Action::Unrecognized => Flat::new(ActionKind::Unrecognized),
    }
}

fn address_of(a: &Option<Account>) -> Option<&str> {
    a.as_ref()
        .and_then(|a| a.address.as_deref())
        .filter(|s| !s.is_empty())
}

fn direction_for(flat: &Flat, viewer: Option<&str>) -> Option<Direction> {
    let viewer = viewer.filter(|v| !v.trim().is_empty())?;
    let is_sender = address_of(&flat.sender).is_some_and(|s| address::same(s, viewer));
    let is_recipient = address_of(&flat.recipient).is_some_and(|r| address::same(r, viewer));
    match (is_sender, is_recipient) {
        (true, true) => Some(Direction::SelfTransfer),
        (true, false) => Some(Direction::Out),
        (false, true) => Some(Direction::In),
        (false, false) => None,
    }
}

struct EventMeta {
    event_id: Option<String>,
    timestamp: Option<i64>,
    is_scam: bool,
}

fn finish(
    mut flat: Flat,
    direction: Option<Direction>,
    meta: &EventMeta,
    policy: &Policy,
) -> DecodedEvent {
    let mut warnings = std::mem::take(&mut flat.warnings);

    if meta.is_scam {
        warnings.push("event flagged as scam by indexer");
    }
    let scam_party = [&flat.sender, &flat.recipient]
        .into_iter()
        .flatten()
        .any(|a| a.is_scam);
    if scam_party {
        warnings.push("counterparty flagged as scam by indexer");
    }

    let counterparty = match direction {
        Some(Direction::Out) => address_of(&flat.recipient),
        Some(Direction::In) => address_of(&flat.sender),
        Some(Direction::SelfTransfer) => address_of(&flat.sender),
        None => None,
    }
    .map(|a| sanitizer::sanitize(a).cleaned);

    let asset = match flat.symbol.as_deref() {
        Some(sym) if !sym.trim().is_empty() => {
            let sanitized = sanitizer::sanitize(sym);
            warnings.extend(threat::review(&sanitized, policy, "token symbol"));
            let skel = sanitizer::skeleton(&sanitized.cleaned);
            if skel.contains("usdt") && skel.contains("ton") {
                warnings.push("token name imitates USDT");
            }
            sanitized.cleaned
        }
        _ if matches!(
            flat.kind,
            ActionKind::JettonTransfer | ActionKind::JettonMint
        ) =>
        {
            "JETTON".to_string()
        }
        _ if flat.kind == ActionKind::NftTransfer => "NFT".to_string(),
        _ => "TON".to_string(),
    };
    if flat.verification.as_deref() == Some("blacklist") {
        warnings.push("jetton is blacklisted");
    }

    let action = match (&flat.label, flat.kind) {
        (Some(label), _) => label.clone(),
        (None, ActionKind::JettonTransfer | ActionKind::JettonMint) if flat.symbol.is_some() => {
            let verb = if flat.kind == ActionKind::JettonMint {
                "Mint"
            } else {
                "Transfer"
            };
            format!("{} {}", asset, verb)
        }
        (None, kind) => kind.label().to_string(),
    };

    let amount = flat.amount.and_then(|units| {
        let rendered = format_units(units, flat.decimals);
        if rendered.is_none() {
            warnings.push("unsupported jetton decimals");
        }
        rendered
    });

    let comment = match &flat.comment {
        Some(bytes) => {
            let sanitized = sanitizer::sanitize_bytes(bytes);
            warnings.extend(threat::review(&sanitized, policy, "comment"));
            sanitized.cleaned
        }
        None => String::new(),
    };

    let timestamp = meta
        .timestamp
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|ts| ts.to_rfc3339());

    DecodedEvent {
        kind: flat.kind,
        action,
        amount,
        asset,
        direction,
        counterparty,
        comment,
        opcode: flat.opcode.map(|op| format!("0x{:08x}", op)),
        event_id: meta.event_id.as_deref().map(|id| sanitizer::sanitize(id).cleaned),
        timestamp,
        warning: warnings.finish(),
    }
}

fn unrecognized(meta: &EventMeta, policy: &Policy) -> DecodedEvent {
    finish(Flat::new(ActionKind::Unrecognized), None, meta, policy)
}

/// Every action of the event, one record each.
pub fn parse_event_actions_with(
    raw: &Value,
    viewer: Option<&str>,
    policy: &Policy,
) -> Vec<DecodedEvent> {
    match classify(raw) {
        RawShape::Event(ev) => {
            let meta = EventMeta {
                event_id: ev.event_id,
                timestamp: ev.timestamp,
                is_scam: ev.is_scam,
            };
            if ev.actions.is_empty() {
                return vec![unrecognized(&meta, policy)];
            }
            ev.actions
                .iter()
                .map(|a| {
                    let flat = flatten(decode_action(a));
                    let direction = direction_for(&flat, viewer);
                    finish(flat, direction, &meta, policy)
                })
                .collect()
        }
        RawShape::Message(msg) => {
            let meta = EventMeta {
                event_id: msg.hash.clone(),
                timestamp: msg.created_at,
                is_scam: false,
            };
            let flat = flatten(Action::Message(msg));
            let direction = direction_for(&flat, viewer);
            vec![finish(flat, direction, &meta, policy)]
        }
        RawShape::Unknown => {
            debug!("event shape not recognised");
            let meta = EventMeta {
                event_id: None,
                timestamp: None,
                is_scam: false,
            };
            vec![unrecognized(&meta, policy)]
        }
    }
}

pub fn parse_event_actions(raw: &Value, viewer: Option<&str>) -> Vec<DecodedEvent> {
    parse_event_actions_with(raw, viewer, config::policy())
}

/// Summary of one event: the first action involving the viewer, else the first action.
pub fn parse_event_with(raw: &Value, viewer: Option<&str>, policy: &Policy) -> DecodedEvent {
    let mut all = parse_event_actions_with(raw, viewer, policy);
    let pick = all.iter().position(|e| e.direction.is_some()).unwrap_or(0);
    // never empty: every shape yields at least one record
    all.swap_remove(pick)
}

pub fn parse_event(raw: &Value, viewer: Option<&str>) -> DecodedEvent {
    parse_event_with(raw, viewer, config::policy())
}

/// Parse event JSON text; only text that is not JSON is an error.
pub fn parse_event_json(text: &str, viewer: Option<&str>) -> Result<DecodedEvent, DecodeError> {
    let raw: Value = serde_json::from_str(text)?;
    Ok(parse_event(&raw, viewer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    const ALICE: &str = "0:f814fabe3d10e27b240a922cc54d1b520f2b9c508aab8f4bffcd7266a9a0e9eb";
    const ALICE_FRIENDLY: &str = "EQD4FPq-PRDieyQKkizFTRtSDyucUIqrj0v_zXJmqaDp6_0t";
    const BOB: &str = "0:83dfd552e63729b472fcbcc8c45ebcc6691702558b68ec7527e1ba403a0f31a8";

    fn parse(raw: &Value, viewer: Option<&str>) -> DecodedEvent {
        parse_event_with(raw, viewer, &Policy::default())
    }

    fn ton_transfer(from: &str, to: &str, amount: u64, comment: Option<&str>) -> Value {
        json!({
            "event_id": "abc123",
            "timestamp": 1700000000,
            "is_scam": false,
            "actions": [{
                "type": "TonTransfer",
                "TonTransfer": {
                    "sender": {"address": from, "is_scam": false},
                    "recipient": {"address": to},
                    "amount": amount,
                    "comment": comment,
                }
            }]
        })
    }

    #[test]
    fn outgoing_ton_transfer() {
        let ev = parse(&ton_transfer(ALICE, BOB, 500_000_000, Some("Thanks for the pizza")), Some(ALICE));
        assert_eq!(ev.kind, ActionKind::TonTransfer);
        assert_eq!(ev.action, "TON Transfer");
        assert_eq!(ev.amount.as_deref(), Some("0.5"));
        assert_eq!(ev.asset, "TON");
        assert_eq!(ev.direction, Some(Direction::Out));
        assert_eq!(ev.counterparty.as_deref(), Some(BOB));
        assert_eq!(ev.comment, "Thanks for the pizza");
        assert_eq!(ev.timestamp.as_deref(), Some("2023-11-14T22:13:20+00:00"));
        assert_eq!(ev.warning, None);
    }

    #[test]
    fn incoming_and_self_directions() {
        let ev = parse(&ton_transfer(BOB, ALICE, 1_000_000_000, None), Some(ALICE));
        assert_eq!(ev.direction, Some(Direction::In));
        assert_eq!(ev.counterparty.as_deref(), Some(BOB));
        assert_eq!(ev.amount.as_deref(), Some("1"));

        let ev = parse(&ton_transfer(ALICE, ALICE, 1, None), Some(ALICE));
        assert_eq!(ev.direction, Some(Direction::SelfTransfer));
    }

    #[test]
    fn friendly_viewer_matches_raw_party() {
        let ev = parse(&ton_transfer(ALICE, BOB, 1, None), Some(ALICE_FRIENDLY));
        assert_eq!(ev.direction, Some(Direction::Out));
    }

    #[test]
    fn unrelated_viewer_has_no_direction() {
        let ev = parse(&ton_transfer(ALICE, BOB, 1, None), Some("EQ_SOMEONE_ELSE"));
        assert_eq!(ev.direction, None);
        assert_eq!(ev.counterparty, None);
    }

    #[test]
    fn comment_link_is_defanged_and_flagged() {
        let ev = parse(
            &ton_transfer(BOB, ALICE, 1, Some("claim your airdrop at https://ton-gift.site")),
            Some(ALICE),
        );
        assert!(ev.comment.contains("hxxps://ton-gift[.]site"));
        let w = ev.warning.unwrap();
        assert!(w.contains("hidden link in comment"));
        assert!(w.contains("likely scam"));
    }

    #[test]
    fn base64_payload_comment() {
        // op 0 followed by "hi"
        let raw = json!({"actions": [{"type": "TonTransfer", "TonTransfer": {
            "sender": {"address": BOB}, "recipient": {"address": ALICE},
            "amount": 1, "payload": "AAAAAGhp"
        }}]});
        assert_eq!(parse(&raw, Some(ALICE)).comment, "hi");
    }

    #[test]
    fn fake_gift_jetton() {
        let raw = json!({"actions": [{"type": "JettonTransfer", "JettonTransfer": {
            "sender": {"address": BOB, "is_scam": true},
            "recipient": {"address": ALICE},
            "amount": "1000000000",
            "jetton": {"symbol": "FREE-GIFT", "decimals": 9}
        }}]});
        let ev = parse(&raw, Some(ALICE));
        assert_eq!(ev.kind, ActionKind::JettonTransfer);
        assert_eq!(ev.action, "FREE-GIFT Transfer");
        assert_eq!(ev.asset, "FREE-GIFT");
        assert_eq!(ev.amount.as_deref(), Some("1"));
        assert_eq!(ev.direction, Some(Direction::In));
        let w = ev.warning.unwrap();
        assert!(w.contains("counterparty flagged as scam"));
        assert!(w.contains("caution"));
    }

    #[test]
    fn usdt_imitation_and_decimals() {
        let raw = json!({"actions": [{"type": "JettonTransfer", "JettonTransfer": {
            "sender": {"address": BOB}, "recipient": {"address": ALICE},
            "amount": "2500000", "jetton": {"symbol": "USDT-TON", "decimals": "6"}
        }}]});
        let ev = parse(&raw, Some(ALICE));
        assert_eq!(ev.amount.as_deref(), Some("2.5"));
        assert!(ev.warning.unwrap().contains("imitates USDT"));
    }

    #[test]
    fn nft_mint_and_swap_kinds() {
        let raw = json!({"actions": [
            {"type": "NftItemTransfer", "NftItemTransfer": {"sender": {"address": BOB}, "recipient": {"address": ALICE}, "nft": "0:11"}},
            {"type": "JettonMint", "JettonMint": {"recipient": {"address": ALICE}, "amount": "5", "jetton": {"symbol": "GEM", "decimals": 0}}},
            {"type": "JettonSwap", "JettonSwap": {"user_wallet": {"address": ALICE}, "router": {"address": BOB}, "ton_in": 2000000000}}
        ]});
        let all = parse_event_actions_with(&raw, Some(ALICE), &Policy::default());
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].kind, ActionKind::NftTransfer);
        assert_eq!(all[0].asset, "NFT");
        assert_eq!(all[0].amount, None);
        assert_eq!(all[1].action, "GEM Mint");
        assert_eq!(all[1].amount.as_deref(), Some("5"));
        assert_eq!(all[1].direction, Some(Direction::In));
        assert_eq!(all[2].kind, ActionKind::Swap);
        assert_eq!(all[2].amount.as_deref(), Some("2"));
        assert_eq!(all[2].direction, Some(Direction::Out));
    }

    #[test]
    fn contract_call_with_known_opcode() {
        let raw = json!({"actions": [{"type": "SmartContractExec", "SmartContractExec": {
            "executor": {"address": ALICE}, "contract": {"address": BOB},
            "ton_attached": 50000000, "operation": "0x0f8a7ea5"
        }}]});
        let ev = parse(&raw, Some(ALICE));
        assert_eq!(ev.kind, ActionKind::ContractCall);
        assert_eq!(ev.action, "Contract Call: Jetton Transfer");
        assert_eq!(ev.opcode.as_deref(), Some("0x0f8a7ea5"));
        assert_eq!(ev.amount.as_deref(), Some("0.05"));
    }

    #[test]
    fn unknown_action_type_is_generic() {
        let raw = json!({"actions": [{"type": "AuctionBid", "AuctionBid": {"amount": 1}}]});
        let ev = parse(&raw, Some(ALICE));
        assert_eq!(ev.kind, ActionKind::Unrecognized);
        assert_eq!(ev.action, "Contract interaction");
    }

    #[test]
    fn mistyped_body_degrades() {
        let raw = json!({"actions": [{"type": "TonTransfer", "TonTransfer": "oops"}]});
        assert_eq!(parse(&raw, None).kind, ActionKind::Unrecognized);
    }

    #[test]
    fn mistyped_party_is_dropped_not_the_action() {
        let raw = json!({"actions": [{"type": "TonTransfer", "TonTransfer": {
            "sender": 42, "recipient": {"address": ALICE}, "amount": 5
        }}]});
        let ev = parse(&raw, Some(ALICE));
        assert_eq!(ev.kind, ActionKind::TonTransfer);
        assert_eq!(ev.direction, Some(Direction::In));
        assert_eq!(ev.counterparty, None);
        assert_eq!(ev.amount.as_deref(), Some("0.000000005"));
    }

    #[rstest]
    #[case("/is_scam", json!(null))]
    #[case("/actions/0/TonTransfer/sender/is_scam", json!(null))]
    #[case("/actions/0/TonTransfer/comment", json!(null))]
    #[case("/timestamp", json!("1700000000"))]
    #[case("/timestamp", json!(null))]
    #[case("/event_id", json!(5))]
    #[case("/event_id", json!({"nested": true}))]
    fn odd_metadata_keeps_the_transfer(#[case] pointer: &str, #[case] value: Value) {
        let mut raw = ton_transfer(BOB, ALICE, 1_000_000_000, Some("hi"));
        *raw.pointer_mut(pointer).unwrap() = value;
        let ev = parse(&raw, Some(ALICE));
        assert_eq!(ev.kind, ActionKind::TonTransfer);
        assert_eq!(ev.amount.as_deref(), Some("1"));
        assert_eq!(ev.direction, Some(Direction::In));
        assert_eq!(ev.counterparty.as_deref(), Some(BOB));
    }

    #[test]
    fn lenient_metadata_values() {
        let mut raw = ton_transfer(BOB, ALICE, 1, None);
        raw["timestamp"] = json!("1700000000");
        raw["event_id"] = json!(5);
        let ev = parse(&raw, Some(ALICE));
        assert_eq!(ev.timestamp.as_deref(), Some("2023-11-14T22:13:20+00:00"));
        assert_eq!(ev.event_id.as_deref(), Some("5"));
    }

    #[test]
    fn missing_fields_never_crash() {
        for raw in [
            json!({}),
            json!(null),
            json!([1, 2]),
            json!({"actions": []}),
            json!({"actions": [{"type": "TonTransfer"}]}),
            json!({"actions": [{"type": "TonTransfer", "TonTransfer": null}]}),
        ] {
            let ev = parse(&raw, Some(ALICE));
            assert_eq!(ev.amount, None);
            assert_eq!(ev.direction, None);
        }
    }

    #[test]
    fn raw_message_by_opcode() {
        let raw = json!({
            "op_code": "0x5fcc3d14",
            "source": ALICE,
            "destination": {"address": BOB},
            "value": "100000000"
        });
        let ev = parse(&raw, Some(BOB));
        assert_eq!(ev.kind, ActionKind::NftTransfer);
        assert_eq!(ev.action, "NFT Transfer");
        assert_eq!(ev.direction, Some(Direction::In));
        assert_eq!(ev.amount.as_deref(), Some("0.1"));

        let plain = json!({"source": ALICE, "destination": BOB, "value": 1, "comment": "hey"});
        let ev = parse(&plain, Some(ALICE));
        assert_eq!(ev.kind, ActionKind::TonTransfer);
        assert_eq!(ev.comment, "hey");
    }

    #[test]
    fn indexer_scam_flag() {
        let mut raw = ton_transfer(BOB, ALICE, 1, None);
        raw["is_scam"] = json!(true);
        assert!(parse(&raw, Some(ALICE))
            .warning
            .unwrap()
            .contains("flagged as scam by indexer"));
    }

    #[test]
    fn opcode_forms() {
        assert_eq!(parse_opcode(&json!("0x0f8a7ea5")), Some(0x0f8a7ea5));
        assert_eq!(parse_opcode(&json!("f8a7ea5")), Some(0x0f8a7ea5));
        assert_eq!(parse_opcode(&json!(260734629)), Some(0x0f8a7ea5));
        assert_eq!(parse_opcode(&json!("0x1234567890")), None);
        assert_eq!(parse_opcode(&json!("zz")), None);
    }

    #[test]
    fn json_entry_point() {
        assert!(parse_event_json("{", None).is_err());
        let ev = parse_event_json(r#"{"actions": []}"#, None).unwrap();
        assert_eq!(ev.action, "Contract interaction");
    }
}
