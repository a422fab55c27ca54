// src/models.rs
use serde::Serialize;

/// A wallet deep link after parsing and hardening
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecodedLink {
    pub action: String,
    pub destination: Option<String>,
    pub amount: Option<u128>, // nanoton
    pub comment: String,      // sanitized
    pub jetton: Option<String>,
    pub has_payload: bool,
    pub expires_at: Option<String>, // RFC3339
    pub warning: Option<String>,
}

/// Direction of value relative to the viewing wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Direction {
    #[serde(rename = "in")]
    In,
    #[serde(rename = "out")]
    Out,
    #[serde(rename = "self")]
    SelfTransfer,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
            Direction::SelfTransfer => "self",
        }
    }
}

/// Closed set of recognised action kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    TonTransfer,
    NftTransfer,
    JettonTransfer,
    JettonMint,
    ContractCall,
    Swap,
    Unrecognized,
}

impl ActionKind {
    /// Human label shown to users
    pub fn label(self) -> &'static str {
        match self {
            ActionKind::TonTransfer => "TON Transfer",
            ActionKind::NftTransfer => "NFT Transfer",
            ActionKind::JettonTransfer => "Jetton Transfer",
            ActionKind::JettonMint => "Jetton Mint",
            ActionKind::ContractCall => "Contract Call",
            ActionKind::Swap => "Swap",
            ActionKind::Unrecognized => "Contract interaction",
        }
    }
}

/// One event (or one action of an event) flattened for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedEvent {
    pub kind: ActionKind,
    pub action: String,
    pub amount: Option<String>, // decimal string, never float
    pub asset: String,
    pub direction: Option<Direction>,
    pub counterparty: Option<String>,
    pub comment: String, // sanitized
    pub opcode: Option<String>,
    pub event_id: Option<String>,
    pub timestamp: Option<String>, // RFC3339
    pub warning: Option<String>,
}

/// Collects warnings in order and renders them as one string.
#[derive(Debug, Default)]
pub(crate) struct Warnings(Vec<String>);

impl Warnings {
    pub fn push(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        if !self.0.contains(&msg) {
            self.0.push(msg);
        }
    }

    pub fn extend(&mut self, msgs: impl IntoIterator<Item = String>) {
        for m in msgs {
            self.push(m);
        }
    }

    pub fn finish(self) -> Option<String> {
        if self.0.is_empty() {
            None
        } else {
            Some(self.0.join("; "))
        }
    }
}
