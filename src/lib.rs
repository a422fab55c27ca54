//! Decodes TON wallet deep links and blockchain events into display-safe
//! summaries, flagging hidden characters, layered encodings and scam wording.

pub mod address;
pub mod aggregator;
pub mod amount;
pub mod config;
pub mod error;
pub mod event;
pub mod link;
pub mod models;
pub mod sanitizer;
pub mod threat;

pub use aggregator::net_flows;
pub use error::DecodeError;
pub use event::{parse_event, parse_event_actions, parse_event_json};
pub use link::{parse_ton_link, parse_ton_link_bytes};
pub use models::{ActionKind, DecodedEvent, DecodedLink, Direction};
pub use sanitizer::{sanitize, SanitizationResult, SanitizeFlag};
pub use threat::assess;
