// src/aggregator.rs
use crate::models::{DecodedEvent, Direction};
use rust_decimal::prelude::FromStr;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Net amount per asset from the viewer's side: incoming adds, outgoing subtracts.
/// Self transfers and events without a direction do not move the balance.
pub fn net_flows(events: &[DecodedEvent]) -> BTreeMap<String, Decimal> {
    let mut flows: BTreeMap<String, Decimal> = BTreeMap::new();

    for ev in events {
        let sign = match ev.direction {
            Some(Direction::In) => Decimal::ONE,
            Some(Direction::Out) => Decimal::NEGATIVE_ONE,
            Some(Direction::SelfTransfer) | None => continue,
        };
        let Some(amount) = ev.amount.as_deref() else {
            continue;
        };

        // Decimal holds 28 significant digits; larger raw amounts are skipped
        let value = match Decimal::from_str(amount) {
            Ok(v) => v,
            Err(err) => {
                warn!(%err, amount, asset = %ev.asset, "skipping amount outside decimal range");
                continue;
            }
        };

        let entry = flows.entry(ev.asset.clone()).or_insert(Decimal::ZERO);
        match entry.checked_add(sign * value) {
            Some(net) => *entry = net,
            None => warn!(asset = %ev.asset, "net flow overflow, entry skipped"),
        }
    }

    for (asset, net) in &flows {
        debug!("net flow for {} => {}", asset, net);
    }
    flows
}
