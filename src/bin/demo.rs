// Replays two reference cases: a double-encoded phishing link and a fake gift jetton.
use serde_json::json;
use ton_semantic_decoder::{parse_event, parse_ton_link};
use tracing::info;

const VIEWER: &str = "EQD4FPq-PRDieyQKkizFTRtSDyucUIqrj0v_zXJmqaDp6_0t";
const SENDER: &str = "0:83dfd552e63729b472fcbcc8c45ebcc6691702558b68ec7527e1ba403a0f31a8";

fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let raw_link = format!(
        "ton://transfer/{}?amount=500000000&text=h%2574tps://scam.site",
        VIEWER
    );
    info!("decoding suspicious link");
    let link = parse_ton_link(&raw_link);
    println!("{}", serde_json::to_string_pretty(&link)?);

    let gift = json!({
        "event_id": "demo-gift",
        "timestamp": 1700000000,
        "actions": [{
            "type": "JettonTransfer",
            "JettonTransfer": {
                "sender": {"address": SENDER, "is_scam": true},
                "recipient": {"address": VIEWER},
                "amount": "1000000000",
                "comment": "Claim your reward at ton-bonus.site",
                "jetton": {"symbol": "FREE-GIFT", "decimals": 9}
            }
        }]
    });
    info!("decoding fake gift jetton");
    let ev = parse_event(&gift, Some(VIEWER));
    println!("{}", serde_json::to_string_pretty(&ev)?);

    Ok(())
}
