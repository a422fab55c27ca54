use clap::{Parser, Subcommand};
use eyre::WrapErr;
use serde::Serialize;
use serde_json::Value;
use std::io::Read;
use ton_semantic_decoder::{config, event, link, net_flows, sanitizer, threat};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ton-decoder", about = "Decode TON deep links and events into safe summaries")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a ton:// or wallet https deep link
    Link {
        link: String,
    },

    /// Normalize an event JSON file ("-" reads stdin)
    Event {
        file: String,

        /// Wallet viewing the event
        #[arg(long)]
        viewer: Option<String>,

        /// Print every action instead of the summary
        #[arg(long)]
        all: bool,
    },

    /// Run the scam heuristics over free text
    Assess {
        text: String,
    },

    /// Net amount per asset over a JSON array of events
    Flows {
        file: String,

        #[arg(long)]
        viewer: String,
    },
}

#[derive(Serialize)]
struct Assessment {
    cleaned: String,
    flags: Vec<sanitizer::SanitizeFlag>,
    warning: Option<String>,
}

fn read_input(file: &str) -> eyre::Result<String> {
    if file == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .wrap_err("reading stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(file).wrap_err_with(|| format!("reading {}", file))
}

fn print_json<T: Serialize>(value: &T) -> eyre::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> eyre::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load()?;

    // logs go to stderr, stdout carries only JSON
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cfg.log_filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    info!(
        passes = cfg.policy.max_decode_passes,
        layer_threshold = cfg.policy.encoding_layer_threshold,
        keywords = cfg.policy.scam_keywords.len(),
        "Loaded decoder config"
    );
    config::install(cfg.policy);

    match cli.command {
        Command::Link { link: raw } => print_json(&link::parse_ton_link(&raw)),
        Command::Event { file, viewer, all } => {
            let raw: Value = serde_json::from_str(&read_input(&file)?)
                .map_err(ton_semantic_decoder::DecodeError::from)?;
            if all {
                print_json(&event::parse_event_actions(&raw, viewer.as_deref()))
            } else {
                print_json(&event::parse_event(&raw, viewer.as_deref()))
            }
        }
        Command::Assess { text } => {
            let sanitized = sanitizer::sanitize(&text);
            let warning = threat::assess_with(&sanitized, config::policy());
            print_json(&Assessment {
                flags: sanitized.flags.iter().copied().collect(),
                cleaned: sanitized.cleaned,
                warning,
            })
        }
        Command::Flows { file, viewer } => {
            let raw: Value = serde_json::from_str(&read_input(&file)?)
                .map_err(ton_semantic_decoder::DecodeError::from)?;
            let events: Vec<_> = match raw {
                Value::Array(items) => items
                    .iter()
                    .flat_map(|ev| event::parse_event_actions(ev, Some(viewer.as_str())))
                    .collect(),
                single => event::parse_event_actions(&single, Some(viewer.as_str())),
            };
            info!(count = events.len(), "aggregating actions");
            let flows = net_flows(&events);
            let rendered: std::collections::BTreeMap<_, _> = flows
                .into_iter()
                .map(|(asset, net)| (asset, net.to_string()))
                .collect();
            print_json(&rendered)
        }
    }
}
