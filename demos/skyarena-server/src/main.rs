//! A console host for SkyArena.
//!
//! Reads host events from stdin, one per line, and prints the actions the
//! server sends back:
//!
//! ```text
//! join <player> <world> [mod]
//! quit <player>
//! chat <player> <message...>
//! move <player> <from> <to>
//! ```
//!
//! Settings come from the path given as the first argument, or
//! `skyarena.yml`. Logging follows `RUST_LOG` (default `info`).

use std::path::PathBuf;

use skyarena::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

fn parse_event(line: &str, online: &[PlayerName]) -> Option<HostEvent> {
    let mut words = line.split_whitespace();
    let event = match (words.next()?, words.next()) {
        ("join", Some(player)) => HostEvent::PlayerJoined {
            player: player.into(),
            world: WorldName::from(words.next()?),
            moderator: words.next() == Some("mod"),
        },
        ("quit", Some(player)) => HostEvent::PlayerQuit {
            player: player.into(),
        },
        ("chat", Some(player)) => HostEvent::PlayerChat {
            player: player.into(),
            message: words.collect::<Vec<_>>().join(" "),
            recipients: online.to_vec(),
        },
        ("move", Some(player)) => HostEvent::WorldChanged {
            player: player.into(),
            from: WorldName::from(words.next()?),
            to: WorldName::from(words.next()?),
        },
        _ => return None,
    };
    Some(event)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("skyarena.yml"));
    let settings = ServerSettings::load(&path)?;
    let server = SkyArenaServer::start(settings, Box::new(Ledger::new()))?;

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (actions_tx, mut actions_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut online: Vec<PlayerName> = Vec::new();
        while let Ok(Some(line)) = lines.next_line().await {
            let Some(event) = parse_event(&line, &online) else {
                eprintln!("unrecognized: {line}");
                continue;
            };
            match &event {
                HostEvent::PlayerJoined { player, .. } => online.push(player.clone()),
                HostEvent::PlayerQuit { player } => online.retain(|p| p != player),
                _ => {}
            }
            if events_tx.send(event).is_err() {
                break;
            }
        }
    });

    tokio::spawn(async move {
        while let Some(action) = actions_rx.recv().await {
            match action {
                HostAction::Chat { recipients, message } => {
                    let to: Vec<&str> = recipients.iter().map(PlayerName::as_str).collect();
                    println!("chat -> [{}]: {message}", to.join(", "));
                }
                HostAction::Notify { player, message } => println!("notify {player}: {message}"),
            }
        }
    });

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "could not listen for ctrl-c");
        }
    };
    server.run(events_rx, actions_tx, shutdown).await;
    Ok(())
}
