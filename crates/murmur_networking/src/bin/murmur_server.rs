//! # MURMUR Server
//!
//! Loads the areas, starts the world actor and serves WebSocket clients.
//!
//! ## Usage
//!
//! ```bash
//! murmur_server --config murmur.toml --bind 0.0.0.0:8080 --areas areas
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use murmur_core::{EventQueue, WorldActor};
use murmur_networking::{MudServer, ServerConfig};
use murmur_world::{builtin_commands, load_areas, World};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    bind: Option<SocketAddr>,
    areas: Option<PathBuf>,
}

const USAGE: &str = "\
Usage: murmur_server [OPTIONS]

Options:
  -c, --config <PATH>    TOML configuration file
  -b, --bind <ADDR>      Listen address (default: 127.0.0.1:8080)
  -a, --areas <DIR>      Directory of area files (default: areas)
  -h, --help             Show this help";

/// Returns `None` if help was requested.
fn parse_args(args: &[String]) -> anyhow::Result<Option<Args>> {
    let mut parsed = Args::default();
    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        let value = || {
            args.get(i + 1)
                .with_context(|| format!("{flag} needs a value"))
        };
        match flag {
            "--config" | "-c" => {
                parsed.config = Some(PathBuf::from(value()?));
                i += 1;
            }
            "--bind" | "-b" => {
                let addr = value()?;
                parsed.bind = Some(addr.parse().with_context(|| format!("bad address {addr}"))?);
                i += 1;
            }
            "--areas" | "-a" => {
                parsed.areas = Some(PathBuf::from(value()?));
                i += 1;
            }
            "--help" | "-h" => return Ok(None),
            other => bail!("unknown option {other}\n\n{USAGE}"),
        }
        i += 1;
    }
    Ok(Some(parsed))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let argv: Vec<String> = std::env::args().collect();
    let Some(args) = parse_args(&argv)? else {
        println!("{USAGE}");
        return Ok(());
    };

    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if let Some(areas) = args.areas {
        config.areas = areas;
    }
    config.validate()?;

    let topology = load_areas(&config.areas)
        .with_context(|| format!("loading areas from {}", config.areas.display()))?;
    tracing::info!(rooms = topology.room_count(), "areas loaded");

    let commands = Arc::new(builtin_commands());
    let (scheduler, queue) = EventQueue::bounded(config.event_capacity);
    let world = World::new(
        Arc::new(topology),
        Arc::clone(&commands),
        config.world_rules(),
        scheduler.clone(),
    )?;
    let actor = WorldActor::new(world, queue).spawn("murmur-world")?;

    let server = MudServer::bind(&config, scheduler, commands)
        .with_context(|| format!("binding {}", config.bind))?;
    tracing::info!(addr = %server.local_addr(), start_room = config.start_room, "murmur is up");

    let served = server.serve();
    let world = actor.join()?;
    tracing::info!(players = world.player_count(), "world stopped");
    served?;
    Ok(())
}
