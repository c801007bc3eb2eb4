//! rts-client-replay binary
//!
//! Drives a `ClientCore` from a recorded server stream (one JSON server
//! message per line) at a fixed tick rate, logging every command the client
//! would have sent.
//!
//! ## Configuration (env / TOML via `config` crate)
//!
//! | Key                               | Default   | Description                       |
//! |-----------------------------------|-----------|-----------------------------------|
//! | `RTS_CLIENT_PLAYER_ID`            | `1`       | Player id sent in `join`          |
//! | `RTS_CLIENT_PLAYER_NAME`          | `Player1` | Player name sent in `join`        |
//! | `RTS_CLIENT_DEFAULT_SPEED`        | `2.0`     | Fallback unit speed (tiles/s)     |
//! | `RTS_CLIENT_GATHER_RANGE`         | `1.5`     | Gather range (tiles)              |
//! | `RTS_CLIENT_GATHER_COOLDOWN`      | `0.6`     | Seconds between gather re-sends   |
//! | `RTS_CLIENT_INTERACTION_RANGE`    | `1.5`     | Attack / hunt / deposit range     |
//! | `RTS_CLIENT_RECONNECT_DELAY`      | `2.0`     | Seconds between reconnects        |
//! | `RTS_CLIENT_MAX_RECONNECT_ATTEMPTS` | `10`    | Reconnect budget                  |

use anyhow::{bail, Context, Result};
use clap::Parser;
use rts_client_core::{ClientConfig, ClientCore, ClientEvent, EntityId};
use std::path::PathBuf;
use std::time::Duration;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "rts-client-replay", about = "Replay a recorded server stream", version)]
struct Args {
    /// JSON-lines file of server messages
    input: PathBuf,

    /// Optional TOML client config
    #[arg(long, env = "RTS_CLIENT_CONFIG")]
    config: Option<PathBuf>,

    /// Client tick rate (Hz); one recorded line is fed per tick
    #[arg(long, env = "RTS_REPLAY_TICK_RATE_HZ", default_value_t = 10.0)]
    tick_rate_hz: f32,

    /// Extra ticks to run after the last line so movements can finish
    #[arg(long, default_value_t = 20)]
    drain_ticks: u32,

    /// Standing gather intent `UNIT:RESOURCE`, registered after the first snapshot
    #[arg(long = "gather", value_parser = parse_gather)]
    gathers: Vec<(EntityId, EntityId)>,

    /// The recording already contains the join/ready acks
    #[arg(long)]
    recorded_handshake: bool,
}

fn parse_gather(s: &str) -> Result<(EntityId, EntityId), String> {
    let (unit, resource) = s
        .split_once(':')
        .ok_or_else(|| format!("expected UNIT:RESOURCE, got `{}`", s))?;
    let unit = unit.trim().parse().map_err(|e| format!("bad unit id: {}", e))?;
    let resource = resource
        .trim()
        .parse()
        .map_err(|e| format!("bad resource id: {}", e))?;
    Ok((unit, resource))
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialise logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rts_client_core=debug".parse()?),
        )
        .init();

    let args = Args::parse();
    if args.tick_rate_hz <= 0.0 {
        bail!("tick rate must be positive, got {}", args.tick_rate_hz);
    }

    let config = ClientConfig::load(args.config.as_deref()).context("loading client config")?;
    let text = std::fs::read_to_string(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();

    log::info!(
        "Replaying {} messages from {} at {} Hz as player {} ({})",
        lines.len(),
        args.input.display(),
        args.tick_rate_hz,
        config.player_id,
        config.player_name,
    );

    let mut core = ClientCore::new(config);
    core.on_transport_open();
    if !args.recorded_handshake {
        core.receive(r#"{"type":"ack","ok":true,"msg":"joined"}"#)?;
        core.receive(r#"{"type":"ack","ok":true,"msg":"ready"}"#)?;
    }

    let dt = 1.0 / args.tick_rate_hz;
    let mut interval = tokio::time::interval(Duration::from_secs_f32(dt));
    let mut feed = lines.into_iter();
    let mut stats = ReplayStats::default();
    let mut gathers_registered = args.gathers.is_empty();
    let mut idle_ticks = 0u32;

    while idle_ticks < args.drain_ticks {
        interval.tick().await;

        match feed.next() {
            Some(line) => {
                if core.receive(line).is_err() {
                    stats.malformed += 1;
                }
            }
            None => idle_ticks += 1,
        }

        core.update(dt);
        stats.ticks += 1;

        for event in core.drain_events() {
            match &event {
                ClientEvent::SnapshotApplied { .. } => stats.snapshots += 1,
                ClientEvent::ServerError(_) => stats.server_errors += 1,
                _ => {}
            }
            log::debug!("Event: {:?}", event);
        }

        if !gathers_registered && core.state().tick() > 0 {
            for &(unit, resource) in &args.gathers {
                if !core.order_gather(unit, resource) {
                    log::warn!("Could not register gather {}:{}", unit, resource);
                }
            }
            gathers_registered = true;
        }

        for json in core.drain_outbound_encoded() {
            log::info!("-> {}", json);
            stats.commands += 1;
        }
    }

    let state = core.state();
    log::info!(
        "Replay done: {} ticks, {} snapshots, {} commands, {} malformed, {} server errors; \
         final tick {} with {} units, {} buildings, {} resources, {} gather tasks",
        stats.ticks,
        stats.snapshots,
        stats.commands,
        stats.malformed,
        stats.server_errors,
        state.tick(),
        state.unit_count(),
        state.building_count(),
        state.resource_count(),
        core.tasks().len(),
    );
    Ok(())
}

#[derive(Debug, Default)]
struct ReplayStats {
    ticks: u64,
    snapshots: u64,
    commands: u64,
    malformed: u64,
    server_errors: u64,
}
