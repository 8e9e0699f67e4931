//! Headless demo binary: runs the engine for a configured number of ticks
//! (or indefinitely at its target tick rate) and prints periodic stats.
//! There is no HTTP API or frontend viewer here -- both are out of scope
//! for the core and are expected to sit on top of `EngineManager` the same
//! way this binary does.

use std::time::Duration;

use clap::Parser;
use gridkeep_engine::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "gridkeep", about = "Run the deterministic tick engine headlessly")]
struct Args {
    #[arg(long, default_value_t = 42)]
    seed: u64,

    #[arg(long, default_value_t = 64)]
    grid_width: i32,

    #[arg(long, default_value_t = 64)]
    grid_height: i32,

    #[arg(long, default_value_t = 20)]
    entities: u32,

    #[arg(long, default_value_t = 4)]
    workers: usize,

    #[arg(long, default_value_t = 200)]
    ticks: u64,

    #[arg(long, default_value_t = 20)]
    tick_rate: u32,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let config = EngineConfig {
        world_seed: args.seed,
        grid_width: args.grid_width,
        grid_height: args.grid_height,
        initial_entity_count: args.entities,
        num_workers: args.workers,
        tick_rate: args.tick_rate,
        max_ticks: Some(args.ticks),
        ..EngineConfig::default()
    };

    tracing::info!(?config, "starting engine");
    let mut manager = EngineManager::spawn(config)?;

    loop {
        std::thread::sleep(Duration::from_millis(200));
        let stats = manager.stats();
        tracing::info!(
            tick = stats.tick,
            alive = stats.alive_count,
            spawned = stats.spawn_count,
            died = stats.death_count,
            degraded = stats.degraded_tick_count,
            "tick progress"
        );

        if !stats.running {
            if let Some(err) = &stats.last_error {
                tracing::error!(%err, "engine stopped unexpectedly");
            }
            break;
        }
        if stats.tick >= args.ticks {
            break;
        }
    }

    manager.submit_control(ControlCommand::Pause);
    let snapshot = manager.current_snapshot();
    let final_stats = manager.stats();
    println!(
        "{}",
        serde_json::json!({
            "tick": snapshot.tick,
            "entities": snapshot.entities.len(),
            "fingerprint": hex_fingerprint(&snapshot.fingerprint()),
            "stats": {
                "spawned": final_stats.spawn_count,
                "died": final_stats.death_count,
                "degraded_ticks": final_stats.degraded_tick_count,
            },
        })
    );

    manager.shutdown();
    Ok(())
}

fn hex_fingerprint(bytes: &[u8; 32]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
