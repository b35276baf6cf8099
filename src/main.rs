//! Slither Arena headless runner
//!
//! Runs a session with a scripted player and logs what happens. Useful for
//! tuning configs and checking determinism without a renderer.

use std::error::Error;
use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use serde_json::json;

use slither_arena::sim::{GameState, SIM_DT, TickInput, create_game_state, tick, tick_with_frame_time};
use slither_arena::{SlitherConfig, heading};

/// Run a headless Slither Arena session
#[derive(Parser, Debug)]
#[command(name = "slither-arena")]
#[command(about = "Run the arena simulation headless with a scripted player")]
struct Args {
    /// Random seed for deterministic runs
    #[arg(long)]
    seed: Option<u64>,

    /// Number of ticks to simulate (60 per second)
    #[arg(long, default_value_t = 3600)]
    ticks: u64,

    /// Override the bot population target
    #[arg(long)]
    bots: Option<usize>,

    /// JSON config file, merged over the defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Feed measured tick cost to the bot governor instead of the fixed step
    #[arg(long)]
    measured: bool,

    /// Print the final snapshot as JSON
    #[arg(long)]
    snapshot: bool,
}

/// Scripted player: slow sweeping turns, pulled back toward the center near the edge
fn autopilot(state: &GameState) -> TickInput {
    let head = state.player.head();
    let t = state.time_ticks as f32 * SIM_DT;
    let sweep = heading(state.player.heading + (t * 0.7).sin() * 1.2);
    let edge = head.length() / state.config.world.radius;
    let steering = if edge > 0.6 {
        (-head.normalize_or_zero()).lerp(sweep, 0.3).normalize_or_zero()
    } else {
        sweep
    };
    TickInput {
        steering,
        boost: (t % 12.0) < 1.5,
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => SlitherConfig::load(path)?,
        None => SlitherConfig::default(),
    };
    let overrides = args.bots.map(|count| json!({ "bots": { "count": count } }));
    let seed = args.seed.unwrap_or_else(rand::random);
    let mut state = create_game_state(Some(config), overrides.as_ref(), Some(seed))?;
    log::info!("Slither Arena (headless) seed {}, {} ticks", seed, args.ticks);

    let report_every = (1.0 / SIM_DT) as u64 * 10;
    let mut last_cost_ms = SIM_DT * 1000.0;
    for _ in 0..args.ticks {
        let input = autopilot(&state);
        if args.measured {
            let started = Instant::now();
            tick_with_frame_time(&mut state, &input, SIM_DT, last_cost_ms);
            last_cost_ms = started.elapsed().as_secs_f32() * 1000.0;
        } else {
            tick(&mut state, &input, SIM_DT);
        }

        if state.time_ticks % report_every == 0 {
            log::info!(
                "t={:.0}s length={:.0} score={:.0} bots={}/{} pellets={} zoom={:.2}",
                state.elapsed,
                state.player.length,
                state.player.score,
                state.bots.len(),
                state.budget.target_count,
                state.pellets.len(),
                state.camera.zoom
            );
        }
        if let Some(crash) = state.crash {
            log::info!(
                "Run ended at {:.1}s: {:?} at ({:.0}, {:.0})",
                crash.time,
                crash.reason,
                crash.position.x,
                crash.position.y
            );
            break;
        }
    }

    let generations: u32 = state.bots.iter().map(|b| b.generation).sum();
    log::info!(
        "Finished after {} ticks: score {:.0}, {} bots (total generation {}), {} queued respawns",
        state.time_ticks,
        state.player.score,
        state.bots.len(),
        generations,
        state.respawns.len()
    );

    if args.snapshot {
        println!("{}", serde_json::to_string_pretty(&state.snapshot())?);
    }
    Ok(())
}
