//! Headless city driver.
//!
//! Runs a `CityEngine` at a fixed tick rate and plays the external
//! collaborator roles: it turns proximity conflicts into accident reports,
//! injects a storm window, and dumps the final snapshot as JSON.
//!
//! Usage:
//!   cargo run -p jetcity-cli --bin run_city -- --ticks 2000 --agents 24
//!   RUST_LOG=jetcity_core=debug cargo run -p jetcity-cli --bin run_city

use anyhow::Context;
use clap::Parser;
use jetcity_cli::{commuter_rush, harbor_run};
use jetcity_core::{AgentStatus, CityEngine, Point, Severity};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::interval;

#[derive(Debug, Parser)]
#[command(name = "run_city", about = "Run the jetcity simulation headlessly")]
struct Args {
    /// Number of ticks to simulate
    #[arg(long, default_value_t = 2400)]
    ticks: u64,

    /// Vehicles in the roster
    #[arg(long, default_value_t = 24)]
    agents: usize,

    /// Parking slot count
    #[arg(long, default_value_t = 8)]
    slots: u32,

    /// RNG seed; same seed replays the same run
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Tick rate in Hz (wall clock); simulated dt is 1/rate
    #[arg(long, default_value_t = 20.0)]
    rate_hz: f64,

    /// Run as fast as possible instead of pacing to rate_hz
    #[arg(long)]
    fast: bool,

    /// Use the harbor city map instead of the open plain
    #[arg(long)]
    harbor: bool,

    /// Probability that a conflict pair produces an accident report
    #[arg(long, default_value_t = 0.02)]
    accident_chance: f64,

    /// Tick at which a severe storm rolls in
    #[arg(long)]
    storm_at: Option<u64>,

    /// Storm length in ticks
    #[arg(long, default_value_t = 200)]
    storm_ticks: u64,

    /// Write the final snapshot JSON here instead of stdout
    #[arg(long)]
    snapshot_out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let rate = args.rate_hz.max(1.0);
    let dt = 1.0 / rate;

    let config = if args.harbor {
        harbor_run(args.agents, args.slots, args.seed)
    } else {
        commuter_rush(args.agents, args.slots, args.seed)
    };
    let mut engine = CityEngine::configure(config).context("city configuration failed")?;

    // The reporter has its own seeded RNG so engine determinism is untouched.
    let mut reporter_rng = ChaCha8Rng::seed_from_u64(args.seed.wrapping_add(0x5EED));

    let mut ticker = interval(Duration::from_secs_f64(1.0 / rate));
    let mut storm_until: Option<u64> = None;
    let mut total_conflicts = 0usize;
    let mut total_warnings = 0usize;
    let mut total_accidents = 0usize;

    for _ in 0..args.ticks {
        if !args.fast {
            ticker.tick().await;
        }

        // Storm window injection.
        let now = engine.current_tick();
        if args.storm_at == Some(now) {
            engine.set_weather(Severity::Severe);
            storm_until = Some(now + args.storm_ticks);
            tracing::info!(tick = now, "storm front arrives, grounding traffic");
        }
        if storm_until == Some(now) {
            engine.set_weather(Severity::Advisory);
            storm_until = None;
            tracing::info!(tick = now, "storm cleared");
        }

        let report = engine.tick(dt)?;
        total_conflicts += report.conflicts.len();
        total_warnings += report.warnings.len();

        // Accident reporter role: a conflict occasionally becomes an accident
        // at the midpoint of the pair.
        for conflict in &report.conflicts {
            if !reporter_rng.gen_bool(args.accident_chance.clamp(0.0, 1.0)) {
                continue;
            }
            let positions: HashMap<&str, Point> = engine
                .snapshot()
                .iter()
                .map(|s| (s.callsign.as_str(), s.position))
                .collect();
            if let (Some(a), Some(b)) = (
                positions.get(conflict.first.as_str()),
                positions.get(conflict.second.as_str()),
            ) {
                let center = Point::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0);
                engine.report_accident_for(center, 25.0, Severity::Caution, 300);
                total_accidents += 1;
            }
        }

        if report.tick % 500 == 0 {
            let parked = engine
                .snapshot()
                .iter()
                .filter(|s| s.status == AgentStatus::Parked)
                .count();
            tracing::info!(
                tick = report.tick,
                parked,
                conflicts = report.conflicts.len(),
                "progress"
            );
        }
    }

    let mut by_status: HashMap<String, usize> = HashMap::new();
    for snap in engine.snapshot() {
        *by_status.entry(format!("{:?}", snap.status)).or_default() += 1;
    }
    tracing::info!(
        ticks = args.ticks,
        conflicts = total_conflicts,
        accidents = total_accidents,
        warnings = total_warnings,
        ?by_status,
        "run complete"
    );

    let json = serde_json::to_string_pretty(engine.snapshot())?;
    match &args.snapshot_out {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("writing snapshot to {}", path.display()))?;
            tracing::info!(path = %path.display(), "snapshot written");
        }
        None => println!("{json}"),
    }

    Ok(())
}
