//! Live squat coaching from a webcam

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use armonia_coach::coach::{run_session, Cue, SessionAggregator};
use armonia_coach::config::Config;
use armonia_coach::pose::MoveNetSource;

const CONFIG_PATH: &str = "config.toml";

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = Config::load_or_default(CONFIG_PATH);
    let mut session = SessionAggregator::from_config(&config).context("invalid configuration")?;

    let stop = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&stop))?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&stop))?;

    println!("=== Armonia Coach camera ({}) ===", env!("GIT_VERSION"));
    println!("camera {} ({}x{}), model {}", config.camera.index, config.camera.width, config.camera.height, config.camera.model_path);
    println!("exercise: {}", session.exercise().name);
    for tip in session.exercise().tips {
        println!("  - {}", tip);
    }
    println!("Ctrl-C to stop");
    println!();

    let mut last_reps = 0;
    let mut last_cue = Cue::None;
    let summary = run_session(
        &mut session,
        || MoveNetSource::open(&config.camera),
        &stop,
        |state| {
            if state.completed_reps != last_reps {
                println!(
                    "rep {}  (set {}, {}/{} )",
                    state.completed_reps,
                    state.completed_sets + 1,
                    state.reps_in_current_set,
                    config.session.reps_per_set
                );
            }
            if state.cue != last_cue && state.cue != Cue::None {
                println!("  {}", state.cue.message());
            }
            last_reps = state.completed_reps;
            last_cue = state.cue;
        },
    )
    .context("camera session failed")?;

    let state = &summary.final_state;
    println!();
    println!(
        "{} frames in {:.1}s ({:.1} fps)",
        summary.frames,
        summary.elapsed_secs,
        summary.frames as f64 / summary.elapsed_secs.max(1e-3)
    );
    println!(
        "reps: {}  sets: {}  back warnings: {}",
        state.completed_reps,
        state.completed_sets,
        state.warnings.len()
    );
    Ok(())
}
