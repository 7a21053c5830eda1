use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use armonia_coach::body_map::{self, BodySide, Circle};
use armonia_coach::chat::{ChatClient, MuscleContext};
use armonia_coach::coach::{run_session, Cue, SessionAggregator, SessionState};
use armonia_coach::config::Config;
use armonia_coach::exercise;
use armonia_coach::pose::ReplaySource;

const CONFIG_PATH: &str = "config.toml";

#[derive(Parser)]
#[command(name = "armonia-coach", version = env!("GIT_VERSION"))]
#[command(about = "Squat rep counting, form warnings and muscle lookup", long_about = None)]
struct Cli {
    /// Config file; defaults are used when it is missing
    #[arg(short, long, default_value = CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run recorded frames (one JSON frame per line) through the coach
    Replay {
        file: PathBuf,

        /// Exercise id or name, overrides the config
        #[arg(long)]
        exercise: Option<String>,

        /// Print the state after every frame
        #[arg(short, long)]
        verbose: bool,
    },

    /// Muscles under a circle on the body map
    Analyze {
        #[arg(long, default_value = "front")]
        side: BodySide,
        #[arg(long)]
        cx: f64,
        #[arg(long)]
        cy: f64,
        #[arg(long, default_value_t = 0.05)]
        radius: f64,

        /// Ask the backend first, local map on failure
        #[arg(long)]
        remote: bool,
    },

    /// Ask the coaching assistant
    Chat {
        message: String,

        /// Body-map muscle id to give the assistant as context (repeatable)
        #[arg(long = "muscle")]
        muscles: Vec<i32>,
    },

    /// List the exercise catalog
    Exercises {
        /// Only exercises training this muscle group
        #[arg(long)]
        muscle: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();
    let config = Config::load_or_default(&cli.config);

    match cli.command {
        Commands::Replay {
            file,
            exercise,
            verbose,
        } => replay(&config, file, exercise.as_deref(), verbose),
        Commands::Analyze {
            side,
            cx,
            cy,
            radius,
            remote,
        } => analyze(&config, side, Circle { cx, cy, radius }, remote).await,
        Commands::Chat { message, muscles } => chat(&config, &message, &muscles).await,
        Commands::Exercises { muscle } => {
            list_exercises(muscle.as_deref());
            Ok(())
        }
    }
}

fn print_state(state: &SessionState) {
    let knee = state
        .last_sample
        .knee
        .map_or("-".to_string(), |a| format!("{:.1}", a));
    let back = state
        .last_sample
        .back
        .map_or("-".to_string(), |a| format!("{:.1}", a));
    println!(
        "#{:<5} {:<10} knee {:>6} back {:>6}  reps {} (set {}, {} in set)  {}",
        state.frames_ingested,
        format!("{:?}", state.current_phase),
        knee,
        back,
        state.completed_reps,
        state.completed_sets,
        state.reps_in_current_set,
        state.cue.message()
    );
}

fn replay(config: &Config, file: PathBuf, exercise_name: Option<&str>, verbose: bool) -> Result<()> {
    let mut session = SessionAggregator::from_config(config).context("invalid configuration")?;
    if let Some(name) = exercise_name {
        let Some(ex) = exercise::find_by_id(name).or_else(|| exercise::find_by_name(name)) else {
            bail!("unknown exercise '{}'", name);
        };
        session.set_exercise(ex);
    }
    if !session.exercise().is_coached() {
        println!("{} has no form coach; frames are counted only", session.exercise().name);
    }

    let stop = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&stop))?;

    println!("=== Armonia Coach replay ({}) ===", env!("GIT_VERSION"));
    println!("exercise: {}", session.exercise().name);
    println!("source:   {}", file.display());
    println!();

    let mut last_reps = 0;
    let mut last_warnings = 0;
    let mut last_cue = Cue::None;
    let summary = run_session(
        &mut session,
        || ReplaySource::open(&file).map(|s| s.with_layout(config.landmarks.layout)),
        &stop,
        |state| {
            let changed = state.completed_reps != last_reps
                || state.warnings.len() != last_warnings
                || state.cue != last_cue;
            if verbose || changed {
                print_state(state);
            }
            last_reps = state.completed_reps;
            last_warnings = state.warnings.len();
            last_cue = state.cue;
        },
    )
    .with_context(|| format!("replay of {} failed", file.display()))?;

    let state = &summary.final_state;
    println!();
    println!("frames:   {} ({:?})", summary.frames, summary.end);
    println!("reps:     {}", state.completed_reps);
    println!("sets:     {} (+{} reps)", state.completed_sets, state.reps_in_current_set);
    println!("warnings: {}", state.warnings.len());
    for w in &state.warnings {
        println!("  {:>8}ms  {} ({:.1}°)", w.timestamp_ms, w.kind.message(), w.angle_at_trigger);
    }
    Ok(())
}

async fn analyze(config: &Config, side: BodySide, circle: Circle, remote: bool) -> Result<()> {
    let response = if remote {
        let client = ChatClient::from_config(&config.chat)?;
        client.analyze(side, circle).await
    } else {
        body_map::analyze_circle(side, &circle).into()
    };

    println!(
        "{:?} ({:.3}, {:.3}) r={:.3}{}",
        side,
        circle.cx,
        circle.cy,
        circle.radius,
        if response.local { "  [local]" } else { "" }
    );
    for hit in &response.results {
        println!(
            "  {:>4}  {:>5.1}%  {:<32} {}  [{}]",
            hit.id,
            hit.prob * 100.0,
            hit.muscle_en,
            hit.muscle_ar,
            hit.region
        );
    }
    if let (Some(region), Some(conf)) = (&response.region_hint, response.region_conf) {
        println!("region: {} ({:.0}%)", region, conf * 100.0);
    }
    Ok(())
}

async fn chat(config: &Config, message: &str, muscle_ids: &[i32]) -> Result<()> {
    let mut muscles = Vec::with_capacity(muscle_ids.len());
    for &id in muscle_ids {
        let Some(m) = body_map::find_muscle(id) else {
            bail!("unknown muscle id {}", id);
        };
        muscles.push(MuscleContext {
            muscle_ar: m.name_ar.to_string(),
            muscle_en: m.name_en.to_string(),
            region: m.region.to_string(),
            prob: 1.0,
        });
    }

    let mut client = ChatClient::from_config(&config.chat)?;
    let response = client.send_chat(message, &muscles).await;
    println!("{}", response.display_text());
    if !response.youtube.is_empty() {
        println!();
        println!("video: {}", response.youtube);
    }
    Ok(())
}

fn list_exercises(muscle: Option<&str>) {
    let list = match muscle {
        Some(m) => exercise::by_muscle(m),
        None => exercise::all().iter().collect(),
    };
    for ex in list {
        println!(
            "{:<14} {:<18} {:<7} {}",
            ex.id,
            ex.name,
            if ex.is_coached() { "coached" } else { "" },
            ex.muscle_groups.join(", ")
        );
        for tip in ex.tips {
            println!("    - {}", tip);
        }
    }
}
