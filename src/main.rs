use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use set_edge::config::{self, RunSettings, arg_value, has_flag};
use set_edge::pipeline::{self, MatchInput};
use set_edge::{Prediction, fake_slate};

const DEFAULT_DEMO_SEED: u64 = 26;
const DEFAULT_DEMO_MATCHES: usize = 24;

fn main() -> Result<()> {
    config::load_dotenv();
    config::init_logging();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let settings = RunSettings::resolve(&args).context("resolve settings")?;
    let engine = settings
        .engine_config()
        .context("load weight profile and engine config")?;
    info!(
        profile = engine.profile().code_name(),
        season = engine.season(),
        aggregate_hard = engine.aggregate_indoor_outdoor(),
        cap = engine.confidence_cap(),
        "engine ready"
    );

    let slate = if has_flag(&args, "--demo") {
        let seed = arg_value(&args, "--seed")
            .and_then(|raw| raw.parse::<u64>().ok())
            .unwrap_or(DEFAULT_DEMO_SEED);
        let count = arg_value(&args, "--matches")
            .and_then(|raw| raw.parse::<usize>().ok())
            .unwrap_or(DEFAULT_DEMO_MATCHES)
            .clamp(1, 10_000);
        fake_slate::generate_slate(seed, count, engine.season())
    } else {
        let path = slate_path(&args).context("no slate given (pass a path or --demo)")?;
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("read slate {}", path.display()))?;
        serde_json::from_str::<Vec<MatchInput>>(&raw)
            .with_context(|| format!("parse slate {}", path.display()))?
    };

    let mut predictions = pipeline::predict_slate(&slate, &engine);
    let summary = pipeline::summarize(&predictions);
    info!(
        total = summary.total,
        kept = summary.kept,
        skipped = summary.skipped,
        capped = summary.capped,
        "slate scored"
    );

    if has_flag(&args, "--kept-only") {
        predictions.retain(Prediction::is_kept);
    }
    println!("{}", serde_json::to_string_pretty(&predictions)?);
    Ok(())
}

fn slate_path(args: &[String]) -> Option<PathBuf> {
    arg_value(args, "--slate").map(PathBuf::from).or_else(|| {
        let mut skip_next = false;
        for arg in args {
            if skip_next {
                skip_next = false;
                continue;
            }
            if arg.starts_with("--") {
                skip_next = !arg.contains('=') && takes_value(arg);
                continue;
            }
            return Some(PathBuf::from(arg));
        }
        None
    })
}

fn takes_value(flag: &str) -> bool {
    matches!(
        flag,
        "--registry" | "--profile" | "--confidence-cap" | "--season" | "--seed" | "--matches"
            | "--slate"
    )
}
