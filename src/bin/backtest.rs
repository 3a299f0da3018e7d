use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use set_edge::calibration::{self, BacktestCase};
use set_edge::config::{self, RunSettings, arg_value, has_flag};
use set_edge::{fake_slate, pipeline};

const DEFAULT_SYNTHETIC_SEED: u64 = 7;
const DEFAULT_SYNTHETIC_MATCHES: usize = 400;
const DEFAULT_BINS: usize = 10;

fn main() -> Result<()> {
    config::load_dotenv();
    config::init_logging();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let settings = RunSettings::resolve(&args).context("resolve settings")?;
    let engine = settings.engine_config().context("load engine config")?;

    let cases: Vec<BacktestCase> = if has_flag(&args, "--synthetic") {
        let seed = arg_value(&args, "--seed")
            .and_then(|raw| raw.parse::<u64>().ok())
            .unwrap_or(DEFAULT_SYNTHETIC_SEED);
        let count = arg_value(&args, "--matches")
            .and_then(|raw| raw.parse::<usize>().ok())
            .unwrap_or(DEFAULT_SYNTHETIC_MATCHES);
        fake_slate::generate_backtest(seed, count, engine.season())
    } else {
        let path = arg_value(&args, "--cases")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("tests/fixtures/backtest_cases.json"));
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("read backtest cases {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parse backtest cases {}", path.display()))?
    };
    if cases.is_empty() {
        return Err(anyhow!("no backtest cases"));
    }

    let inputs = cases.iter().map(|c| c.input.clone()).collect::<Vec<_>>();
    let outcomes = cases.iter().map(|c| c.outcome).collect::<Vec<_>>();
    let predictions = pipeline::predict_slate(&inputs, &engine);

    let metrics = calibration::evaluate(&predictions, &outcomes);
    let bins = arg_value(&args, "--bins")
        .and_then(|raw| raw.parse::<usize>().ok())
        .unwrap_or(DEFAULT_BINS);
    let bins = calibration::calibration_bins(&predictions, &outcomes, bins);
    let tradeoffs = calibration::chain_tradeoffs(engine.skip_engine(), &predictions, &outcomes);

    if has_flag(&args, "--json") {
        let report = serde_json::json!({
            "profile": engine.profile().code_name(),
            "metrics": metrics,
            "ece": calibration::expected_calibration_error(&bins),
            "bins": bins,
            "rules": tradeoffs,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Profile: {}", engine.profile().code_name());
    println!(
        "Scored: {}  Kept: {}  Skipped: {}",
        metrics.samples,
        metrics.kept,
        metrics.samples - metrics.kept
    );
    println!("+1.5 accuracy (kept): {:.1}%", metrics.accuracy_kept * 100.0);
    println!("+1.5 accuracy (all):  {:.1}%", metrics.accuracy_all * 100.0);
    println!("Bagels kept: {}", metrics.bagels_kept);
    println!("Brier: {:.4}  LogLoss: {:.4}", metrics.brier, metrics.log_loss);
    println!("ECE: {:.4}", calibration::expected_calibration_error(&bins));

    println!();
    println!("Calibration");
    for bin in bins.iter().filter(|b| b.count > 0) {
        println!(
            "  {:.2}-{:.2}  n={:<4} pred={:.3} actual={:.3}",
            bin.bucket_start, bin.bucket_end, bin.count, bin.avg_pred, bin.actual_rate
        );
    }

    println!();
    println!(
        "{:<52} {:>6} {:>7} {:>7} {:>6} {:>6} {:>6}",
        "Rule", "Fired", "LossHid", "WinHid", "Prec", "Rec", "F1"
    );
    for t in &tradeoffs {
        println!(
            "{:<52} {:>6} {:>7} {:>7} {:>6.3} {:>6.3} {:>6.3}",
            t.rule, t.fired, t.losses_hidden, t.wins_hidden, t.precision, t.recall, t.f1
        );
    }

    Ok(())
}
