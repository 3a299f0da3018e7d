use serde::{Deserialize, Serialize};

use crate::assemble::{Prediction, Side};
use crate::pipeline::MatchInput;
use crate::skip::{SkipLogicEngine, SkipRule};

/// Realized set score of a finished match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetOutcome {
    pub sets_a: u8,
    pub sets_b: u8,
}

impl SetOutcome {
    pub fn sets_won_by(&self, side: Side) -> u8 {
        match side {
            Side::PlayerA => self.sets_a,
            Side::PlayerB => self.sets_b,
        }
    }

    /// The favored player took at least one set.
    pub fn covered(&self, favored: Side) -> bool {
        self.sets_won_by(favored) >= 1
    }
}

/// A finished match paired with the inputs it was scored from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestCase {
    #[serde(rename = "match")]
    pub input: MatchInput,
    pub outcome: SetOutcome,
}

/// Probability that a player winning each set with `set_probability` takes
/// at least one of the first two.
pub fn cover_probability(set_probability: f64) -> f64 {
    let miss = 1.0 - set_probability.clamp(0.0, 1.0);
    1.0 - miss * miss
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Metrics {
    pub samples: usize,
    pub kept: usize,
    pub brier: f64,
    pub log_loss: f64,
    /// +1.5 hit rate over every scored match.
    pub accuracy_all: f64,
    /// +1.5 hit rate over kept matches only.
    pub accuracy_kept: f64,
    /// Kept picks where the favorite won no set.
    pub bagels_kept: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalibrationBin {
    pub bucket_start: f64,
    pub bucket_end: f64,
    pub count: usize,
    pub avg_pred: f64,
    pub actual_rate: f64,
}

/// Losses-saved vs wins-kept for one rule evaluated on its own.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleTradeoff {
    pub rule: String,
    pub fired: usize,
    pub losses_hidden: usize,
    pub wins_hidden: usize,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

fn scored<'a>(
    predictions: &'a [Prediction],
    outcomes: &'a [SetOutcome],
) -> impl Iterator<Item = (&'a Prediction, &'a SetOutcome)> {
    predictions
        .iter()
        .zip(outcomes)
        .filter(|(p, _)| !p.factor_breakdown.is_empty())
}

/// Matches that never reached scoring (data problems) are left out.
pub fn evaluate(predictions: &[Prediction], outcomes: &[SetOutcome]) -> Metrics {
    if predictions.is_empty() || predictions.len() != outcomes.len() {
        return Metrics::default();
    }

    let mut samples = 0usize;
    let mut kept = 0usize;
    let mut brier_sum = 0.0_f64;
    let mut log_loss_sum = 0.0_f64;
    let mut hits_all = 0usize;
    let mut hits_kept = 0usize;
    let mut bagels_kept = 0usize;

    for (p, o) in scored(predictions, outcomes) {
        samples += 1;
        let q = cover_probability(p.set_probability);
        let hit = o.covered(p.favored);
        let y = if hit { 1.0 } else { 0.0 };
        brier_sum += (q - y).powi(2);
        let actual_prob = (if hit { q } else { 1.0 - q }).clamp(1e-12, 1.0);
        log_loss_sum += -actual_prob.ln();
        if hit {
            hits_all += 1;
        }
        if p.is_kept() {
            kept += 1;
            if hit {
                hits_kept += 1;
            } else {
                bagels_kept += 1;
            }
        }
    }

    if samples == 0 {
        return Metrics::default();
    }
    let n = samples as f64;
    Metrics {
        samples,
        kept,
        brier: brier_sum / n,
        log_loss: log_loss_sum / n,
        accuracy_all: hits_all as f64 / n,
        accuracy_kept: if kept > 0 {
            hits_kept as f64 / kept as f64
        } else {
            0.0
        },
        bagels_kept,
    }
}

pub fn calibration_bins(
    predictions: &[Prediction],
    outcomes: &[SetOutcome],
    bins: usize,
) -> Vec<CalibrationBin> {
    let bins = bins.max(2);
    let mut counts = vec![0usize; bins];
    let mut pred_sum = vec![0.0_f64; bins];
    let mut actual_sum = vec![0.0_f64; bins];

    for (p, o) in scored(predictions, outcomes) {
        let q = cover_probability(p.set_probability);
        let idx = ((q * bins as f64).floor() as usize).min(bins - 1);
        counts[idx] += 1;
        pred_sum[idx] += q;
        if o.covered(p.favored) {
            actual_sum[idx] += 1.0;
        }
    }

    (0..bins)
        .map(|i| {
            let count = counts[i];
            let (avg_pred, actual_rate) = if count > 0 {
                (pred_sum[i] / count as f64, actual_sum[i] / count as f64)
            } else {
                (0.0, 0.0)
            };
            CalibrationBin {
                bucket_start: i as f64 / bins as f64,
                bucket_end: (i + 1) as f64 / bins as f64,
                count,
                avg_pred,
                actual_rate,
            }
        })
        .collect()
}

pub fn expected_calibration_error(bins: &[CalibrationBin]) -> f64 {
    let total: usize = bins.iter().map(|b| b.count).sum();
    if total == 0 {
        return 0.0;
    }
    bins.iter()
        .map(|b| b.count as f64 / total as f64 * (b.avg_pred - b.actual_rate).abs())
        .sum()
}

pub fn rule_tradeoff(
    rule: &SkipRule,
    predictions: &[Prediction],
    outcomes: &[SetOutcome],
) -> RuleTradeoff {
    let mut fired = 0usize;
    let mut losses_hidden = 0usize;
    let mut wins_hidden = 0usize;
    let mut total_losses = 0usize;

    for (p, o) in scored(predictions, outcomes) {
        let hit = o.covered(p.favored);
        if !hit {
            total_losses += 1;
        }
        if rule.evaluate(&p.signals).is_some() {
            fired += 1;
            if hit {
                wins_hidden += 1;
            } else {
                losses_hidden += 1;
            }
        }
    }

    let precision = ratio(losses_hidden, fired);
    let recall = ratio(losses_hidden, total_losses);
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };
    RuleTradeoff {
        rule: rule.label(),
        fired,
        losses_hidden,
        wins_hidden,
        precision,
        recall,
        f1,
    }
}

pub fn chain_tradeoffs(
    engine: &SkipLogicEngine,
    predictions: &[Prediction],
    outcomes: &[SetOutcome],
) -> Vec<RuleTradeoff> {
    engine
        .rules()
        .iter()
        .map(|rule| rule_tradeoff(rule, predictions, outcomes))
        .collect()
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}
