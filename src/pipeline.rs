use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::amplify::{self, Amplified};
use crate::assemble::{self, Players, Prediction, Scored};
use crate::blend::{self, BlendedPlayerProfile};
use crate::config::EngineConfig;
use crate::gate;
use crate::protect::{self, PickContext};
use crate::score::{self, ScoreResult};
use crate::skip::{SkipDecision, SkipSignals, TournamentTier};
use crate::stats::PlayerSurfaceStats;
use crate::surface;
use crate::weights::Factor;
use crate::win_prob::{self, Probabilities};

/// Uncapped match probability from which historical misses were all straight-set losses.
const BAGEL_BAND_START: f64 = 0.758;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerInput {
    pub name: String,
    /// Season records on any surface; the pipeline picks the ones that match.
    #[serde(default)]
    pub seasons: Vec<PlayerSurfaceStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchInput {
    pub match_id: String,
    #[serde(default)]
    pub tournament_tier: String,
    pub surface_raw_label: String,
    pub player_a: PlayerInput,
    pub player_b: PlayerInput,
    #[serde(default)]
    pub ranking_a: Option<u32>,
    #[serde(default)]
    pub ranking_b: Option<u32>,
    #[serde(default)]
    pub utr_a: Option<f64>,
    #[serde(default)]
    pub utr_b: Option<f64>,
}

/// Season records on `canonical`, one per year. Same-year records that
/// normalize to the same surface are merged.
pub fn surface_history(
    seasons: &[PlayerSurfaceStats],
    canonical: &str,
    aggregate_indoor_outdoor: bool,
) -> BTreeMap<i32, PlayerSurfaceStats> {
    let mut by_year: BTreeMap<i32, Vec<&PlayerSurfaceStats>> = BTreeMap::new();
    for record in seasons {
        if surface::normalize(&record.surface, aggregate_indoor_outdoor) == canonical {
            by_year.entry(record.year).or_default().push(record);
        }
    }
    by_year
        .into_iter()
        .filter_map(|(year, records)| {
            PlayerSurfaceStats::merge(&records, canonical).map(|merged| (year, merged))
        })
        .collect()
}

struct SideOutcome {
    profile: Option<BlendedPlayerProfile>,
    issues: Vec<String>,
}

fn prepare_side(
    label: &str,
    player: &PlayerInput,
    canonical: &str,
    config: &EngineConfig,
) -> SideOutcome {
    let aggregate = config.aggregate_indoor_outdoor();
    let window = config.blend().window_years();
    let mut issues = Vec::new();
    // Only records that can reach the blend for this surface matter.
    for record in player.seasons.iter().filter(|r| {
        window.contains(&r.year) && surface::normalize(&r.surface, aggregate) == canonical
    }) {
        if let Err(err) = record.validate() {
            issues.push(format!("{label}: invalid stats: {err}"));
        }
    }

    let history = surface_history(&player.seasons, canonical, aggregate);
    let profile = match blend::blend(&history, config.blend()) {
        Ok(profile) => {
            let result = gate::check(&profile, config.gate());
            issues.extend(result.reasons.into_iter().map(|r| format!("{label}: {r}")));
            Some(profile)
        }
        Err(err) => {
            issues.push(format!("{label}: {err} on {canonical}"));
            None
        }
    };
    SideOutcome { profile, issues }
}

fn gap<T>(a: Option<T>, b: Option<T>, diff: impl Fn(T, T) -> T) -> Option<T> {
    Some(diff(a?, b?))
}

/// Runs one match through every stage. Bad data never fails the call; it
/// turns into a skipped prediction with the reasons attached.
pub fn predict_match(input: &MatchInput, config: &EngineConfig) -> Prediction {
    let label = surface::classify(&input.surface_raw_label, config.aggregate_indoor_outdoor());
    let mut risk_flags = BTreeSet::new();
    if !label.known {
        warn!(match_id = %input.match_id, raw = %input.surface_raw_label, "unknown surface label");
        risk_flags.insert(format!("unknown_surface:{}", input.surface_raw_label));
    }

    let side_a = prepare_side("player_a", &input.player_a, &label.canonical, config);
    let side_b = prepare_side("player_b", &input.player_b, &label.canonical, config);
    let mut data_issues = side_a.issues;
    data_issues.extend(side_b.issues);

    let scored = data_issues.is_empty();
    let (score, amplified, probabilities, reliability) = match (&side_a.profile, &side_b.profile)
    {
        (Some(a), Some(b)) if scored => {
            let score = score::score(a, b, config.profile());
            let amplified = if config.amplification_enabled() {
                amplify::amplify_score(&score, config.return_focus(), config.amplification())
            } else {
                Amplified::identity(score.raw_diff)
            };
            let probabilities = win_prob::calibrate(amplified.diff, config.confidence_cap());
            debug!(
                match_id = %input.match_id,
                raw_diff = score.raw_diff,
                amplified = amplified.diff,
                set_probability = probabilities.set_probability,
                "scored"
            );
            (score, amplified, probabilities, a.confidence.min(b.confidence))
        }
        _ => (
            ScoreResult::empty(),
            Amplified::identity(0.0),
            Probabilities::coin_flip(),
            0.0,
        ),
    };

    for factor in &score.missing {
        risk_flags.insert(format!("missing_factor:{factor}"));
    }
    if probabilities.uncapped_match_probability >= BAGEL_BAND_START {
        risk_flags.insert("overconfidence_band".to_string());
    }

    let (profile_a, profile_b) = (side_a.profile.as_ref(), side_b.profile.as_ref());
    let utr_a = input.utr_a.or_else(|| profile_a.and_then(|p| p.latest_utr));
    let utr_b = input.utr_b.or_else(|| profile_b.and_then(|p| p.latest_utr));
    let rank_a = input.ranking_a.or_else(|| profile_a.and_then(|p| p.latest_ranking));
    let rank_b = input.ranking_b.or_else(|| profile_b.and_then(|p| p.latest_ranking));
    let utr_gap = gap(utr_a, utr_b, |a: f64, b: f64| (a - b).abs());
    let ranking_gap = gap(rank_a, rank_b, |a: u32, b: u32| a.abs_diff(b));
    if utr_gap.is_none() {
        risk_flags.insert("missing_utr".to_string());
    }
    if ranking_gap.is_none() {
        risk_flags.insert("missing_ranking".to_string());
    }

    let base_confidence = probabilities.set_probability * (0.5 + 0.5 * reliability);
    let confidence = match (profile_a, profile_b) {
        (Some(a), Some(b)) if scored => {
            let (favored, opponent, favored_rank, opponent_rank) = if amplified.diff < 0.0 {
                (b, a, rank_b, rank_a)
            } else {
                (a, b, rank_a, rank_b)
            };
            let ctx = PickContext {
                indoor: label.is_indoor(),
                favored_rank,
                opponent_rank,
                favored_form: favored.factor(Factor::RecentForm),
                opponent_form: opponent.factor(Factor::RecentForm),
                favored_clutch: favored.factor(Factor::ClutchFactor),
                opponent_clutch: opponent.factor(Factor::ClutchFactor),
                uncapped_match_probability: probabilities.uncapped_match_probability,
                data_gaps: risk_flags.iter().any(|f| f.starts_with("missing_")),
            };
            let protected = protect::protect(config.protections(), base_confidence, &ctx);
            for name in &protected.fired {
                risk_flags.insert(format!("protection:{name}"));
            }
            if !protected.fired.is_empty() {
                debug!(
                    match_id = %input.match_id,
                    before = base_confidence,
                    after = protected.confidence,
                    "confidence protected"
                );
            }
            protected.confidence
        }
        _ => base_confidence,
    };

    let sample = |side: Option<&BlendedPlayerProfile>| side.map_or(0, |p| p.sample_size);
    let signals = SkipSignals {
        confidence,
        score_gap: score.raw_diff.abs(),
        indoor: label.is_indoor(),
        tier: TournamentTier::parse(&input.tournament_tier),
        utr_gap,
        ranking_gap,
        min_sample_size: sample(profile_a).min(sample(profile_b)),
        data_issues,
    };

    let mut decision = config.skip_engine().decide(&signals);
    if !scored && !decision.is_skip() {
        decision = SkipDecision::Skip {
            rule: "surface_data_quality".to_string(),
            reason: format!("surface data quality: {}", signals.data_issues.join("; ")),
        };
    }

    let prediction = assemble::assemble(
        &input.match_id,
        Players {
            a: &input.player_a.name,
            b: &input.player_b.name,
        },
        &label.canonical,
        &probabilities,
        &decision,
        Scored {
            raw_diff: score.raw_diff,
            amplified_diff: amplified.diff,
            breakdown: &score.breakdown,
        },
        config.profile().code_name(),
        signals,
        risk_flags,
    );
    info!(
        match_id = %prediction.match_id,
        favored = %prediction.favored_player,
        set_probability = prediction.set_probability,
        skipped = prediction.skipped,
        "prediction"
    );
    prediction
}

/// Scores a slate in parallel. Output order follows input order.
pub fn predict_slate(matches: &[MatchInput], config: &EngineConfig) -> Vec<Prediction> {
    matches
        .par_iter()
        .map(|m| predict_match(m, config))
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SlateSummary {
    pub total: usize,
    pub kept: usize,
    pub skipped: usize,
    pub capped: usize,
}

pub fn summarize(predictions: &[Prediction]) -> SlateSummary {
    let kept = predictions.iter().filter(|p| p.is_kept()).count();
    SlateSummary {
        total: predictions.len(),
        kept,
        skipped: predictions.len() - kept,
        capped: predictions.iter().filter(|p| p.confidence_capped).count(),
    }
}
