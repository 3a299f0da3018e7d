use serde::{Deserialize, Serialize};

use crate::score::ScoreResult;
use crate::weights::Factor;

/// Multipliers of the hierarchical ("Hannah Fry") edge model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmplificationFactors {
    /// Edges at or above this size get the flat multiplier.
    pub flat_threshold: f64,
    pub flat_multiplier: f64,
    pub point_to_game: f64,
    pub game_to_set: f64,
    pub set_to_match: f64,
    pub return_threshold: f64,
    pub return_multiplier: f64,
}

impl Default for AmplificationFactors {
    fn default() -> Self {
        Self {
            flat_threshold: 0.03,
            flat_multiplier: 1.30,
            point_to_game: 1.2,
            game_to_set: 1.5,
            set_to_match: 2.0,
            return_threshold: 0.02,
            return_multiplier: 1.6,
        }
    }
}

impl AmplificationFactors {
    pub fn hierarchical(&self) -> f64 {
        self.point_to_game * self.game_to_set * self.set_to_match
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Amplified {
    pub diff: f64,
    pub return_boosted: bool,
    pub flat_rule_applied: bool,
}

impl Amplified {
    pub fn identity(raw_diff: f64) -> Self {
        Self {
            diff: raw_diff,
            return_boosted: false,
            flat_rule_applied: false,
        }
    }
}

pub fn amplify(raw_diff: f64, factors: &AmplificationFactors) -> f64 {
    let mut d = raw_diff;
    if d.abs() >= factors.flat_threshold {
        d *= factors.flat_multiplier;
    }
    d * factors.point_to_game * factors.game_to_set * factors.set_to_match
}

/// Amplifies a scored differential, first boosting a return-of-serve edge
/// that points the same way as the overall score.
pub fn amplify_score(
    score: &ScoreResult,
    return_focus: bool,
    factors: &AmplificationFactors,
) -> Amplified {
    let mut raw = score.raw_diff;
    let mut return_boosted = false;

    if return_focus
        && let Some(edge) = score.return_edge
        && edge.abs() >= factors.return_threshold
    {
        let contribution = score.contribution(Factor::ReturnOfServe);
        if contribution != 0.0 && contribution.signum() == raw.signum() {
            raw += contribution * (factors.return_multiplier - 1.0);
            return_boosted = true;
        }
    }

    Amplified {
        diff: amplify(raw, factors),
        return_boosted,
        flat_rule_applied: raw.abs() >= factors.flat_threshold,
    }
}
