use std::collections::BTreeMap;

use serde::Serialize;

use crate::blend::BlendedPlayerProfile;
use crate::weights::{Factor, WeightProfile};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreResult {
    /// Sum of contributions; positive favors player A.
    pub raw_diff: f64,
    /// `(a - b) * weight` per profile factor.
    pub breakdown: BTreeMap<Factor, f64>,
    /// Unweighted return-of-serve difference, when both sides have it.
    pub return_edge: Option<f64>,
    /// Factors the profile weights but one of the players lacks.
    pub missing: Vec<Factor>,
}

impl ScoreResult {
    pub fn empty() -> Self {
        Self {
            raw_diff: 0.0,
            breakdown: BTreeMap::new(),
            return_edge: None,
            missing: Vec::new(),
        }
    }

    pub fn contribution(&self, factor: Factor) -> f64 {
        self.breakdown.get(&factor).copied().unwrap_or(0.0)
    }
}

pub fn score(
    profile_a: &BlendedPlayerProfile,
    profile_b: &BlendedPlayerProfile,
    weights: &WeightProfile,
) -> ScoreResult {
    let mut breakdown = BTreeMap::new();
    let mut missing = Vec::new();
    let mut return_edge = None;

    for (factor, weight) in weights.weights() {
        let contribution = match (profile_a.factor(factor), profile_b.factor(factor)) {
            (Some(a), Some(b)) => {
                if factor == Factor::ReturnOfServe {
                    return_edge = Some(a - b);
                }
                (a - b) * weight
            }
            _ => {
                missing.push(factor);
                0.0
            }
        };
        breakdown.insert(factor, contribution);
    }

    ScoreResult {
        raw_diff: breakdown.values().sum(),
        breakdown,
        return_edge,
        missing,
    }
}
