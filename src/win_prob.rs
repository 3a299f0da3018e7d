use serde::Serialize;

/// Steepness of the amplified-diff to set-probability logistic.
const LOGISTIC_K: f64 = 1.25;

pub const DEFAULT_CONFIDENCE_CAP: f64 = 0.73;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Probabilities {
    /// Favored player's probability of winning a set.
    pub set_probability: f64,
    /// Favored player's probability of winning the match.
    pub match_probability: f64,
    pub confidence_capped: bool,
    pub uncapped_set_probability: f64,
    pub uncapped_match_probability: f64,
}

impl Probabilities {
    /// Nothing known about either side.
    pub fn coin_flip() -> Self {
        Self {
            set_probability: 0.5,
            match_probability: 0.5,
            confidence_capped: false,
            uncapped_set_probability: 0.5,
            uncapped_match_probability: 0.5,
        }
    }
}

pub fn set_probability(amplified_diff: f64) -> f64 {
    1.0 / (1.0 + (-LOGISTIC_K * amplified_diff.abs()).exp())
}

/// Best of three: win 2-0, or split the first two and take the decider.
pub fn match_from_set(p: f64) -> f64 {
    let p = p.clamp(0.0, 1.0);
    p * p * (3.0 - 2.0 * p)
}

/// Maps the amplified differential to the favored player's probabilities,
/// capping both last.
pub fn calibrate(amplified_diff: f64, confidence_cap: f64) -> Probabilities {
    let set_raw = set_probability(amplified_diff);
    let match_raw = match_from_set(set_raw);
    Probabilities {
        set_probability: set_raw.min(confidence_cap),
        match_probability: match_raw.min(confidence_cap),
        confidence_capped: set_raw > confidence_cap || match_raw > confidence_cap,
        uncapped_set_probability: set_raw,
        uncapped_match_probability: match_raw,
    }
}
