use serde::{Deserialize, Serialize};

use crate::blend::BlendedPlayerProfile;

pub const MIN_CONFIDENCE: f64 = 0.50;
pub const MIN_SAMPLE_SIZE: u32 = 10;
pub const MAX_CURRENT_YEAR_RATIO: f64 = 0.80;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GateThresholds {
    pub min_confidence: f64,
    pub min_sample_size: u32,
    pub max_current_year_ratio: f64,
}

impl Default for GateThresholds {
    fn default() -> Self {
        Self {
            min_confidence: MIN_CONFIDENCE,
            min_sample_size: MIN_SAMPLE_SIZE,
            max_current_year_ratio: MAX_CURRENT_YEAR_RATIO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct GateResult {
    pub pass: bool,
    pub reasons: Vec<String>,
}

/// Every failing condition is reported; nothing short-circuits.
pub fn check(profile: &BlendedPlayerProfile, thresholds: &GateThresholds) -> GateResult {
    let mut reasons = Vec::new();

    if profile.sample_size == 0 || profile.blended_factor_scores.is_empty() {
        reasons.push("surface data missing or incomplete".to_string());
    }
    if profile.confidence < thresholds.min_confidence {
        reasons.push(format!(
            "surface confidence {:.2} below {:.2}",
            profile.confidence, thresholds.min_confidence
        ));
    }
    if profile.sample_size < thresholds.min_sample_size {
        reasons.push(format!(
            "only {} matches on surface, need {}",
            profile.sample_size, thresholds.min_sample_size
        ));
    }
    if profile.current_year_ratio > thresholds.max_current_year_ratio {
        reasons.push(format!(
            "{:.0}% of matches from current season, no historical baseline",
            profile.current_year_ratio * 100.0
        ));
    }

    GateResult {
        pass: reasons.is_empty(),
        reasons,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::weights::Factor;

    fn profile(sample_size: u32, confidence: f64, current_year_ratio: f64) -> BlendedPlayerProfile {
        BlendedPlayerProfile {
            blended_win_rate: 0.5,
            blended_factor_scores: BTreeMap::from([(Factor::RecentForm, 0.5)]),
            confidence,
            sample_size,
            current_year_ratio,
            year_weights: BTreeMap::new(),
            current_year_match_count: 0,
            latest_ranking: None,
            latest_utr: None,
        }
    }

    #[test]
    fn sample_size_boundary_is_inclusive() {
        let t = GateThresholds::default();
        assert!(!check(&profile(9, 0.9, 0.5), &t).pass);
        assert!(check(&profile(10, 0.50, 0.5), &t).pass);
    }

    #[test]
    fn confidence_just_below_floor_fails() {
        let result = check(&profile(20, 0.4999, 0.5), &GateThresholds::default());
        assert!(!result.pass);
        assert_eq!(result.reasons.len(), 1);
    }

    #[test]
    fn all_reasons_accumulate() {
        let result = check(&profile(3, 0.15, 1.0), &GateThresholds::default());
        assert!(!result.pass);
        assert_eq!(result.reasons.len(), 3);
    }

    #[test]
    fn current_year_ratio_boundary() {
        let t = GateThresholds::default();
        assert!(check(&profile(20, 1.0, 0.80), &t).pass);
        assert!(!check(&profile(20, 1.0, 0.81), &t).pass);
    }

    #[test]
    fn missing_factors_is_incomplete() {
        let mut p = profile(20, 1.0, 0.5);
        p.blended_factor_scores.clear();
        let result = check(&p, &GateThresholds::default());
        assert!(!result.pass);
        assert!(result.reasons[0].contains("missing"));
    }
}
