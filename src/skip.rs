use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::gate::MIN_SAMPLE_SIZE;

/// Raw differentials below this are too close to call either way.
pub const COIN_FLIP_SCORE_GAP: f64 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentTier {
    #[default]
    Regular,
    /// Finals and other end-of-season elite events.
    Elite,
}

impl TournamentTier {
    pub fn parse(label: &str) -> Self {
        let lower = label.to_lowercase();
        if lower.contains("final") || lower.contains("elite") {
            TournamentTier::Elite
        } else {
            TournamentTier::Regular
        }
    }
}

impl fmt::Display for TournamentTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TournamentTier::Regular => f.write_str("Regular"),
            TournamentTier::Elite => f.write_str("Elite"),
        }
    }
}

/// Everything a skip rule is allowed to look at, computed before the chain runs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SkipSignals {
    /// Capped set probability adjusted for data reliability and protections.
    pub confidence: f64,
    /// Absolute raw score differential.
    #[serde(default)]
    pub score_gap: f64,
    pub indoor: bool,
    pub tier: TournamentTier,
    pub utr_gap: Option<f64>,
    pub ranking_gap: Option<u32>,
    /// Smaller of the two players' blended sample sizes.
    pub min_sample_size: u32,
    /// Gate and validation failures for either player, already prefixed with the player.
    #[serde(default)]
    pub data_issues: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum SkipRule {
    MinSampleSize {
        min_matches: u32,
    },
    SurfaceDataQuality,
    CoinFlipConfidence {
        min_confidence: f64,
        #[serde(default)]
        min_score_gap: f64,
    },
    EliteTournamentVariance {
        max_utr_gap: f64,
    },
    IndoorCloseUtr {
        max_utr_gap: f64,
        max_confidence: f64,
    },
    LargeRankingGapMediumConfidence {
        min_ranking_gap: u32,
        max_confidence: f64,
    },
    LowConfidenceFloor {
        indoor_only: bool,
        min_confidence: f64,
    },
}

impl SkipRule {
    pub fn name(&self) -> &'static str {
        match self {
            SkipRule::MinSampleSize { .. } => "min_sample_size",
            SkipRule::SurfaceDataQuality => "surface_data_quality",
            SkipRule::CoinFlipConfidence { .. } => "coin_flip_confidence",
            SkipRule::EliteTournamentVariance { .. } => "elite_tournament_variance",
            SkipRule::IndoorCloseUtr { .. } => "indoor_close_utr",
            SkipRule::LargeRankingGapMediumConfidence { .. } => {
                "large_ranking_gap_medium_confidence"
            }
            SkipRule::LowConfidenceFloor { .. } => "low_confidence_floor",
        }
    }

    /// Short label that tells parameterised instances of the same rule apart.
    pub fn label(&self) -> String {
        match self {
            SkipRule::MinSampleSize { min_matches } => format!("{}({min_matches})", self.name()),
            SkipRule::SurfaceDataQuality => self.name().to_string(),
            SkipRule::CoinFlipConfidence {
                min_confidence,
                min_score_gap,
            } => format!("{}({min_confidence:.2},{min_score_gap:.2})", self.name()),
            SkipRule::EliteTournamentVariance { max_utr_gap } => {
                format!("{}({max_utr_gap:.2})", self.name())
            }
            SkipRule::IndoorCloseUtr {
                max_utr_gap,
                max_confidence,
            } => format!("{}({max_utr_gap:.2},{max_confidence:.2})", self.name()),
            SkipRule::LargeRankingGapMediumConfidence {
                min_ranking_gap,
                max_confidence,
            } => format!("{}({min_ranking_gap},{max_confidence:.2})", self.name()),
            SkipRule::LowConfidenceFloor {
                indoor_only,
                min_confidence,
            } => {
                let scope = if *indoor_only { "indoor" } else { "all" };
                format!("{}({scope},{min_confidence:.2})", self.name())
            }
        }
    }

    /// The skip reason if this rule fires on `s`. Rules that need a UTR or
    /// ranking gap never fire when it is unknown.
    pub fn evaluate(&self, s: &SkipSignals) -> Option<String> {
        match *self {
            SkipRule::MinSampleSize { min_matches } => (s.min_sample_size < min_matches).then(|| {
                format!(
                    "insufficient surface sample: {} matches, need {min_matches}",
                    s.min_sample_size
                )
            }),
            SkipRule::SurfaceDataQuality => (!s.data_issues.is_empty())
                .then(|| format!("surface data quality: {}", s.data_issues.join("; "))),
            SkipRule::CoinFlipConfidence {
                min_confidence,
                min_score_gap,
            } => {
                if s.confidence < min_confidence {
                    Some(format!(
                        "coin flip: confidence {:.1}% below {:.0}%",
                        s.confidence * 100.0,
                        min_confidence * 100.0
                    ))
                } else if s.score_gap < min_score_gap {
                    Some(format!(
                        "coin flip: score gap {:.3} below {min_score_gap:.3}",
                        s.score_gap
                    ))
                } else {
                    None
                }
            }
            SkipRule::EliteTournamentVariance { max_utr_gap } => {
                let gap = s.utr_gap?;
                (s.tier == TournamentTier::Elite && s.indoor && gap < max_utr_gap).then(|| {
                    format!("elite indoor event with close UTR (gap {gap:.2} < {max_utr_gap:.2})")
                })
            }
            SkipRule::IndoorCloseUtr {
                max_utr_gap,
                max_confidence,
            } => {
                let gap = s.utr_gap?;
                (s.indoor && gap < max_utr_gap && s.confidence < max_confidence).then(|| {
                    format!(
                        "indoor close UTR: gap {gap:.2} < {max_utr_gap:.2} at confidence {:.1}% < {:.0}%",
                        s.confidence * 100.0,
                        max_confidence * 100.0
                    )
                })
            }
            SkipRule::LargeRankingGapMediumConfidence {
                min_ranking_gap,
                max_confidence,
            } => {
                let gap = s.ranking_gap?;
                (gap > min_ranking_gap && s.confidence < max_confidence).then(|| {
                    format!(
                        "large ranking gap {gap} > {min_ranking_gap} at confidence {:.1}% < {:.0}%",
                        s.confidence * 100.0,
                        max_confidence * 100.0
                    )
                })
            }
            SkipRule::LowConfidenceFloor {
                indoor_only,
                min_confidence,
            } => ((s.indoor || !indoor_only) && s.confidence < min_confidence).then(|| {
                let scope = if s.indoor { "indoor" } else { "match" };
                format!(
                    "{scope} confidence {:.1}% below floor {:.0}%",
                    s.confidence * 100.0,
                    min_confidence * 100.0
                )
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum SkipDecision {
    Keep,
    Skip { rule: String, reason: String },
}

impl SkipDecision {
    pub fn is_skip(&self) -> bool {
        matches!(self, SkipDecision::Skip { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            SkipDecision::Keep => None,
            SkipDecision::Skip { reason, .. } => Some(reason),
        }
    }
}

/// Ordered rule chain; the first rule that fires decides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkipLogicEngine {
    rules: Vec<SkipRule>,
}

impl Default for SkipLogicEngine {
    fn default() -> Self {
        Self::default_chain()
    }
}

impl SkipLogicEngine {
    pub fn new(rules: Vec<SkipRule>) -> Self {
        Self { rules }
    }

    pub fn default_chain() -> Self {
        Self::new(vec![
            SkipRule::MinSampleSize {
                min_matches: MIN_SAMPLE_SIZE,
            },
            SkipRule::SurfaceDataQuality,
            SkipRule::CoinFlipConfidence {
                min_confidence: 0.50,
                min_score_gap: COIN_FLIP_SCORE_GAP,
            },
            SkipRule::EliteTournamentVariance { max_utr_gap: 0.50 },
            SkipRule::IndoorCloseUtr {
                max_utr_gap: 0.27,
                max_confidence: 0.73,
            },
            SkipRule::IndoorCloseUtr {
                max_utr_gap: 0.40,
                max_confidence: 0.68,
            },
            SkipRule::LargeRankingGapMediumConfidence {
                min_ranking_gap: 200,
                max_confidence: 0.63,
            },
            SkipRule::LowConfidenceFloor {
                indoor_only: true,
                min_confidence: 0.59,
            },
        ])
    }

    pub fn rules(&self) -> &[SkipRule] {
        &self.rules
    }

    pub fn decide(&self, signals: &SkipSignals) -> SkipDecision {
        for rule in &self.rules {
            if let Some(reason) = rule.evaluate(signals) {
                info!(rule = rule.name(), %reason, "skip");
                return SkipDecision::Skip {
                    rule: rule.name().to_string(),
                    reason,
                };
            }
        }
        SkipDecision::Keep
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals(confidence: f64, indoor: bool) -> SkipSignals {
        SkipSignals {
            confidence,
            score_gap: 0.15,
            indoor,
            tier: TournamentTier::Regular,
            utr_gap: Some(1.5),
            ranking_gap: Some(10),
            min_sample_size: 30,
            data_issues: Vec::new(),
        }
    }

    fn rule_of(decision: &SkipDecision) -> Option<&str> {
        match decision {
            SkipDecision::Keep => None,
            SkipDecision::Skip { rule, .. } => Some(rule),
        }
    }

    #[test]
    fn coin_flip_beats_indoor_floor() {
        let engine = SkipLogicEngine::default_chain();
        let d = engine.decide(&signals(0.40, true));
        assert_eq!(rule_of(&d), Some("coin_flip_confidence"));
        assert!(d.reason().unwrap().contains("coin flip"));
    }

    #[test]
    fn near_even_score_is_a_coin_flip_at_any_confidence() {
        let engine = SkipLogicEngine::default_chain();
        let mut s = signals(0.50, false);
        s.score_gap = 0.0;
        let d = engine.decide(&s);
        assert_eq!(rule_of(&d), Some("coin_flip_confidence"));
        assert!(d.reason().unwrap().contains("score gap"));

        s.score_gap = COIN_FLIP_SCORE_GAP;
        assert_eq!(engine.decide(&s), SkipDecision::Keep);
    }

    #[test]
    fn confident_outdoor_match_is_kept() {
        let d = SkipLogicEngine::default_chain().decide(&signals(0.66, false));
        assert_eq!(d, SkipDecision::Keep);
    }

    #[test]
    fn tier_parses_finals() {
        assert_eq!(TournamentTier::parse("ATP Finals"), TournamentTier::Elite);
        assert_eq!(TournamentTier::parse("Regular"), TournamentTier::Regular);
    }

    #[test]
    fn elite_indoor_close_utr() {
        let mut s = signals(0.72, true);
        s.tier = TournamentTier::Elite;
        s.utr_gap = Some(0.45);
        let d = SkipLogicEngine::default_chain().decide(&s);
        assert_eq!(rule_of(&d), Some("elite_tournament_variance"));
    }

    #[test]
    fn indoor_close_utr_tiers() {
        let engine = SkipLogicEngine::default_chain();
        let mut s = signals(0.70, true);
        s.utr_gap = Some(0.20);
        assert!(engine.decide(&s).reason().unwrap().contains("0.27"));
        s.utr_gap = Some(0.35);
        assert_eq!(engine.decide(&s), SkipDecision::Keep);
        s.confidence = 0.65;
        assert!(engine.decide(&s).reason().unwrap().contains("0.40"));
    }

    #[test]
    fn ranking_gap_rule() {
        let engine = SkipLogicEngine::default_chain();
        let mut s = signals(0.62, false);
        s.ranking_gap = Some(250);
        assert_eq!(
            rule_of(&engine.decide(&s)),
            Some("large_ranking_gap_medium_confidence")
        );
        s.ranking_gap = Some(200);
        assert_eq!(engine.decide(&s), SkipDecision::Keep);
    }

    #[test]
    fn unknown_gaps_never_fire() {
        let mut s = signals(0.55, true);
        s.utr_gap = None;
        s.ranking_gap = None;
        let rule = SkipRule::IndoorCloseUtr {
            max_utr_gap: 0.27,
            max_confidence: 0.73,
        };
        assert_eq!(rule.evaluate(&s), None);
        // the indoor floor still catches it
        let d = SkipLogicEngine::default_chain().decide(&s);
        assert_eq!(rule_of(&d), Some("low_confidence_floor"));
    }

    #[test]
    fn data_rules_run_first() {
        let mut s = signals(0.20, true);
        s.min_sample_size = 4;
        s.data_issues.push("player_a: only 4 matches on surface, need 10".into());
        let d = SkipLogicEngine::default_chain().decide(&s);
        assert_eq!(rule_of(&d), Some("min_sample_size"));
    }

    #[test]
    fn rules_round_trip_as_tagged_json() {
        let json = serde_json::to_string(SkipLogicEngine::default_chain().rules()).unwrap();
        assert!(json.contains("\"rule\":\"indoor_close_utr\""));
        let back: Vec<SkipRule> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SkipLogicEngine::default_chain().rules());
    }
}
