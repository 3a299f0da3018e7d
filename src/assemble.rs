use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::skip::{SkipDecision, SkipSignals};
use crate::weights::Factor;
use crate::win_prob::Probabilities;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    PlayerA,
    PlayerB,
}

/// One match's verdict. Self-describing: the breakdown, signals and flags are
/// enough to audit why it was kept or skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub match_id: String,
    pub player_a: String,
    pub player_b: String,
    pub surface: String,
    pub favored: Side,
    pub favored_player: String,
    pub set_probability: f64,
    pub match_probability: f64,
    pub confidence_capped: bool,
    pub confidence: f64,
    pub raw_diff: f64,
    pub amplified_diff: f64,
    pub skipped: bool,
    pub skip_rule: Option<String>,
    pub skip_reason: Option<String>,
    pub risk_flags: BTreeSet<String>,
    pub factor_breakdown: BTreeMap<Factor, f64>,
    pub weight_profile: String,
    pub signals: SkipSignals,
}

impl Prediction {
    pub fn is_kept(&self) -> bool {
        !self.skipped
    }
}

pub struct Players<'a> {
    pub a: &'a str,
    pub b: &'a str,
}

pub struct Scored<'a> {
    pub raw_diff: f64,
    pub amplified_diff: f64,
    pub breakdown: &'a BTreeMap<Factor, f64>,
}

#[allow(clippy::too_many_arguments)]
pub fn assemble(
    match_id: &str,
    players: Players<'_>,
    surface: &str,
    probabilities: &Probabilities,
    decision: &SkipDecision,
    scored: Scored<'_>,
    weight_profile: &str,
    signals: SkipSignals,
    risk_flags: BTreeSet<String>,
) -> Prediction {
    let favored = if scored.amplified_diff < 0.0 {
        Side::PlayerB
    } else {
        Side::PlayerA
    };
    let favored_player = match favored {
        Side::PlayerA => players.a,
        Side::PlayerB => players.b,
    };
    let (skip_rule, skip_reason) = match decision {
        SkipDecision::Keep => (None, None),
        SkipDecision::Skip { rule, reason } => (Some(rule.clone()), Some(reason.clone())),
    };

    Prediction {
        match_id: match_id.to_string(),
        player_a: players.a.to_string(),
        player_b: players.b.to_string(),
        surface: surface.to_string(),
        favored,
        favored_player: favored_player.to_string(),
        set_probability: probabilities.set_probability,
        match_probability: probabilities.match_probability,
        confidence_capped: probabilities.confidence_capped,
        confidence: signals.confidence,
        raw_diff: scored.raw_diff,
        amplified_diff: scored.amplified_diff,
        skipped: decision.is_skip(),
        skip_rule,
        skip_reason,
        risk_flags,
        factor_breakdown: scored.breakdown.clone(),
        weight_profile: weight_profile.to_string(),
        signals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_reason_present_only_when_skipped() {
        let probs = Probabilities::coin_flip();
        let breakdown = BTreeMap::new();
        let keep = assemble(
            "m1",
            Players { a: "A", b: "B" },
            "Clay",
            &probs,
            &SkipDecision::Keep,
            Scored {
                raw_diff: 0.0,
                amplified_diff: 0.0,
                breakdown: &breakdown,
            },
            "BASELINE",
            SkipSignals::default(),
            BTreeSet::new(),
        );
        assert!(!keep.skipped);
        assert!(keep.skip_reason.is_none());

        let skip = assemble(
            "m1",
            Players { a: "A", b: "B" },
            "Clay",
            &probs,
            &SkipDecision::Skip {
                rule: "coin_flip_confidence".into(),
                reason: "coin flip".into(),
            },
            Scored {
                raw_diff: -0.1,
                amplified_diff: -0.4,
                breakdown: &breakdown,
            },
            "BASELINE",
            SkipSignals::default(),
            BTreeSet::new(),
        );
        assert!(skip.skipped);
        assert_eq!(skip.skip_reason.as_deref(), Some("coin flip"));
        assert_eq!(skip.favored_player, "B");
    }
}
