use serde::{Deserialize, Serialize};

/// Confidence adjustments applied to a scored pick before the skip chain sees it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "protection", rename_all = "snake_case")]
pub enum Protection {
    /// The favorite is ranked at least `min_ranking_gap` places below the opponent.
    UpsetCap { min_ranking_gap: u32, cap: f64 },
    TerribleFormCap { max_form: f64, cap: f64 },
    /// Several red flags on a pick the engine already likes a lot.
    BagelCap {
        min_red_flags: usize,
        min_confidence: f64,
        very_high_probability: f64,
        major_form_gap: f64,
        cap: f64,
    },
    /// Medium-confidence indoor picks without a clear clutch edge.
    LowClutchIndoor {
        min_confidence: f64,
        max_confidence: f64,
        min_clutch_gap: f64,
        multiplier: f64,
    },
}

/// What the protections know about the pick, oriented to the favored player.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PickContext {
    pub indoor: bool,
    pub favored_rank: Option<u32>,
    pub opponent_rank: Option<u32>,
    pub favored_form: Option<f64>,
    pub opponent_form: Option<f64>,
    pub favored_clutch: Option<f64>,
    pub opponent_clutch: Option<f64>,
    pub uncapped_match_probability: f64,
    /// Missing UTR, ranking or factor data for either player.
    pub data_gaps: bool,
}

impl Protection {
    pub fn name(&self) -> &'static str {
        match self {
            Protection::UpsetCap { .. } => "upset_cap",
            Protection::TerribleFormCap { .. } => "terrible_form_cap",
            Protection::BagelCap { .. } => "bagel_cap",
            Protection::LowClutchIndoor { .. } => "low_clutch_indoor",
        }
    }

    /// The lowered confidence if this protection fires; `None` leaves it alone.
    pub fn apply(&self, confidence: f64, ctx: &PickContext) -> Option<f64> {
        match *self {
            Protection::UpsetCap {
                min_ranking_gap,
                cap,
            } => {
                let (favored, opponent) = (ctx.favored_rank?, ctx.opponent_rank?);
                (favored > opponent && favored - opponent >= min_ranking_gap && confidence > cap)
                    .then_some(cap)
            }
            Protection::TerribleFormCap { max_form, cap } => {
                (ctx.favored_form? < max_form && confidence > cap).then_some(cap)
            }
            Protection::BagelCap {
                min_red_flags,
                min_confidence,
                very_high_probability,
                major_form_gap,
                cap,
            } => {
                let form_issue = match (ctx.favored_form, ctx.opponent_form) {
                    (Some(f), Some(o)) => o - f >= major_form_gap,
                    _ => false,
                };
                let red_flags = [
                    form_issue,
                    ctx.uncapped_match_probability > very_high_probability,
                    ctx.data_gaps,
                ]
                .into_iter()
                .filter(|flag| *flag)
                .count();
                (red_flags >= min_red_flags && confidence > min_confidence && confidence > cap)
                    .then_some(cap)
            }
            Protection::LowClutchIndoor {
                min_confidence,
                max_confidence,
                min_clutch_gap,
                multiplier,
            } => {
                let gap = ctx.favored_clutch? - ctx.opponent_clutch?;
                (ctx.indoor
                    && (min_confidence..max_confidence).contains(&confidence)
                    && gap < min_clutch_gap)
                    .then_some(confidence * multiplier)
            }
        }
    }
}

pub fn default_protections() -> Vec<Protection> {
    vec![
        Protection::BagelCap {
            min_red_flags: 2,
            min_confidence: 0.70,
            very_high_probability: 0.80,
            major_form_gap: 0.20,
            cap: 0.65,
        },
        Protection::UpsetCap {
            min_ranking_gap: 50,
            cap: 0.65,
        },
        Protection::TerribleFormCap {
            max_form: 0.20,
            cap: 0.55,
        },
        Protection::LowClutchIndoor {
            min_confidence: 0.55,
            max_confidence: 0.73,
            min_clutch_gap: 0.10,
            multiplier: 0.75,
        },
    ]
}

#[derive(Debug, Clone, PartialEq)]
pub struct Protected {
    pub confidence: f64,
    pub fired: Vec<&'static str>,
}

/// Runs every protection in order; each one sees the confidence left by the previous.
pub fn protect(protections: &[Protection], confidence: f64, ctx: &PickContext) -> Protected {
    let mut out = Protected {
        confidence,
        fired: Vec::new(),
    };
    for protection in protections {
        if let Some(lowered) = protection.apply(out.confidence, ctx) {
            out.confidence = lowered;
            out.fired.push(protection.name());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> PickContext {
        PickContext {
            indoor: false,
            favored_rank: Some(20),
            opponent_rank: Some(40),
            favored_form: Some(0.6),
            opponent_form: Some(0.5),
            favored_clutch: Some(0.6),
            opponent_clutch: Some(0.4),
            uncapped_match_probability: 0.70,
            data_gaps: false,
        }
    }

    #[test]
    fn healthy_pick_is_untouched() {
        let out = protect(&default_protections(), 0.68, &ctx());
        assert_eq!(out.confidence, 0.68);
        assert!(out.fired.is_empty());
    }

    #[test]
    fn upset_pick_is_capped() {
        let mut c = ctx();
        c.favored_rank = Some(120);
        c.opponent_rank = Some(70);
        let out = protect(&default_protections(), 0.70, &c);
        assert_eq!(out.confidence, 0.65);
        assert_eq!(out.fired, vec!["upset_cap"]);

        c.favored_rank = Some(119);
        assert!(protect(&default_protections(), 0.70, &c).fired.is_empty());
    }

    #[test]
    fn unknown_rankings_never_count_as_upsets() {
        let mut c = ctx();
        c.favored_rank = None;
        let rule = Protection::UpsetCap {
            min_ranking_gap: 50,
            cap: 0.65,
        };
        assert_eq!(rule.apply(0.70, &c), None);
    }

    #[test]
    fn terrible_form_caps_at_55() {
        let mut c = ctx();
        c.favored_form = Some(0.15);
        let out = protect(&default_protections(), 0.66, &c);
        assert_eq!(out.confidence, 0.55);
        assert_eq!(out.fired, vec!["terrible_form_cap"]);
    }

    #[test]
    fn bagel_cap_needs_two_red_flags() {
        let mut c = ctx();
        c.uncapped_match_probability = 0.85;
        assert!(protect(&default_protections(), 0.72, &c).fired.is_empty());

        c.data_gaps = true;
        let out = protect(&default_protections(), 0.72, &c);
        assert_eq!(out.confidence, 0.65);
        assert_eq!(out.fired, vec!["bagel_cap"]);

        // below the high-confidence band it stays quiet
        assert!(protect(&default_protections(), 0.69, &c).fired.is_empty());
    }

    #[test]
    fn low_clutch_downgrades_medium_indoor_picks() {
        let mut c = ctx();
        c.indoor = true;
        c.favored_clutch = Some(0.45);
        let out = protect(&default_protections(), 0.64, &c);
        assert!((out.confidence - 0.48).abs() < 1e-12);
        assert_eq!(out.fired, vec!["low_clutch_indoor"]);

        // outside the medium band, or outdoors, nothing happens
        assert!(protect(&default_protections(), 0.54, &c).fired.is_empty());
        c.indoor = false;
        assert!(protect(&default_protections(), 0.64, &c).fired.is_empty());
    }

    #[test]
    fn protections_round_trip_as_tagged_json() {
        let json = serde_json::to_string(&default_protections()).unwrap();
        assert!(json.contains("\"protection\":\"low_clutch_indoor\""));
        let back: Vec<Protection> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, default_protections());
    }
}
