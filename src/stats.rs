use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::InvalidStatsError;
use crate::weights::Factor;

// Aces per service point at which the ace component of serve dominance saturates.
const ACE_RATE_CEILING: f64 = 0.15;
// Best-of-five ceiling; anything above this is a feed error.
const MAX_SETS_PER_MATCH: u32 = 5;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServeStats {
    #[serde(default)]
    pub ace_rate: f64,
    #[serde(default)]
    pub first_serve_pct: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReturnStats {
    #[serde(default)]
    pub first_serve_return_won: Option<f64>,
    #[serde(default)]
    pub second_serve_return_won: Option<f64>,
    #[serde(default)]
    pub break_points_converted: Option<f64>,
}

impl ReturnStats {
    fn mean(&self) -> Option<f64> {
        let vals: Vec<f64> = [
            self.first_serve_return_won,
            self.second_serve_return_won,
            self.break_points_converted,
        ]
        .into_iter()
        .flatten()
        .collect();
        if vals.is_empty() {
            None
        } else {
            Some(vals.iter().sum::<f64>() / vals.len() as f64)
        }
    }
}

/// One player's record for one season on one surface, as handed over by the
/// acquisition layer. Rates and factor scores are already normalized to `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSurfaceStats {
    pub year: i32,
    pub surface: String,
    pub matches_played: u32,
    #[serde(default)]
    pub sets_won: u32,
    #[serde(default)]
    pub sets_lost: u32,
    #[serde(default)]
    pub win_rate: f64,
    #[serde(default)]
    pub serve_stats: ServeStats,
    #[serde(default)]
    pub return_stats: ReturnStats,
    #[serde(default)]
    pub mental_toughness_score: Option<f64>,
    #[serde(default)]
    pub pressure_conversion_rate: Option<f64>,
    #[serde(default)]
    pub ranking: Option<u32>,
    #[serde(default)]
    pub utr: Option<f64>,
    /// Matches played this calendar year across every surface.
    #[serde(default)]
    pub current_year_match_count: u32,
    /// Explicit factor scores; anything missing here is derived from the raw counts.
    #[serde(default)]
    pub factors: BTreeMap<Factor, f64>,
}

impl PlayerSurfaceStats {
    pub fn new(year: i32, surface: &str, matches_played: u32, win_rate: f64) -> Self {
        Self {
            year,
            surface: surface.to_string(),
            matches_played,
            sets_won: 0,
            sets_lost: 0,
            win_rate,
            serve_stats: ServeStats::default(),
            return_stats: ReturnStats::default(),
            mental_toughness_score: None,
            pressure_conversion_rate: None,
            ranking: None,
            utr: None,
            current_year_match_count: 0,
            factors: BTreeMap::new(),
        }
    }

    pub fn with_factor(mut self, factor: Factor, value: f64) -> Self {
        self.factors.insert(factor, value);
        self
    }

    pub fn with_sets(mut self, won: u32, lost: u32) -> Self {
        self.sets_won = won;
        self.sets_lost = lost;
        self
    }

    pub fn has_data(&self) -> bool {
        self.matches_played > 0
    }

    pub fn validate(&self) -> Result<(), InvalidStatsError> {
        let out_of_range = |field: &str, value: f64| InvalidStatsError::OutOfRange {
            year: self.year,
            surface: self.surface.clone(),
            field: field.to_string(),
            value,
        };
        let unit = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);

        let rates = [
            ("win_rate", Some(self.win_rate)),
            ("ace_rate", Some(self.serve_stats.ace_rate)),
            ("first_serve_pct", Some(self.serve_stats.first_serve_pct)),
            ("first_serve_return_won", self.return_stats.first_serve_return_won),
            ("second_serve_return_won", self.return_stats.second_serve_return_won),
            ("break_points_converted", self.return_stats.break_points_converted),
            ("mental_toughness_score", self.mental_toughness_score),
            ("pressure_conversion_rate", self.pressure_conversion_rate),
        ];
        for (field, value) in rates {
            if let Some(v) = value
                && !unit(v)
            {
                return Err(out_of_range(field, v));
            }
        }
        for (factor, value) in &self.factors {
            if !unit(*value) {
                return Err(out_of_range(factor.as_str(), *value));
            }
        }

        let sets = u64::from(self.sets_won) + u64::from(self.sets_lost);
        if sets > u64::from(self.matches_played) * u64::from(MAX_SETS_PER_MATCH) {
            return Err(InvalidStatsError::Inconsistent {
                year: self.year,
                surface: self.surface.clone(),
                matches: self.matches_played,
                sets,
            });
        }
        Ok(())
    }

    /// Explicit factor score if the feed supplied one, otherwise a value derived
    /// from the raw counts where such a derivation exists.
    pub fn factor_value(&self, factor: Factor) -> Option<f64> {
        if let Some(v) = self.factors.get(&factor) {
            return Some(*v);
        }
        match factor {
            Factor::SetPerformance => {
                let total = u64::from(self.sets_won) + u64::from(self.sets_lost);
                (total > 0).then(|| self.sets_won as f64 / total as f64)
            }
            Factor::SurfacePerformance => self.has_data().then_some(self.win_rate),
            Factor::ClutchFactor => self.mental_toughness_score,
            Factor::PressurePerformance => self.pressure_conversion_rate,
            Factor::ReturnOfServe => self.return_stats.mean(),
            Factor::ServeDominance => {
                if self.serve_stats.first_serve_pct <= 0.0 {
                    return None;
                }
                let ace = (self.serve_stats.ace_rate / ACE_RATE_CEILING).min(1.0);
                Some(0.4 * ace + 0.6 * self.serve_stats.first_serve_pct)
            }
            _ => None,
        }
    }

    /// Pools several same-season records (e.g. indoor and outdoor hardcourt)
    /// into one. Counts are summed, rates are weighted by matches played.
    pub fn merge(records: &[&PlayerSurfaceStats], surface: &str) -> Option<PlayerSurfaceStats> {
        let first = records.first()?;
        if records.len() == 1 {
            let mut only = (*first).clone();
            only.surface = surface.to_string();
            return Some(only);
        }

        let total = |get: fn(&PlayerSurfaceStats) -> u32| {
            records.iter().fold(0u32, |acc, r| acc.saturating_add(get(r)))
        };
        let matches = total(|r| r.matches_played);
        let weight = |r: &PlayerSurfaceStats| {
            if matches == 0 {
                1.0 / records.len() as f64
            } else {
                r.matches_played as f64 / matches as f64
            }
        };
        let pooled = |get: &dyn Fn(&PlayerSurfaceStats) -> f64| {
            records.iter().map(|&r| weight(r) * get(r)).sum::<f64>()
        };
        let pooled_opt = |get: &dyn Fn(&PlayerSurfaceStats) -> Option<f64>| {
            let mut num = 0.0;
            let mut den = 0.0;
            for &r in records {
                if let Some(v) = get(r) {
                    let w = weight(r);
                    num += w * v;
                    den += w;
                }
            }
            (den > 0.0).then(|| num / den)
        };

        let mut factors = BTreeMap::new();
        for factor in Factor::ALL {
            if let Some(v) = pooled_opt(&|r| r.factors.get(&factor).copied()) {
                factors.insert(factor, v);
            }
        }

        let busiest = records
            .iter()
            .max_by_key(|r| r.matches_played)
            .copied()
            .unwrap_or(*first);

        Some(PlayerSurfaceStats {
            year: first.year,
            surface: surface.to_string(),
            matches_played: matches,
            sets_won: total(|r| r.sets_won),
            sets_lost: total(|r| r.sets_lost),
            win_rate: pooled(&|r| r.win_rate),
            serve_stats: ServeStats {
                ace_rate: pooled(&|r| r.serve_stats.ace_rate),
                first_serve_pct: pooled(&|r| r.serve_stats.first_serve_pct),
            },
            return_stats: ReturnStats {
                first_serve_return_won: pooled_opt(&|r| r.return_stats.first_serve_return_won),
                second_serve_return_won: pooled_opt(&|r| r.return_stats.second_serve_return_won),
                break_points_converted: pooled_opt(&|r| r.return_stats.break_points_converted),
            },
            mental_toughness_score: pooled_opt(&|r| r.mental_toughness_score),
            pressure_conversion_rate: pooled_opt(&|r| r.pressure_conversion_rate),
            ranking: busiest.ranking,
            utr: busiest.utr,
            current_year_match_count: records
                .iter()
                .map(|r| r.current_year_match_count)
                .max()
                .unwrap_or(0),
            factors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_factor_wins_over_derivation() {
        let s = PlayerSurfaceStats::new(2025, "Clay", 12, 0.6)
            .with_sets(20, 10)
            .with_factor(Factor::SetPerformance, 0.9);
        assert_eq!(s.factor_value(Factor::SetPerformance), Some(0.9));
    }

    #[test]
    fn derives_set_performance_and_serve() {
        let mut s = PlayerSurfaceStats::new(2025, "Clay", 12, 0.6).with_sets(18, 6);
        s.serve_stats = ServeStats {
            ace_rate: 0.30,
            first_serve_pct: 0.5,
        };
        assert_eq!(s.factor_value(Factor::SetPerformance), Some(0.75));
        assert_eq!(s.factor_value(Factor::SurfacePerformance), Some(0.6));
        let serve = s.factor_value(Factor::ServeDominance).unwrap();
        assert!((serve - 0.7).abs() < 1e-12);
        assert_eq!(s.factor_value(Factor::Momentum), None);
    }

    #[test]
    fn return_of_serve_averages_available_rates() {
        let mut s = PlayerSurfaceStats::new(2025, "Grass", 5, 0.4);
        s.return_stats.first_serve_return_won = Some(0.30);
        s.return_stats.second_serve_return_won = Some(0.50);
        let v = s.factor_value(Factor::ReturnOfServe).unwrap();
        assert!((v - 0.40).abs() < 1e-12);
    }

    #[test]
    fn validate_flags_rates_outside_unit_interval() {
        let s = PlayerSurfaceStats::new(2025, "Clay", 10, 1.4);
        assert!(matches!(
            s.validate(),
            Err(InvalidStatsError::OutOfRange { ref field, .. }) if field == "win_rate"
        ));
        let s = PlayerSurfaceStats::new(2025, "Clay", 2, 0.5).with_sets(9, 4);
        assert!(matches!(s.validate(), Err(InvalidStatsError::Inconsistent { .. })));
    }

    #[test]
    fn huge_counts_are_rejected_not_overflowed() {
        let s = PlayerSurfaceStats::new(2025, "Clay", u32::MAX / 2, 0.5).with_sets(10, 10);
        assert_eq!(s.validate(), Ok(()));
        let s = PlayerSurfaceStats::new(2025, "Clay", 1, 0.5).with_sets(u32::MAX, u32::MAX);
        assert!(matches!(
            s.validate(),
            Err(InvalidStatsError::Inconsistent { sets, .. }) if sets == 2 * u64::from(u32::MAX)
        ));
        assert_eq!(s.factor_value(Factor::SetPerformance), Some(0.5));
    }

    #[test]
    fn merge_saturates_instead_of_overflowing() {
        let a = PlayerSurfaceStats::new(2025, "Hardcourt indoor", u32::MAX, 0.5).with_sets(u32::MAX, 1);
        let b = PlayerSurfaceStats::new(2025, "Hardcourt outdoor", 10, 0.5).with_sets(5, 1);
        let merged = PlayerSurfaceStats::merge(&[&a, &b], "Hard").unwrap();
        assert_eq!(merged.matches_played, u32::MAX);
        assert_eq!(merged.sets_won, u32::MAX);
        assert_eq!(merged.sets_lost, 2);
    }

    #[test]
    fn merge_weights_rates_by_matches() {
        let indoor = PlayerSurfaceStats::new(2025, "Hardcourt indoor", 10, 0.8)
            .with_sets(20, 5)
            .with_factor(Factor::RecentForm, 0.9);
        let outdoor = PlayerSurfaceStats::new(2025, "Hardcourt outdoor", 30, 0.4)
            .with_sets(30, 30)
            .with_factor(Factor::RecentForm, 0.5);
        let merged = PlayerSurfaceStats::merge(&[&indoor, &outdoor], "Hard").unwrap();
        assert_eq!(merged.surface, "Hard");
        assert_eq!(merged.matches_played, 40);
        assert_eq!(merged.sets_won, 50);
        assert!((merged.win_rate - 0.5).abs() < 1e-12);
        assert!((merged.factors[&Factor::RecentForm] - 0.6).abs() < 1e-12);
    }
}
