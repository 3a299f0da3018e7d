use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::InsufficientHistoryError;
use crate::stats::PlayerSurfaceStats;
use crate::weights::Factor;

const TWO_YEAR_WEIGHTS: [f64; 2] = [0.70, 0.30];
const THREE_YEAR_WEIGHTS: [f64; 3] = [0.60, 0.30, 0.10];

pub const DEFAULT_CONFIDENCE_SATURATION_MATCHES: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    TwoYear,
    #[default]
    ThreeYear,
}

impl BlendMode {
    pub fn window(self) -> usize {
        self.base_weights().len()
    }

    /// Recency weights, current season first.
    pub fn base_weights(self) -> &'static [f64] {
        match self {
            BlendMode::TwoYear => &TWO_YEAR_WEIGHTS,
            BlendMode::ThreeYear => &THREE_YEAR_WEIGHTS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlendSettings {
    pub mode: BlendMode,
    /// The "current" season of the window.
    pub season: i32,
    /// Matches at which sample confidence reaches 1.0.
    pub confidence_saturation_matches: u32,
}

impl BlendSettings {
    pub fn new(mode: BlendMode, season: i32) -> Self {
        Self {
            mode,
            season,
            confidence_saturation_matches: DEFAULT_CONFIDENCE_SATURATION_MATCHES,
        }
    }

    pub fn window_years(&self) -> Vec<i32> {
        (0..self.mode.window() as i32).map(|k| self.season - k).collect()
    }
}

/// One player's multi-season view of a single surface, built fresh per match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlendedPlayerProfile {
    pub blended_win_rate: f64,
    pub blended_factor_scores: BTreeMap<Factor, f64>,
    /// Data sufficiency in `[0, 1]`.
    pub confidence: f64,
    pub sample_size: u32,
    pub current_year_ratio: f64,
    /// Renormalized recency weight applied to each season that had data.
    pub year_weights: BTreeMap<i32, f64>,
    pub current_year_match_count: u32,
    pub latest_ranking: Option<u32>,
    pub latest_utr: Option<f64>,
}

impl BlendedPlayerProfile {
    pub fn factor(&self, factor: Factor) -> Option<f64> {
        self.blended_factor_scores.get(&factor).copied()
    }
}

/// Recency weights for the seasons that actually carry data, rescaled to sum to 1.
pub fn renormalized_weights(settings: &BlendSettings, available: &[i32]) -> BTreeMap<i32, f64> {
    let base = settings.mode.base_weights();
    let picked: Vec<(i32, f64)> = settings
        .window_years()
        .into_iter()
        .zip(base.iter().copied())
        .filter(|(year, _)| available.contains(year))
        .collect();
    let total: f64 = picked.iter().map(|(_, w)| w).sum();
    if total <= 0.0 {
        return BTreeMap::new();
    }
    picked.into_iter().map(|(y, w)| (y, w / total)).collect()
}

/// Linear ramp in matches played, flat at 1.0 from the saturation point on.
pub fn sample_confidence(sample_size: u32, saturation_matches: u32) -> f64 {
    if saturation_matches == 0 {
        return 1.0;
    }
    (sample_size as f64 / saturation_matches as f64).clamp(0.0, 1.0)
}

pub fn blend(
    stats_by_year: &BTreeMap<i32, PlayerSurfaceStats>,
    settings: &BlendSettings,
) -> Result<BlendedPlayerProfile, InsufficientHistoryError> {
    let window = settings.window_years();
    for year in stats_by_year.keys() {
        if !window.contains(year) {
            warn!(year, season = settings.season, "season outside blend window ignored");
        }
    }

    let records: Vec<&PlayerSurfaceStats> = window
        .iter()
        .filter_map(|y| stats_by_year.get(y))
        .filter(|s| s.has_data())
        .collect();
    if records.is_empty() {
        return Err(InsufficientHistoryError {
            season: settings.season,
            window: window.len(),
        });
    }

    let available: Vec<i32> = records.iter().map(|s| s.year).collect();
    let year_weights = renormalized_weights(settings, &available);

    let weighted = |pairs: &mut dyn Iterator<Item = (i32, f64)>| {
        let mut num = 0.0;
        let mut den = 0.0;
        for (year, value) in pairs {
            let w = year_weights.get(&year).copied().unwrap_or(0.0);
            num += w * value;
            den += w;
        }
        (den > 0.0).then(|| num / den)
    };

    let blended_win_rate =
        weighted(&mut records.iter().map(|s| (s.year, s.win_rate))).unwrap_or(0.0);

    let mut blended_factor_scores = BTreeMap::new();
    for factor in Factor::ALL {
        let mut values = records
            .iter()
            .filter_map(|s| s.factor_value(factor).map(|v| (s.year, v)));
        if let Some(v) = weighted(&mut values) {
            blended_factor_scores.insert(factor, v.clamp(0.0, 1.0));
        }
    }

    let sample_size = records
        .iter()
        .fold(0u32, |acc, s| acc.saturating_add(s.matches_played));
    let current = stats_by_year.get(&settings.season);
    let current_matches = current.map(|s| s.matches_played).unwrap_or(0);
    let current_year_ratio = current_matches as f64 / sample_size as f64;
    let latest = records[0];

    let profile = BlendedPlayerProfile {
        blended_win_rate,
        blended_factor_scores,
        confidence: sample_confidence(sample_size, settings.confidence_saturation_matches),
        sample_size,
        current_year_ratio,
        year_weights,
        current_year_match_count: current.map(|s| s.current_year_match_count).unwrap_or(0),
        latest_ranking: records.iter().find_map(|s| s.ranking),
        latest_utr: records.iter().find_map(|s| s.utr),
    };
    debug!(
        sample_size = profile.sample_size,
        confidence = profile.confidence,
        current_year_ratio = profile.current_year_ratio,
        latest_year = latest.year,
        "blended surface profile"
    );
    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn season(year: i32, matches: u32, win_rate: f64, form: f64) -> PlayerSurfaceStats {
        PlayerSurfaceStats::new(year, "Clay", matches, win_rate).with_factor(Factor::RecentForm, form)
    }

    fn by_year(rows: Vec<PlayerSurfaceStats>) -> BTreeMap<i32, PlayerSurfaceStats> {
        rows.into_iter().map(|s| (s.year, s)).collect()
    }

    #[test]
    fn two_year_mode_uses_seventy_thirty() {
        let settings = BlendSettings::new(BlendMode::TwoYear, 2025);
        let stats = by_year(vec![season(2025, 10, 0.8, 1.0), season(2024, 10, 0.4, 0.0)]);
        let p = blend(&stats, &settings).unwrap();
        assert!((p.blended_win_rate - (0.7 * 0.8 + 0.3 * 0.4)).abs() < 1e-12);
        assert!((p.factor(Factor::RecentForm).unwrap() - 0.7).abs() < 1e-12);
    }

    #[test]
    fn three_year_mode_uses_sixty_thirty_ten() {
        let settings = BlendSettings::new(BlendMode::ThreeYear, 2025);
        let stats = by_year(vec![
            season(2025, 10, 1.0, 1.0),
            season(2024, 10, 0.0, 0.0),
            season(2023, 10, 0.5, 0.5),
        ]);
        let p = blend(&stats, &settings).unwrap();
        assert!((p.blended_win_rate - 0.65).abs() < 1e-12);
        assert_eq!(p.sample_size, 30);
        assert!((p.current_year_ratio - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn missing_oldest_year_renormalizes() {
        let settings = BlendSettings::new(BlendMode::ThreeYear, 2025);
        let w = renormalized_weights(&settings, &[2025, 2024]);
        assert!((w[&2025] - 0.6 / 0.9).abs() < 1e-12);
        assert!((w[&2024] - 0.3 / 0.9).abs() < 1e-12);
        assert!((w.values().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn factor_missing_in_one_year_renormalizes_per_factor() {
        let settings = BlendSettings::new(BlendMode::TwoYear, 2025);
        let stats = by_year(vec![
            season(2025, 10, 0.5, 0.9),
            PlayerSurfaceStats::new(2024, "Clay", 10, 0.5),
        ]);
        let p = blend(&stats, &settings).unwrap();
        assert!((p.factor(Factor::RecentForm).unwrap() - 0.9).abs() < 1e-12);
    }

    #[test]
    fn empty_years_do_not_count() {
        let settings = BlendSettings::new(BlendMode::TwoYear, 2025);
        let stats = by_year(vec![season(2025, 0, 0.0, 0.0), season(2024, 12, 0.5, 0.5)]);
        let p = blend(&stats, &settings).unwrap();
        assert_eq!(p.year_weights.len(), 1);
        assert_eq!(p.current_year_ratio, 0.0);
    }

    #[test]
    fn no_data_is_insufficient_history() {
        let settings = BlendSettings::new(BlendMode::ThreeYear, 2025);
        let stats = by_year(vec![season(2020, 40, 0.5, 0.5)]);
        let err = blend(&stats, &settings).unwrap_err();
        assert_eq!(err.window, 3);
    }

    #[test]
    fn confidence_saturates_at_one() {
        assert_eq!(sample_confidence(0, 20), 0.0);
        assert_eq!(sample_confidence(10, 20), 0.5);
        assert_eq!(sample_confidence(20, 20), 1.0);
        assert_eq!(sample_confidence(500, 20), 1.0);
    }
}
