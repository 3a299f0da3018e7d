use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::InvalidConfigError;

pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-3;

pub const DEFAULT_PROFILE_CODE: &str = "BASELINE";

/// Feature flag that enables the return-of-serve boost during amplification.
pub const FEATURE_RETURN_FOCUS: &str = "return_of_serve_focus";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Factor {
    SetPerformance,
    RecentForm,
    Momentum,
    SurfacePerformance,
    ClutchFactor,
    PhysicalFactors,
    RankingAdvantage,
    ReturnOfServe,
    TiebreakPerformance,
    PressurePerformance,
    ServeDominance,
}

impl Factor {
    pub const ALL: [Factor; 11] = [
        Factor::SetPerformance,
        Factor::RecentForm,
        Factor::Momentum,
        Factor::SurfacePerformance,
        Factor::ClutchFactor,
        Factor::PhysicalFactors,
        Factor::RankingAdvantage,
        Factor::ReturnOfServe,
        Factor::TiebreakPerformance,
        Factor::PressurePerformance,
        Factor::ServeDominance,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Factor::SetPerformance => "set_performance",
            Factor::RecentForm => "recent_form",
            Factor::Momentum => "momentum",
            Factor::SurfacePerformance => "surface_performance",
            Factor::ClutchFactor => "clutch_factor",
            Factor::PhysicalFactors => "physical_factors",
            Factor::RankingAdvantage => "ranking_advantage",
            Factor::ReturnOfServe => "return_of_serve",
            Factor::TiebreakPerformance => "tiebreak_performance",
            Factor::PressurePerformance => "pressure_performance",
            Factor::ServeDominance => "serve_dominance",
        }
    }

    pub fn parse(name: &str) -> Option<Factor> {
        let key = name.trim().to_ascii_lowercase();
        Factor::ALL.into_iter().find(|f| f.as_str() == key)
    }
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated, named set of factor weights.
///
/// Construction fails unless every factor is known, every weight lies in
/// `[0, 1]`, and the weights sum to `1.0 ± 1e-3`. Profiles are never
/// renormalized behind the caller's back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightProfile {
    code_name: String,
    name: String,
    description: String,
    weights: BTreeMap<Factor, f64>,
    features: BTreeMap<String, bool>,
}

impl WeightProfile {
    pub fn new<K: AsRef<str>>(
        code_name: &str,
        weights: impl IntoIterator<Item = (K, f64)>,
    ) -> Result<Self, InvalidConfigError> {
        let mut parsed = BTreeMap::new();
        for (raw, weight) in weights {
            let raw = raw.as_ref();
            let Some(factor) = Factor::parse(raw) else {
                return Err(InvalidConfigError::UnknownFactor {
                    profile: code_name.to_string(),
                    factor: raw.to_string(),
                });
            };
            if !weight.is_finite() || !(0.0..=1.0).contains(&weight) {
                return Err(InvalidConfigError::WeightOutOfRange {
                    profile: code_name.to_string(),
                    factor: raw.to_string(),
                    weight,
                });
            }
            parsed.insert(factor, weight);
        }

        if parsed.is_empty() {
            return Err(InvalidConfigError::EmptyProfile {
                profile: code_name.to_string(),
            });
        }

        let sum: f64 = parsed.values().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(InvalidConfigError::WeightSum {
                profile: code_name.to_string(),
                sum,
                tolerance: WEIGHT_SUM_TOLERANCE,
            });
        }

        Ok(Self {
            code_name: code_name.to_string(),
            name: code_name.to_string(),
            description: String::new(),
            weights: parsed,
            features: BTreeMap::new(),
        })
    }

    /// The base weights the model has shipped with since the return-of-serve factor was added.
    pub fn baseline() -> Self {
        Self {
            code_name: DEFAULT_PROFILE_CODE.to_string(),
            name: "Baseline".to_string(),
            description: "Set performance led, return-of-serve focus".to_string(),
            weights: BTreeMap::from([
                (Factor::SetPerformance, 0.28),
                (Factor::RecentForm, 0.20),
                (Factor::Momentum, 0.11),
                (Factor::SurfacePerformance, 0.10),
                (Factor::ClutchFactor, 0.09),
                (Factor::PhysicalFactors, 0.05),
                (Factor::RankingAdvantage, 0.09),
                (Factor::ReturnOfServe, 0.08),
            ]),
            features: BTreeMap::from([(FEATURE_RETURN_FOCUS.to_string(), true)]),
        }
    }

    pub fn with_name(mut self, name: &str, description: &str) -> Self {
        self.name = name.to_string();
        self.description = description.to_string();
        self
    }

    pub fn with_feature(mut self, flag: &str, enabled: bool) -> Self {
        self.features.insert(flag.to_string(), enabled);
        self
    }

    pub fn code_name(&self) -> &str {
        &self.code_name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn weight(&self, factor: Factor) -> Option<f64> {
        self.weights.get(&factor).copied()
    }

    pub fn weights(&self) -> impl Iterator<Item = (Factor, f64)> + '_ {
        self.weights.iter().map(|(f, w)| (*f, *w))
    }

    pub fn features(&self) -> &BTreeMap<String, bool> {
        &self.features
    }

    pub fn feature(&self, flag: &str) -> Option<bool> {
        self.features.get(flag).copied()
    }

    /// Heaviest factors first; ties keep catalogue order.
    pub fn top_factors(&self, n: usize) -> Vec<(Factor, f64)> {
        let mut rows: Vec<(Factor, f64)> = self.weights().collect();
        rows.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        rows.truncate(n);
        rows
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    active: Option<String>,
    #[serde(default)]
    profiles: BTreeMap<String, ProfileFile>,
}

#[derive(Debug, Clone, Deserialize)]
struct ProfileFile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: String,
    weights: BTreeMap<String, f64>,
    #[serde(default)]
    features: BTreeMap<String, bool>,
}

/// Named collection of weight profiles. Read-only once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightRegistry {
    profiles: BTreeMap<String, WeightProfile>,
    active: Option<String>,
}

impl WeightRegistry {
    pub fn builtin() -> Self {
        let baseline = WeightProfile::baseline();
        Self {
            active: Some(baseline.code_name().to_string()),
            profiles: BTreeMap::from([(baseline.code_name().to_string(), baseline)]),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, InvalidConfigError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Parses and validates every profile; the first invalid one fails the whole registry.
    pub fn from_json_str(raw: &str) -> Result<Self, InvalidConfigError> {
        let file: RegistryFile = serde_json::from_str(raw)?;

        let mut profiles = BTreeMap::new();
        for (code_name, entry) in file.profiles {
            let mut profile = WeightProfile::new(&code_name, entry.weights)?;
            profile.name = entry.name.unwrap_or_else(|| code_name.clone());
            profile.description = entry.description;
            profile.features = entry.features;
            profiles.insert(code_name, profile);
        }

        if let Some(active) = file.active.as_deref()
            && !profiles.contains_key(active)
        {
            return Err(InvalidConfigError::UnknownProfile(active.to_string()));
        }

        Ok(Self {
            profiles,
            active: file.active,
        })
    }

    pub fn get(&self, code_name: &str) -> Option<&WeightProfile> {
        self.profiles.get(code_name)
    }

    pub fn active_code_name(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// The requested profile, or the registry's active one when no name is given.
    pub fn select(&self, code_name: Option<&str>) -> Result<&WeightProfile, InvalidConfigError> {
        let code = code_name
            .or(self.active.as_deref())
            .ok_or(InvalidConfigError::NoActiveProfile)?;
        self.get(code)
            .ok_or_else(|| InvalidConfigError::UnknownProfile(code.to_string()))
    }

    pub fn profiles(&self) -> impl Iterator<Item = &WeightProfile> {
        self.profiles.values()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
