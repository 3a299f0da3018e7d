use std::path::PathBuf;

use chrono::{Datelike, Utc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::amplify::AmplificationFactors;
use crate::blend::{BlendMode, BlendSettings};
use crate::error::InvalidConfigError;
use crate::gate::GateThresholds;
use crate::protect::{self, Protection};
use crate::skip::{SkipLogicEngine, SkipRule};
use crate::weights::{FEATURE_RETURN_FOCUS, WeightProfile, WeightRegistry};
use crate::win_prob::DEFAULT_CONFIDENCE_CAP;

/// Everything a scoring run depends on. Built once, then shared read-only
/// across every match of the run.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    profile: WeightProfile,
    aggregate_indoor_outdoor: bool,
    confidence_cap: f64,
    amplification_enabled: bool,
    blend: BlendSettings,
    gate: GateThresholds,
    amplification: AmplificationFactors,
    protections: Vec<Protection>,
    skip: SkipLogicEngine,
}

impl EngineConfig {
    pub fn new(profile: WeightProfile, season: i32) -> Self {
        Self {
            profile,
            aggregate_indoor_outdoor: false,
            confidence_cap: DEFAULT_CONFIDENCE_CAP,
            amplification_enabled: true,
            blend: BlendSettings::new(BlendMode::default(), season),
            gate: GateThresholds::default(),
            amplification: AmplificationFactors::default(),
            protections: protect::default_protections(),
            skip: SkipLogicEngine::default_chain(),
        }
    }

    pub fn with_aggregate_indoor_outdoor(mut self, enabled: bool) -> Self {
        self.aggregate_indoor_outdoor = enabled;
        self
    }

    pub fn with_confidence_cap(mut self, cap: f64) -> Result<Self, InvalidConfigError> {
        if !cap.is_finite() || cap <= 0.5 || cap > 1.0 {
            return Err(InvalidConfigError::ConfidenceCap(cap));
        }
        self.confidence_cap = cap;
        Ok(self)
    }

    pub fn with_amplification(mut self, enabled: bool) -> Self {
        self.amplification_enabled = enabled;
        self
    }

    pub fn with_amplification_factors(mut self, factors: AmplificationFactors) -> Self {
        self.amplification = factors;
        self
    }

    pub fn with_blend_mode(mut self, mode: BlendMode) -> Self {
        self.blend.mode = mode;
        self
    }

    pub fn with_confidence_saturation(mut self, matches: u32) -> Result<Self, InvalidConfigError> {
        if matches == 0 {
            return Err(InvalidConfigError::Setting {
                key: "confidence_saturation_matches".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        self.blend.confidence_saturation_matches = matches;
        Ok(self)
    }

    pub fn with_gate_thresholds(mut self, gate: GateThresholds) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_skip_rules(mut self, rules: Vec<SkipRule>) -> Self {
        self.skip = SkipLogicEngine::new(rules);
        self
    }

    pub fn with_protections(mut self, protections: Vec<Protection>) -> Self {
        self.protections = protections;
        self
    }

    pub fn profile(&self) -> &WeightProfile {
        &self.profile
    }

    pub fn aggregate_indoor_outdoor(&self) -> bool {
        self.aggregate_indoor_outdoor
    }

    pub fn confidence_cap(&self) -> f64 {
        self.confidence_cap
    }

    pub fn amplification_enabled(&self) -> bool {
        self.amplification_enabled
    }

    pub fn amplification(&self) -> &AmplificationFactors {
        &self.amplification
    }

    /// Profiles without the flag keep the return boost on.
    pub fn return_focus(&self) -> bool {
        self.profile.feature(FEATURE_RETURN_FOCUS).unwrap_or(true)
    }

    pub fn blend(&self) -> &BlendSettings {
        &self.blend
    }

    pub fn season(&self) -> i32 {
        self.blend.season
    }

    pub fn gate(&self) -> &GateThresholds {
        &self.gate
    }

    pub fn protections(&self) -> &[Protection] {
        &self.protections
    }

    pub fn skip_engine(&self) -> &SkipLogicEngine {
        &self.skip
    }
}

pub fn current_season() -> i32 {
    Utc::now().year()
}

/// stderr logging for the binaries; stdout stays machine-readable.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// `.env.local` first so it wins over `.env`.
pub fn load_dotenv() {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
}

pub const ENV_REGISTRY: &str = "SET_EDGE_REGISTRY";
pub const ENV_PROFILE: &str = "SET_EDGE_PROFILE";
pub const ENV_AGGREGATE_HARD: &str = "SET_EDGE_AGGREGATE_HARD";
pub const ENV_CONFIDENCE_CAP: &str = "SET_EDGE_CONFIDENCE_CAP";
pub const ENV_AMPLIFY: &str = "SET_EDGE_AMPLIFY";
pub const ENV_THREE_YEAR: &str = "SET_EDGE_THREE_YEAR";
pub const ENV_SEASON: &str = "SET_EDGE_SEASON";

/// Binary-side settings, resolved from CLI flags, then env vars, then defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub registry_path: Option<PathBuf>,
    pub profile: Option<String>,
    pub aggregate_indoor_outdoor: bool,
    pub confidence_cap: f64,
    pub amplification_enabled: bool,
    pub blend_mode: BlendMode,
    pub season: i32,
}

impl RunSettings {
    pub fn resolve(args: &[String]) -> Result<Self, InvalidConfigError> {
        Self::resolve_with(args, |key| std::env::var(key).ok())
    }

    /// Like [`RunSettings::resolve`] with a custom env lookup.
    pub fn resolve_with(
        args: &[String],
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, InvalidConfigError> {
        let lookup = |flag: &str, key: &str| {
            arg_value(args, flag).or_else(|| env(key).filter(|v| !v.trim().is_empty()))
        };

        let registry_path = lookup("--registry", ENV_REGISTRY).map(PathBuf::from);
        let profile = lookup("--profile", ENV_PROFILE);

        let aggregate_indoor_outdoor = if has_flag(args, "--aggregate-hard") {
            true
        } else {
            parse_bool(ENV_AGGREGATE_HARD, env(ENV_AGGREGATE_HARD))?.unwrap_or(false)
        };
        let amplification_enabled = if has_flag(args, "--no-amplify") {
            false
        } else {
            parse_bool(ENV_AMPLIFY, env(ENV_AMPLIFY))?.unwrap_or(true)
        };
        let three_year = if has_flag(args, "--two-year") {
            false
        } else {
            parse_bool(ENV_THREE_YEAR, env(ENV_THREE_YEAR))?.unwrap_or(true)
        };

        let confidence_cap = match lookup("--confidence-cap", ENV_CONFIDENCE_CAP) {
            Some(raw) => parse_number(ENV_CONFIDENCE_CAP, &raw)?,
            None => DEFAULT_CONFIDENCE_CAP,
        };
        let season = match lookup("--season", ENV_SEASON) {
            Some(raw) => parse_number(ENV_SEASON, &raw)?,
            None => current_season(),
        };

        Ok(Self {
            registry_path,
            profile,
            aggregate_indoor_outdoor,
            confidence_cap,
            amplification_enabled,
            blend_mode: if three_year {
                BlendMode::ThreeYear
            } else {
                BlendMode::TwoYear
            },
            season,
        })
    }

    pub fn load_registry(&self) -> Result<WeightRegistry, InvalidConfigError> {
        match &self.registry_path {
            Some(path) => WeightRegistry::load(path),
            None => Ok(WeightRegistry::builtin()),
        }
    }

    /// Loads the registry, selects the profile and validates everything up front.
    pub fn engine_config(&self) -> Result<EngineConfig, InvalidConfigError> {
        let registry = self.load_registry()?;
        let profile = registry.select(self.profile.as_deref())?.clone();
        EngineConfig::new(profile, self.season)
            .with_aggregate_indoor_outdoor(self.aggregate_indoor_outdoor)
            .with_amplification(self.amplification_enabled)
            .with_blend_mode(self.blend_mode)
            .with_confidence_cap(self.confidence_cap)
    }
}

pub fn has_flag(args: &[String], name: &str) -> bool {
    args.iter().any(|arg| arg == name)
}

/// `--name=value` or `--name value`.
pub fn arg_value(args: &[String], name: &str) -> Option<String> {
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&format!("{name}=")) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
            && !next.starts_with("--")
        {
            return Some(next.trim().to_string());
        }
    }
    None
}

fn parse_bool(key: &str, raw: Option<String>) -> Result<Option<bool>, InvalidConfigError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "" => Ok(None),
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        other => Err(InvalidConfigError::Setting {
            key: key.to_string(),
            reason: format!("`{other}` is not a boolean"),
        }),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, InvalidConfigError> {
    raw.trim().parse::<T>().map_err(|_| InvalidConfigError::Setting {
        key: key.to_string(),
        reason: format!("`{raw}` is not a number"),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_without_flags_or_env() {
        let s = RunSettings::resolve_with(&[], |_| None).unwrap();
        assert_eq!(s.confidence_cap, 0.73);
        assert!(s.amplification_enabled);
        assert!(!s.aggregate_indoor_outdoor);
        assert_eq!(s.blend_mode, BlendMode::ThreeYear);
        assert!(s.registry_path.is_none());
    }

    #[test]
    fn flags_beat_env() {
        let env = HashMap::from([
            (ENV_SEASON, "2023"),
            (ENV_PROFILE, "FROM_ENV"),
            (ENV_AGGREGATE_HARD, "false"),
        ]);
        let s = RunSettings::resolve_with(
            &args(&["--season=2025", "--aggregate-hard", "--two-year"]),
            |k| env.get(k).map(|v| v.to_string()),
        )
        .unwrap();
        assert_eq!(s.season, 2025);
        assert_eq!(s.profile.as_deref(), Some("FROM_ENV"));
        assert!(s.aggregate_indoor_outdoor);
        assert_eq!(s.blend_mode, BlendMode::TwoYear);
    }

    #[test]
    fn bad_env_values_are_config_errors() {
        let err = RunSettings::resolve_with(&[], |k| {
            (k == ENV_AMPLIFY).then(|| "sometimes".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, InvalidConfigError::Setting { .. }));
    }

    #[test]
    fn confidence_cap_range() {
        let base = EngineConfig::new(WeightProfile::baseline(), 2025);
        assert!(base.clone().with_confidence_cap(0.5).is_err());
        assert!(base.clone().with_confidence_cap(1.01).is_err());
        assert_eq!(base.with_confidence_cap(0.70).unwrap().confidence_cap(), 0.70);
    }

    #[test]
    fn space_separated_args() {
        let a = args(&["--profile", "AGGRESSIVE", "--confidence-cap", "0.7"]);
        assert_eq!(arg_value(&a, "--profile").as_deref(), Some("AGGRESSIVE"));
        let s = RunSettings::resolve_with(&a, |_| None).unwrap();
        assert_eq!(s.confidence_cap, 0.7);
    }
}
