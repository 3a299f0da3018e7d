use thiserror::Error;

/// Configuration problems. Fatal to a run: reported before any match is scored.
#[derive(Debug, Error)]
pub enum InvalidConfigError {
    #[error("weight profile `{profile}` has no weights")]
    EmptyProfile { profile: String },

    #[error("weight profile `{profile}` references unknown factor `{factor}`")]
    UnknownFactor { profile: String, factor: String },

    #[error("weight profile `{profile}`: weight for `{factor}` is {weight}, expected a value in [0, 1]")]
    WeightOutOfRange {
        profile: String,
        factor: String,
        weight: f64,
    },

    #[error("weight profile `{profile}`: weights sum to {sum:.4}, expected 1.0 ± {tolerance}")]
    WeightSum {
        profile: String,
        sum: f64,
        tolerance: f64,
    },

    #[error("weight registry has no profile named `{0}`")]
    UnknownProfile(String),

    #[error("weight registry has no active profile and none was requested")]
    NoActiveProfile,

    #[error("confidence cap {0} must lie in (0.5, 1.0]")]
    ConfidenceCap(f64),

    #[error("invalid setting `{key}`: {reason}")]
    Setting { key: String, reason: String },

    #[error("read weight registry: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse weight registry: {0}")]
    Json(#[from] serde_json::Error),
}

/// No season in the blend window carried any matches for the player on the surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no season data in the {window}-year window ending {season}")]
pub struct InsufficientHistoryError {
    pub season: i32,
    pub window: usize,
}

/// A season record carries a value that cannot be a rate or a normalized score.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidStatsError {
    #[error("{year} {surface}: `{field}` is {value}, expected a value in [0, 1]")]
    OutOfRange {
        year: i32,
        surface: String,
        field: String,
        value: f64,
    },

    #[error("{year} {surface}: {sets} sets recorded over {matches} matches")]
    Inconsistent {
        year: i32,
        surface: String,
        matches: u32,
        sets: u64,
    },
}
