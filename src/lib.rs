pub mod amplify;
pub mod assemble;
pub mod blend;
pub mod calibration;
pub mod config;
pub mod error;
pub mod fake_slate;
pub mod gate;
pub mod pipeline;
pub mod protect;
pub mod score;
pub mod skip;
pub mod stats;
pub mod surface;
pub mod weights;
pub mod win_prob;

pub use assemble::Prediction;
pub use config::EngineConfig;
pub use pipeline::{MatchInput, PlayerInput, predict_match, predict_slate};
