pub mod estimator;
pub mod performance;
pub mod weights;

pub use estimator::{LiveState, Prediction, WinProbabilityEstimator};
pub use weights::{UpdateOutcome, UpdateParams};
