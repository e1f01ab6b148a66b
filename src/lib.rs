pub mod config;
pub mod data;
pub mod error;
pub mod loss;
pub mod metrics;
pub mod models;
pub mod predictor;
pub mod schedule;
pub mod telemetry;
pub mod trainer;
pub mod utils;

pub use config::TrainerConfig;
pub use error::{Result, RolloutError};
pub use loss::{MseLoss, StepLoss};
pub use predictor::{ParameterUpdater, Predictor};
pub use schedule::RateScheduler;
pub use telemetry::{Mode, Telemetry, TracingTelemetry};
pub use trainer::{RolloutTrainer, TrainReport};
