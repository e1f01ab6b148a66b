pub mod buffer;
pub mod rollout;
pub mod runner;
pub mod step;

pub use buffer::{Horizon, TrajectoryBuffer};
pub use runner::{RolloutTrainer, TrainReport};
