pub mod batch;
pub mod trajectory;

pub use batch::TrajectoryBatch;
pub use trajectory::{TrajectoryBatcher, TrajectoryItem};
