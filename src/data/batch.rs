use burn::tensor::{backend::Backend, Tensor};

#[derive(Clone, Debug)]
pub struct TrajectoryBatch<B: Backend> {
    pub trajectory: Tensor<B, 5>, // [B, T, F + S, X, Y]
}

impl<B: Backend> TrajectoryBatch<B> {
    pub fn new(trajectory: Tensor<B, 5>) -> Self {
        Self { trajectory }
    }

    pub fn batch_size(&self) -> usize {
        self.trajectory.dims()[0]
    }
}
