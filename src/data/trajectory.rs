use burn::data::dataloader::batcher::Batcher;
use burn::tensor::backend::Backend;
use burn::tensor::{Data, Shape, Tensor};
use serde::{Deserialize, Serialize};

use crate::data::batch::TrajectoryBatch;
use crate::error::{Result, RolloutError};
use crate::utils::{narrow, TIME_DIM};

/// One simulated trajectory, row-major over `[T, C, X, Y]`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TrajectoryItem {
    values: Vec<f32>,
    shape: [usize; 4],
}

impl TrajectoryItem {
    pub fn new(values: Vec<f32>, shape: [usize; 4]) -> Result<Self> {
        let expected = shape.iter().product::<usize>();
        if values.len() != expected {
            return Err(RolloutError::shape_mismatch(
                "trajectory item values",
                &[expected],
                &[values.len()],
            ));
        }

        Ok(Self { values, shape })
    }

    pub fn shape(&self) -> [usize; 4] {
        self.shape
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }
}

/// Stacks trajectories along a new batch axis, keeping the first `t_steps` steps.
pub struct TrajectoryBatcher<B: Backend> {
    device: B::Device,
    t_steps: usize,
}

impl<B: Backend> TrajectoryBatcher<B> {
    pub fn new(device: B::Device, t_steps: usize) -> Self {
        Self { device, t_steps }
    }
}

impl<B: Backend> Batcher<TrajectoryItem, TrajectoryBatch<B>> for TrajectoryBatcher<B> {
    fn batch(&self, items: Vec<TrajectoryItem>) -> TrajectoryBatch<B> {
        let layout = items.first().map(|item| item.shape[1..].to_vec());

        let tensors: Vec<Tensor<B, 5>> = items
            .iter()
            .map(|item| {
                let [time, channels, x, y] = item.shape;

                // Every trajectory in a batch must share channel and grid layout
                assert!(layout.as_deref() == Some(&item.shape[1..]));
                assert!(
                    time >= self.t_steps,
                    "trajectory has {} steps, batcher needs {}",
                    time,
                    self.t_steps
                );

                let data = Data::new(item.values.clone(), Shape::new([1, time, channels, x, y]));
                let tensor: Tensor<B, 5> = Tensor::from_data(data.convert());

                narrow(tensor, TIME_DIM, 0..self.t_steps).to_device(&self.device)
            })
            .collect();

        TrajectoryBatch::new(Tensor::cat(tensors, 0))
    }
}
