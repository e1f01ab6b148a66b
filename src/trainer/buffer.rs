use std::ops::Range;

use burn::tensor::{backend::Backend, Tensor};

use crate::error::{Result, RolloutError};
use crate::utils::{narrow, split_channels, CHANNEL_DIM, TIME_DIM};

/// Time layout of a rollout: `[0, context_len)` seeds the window,
/// `[context_len, t_steps)` is predicted one step at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Horizon {
    pub context_len: usize,
    pub t_steps: usize,
    pub num_feat_cols: usize,
}

impl Horizon {
    pub fn new(context_len: usize, t_steps: usize, num_feat_cols: usize) -> Self {
        Self {
            context_len,
            t_steps,
            num_feat_cols,
        }
    }

    pub fn rollout_steps(&self) -> Range<usize> {
        self.context_len..self.t_steps
    }

    pub fn validate(&self) -> Result<()> {
        if self.context_len == 0 {
            return Err(RolloutError::invalid_config("context_len must be at least 1"));
        }
        if self.num_feat_cols == 0 {
            return Err(RolloutError::invalid_config("num_feat_cols must be at least 1"));
        }
        if self.context_len > self.t_steps {
            return Err(RolloutError::invalid_config(format!(
                "context_len ({}) exceeds t_steps ({})",
                self.context_len, self.t_steps
            )));
        }
        Ok(())
    }

    /// Checks a `[B, T, F + S, X, Y]` trajectory can be rolled out over this horizon.
    pub fn check_trajectory(&self, dims: [usize; 5]) -> Result<()> {
        self.validate()?;

        let [batch, time, channels, _, _] = dims;
        if batch == 0 {
            return Err(RolloutError::invalid_config("trajectory batch is empty"));
        }
        if time < self.t_steps {
            return Err(RolloutError::invalid_config(format!(
                "trajectory has {} time steps, t_steps is {}",
                time, self.t_steps
            )));
        }
        if channels < self.num_feat_cols {
            return Err(RolloutError::invalid_config(format!(
                "trajectory has {} channels, num_feat_cols is {}",
                channels, self.num_feat_cols
            )));
        }
        Ok(())
    }
}

/// Rolling context window plus the predicted trajectory built so far.
///
/// Created fresh for every batch. The context always holds exactly
/// `context_len` slices with every channel; the predicted trajectory holds
/// feature channels only and starts with the ground-truth seed.
#[derive(Debug)]
pub struct TrajectoryBuffer<B: Backend> {
    context: Tensor<B, 5>,
    predicted: Tensor<B, 5>,
    num_feat_cols: usize,
}

impl<B: Backend> TrajectoryBuffer<B> {
    pub fn seed(trajectory: &Tensor<B, 5>, horizon: &Horizon) -> Self {
        let context = narrow(trajectory.clone(), TIME_DIM, 0..horizon.context_len);
        let predicted = narrow(context.clone(), CHANNEL_DIM, 0..horizon.num_feat_cols);

        Self {
            context,
            predicted,
            num_feat_cols: horizon.num_feat_cols,
        }
    }

    pub fn context(&self) -> Tensor<B, 5> {
        self.context.clone()
    }

    pub fn context_len(&self) -> usize {
        self.context.dims()[TIME_DIM]
    }

    pub fn predicted(&self) -> Tensor<B, 5> {
        self.predicted.clone()
    }

    pub fn into_predicted(self) -> Tensor<B, 5> {
        self.predicted
    }

    /// Shifts the feature channels one step earlier and appends `prediction`
    /// as the newest feature slice. Static channels stay in place except for
    /// the newest slot, which is overwritten with `statics` (ground truth).
    pub fn advance(
        &mut self,
        prediction: Tensor<B, 5>,
        statics: Option<Tensor<B, 5>>,
    ) -> Result<()> {
        let [batch, len, channels, x, y] = self.context.dims();

        let expected = [batch, 1, self.num_feat_cols, x, y];
        if prediction.dims() != expected {
            return Err(RolloutError::shape_mismatch(
                "newest feature slice",
                &expected,
                &prediction.dims(),
            ));
        }

        let (features, old_statics) = split_channels(self.context.clone(), self.num_feat_cols);
        let features = if len > 1 {
            Tensor::cat(vec![narrow(features, TIME_DIM, 1..len), prediction], TIME_DIM)
        } else {
            prediction
        };

        self.context = match (old_statics, statics) {
            (None, None) => features,
            (Some(old), Some(new)) => {
                let expected = [batch, 1, channels - self.num_feat_cols, x, y];
                if new.dims() != expected {
                    return Err(RolloutError::shape_mismatch(
                        "newest static slice",
                        &expected,
                        &new.dims(),
                    ));
                }

                let statics = if len > 1 {
                    Tensor::cat(vec![narrow(old, TIME_DIM, 0..len - 1), new], TIME_DIM)
                } else {
                    new
                };
                Tensor::cat(vec![features, statics], CHANNEL_DIM)
            }
            (_, new) => {
                let got = new.map(|s| s.dims().to_vec()).unwrap_or_default();
                return Err(RolloutError::shape_mismatch(
                    "newest static slice",
                    &[batch, 1, channels - self.num_feat_cols, x, y],
                    &got,
                ));
            }
        };

        Ok(())
    }

    pub fn append(&mut self, prediction: Tensor<B, 5>) -> Result<()> {
        let [batch, _, _, x, y] = self.predicted.dims();
        let expected = [batch, 1, self.num_feat_cols, x, y];
        if prediction.dims() != expected {
            return Err(RolloutError::shape_mismatch(
                "predicted slice",
                &expected,
                &prediction.dims(),
            ));
        }

        self.predicted = Tensor::cat(vec![self.predicted.clone(), prediction], TIME_DIM);
        Ok(())
    }
}
