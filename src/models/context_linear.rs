use burn::config::Config;
use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::{backend::Backend, Tensor};

use crate::predictor::Predictor;
use crate::utils::{narrow, CHANNEL_DIM, TIME_DIM};

/// Baseline forecaster: one linear map per grid point from the whole context
/// column (every step, every channel) to the next feature values.
#[derive(Module, Debug)]
pub struct ContextLinear<B: Backend> {
    context_len: usize,
    num_channels: usize,
    num_feat_cols: usize,
    residual: bool,
    linear: Linear<B>,
}

impl<B: Backend> ContextLinear<B> {
    pub fn forward(&self, context: Tensor<B, 5>) -> Tensor<B, 5> {
        let [batch, len, channels, x, y] = context.dims();
        assert!(
            len == self.context_len && channels == self.num_channels,
            "context has {} steps and {} channels, model expects {} and {}",
            len,
            channels,
            self.context_len,
            self.num_channels
        );

        let last = narrow(context.clone(), TIME_DIM, len - 1..len);

        // [B, C, F + S, X, Y] -> [B, X * Y, C * (F + S)]
        let columns = context
            .reshape([batch, len * channels, x * y])
            .swap_dims(1, 2);

        let output = self
            .linear
            .forward(columns)
            .swap_dims(1, 2)
            .reshape([batch, 1, self.num_feat_cols, x, y]);

        if self.residual {
            output + narrow(last, CHANNEL_DIM, 0..self.num_feat_cols)
        } else {
            output
        }
    }
}

impl<B: Backend> Predictor<B> for ContextLinear<B> {
    fn predict(&self, context: Tensor<B, 5>) -> Tensor<B, 5> {
        self.forward(context)
    }
}

#[derive(Config, Debug)]
pub struct ContextLinearConfig {
    context_len: usize,
    num_channels: usize,
    num_feat_cols: usize,

    #[config(default = true)]
    bias: bool,

    /// Predict an increment on top of the newest feature slice.
    #[config(default = false)]
    residual: bool,
}

impl ContextLinearConfig {
    pub fn init<B: Backend>(&self) -> ContextLinear<B> {
        assert!(self.context_len > 0, "context_len must be at least 1");
        assert!(
            self.num_feat_cols > 0 && self.num_feat_cols <= self.num_channels,
            "num_feat_cols {} must be in 1..={}",
            self.num_feat_cols,
            self.num_channels
        );

        let linear = LinearConfig::new(self.context_len * self.num_channels, self.num_feat_cols)
            .with_bias(self.bias)
            .init();

        ContextLinear {
            context_len: self.context_len,
            num_channels: self.num_channels,
            num_feat_cols: self.num_feat_cols,
            residual: self.residual,
            linear,
        }
    }
}
