use burn::module::AutodiffModule;
use burn::optim::{GradientsParams, Optimizer};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::Tensor;
use burn::LearningRate;

/// One-step forecaster.
///
/// Maps a context window `[B, C, F + S, X, Y]` to the next slice of the feature
/// channels, `[B, 1, F, X, Y]`. Train/eval switching is done by burn itself:
/// an autodiff module is used for training and its `valid()` inner module for
/// inference, so both need an implementation.
pub trait Predictor<B: Backend> {
    fn predict(&self, context: Tensor<B, 5>) -> Tensor<B, 5>;
}

/// Applies one parameter update computed from a single step loss.
///
/// Every call derives fresh gradients from `loss`, so nothing carries over
/// from a previous step.
pub trait ParameterUpdater<B: AutodiffBackend, M: AutodiffModule<B>> {
    fn update(&mut self, model: M, loss: Tensor<B, 1>, lr: LearningRate) -> M;
}

impl<B, M, O> ParameterUpdater<B, M> for O
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
    O: Optimizer<M, B>,
{
    fn update(&mut self, model: M, loss: Tensor<B, 1>, lr: LearningRate) -> M {
        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &model);

        self.step(lr, model, grads)
    }
}
