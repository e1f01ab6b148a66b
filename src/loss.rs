use burn::tensor::{backend::Backend, Tensor};

/// Scalar loss between a ground-truth slice and a one-step prediction.
///
/// Both tensors are `[B, 1, F, X, Y]`. The result must stay differentiable with
/// respect to `prediction` when the backend tracks gradients.
pub trait StepLoss<B: Backend> {
    fn forward(&self, target: Tensor<B, 5>, prediction: Tensor<B, 5>) -> Tensor<B, 1>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct MseLoss;

impl<B: Backend> StepLoss<B> for MseLoss {
    fn forward(&self, target: Tensor<B, 5>, prediction: Tensor<B, 5>) -> Tensor<B, 1> {
        let residual = prediction - target;
        (residual.clone() * residual).mean()
    }
}
