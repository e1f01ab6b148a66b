use burn::module::AutodiffModule;
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::{ElementConversion, Tensor};
use burn::LearningRate;

use crate::error::{Result, RolloutError};
use crate::loss::StepLoss;
use crate::predictor::{ParameterUpdater, Predictor};

#[derive(Debug)]
pub struct StepOutput<B: Backend> {
    /// Detached `[B, 1, F, X, Y]` prediction, safe to feed back as context.
    pub prediction: Tensor<B, 5>,
    pub loss: f64,
}

fn forecast<B: Backend, P: Predictor<B>>(
    model: &P,
    context: Tensor<B, 5>,
    target: &Tensor<B, 5>,
) -> Result<Tensor<B, 5>> {
    let prediction = model.predict(context);

    if prediction.dims() != target.dims() {
        return Err(RolloutError::shape_mismatch(
            "prediction",
            &target.dims(),
            &prediction.dims(),
        ));
    }

    Ok(prediction)
}

fn finite_loss<B: Backend>(loss: &Tensor<B, 1>, time_step: usize) -> Result<f64> {
    let value = loss.clone().into_scalar().elem::<f64>();

    if !value.is_finite() {
        return Err(RolloutError::NonFiniteLoss { time_step, value });
    }

    Ok(value)
}

/// Predicts `target` from `context` without touching any parameter.
pub fn eval_step<B, P, L>(
    model: &P,
    loss_fn: &L,
    context: Tensor<B, 5>,
    target: Tensor<B, 5>,
    time_step: usize,
) -> Result<StepOutput<B>>
where
    B: Backend,
    P: Predictor<B>,
    L: StepLoss<B>,
{
    let prediction = forecast(model, context, &target)?;
    let loss = loss_fn.forward(target, prediction.clone());
    let loss = finite_loss(&loss, time_step)?;

    Ok(StepOutput {
        prediction: prediction.detach(),
        loss,
    })
}

/// Predicts `target` from `context` and applies one optimizer update using this
/// step's loss alone.
pub fn train_step<B, M, U, L>(
    model: M,
    updater: &mut U,
    loss_fn: &L,
    lr: LearningRate,
    context: Tensor<B, 5>,
    target: Tensor<B, 5>,
    time_step: usize,
) -> Result<(M, StepOutput<B>)>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + Predictor<B>,
    U: ParameterUpdater<B, M>,
    L: StepLoss<B>,
{
    let prediction = forecast(&model, context, &target)?;
    let loss = loss_fn.forward(target, prediction.clone());
    let value = finite_loss(&loss, time_step)?;

    let model = updater.update(model, loss, lr);

    Ok((
        model,
        StepOutput {
            prediction: prediction.detach(),
            loss: value,
        },
    ))
}
