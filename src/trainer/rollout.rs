use burn::module::AutodiffModule;
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::Tensor;
use tracing::{debug, warn};

use super::buffer::{Horizon, TrajectoryBuffer};
use super::step;
use crate::error::Result;
use crate::loss::StepLoss;
use crate::predictor::{ParameterUpdater, Predictor};
use crate::schedule::RateScheduler;
use crate::utils::{narrow, split_channels, time_slice, TIME_DIM};

#[derive(Debug)]
pub struct TrainRollout<B: Backend, M> {
    pub model: M,
    /// Sum of the per-step losses over the horizon.
    pub loss: f64,
    pub predicted: Tensor<B, 5>,
}

#[derive(Debug)]
pub struct EvalRollout<B: Backend> {
    /// Ground truth `[B, T, F, X, Y]`, feature channels only.
    pub actual: Tensor<B, 5>,
    /// Seed window followed by one prediction per rollout step, `[B, T, F, X, Y]`.
    pub predicted: Tensor<B, 5>,
    pub loss: f64,
}

fn log_empty_horizon(horizon: &Horizon) {
    if horizon.rollout_steps().is_empty() {
        warn!(
            context_len = horizon.context_len,
            t_steps = horizon.t_steps,
            "empty rollout horizon, nothing to predict"
        );
    }
}

/// Rolls one batch forward over `[context_len, t_steps)`, updating the model
/// after every step and stepping the scheduler once at the end.
///
/// `on_step` receives the time index and that step's loss.
pub fn train<B, M, U, S, L, F>(
    model: M,
    updater: &mut U,
    scheduler: &mut S,
    loss_fn: &L,
    trajectory: Tensor<B, 5>,
    horizon: &Horizon,
    mut on_step: F,
) -> Result<TrainRollout<B, M>>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + Predictor<B>,
    U: ParameterUpdater<B, M>,
    S: RateScheduler,
    L: StepLoss<B>,
    F: FnMut(usize, f64),
{
    horizon.check_trajectory(trajectory.dims())?;
    log_empty_horizon(horizon);

    let mut buffer = TrajectoryBuffer::seed(&trajectory, horizon);
    let mut model = model;
    let mut loss = 0.0;

    for time_step in horizon.rollout_steps() {
        let (target, statics) = split_channels(
            time_slice(trajectory.clone(), time_step),
            horizon.num_feat_cols,
        );

        let (updated, output) = step::train_step(
            model,
            updater,
            loss_fn,
            scheduler.current(),
            buffer.context(),
            target,
            time_step,
        )?;
        model = updated;

        loss += output.loss;
        debug!(time_step, loss = output.loss, "train rollout step");
        on_step(time_step, output.loss);

        buffer.advance(output.prediction.clone(), statics)?;
        buffer.append(output.prediction)?;
    }

    let lr = scheduler.step();
    debug!(lr, loss, "train rollout finished");

    Ok(TrainRollout {
        model,
        loss,
        predicted: buffer.into_predicted(),
    })
}

/// Closed-loop rollout of one batch; the model only ever sees its own
/// predictions for feature channels after the seed window.
pub fn evaluate<B, P, L>(
    model: &P,
    loss_fn: &L,
    trajectory: Tensor<B, 5>,
    horizon: &Horizon,
) -> Result<EvalRollout<B>>
where
    B: Backend,
    P: Predictor<B>,
    L: StepLoss<B>,
{
    horizon.check_trajectory(trajectory.dims())?;
    log_empty_horizon(horizon);

    let mut buffer = TrajectoryBuffer::seed(&trajectory, horizon);
    let mut loss = 0.0;

    for time_step in horizon.rollout_steps() {
        let (target, statics) = split_channels(
            time_slice(trajectory.clone(), time_step),
            horizon.num_feat_cols,
        );

        let output = step::eval_step(model, loss_fn, buffer.context(), target, time_step)?;

        loss += output.loss;
        debug!(time_step, loss = output.loss, "eval rollout step");

        buffer.advance(output.prediction.clone(), statics)?;
        buffer.append(output.prediction)?;
    }

    let (features, _) = split_channels(trajectory, horizon.num_feat_cols);
    let actual = narrow(features, TIME_DIM, 0..horizon.t_steps);

    Ok(EvalRollout {
        actual,
        predicted: buffer.into_predicted(),
        loss,
    })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::error::RolloutError;
    use crate::loss::MseLoss;
    use crate::schedule::{ConstantRate, StepDecayConfig};
    use crate::utils::CHANNEL_DIM;
    use burn::backend::{Autodiff, NdArray};
    use burn::module::{Module, Param};
    use burn::optim::SgdConfig;
    use burn::tensor::{Data, Shape};

    type TestBackend = NdArray;
    type TestAutodiffBackend = Autodiff<NdArray>;

    /// Predicts the last feature slice scaled by one learnable weight.
    #[derive(Module, Debug)]
    struct Scale<B: Backend> {
        weight: Param<Tensor<B, 1>>,
    }

    impl<B: Backend> Scale<B> {
        fn new(weight: f32) -> Self {
            Self {
                weight: Param::from(Tensor::from_data(Data::from([weight]).convert())),
            }
        }
    }

    impl<B: Backend> Predictor<B> for Scale<B> {
        fn predict(&self, context: Tensor<B, 5>) -> Tensor<B, 5> {
            let [batch, len, _, x, y] = context.dims();
            let last = context.slice([0..batch, len - 1..len, 0..1, 0..x, 0..y]);
            last * self.weight.val().reshape([1, 1, 1, 1, 1])
        }
    }

    /// Remembers every context it is asked to forecast from.
    struct Recording {
        contexts: RefCell<Vec<Tensor<TestBackend, 5>>>,
    }

    impl Predictor<TestBackend> for Recording {
        fn predict(&self, context: Tensor<TestBackend, 5>) -> Tensor<TestBackend, 5> {
            let [batch, _, _, x, y] = context.dims();
            self.contexts.borrow_mut().push(context);
            Tensor::ones([batch, 1, 1, x, y])
        }
    }

    // [1, T, 2, 1, 1]: feature channel 1 + t, static channel -t.
    fn trajectory<B: Backend>(t_steps: usize) -> Tensor<B, 5> {
        let values: Vec<f32> = (0..t_steps)
            .flat_map(|t| [1.0 + t as f32, -(t as f32)])
            .collect();
        Tensor::from_data(Data::new(values, Shape::new([1, t_steps, 2, 1, 1])).convert())
    }

    #[test]
    fn eval_rollout_fills_the_horizon() {
        let horizon = Horizon::new(2, 5, 1);
        let model = Scale::<TestBackend>::new(2.0);

        let rollout = evaluate(&model, &MseLoss, trajectory(5), &horizon).unwrap();

        assert_eq!(rollout.predicted.dims(), [1, 5, 1, 1, 1]);
        assert_eq!(rollout.actual.dims(), [1, 5, 1, 1, 1]);
        // Seed [1, 2] then each step doubles the previous prediction.
        assert_eq!(
            rollout.predicted.into_data().value,
            vec![1.0, 2.0, 4.0, 8.0, 16.0]
        );
        assert_eq!(rollout.actual.into_data().value, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(rollout.loss, 1.0 + 16.0 + 121.0);
    }

    #[test]
    fn eval_rollout_splices_ground_truth_statics() {
        let horizon = Horizon::new(2, 6, 1);
        let model = Recording {
            contexts: RefCell::new(Vec::new()),
        };

        evaluate(&model, &MseLoss, trajectory(6), &horizon).unwrap();

        let contexts = model.contexts.into_inner();
        assert_eq!(contexts.len(), 4);
        for (i, context) in contexts.into_iter().enumerate() {
            assert_eq!(context.dims()[TIME_DIM], 2);

            // The newest slice of the context used at step t was appended at t - 1.
            let newest_time = 1 + i;
            let statics = narrow(time_slice(context, 1), CHANNEL_DIM, 1..2);
            assert_eq!(statics.into_data().value, vec![-(newest_time as f32)]);
        }
    }

    #[test]
    fn eval_rollout_is_deterministic() {
        let horizon = Horizon::new(3, 8, 1);
        let model = Scale::<TestBackend>::new(0.9);

        let first = evaluate(&model, &MseLoss, trajectory(8), &horizon).unwrap();
        let second = evaluate(&model, &MseLoss, trajectory(8), &horizon).unwrap();

        assert_eq!(first.predicted.into_data(), second.predicted.into_data());
    }

    #[test]
    fn actual_is_cropped_to_t_steps() {
        let horizon = Horizon::new(2, 4, 1);
        let model = Scale::<TestBackend>::new(1.0);

        let rollout = evaluate(&model, &MseLoss, trajectory(6), &horizon).unwrap();
        assert_eq!(rollout.actual.dims(), [1, 4, 1, 1, 1]);
        assert_eq!(rollout.predicted.dims(), [1, 4, 1, 1, 1]);
    }

    #[test]
    fn train_rollout_steps_scheduler_once() {
        let horizon = Horizon::new(2, 5, 1);
        let model = Scale::<TestAutodiffBackend>::new(1.0);
        let mut optim = SgdConfig::new().init::<TestAutodiffBackend, Scale<TestAutodiffBackend>>();
        let mut scheduler = StepDecayConfig::new(1e-3).init();
        let mut steps = Vec::new();

        let rollout = train(
            model,
            &mut optim,
            &mut scheduler,
            &MseLoss,
            trajectory(5),
            &horizon,
            |t, _| steps.push(t),
        )
        .unwrap();

        assert_eq!(steps, vec![2, 3, 4]);
        assert_eq!(scheduler.steps(), 1);
        assert_eq!(rollout.predicted.dims(), [1, 5, 1, 1, 1]);
        assert!(rollout.loss > 0.0);
    }

    #[test]
    fn train_rollout_feeds_back_its_own_predictions() {
        let horizon = Horizon::new(2, 5, 1);
        let model = Scale::<TestAutodiffBackend>::new(2.0);
        let mut optim = SgdConfig::new().init::<TestAutodiffBackend, Scale<TestAutodiffBackend>>();
        let mut scheduler = ConstantRate(0.0);

        let rollout = train(
            model,
            &mut optim,
            &mut scheduler,
            &MseLoss,
            trajectory(5),
            &horizon,
            |_, _| {},
        )
        .unwrap();

        // With ground truth as input the steps would predict [4, 6, 8] for a
        // loss of 14; closed loop doubles the previous prediction instead.
        assert_eq!(
            rollout.predicted.into_data().value,
            vec![1.0, 2.0, 4.0, 8.0, 16.0]
        );
        assert_eq!(rollout.loss, 1.0 + 16.0 + 121.0);
    }

    #[test]
    fn train_rollout_with_empty_horizon_returns_seed() {
        let horizon = Horizon::new(3, 3, 1);
        let model = Scale::<TestAutodiffBackend>::new(1.0);
        let mut optim = SgdConfig::new().init::<TestAutodiffBackend, Scale<TestAutodiffBackend>>();
        let mut scheduler = StepDecayConfig::new(1e-3).init();

        let rollout = train(
            model,
            &mut optim,
            &mut scheduler,
            &MseLoss,
            trajectory(3),
            &horizon,
            |_, _| panic!("no step expected"),
        )
        .unwrap();

        assert_eq!(rollout.loss, 0.0);
        assert_eq!(
            rollout.predicted.into_data().value,
            vec![1.0, 2.0, 3.0]
        );
        assert_eq!(
            rollout.model.weight.val().into_data().value,
            vec![1.0]
        );
    }

    #[test]
    fn short_trajectory_is_rejected() {
        let horizon = Horizon::new(2, 6, 1);
        let model = Scale::<TestBackend>::new(1.0);

        let result = evaluate(&model, &MseLoss, trajectory(4), &horizon);
        assert!(matches!(result, Err(RolloutError::InvalidConfig(_))));
    }
}
