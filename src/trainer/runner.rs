use std::fs;

use burn::config::Config;
use burn::data::dataloader::DataLoader;
use burn::module::AutodiffModule;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::Tensor;
use tracing::{info, warn};

use super::buffer::Horizon;
use super::rollout::{self, EvalRollout};
use crate::config::TrainerConfig;
use crate::data::batch::TrajectoryBatch;
use crate::error::{Result, RolloutError};
use crate::loss::StepLoss;
use crate::metrics::{trajectory_errors, MetricsReport, TrajectoryMetrics};
use crate::predictor::{ParameterUpdater, Predictor};
use crate::schedule::RateScheduler;
use crate::telemetry::{Mode, Telemetry, TelemetryError};

type InnerBackend<B> = <B as AutodiffBackend>::InnerBackend;

#[derive(Clone, Debug, PartialEq)]
pub struct TrainReport {
    /// Sum of batch rollout losses divided by the batch count, per epoch.
    pub epoch_losses: Vec<f64>,
}

fn active(
    enabled: bool,
    telemetry: &mut Option<Box<dyn Telemetry>>,
) -> Option<&mut Box<dyn Telemetry>> {
    telemetry.as_mut().filter(|_| enabled)
}

fn emit<F>(telemetry: Option<&mut Box<dyn Telemetry>>, event: F)
where
    F: FnOnce(&mut dyn Telemetry) -> std::result::Result<(), TelemetryError>,
{
    if let Some(telemetry) = telemetry {
        if let Err(err) = event(telemetry.as_mut()) {
            warn!(%err, "dropping telemetry event");
        }
    }
}

/// Drives rolling-horizon training and closed-loop evaluation of one model.
pub struct RolloutTrainer<B: AutodiffBackend, M, U, S, L> {
    model: M,
    updater: U,
    scheduler: S,
    loss: L,
    config: TrainerConfig,
    horizon: Horizon,
    device: B::Device,
    telemetry: Option<Box<dyn Telemetry>>,
}

impl<B, M, U, S, L> RolloutTrainer<B, M, U, S, L>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + Predictor<B>,
    M::InnerModule: Predictor<InnerBackend<B>>,
    U: ParameterUpdater<B, M>,
    S: RateScheduler,
    L: StepLoss<B> + StepLoss<InnerBackend<B>>,
{
    pub fn new(
        model: M,
        updater: U,
        scheduler: S,
        loss: L,
        config: TrainerConfig,
        device: B::Device,
    ) -> Result<Self> {
        config.validate()?;
        let horizon = config.horizon();

        Ok(Self {
            model,
            updater,
            scheduler,
            loss,
            config,
            horizon,
            device,
            telemetry: None,
        })
    }

    /// Installs a telemetry sink; it only receives events while
    /// `use_telemetry` is enabled in the config.
    pub fn with_telemetry(mut self, telemetry: impl Telemetry + 'static) -> Self {
        self.telemetry = Some(Box::new(telemetry));
        self
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn into_model(self) -> M {
        self.model
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Rolls one batch out with a parameter update after every step.
    ///
    /// Returns the summed step losses. A failed step ends the batch: the model
    /// keeps its pre-batch parameters, but the optimizer has already absorbed
    /// the earlier steps' updates, so the error should end the run.
    pub fn train_step(&mut self, batch: TrajectoryBatch<B>) -> Result<f64> {
        let trajectory = batch.trajectory.to_device(&self.device);

        let mut telemetry = active(self.config.use_telemetry, &mut self.telemetry);

        let rollout = rollout::train(
            self.model.clone(),
            &mut self.updater,
            &mut self.scheduler,
            &self.loss,
            trajectory,
            &self.horizon,
            |_, step_loss| {
                emit(telemetry.as_deref_mut(), |t| t.on_step(Mode::Train, step_loss));
            },
        )?;

        self.model = rollout.model;
        Ok(rollout.loss)
    }

    pub fn train(
        &mut self,
        dataloader: &dyn DataLoader<TrajectoryBatch<B>>,
    ) -> Result<TrainReport> {
        let epochs = self.config.train_epochs;
        let mut epoch_losses = Vec::with_capacity(epochs);

        info!(epochs, horizon = ?self.horizon, "starting training");

        for epoch in 1..=epochs {
            let mut total = 0.0;
            let mut batches = 0usize;

            for batch in dataloader.iter() {
                total += self.train_step(batch)?;
                batches += 1;

                let lr = self.scheduler.current();
                emit(active(self.config.use_telemetry, &mut self.telemetry), |t| {
                    t.on_rate(Mode::Train, lr)
                });
            }

            if batches == 0 {
                return Err(RolloutError::EmptyDataset);
            }

            let epoch_loss = total / batches as f64;
            info!(epoch, epochs, batches, epoch_loss, "epoch finished");
            emit(active(self.config.use_telemetry, &mut self.telemetry), |t| {
                t.on_epoch(Mode::Train, epoch_loss)
            });

            epoch_losses.push(epoch_loss);
        }

        Ok(TrainReport { epoch_losses })
    }

    fn eval_batch(
        &self,
        model: &M::InnerModule,
        batch: TrajectoryBatch<B>,
    ) -> Result<EvalRollout<InnerBackend<B>>> {
        let source = batch.trajectory.device();
        let trajectory = batch.trajectory.to_device(&self.device).inner();

        let rollout = rollout::evaluate(model, &self.loss, trajectory, &self.horizon)?;

        Ok(EvalRollout {
            actual: rollout.actual.to_device(&source),
            predicted: rollout.predicted.to_device(&source),
            loss: rollout.loss,
        })
    }

    /// Closed-loop rollout of one batch with the model in inference mode.
    ///
    /// Returns `(actual, predicted)`, both `[B, T, F, X, Y]` on the batch's
    /// original device.
    pub fn test_step(
        &self,
        batch: TrajectoryBatch<B>,
    ) -> Result<(Tensor<InnerBackend<B>, 5>, Tensor<InnerBackend<B>, 5>)> {
        let rollout = self.eval_batch(&self.model.valid(), batch)?;
        Ok((rollout.actual, rollout.predicted))
    }

    /// Evaluates every batch once and concatenates the trajectories along the
    /// batch axis, in loader order.
    pub fn test(
        &self,
        dataloader: &dyn DataLoader<TrajectoryBatch<B>>,
    ) -> Result<(Tensor<InnerBackend<B>, 5>, Tensor<InnerBackend<B>, 5>)> {
        let model = self.model.valid();

        let mut actual = Vec::new();
        let mut predicted = Vec::new();
        let mut loss = 0.0;

        for batch in dataloader.iter() {
            let rollout = self.eval_batch(&model, batch)?;
            actual.push(rollout.actual);
            predicted.push(rollout.predicted);
            loss += rollout.loss;
        }

        if actual.is_empty() {
            return Err(RolloutError::EmptyDataset);
        }

        let batches = actual.len();
        let actual = Tensor::cat(actual, 0);
        let predicted = Tensor::cat(predicted, 0);

        info!(batches, dims = ?predicted.dims(), rollout_loss = loss, "evaluation finished");

        Ok((actual, predicted))
    }

    /// Evaluates the dataset, reduces it to error statistics and writes them to
    /// `<save_load_path>/<exp_name>/metrics.json`.
    pub fn calculate_metrics(
        &self,
        dataloader: &dyn DataLoader<TrajectoryBatch<B>>,
        exp_name: &str,
    ) -> Result<TrajectoryMetrics> {
        info!(exp_name, "predicting trajectories");
        let (actual, predicted) = self.test(dataloader)?;

        let metrics = trajectory_errors(actual, predicted)?;
        info!(
            exp_name,
            mse = metrics.mse,
            rmse = metrics.rmse,
            trajectories = metrics.per_trajectory.len(),
            "calculated metrics"
        );

        let dir = self.config.experiment_dir(exp_name);
        fs::create_dir_all(&dir)?;
        MetricsReport::from_metrics(exp_name, &metrics).save(dir.join("metrics.json"))?;

        Ok(metrics)
    }
}
