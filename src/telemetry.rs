//! Optional experiment telemetry.
//!
//! The trainer reports through three hooks: one event per rollout step, one
//! per learning-rate change and one per epoch. Sinks are best effort; an error
//! returned here is logged by the trainer and otherwise ignored.

use std::fmt;

use thiserror::Error;
use tracing::info;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Train,
    Eval,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Train => "train",
            Mode::Eval => "eval",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("telemetry sink failed: {0}")]
pub struct TelemetryError(pub String);

pub trait Telemetry {
    fn log_scalar(&mut self, name: &str, value: f64) -> Result<(), TelemetryError>;

    fn on_step(&mut self, mode: Mode, step_loss: f64) -> Result<(), TelemetryError> {
        self.log_scalar(&format!("{mode}_batch_loss"), step_loss)
    }

    fn on_rate(&mut self, mode: Mode, lr: f64) -> Result<(), TelemetryError> {
        self.log_scalar(&format!("{mode}_learning_rate"), lr)
    }

    fn on_epoch(&mut self, mode: Mode, epoch_loss: f64) -> Result<(), TelemetryError> {
        self.log_scalar(&format!("{mode}_epoch_loss"), epoch_loss)
    }
}

/// Emits every event as a `tracing` record under the `rollcast::telemetry` target.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingTelemetry;

impl Telemetry for TracingTelemetry {
    fn log_scalar(&mut self, name: &str, value: f64) -> Result<(), TelemetryError> {
        info!(target: "rollcast::telemetry", metric = name, value);
        Ok(())
    }
}
