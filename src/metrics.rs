use burn::config::Config;
use burn::tensor::{backend::Backend, Tensor};

use crate::error::RolloutError;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrajectoryError {
    pub mse: f64,
    pub rmse: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrajectoryMetrics {
    /// Mean of the per-trajectory MSE.
    pub mse: f64,
    /// Mean of the per-trajectory RMSE.
    pub rmse: f64,
    pub per_trajectory: Vec<TrajectoryError>,
}

/// Error statistics for every trajectory of two `[N, T, F, X, Y]` tensors.
///
/// Each trajectory is viewed as a `[T, F * X * Y]` table with time steps as
/// samples. MSE is the mean over every element; RMSE is the root mean squared
/// error of every output column, averaged uniformly over the columns.
pub fn trajectory_errors<B: Backend>(
    actual: Tensor<B, 5>,
    predicted: Tensor<B, 5>,
) -> crate::error::Result<TrajectoryMetrics> {
    if actual.dims() != predicted.dims() {
        return Err(RolloutError::shape_mismatch(
            "predicted trajectories",
            &actual.dims(),
            &predicted.dims(),
        ));
    }

    let [n, t, f, x, y] = actual.dims();
    if n == 0 || t == 0 {
        return Err(RolloutError::EmptyDataset);
    }

    let residual = predicted - actual;
    let squared = (residual.clone() * residual).reshape([n, t, f * x * y]);

    // [N, 1, outputs]
    let per_output = squared.mean_dim(1);
    let mse = per_output.clone().mean_dim(2).reshape([n]);
    let rmse = per_output.sqrt().mean_dim(2).reshape([n]);

    let mse = mse.into_data().convert::<f64>().value;
    let rmse = rmse.into_data().convert::<f64>().value;

    let per_trajectory: Vec<TrajectoryError> = mse
        .iter()
        .zip(rmse.iter())
        .map(|(&mse, &rmse)| TrajectoryError { mse, rmse })
        .collect();

    Ok(TrajectoryMetrics {
        mse: mean(&mse),
        rmse: mean(&rmse),
        per_trajectory,
    })
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Serialised next to the experiment's other artifacts.
#[derive(Config, Debug)]
pub struct MetricsReport {
    pub experiment: String,
    pub mse: f64,
    pub rmse: f64,
    pub trajectory_mse: Vec<f64>,
    pub trajectory_rmse: Vec<f64>,
}

impl MetricsReport {
    pub fn from_metrics(experiment: &str, metrics: &TrajectoryMetrics) -> Self {
        Self::new(
            experiment.to_string(),
            metrics.mse,
            metrics.rmse,
            metrics.per_trajectory.iter().map(|e| e.mse).collect(),
            metrics.per_trajectory.iter().map(|e| e.rmse).collect(),
        )
    }
}
