use std::path::PathBuf;

use burn::config::Config;

use crate::error::RolloutError;
use crate::trainer::buffer::Horizon;

#[derive(Config, Debug)]
pub struct TrainerConfig {
    /// Number of seed steps kept in the rolling context window.
    pub context_len: usize,
    /// Total trajectory length, seed steps included.
    pub t_steps: usize,
    /// Leading channels the model predicts; the remaining channels are static.
    pub num_feat_cols: usize,
    /// Root directory for experiment artifacts.
    pub save_load_path: String,

    #[config(default = 1)]
    pub train_epochs: usize,

    #[config(default = false)]
    pub use_telemetry: bool,
}

impl TrainerConfig {
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.train_epochs == 0 {
            return Err(RolloutError::invalid_config("train_epochs must be at least 1"));
        }
        self.horizon().validate()
    }

    pub fn horizon(&self) -> Horizon {
        Horizon::new(self.context_len, self.t_steps, self.num_feat_cols)
    }

    pub fn experiment_dir(&self, exp_name: &str) -> PathBuf {
        PathBuf::from(&self.save_load_path).join(exp_name)
    }
}
