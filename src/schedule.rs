use burn::config::Config;
use burn::LearningRate;

/// Learning rate source for the per-step optimizer updates.
///
/// `step` is called once per trajectory, after the whole horizon has been
/// rolled out; `current` is read before every optimizer update.
pub trait RateScheduler {
    fn step(&mut self) -> LearningRate;
    fn current(&self) -> LearningRate;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConstantRate(pub LearningRate);

impl RateScheduler for ConstantRate {
    fn step(&mut self) -> LearningRate {
        self.0
    }

    fn current(&self) -> LearningRate {
        self.0
    }
}

/// Multiplies the rate by `gamma` every `step_size` scheduler steps.
#[derive(Clone, Debug)]
pub struct StepDecay {
    initial: LearningRate,
    gamma: f64,
    step_size: usize,
    steps: usize,
}

impl StepDecay {
    pub fn steps(&self) -> usize {
        self.steps
    }
}

impl RateScheduler for StepDecay {
    fn step(&mut self) -> LearningRate {
        self.steps += 1;
        self.current()
    }

    fn current(&self) -> LearningRate {
        let decays = (self.steps / self.step_size) as i32;
        self.initial * self.gamma.powi(decays)
    }
}

#[derive(Config, Debug)]
pub struct StepDecayConfig {
    initial: LearningRate,

    #[config(default = 1)]
    step_size: usize,

    #[config(default = 0.1)]
    gamma: f64,
}

impl StepDecayConfig {
    pub fn init(&self) -> StepDecay {
        StepDecay {
            initial: self.initial,
            gamma: self.gamma,
            step_size: self.step_size.max(1),
            steps: 0,
        }
    }
}
