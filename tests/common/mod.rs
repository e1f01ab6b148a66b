#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use burn::backend::{Autodiff, NdArray};
use burn::data::dataloader::{DataLoader, DataLoaderBuilder};
use burn::data::dataset::InMemDataset;
use burn::module::{AutodiffModule, Module, Param};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::{Data, Tensor};
use burn::LearningRate;

use rollcast::data::{TrajectoryBatch, TrajectoryBatcher, TrajectoryItem};
use rollcast::telemetry::{Telemetry, TelemetryError};
use rollcast::{ParameterUpdater, Predictor};

pub type TestBackend = Autodiff<NdArray>;

/// Next feature slice = newest feature slice times one learnable weight.
#[derive(Module, Debug)]
pub struct Scale<B: Backend> {
    weight: Param<Tensor<B, 1>>,
    num_feat_cols: usize,
}

impl<B: Backend> Scale<B> {
    pub fn new(weight: f32, num_feat_cols: usize) -> Self {
        Self {
            weight: Param::from(Tensor::from_data(Data::from([weight]).convert())),
            num_feat_cols,
        }
    }

    pub fn weight(&self) -> f32 {
        self.weight.val().into_data().convert::<f32>().value[0]
    }
}

impl<B: Backend> Predictor<B> for Scale<B> {
    fn predict(&self, context: Tensor<B, 5>) -> Tensor<B, 5> {
        let [batch, len, _, x, y] = context.dims();
        let last = context.slice([0..batch, len - 1..len, 0..self.num_feat_cols, 0..x, 0..y]);
        last * self.weight.val().reshape([1, 1, 1, 1, 1])
    }
}

/// Counts the updates it forwards to the wrapped optimizer.
pub struct Counting<O> {
    pub inner: O,
    pub updates: Rc<RefCell<usize>>,
}

impl<B, M, O> ParameterUpdater<B, M> for Counting<O>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
    O: ParameterUpdater<B, M>,
{
    fn update(&mut self, model: M, loss: Tensor<B, 1>, lr: LearningRate) -> M {
        *self.updates.borrow_mut() += 1;
        self.inner.update(model, loss, lr)
    }
}

#[derive(Clone, Default)]
pub struct Recorder {
    pub events: Rc<RefCell<Vec<(String, f64)>>>,
}

impl Recorder {
    pub fn count(&self, name: &str) -> usize {
        self.events.borrow().iter().filter(|(n, _)| n == name).count()
    }
}

impl Telemetry for Recorder {
    fn log_scalar(&mut self, name: &str, value: f64) -> Result<(), TelemetryError> {
        self.events.borrow_mut().push((name.to_string(), value));
        Ok(())
    }
}

pub struct Failing;

impl Telemetry for Failing {
    fn log_scalar(&mut self, name: &str, _value: f64) -> Result<(), TelemetryError> {
        Err(TelemetryError(format!("sink offline, lost {name}")))
    }
}

/// `[T, channels, x, 1]` trajectory: feature channels hold `offset + t`,
/// static channels hold `-t`.
pub fn item(
    offset: f32,
    t_steps: usize,
    num_feat_cols: usize,
    channels: usize,
    x: usize,
) -> TrajectoryItem {
    let mut values = Vec::with_capacity(t_steps * channels * x);
    for t in 0..t_steps {
        for c in 0..channels {
            let value = if c < num_feat_cols {
                offset + t as f32
            } else {
                -(t as f32)
            };
            values.extend(std::iter::repeat(value).take(x));
        }
    }
    TrajectoryItem::new(values, [t_steps, channels, x, 1]).unwrap()
}

pub fn zeros(t_steps: usize, channels: usize, x: usize) -> TrajectoryItem {
    TrajectoryItem::new(vec![0.0; t_steps * channels * x], [t_steps, channels, x, 1]).unwrap()
}

pub fn loader(
    items: Vec<TrajectoryItem>,
    batch_size: usize,
    t_steps: usize,
) -> Arc<dyn DataLoader<TrajectoryBatch<TestBackend>>> {
    DataLoaderBuilder::new(TrajectoryBatcher::<TestBackend>::new(Default::default(), t_steps))
        .batch_size(batch_size)
        .build(InMemDataset::new(items))
}

pub fn single_batch(item: TrajectoryItem, t_steps: usize) -> TrajectoryBatch<TestBackend> {
    use burn::data::dataloader::batcher::Batcher;
    TrajectoryBatcher::<TestBackend>::new(Default::default(), t_steps).batch(vec![item])
}
