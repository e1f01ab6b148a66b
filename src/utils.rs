use std::ops::Range;

use burn::tensor::{backend::Backend, Tensor};

pub const TIME_DIM: usize = 1;
pub const CHANNEL_DIM: usize = 2;

/// Restricts `x` to `range` along `dim`, keeping every other axis whole.
pub fn narrow<B: Backend, const D: usize>(
    x: Tensor<B, D>,
    dim: usize,
    range: Range<usize>,
) -> Tensor<B, D> {
    let mut ranges = x.dims().map(|x| 0..x);
    ranges[dim] = range;
    x.slice(ranges)
}

/// Splits `[B, T, F + S, X, Y]` into feature `[B, T, F, X, Y]` and static
/// `[B, T, S, X, Y]` parts. The static part is `None` when `S == 0`.
pub fn split_channels<B: Backend>(
    x: Tensor<B, 5>,
    num_feat_cols: usize,
) -> (Tensor<B, 5>, Option<Tensor<B, 5>>) {
    let channels = x.dims()[CHANNEL_DIM];

    if num_feat_cols >= channels {
        return (x, None);
    }

    let statics = narrow(x.clone(), CHANNEL_DIM, num_feat_cols..channels);
    let features = narrow(x, CHANNEL_DIM, 0..num_feat_cols);

    (features, Some(statics))
}

/// Single time slice `[B, 1, C, X, Y]` at `time_step`.
pub fn time_slice<B: Backend>(x: Tensor<B, 5>, time_step: usize) -> Tensor<B, 5> {
    narrow(x, TIME_DIM, time_step..time_step + 1)
}
