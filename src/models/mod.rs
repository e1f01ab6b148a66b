pub mod context_linear;

pub use context_linear::{ContextLinear, ContextLinearConfig};
