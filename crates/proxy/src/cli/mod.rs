pub mod op;
pub mod ops;

pub use op::{Op, OpContext};
