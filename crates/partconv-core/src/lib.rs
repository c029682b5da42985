//! partconv-core: Shared types for the partitioned convolution engine
//!
//! Sample precision and the workspace error type live here so every crate
//! agrees on them.

mod error;
mod sample;

pub use error::*;
pub use sample::*;
