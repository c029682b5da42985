//! partconv-dsp: Real-time partitioned convolution for ReelForge
//!
//! Applies long impulse responses to streaming audio with a bounded amount
//! of work on the calling thread per block.
//!
//! ## Modules
//! - `plan` - Shared RealFFT forward/inverse plans
//! - `impulse` - Frequency-domain impulse-response segments
//! - `fft_convolver` - Single-partition FFT convolver with overlap-add
//! - `ring` - Accumulation ring buffer with lazy half clearing
//! - `convolver` - Multi-partition, multi-threaded orchestrator
//! - `config` - Engine configuration

pub mod cancel;
pub mod config;
pub mod convolver;
pub mod fft_convolver;
pub mod impulse;
pub mod plan;
pub mod ring;
mod worker;

pub use cancel::CancellationToken;
pub use config::ConvolverConfig;
pub use convolver::PartitionedConvolver;
pub use fft_convolver::{FftConvolver, TailRead};
pub use impulse::{ImpulseResponse, IrSegment};
pub use plan::FftPlan;
pub use ring::AccumulationRing;

use partconv_core::{PcError, PcResult};

/// Trait for all DSP processors
pub trait Processor: Send + Sync {
    /// Reset processor state
    fn reset(&mut self);

    /// Get latency in samples
    fn latency(&self) -> usize {
        0
    }
}

/// Allocate `len` copies of `value`, reporting allocation failure instead of
/// aborting.
pub(crate) fn try_vec<T: Clone>(len: usize, value: T) -> PcResult<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|_| PcError::Allocation { requested: len })?;
    v.resize(len, value);
    Ok(v)
}
