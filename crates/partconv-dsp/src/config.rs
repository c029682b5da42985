//! Convolution engine configuration

use serde::{Deserialize, Serialize};

use partconv_core::{PcError, PcResult};

/// Default block length L
pub const DEFAULT_BLOCK_SIZE: usize = 512;

/// Default cap on background worker threads
pub const DEFAULT_MAX_THREADS: usize = 2;

/// Partitioned convolver configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvolverConfig {
    /// Block length L; also the partition length M (FFT size is 2·L)
    pub block_size: usize,
    /// Upper bound on worker threads per block. The pool is
    /// `min(max_threads, partitions - 1)`; 0 runs every partition on the
    /// calling thread. Output is identical for every value.
    pub max_threads: usize,
}

impl Default for ConvolverConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            max_threads: DEFAULT_MAX_THREADS,
        }
    }
}

impl ConvolverConfig {
    /// Small blocks for interactive monitoring
    pub fn low_latency() -> Self {
        Self {
            block_size: 128,
            ..Self::default()
        }
    }

    /// Large blocks and more workers for offline rendering of long IRs
    pub fn high_throughput() -> Self {
        Self {
            block_size: 2048,
            max_threads: 4,
        }
    }

    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads;
        self
    }

    pub fn validate(&self) -> PcResult<()> {
        if self.block_size == 0 {
            return Err(PcError::invalid("block size must be non-zero"));
        }
        Ok(())
    }
}
