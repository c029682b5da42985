//! Background partition work
//!
//! A slot owns a contiguous range of partitions, a private copy of the
//! staged input block and one scratch output per partition. Worker threads
//! only ever touch their own slot. The ring is written by the caller when it
//! merges a finished slot.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::cancel::CancellationToken;
use crate::fft_convolver::FftConvolver;
use crate::ring::AccumulationRing;
use crate::{Processor, try_vec};
use partconv_core::{PcResult, Sample};

/// Slot shared between the orchestrator and the thread running it
pub(crate) type SharedSlot = Arc<Mutex<WorkerSlot>>;

/// One partition handled by a worker
struct PartitionJob {
    /// Partition index; its contribution is delayed by `index · M`
    index: usize,
    convolver: FftConvolver,
    output: Vec<Sample>,
}

pub(crate) struct WorkerSlot {
    jobs: Vec<PartitionJob>,
    input: Vec<Sample>,
    input_len: usize,
    /// Jobs finished for the staged block, in order
    completed: usize,
}

impl WorkerSlot {
    pub(crate) fn new(partitions: Vec<(usize, FftConvolver)>, block_len: usize) -> PcResult<Self> {
        let jobs = partitions
            .into_iter()
            .map(|(index, convolver)| {
                Ok(PartitionJob {
                    index,
                    convolver,
                    output: try_vec(block_len, 0.0)?,
                })
            })
            .collect::<PcResult<Vec<_>>>()?;

        Ok(Self {
            jobs,
            input: try_vec(block_len, 0.0)?,
            input_len: 0,
            completed: 0,
        })
    }

    pub(crate) fn into_shared(self) -> SharedSlot {
        Arc::new(Mutex::new(self))
    }

    /// First and last partition index handled here
    pub(crate) fn range(&self) -> Option<(usize, usize)> {
        Some((self.jobs.first()?.index, self.jobs.last()?.index))
    }

    /// Copy the block every partition of this slot will convolve
    pub(crate) fn stage(&mut self, input: &[Sample]) {
        self.input[..input.len()].copy_from_slice(input);
        self.input_len = input.len();
        self.completed = 0;
    }

    /// Convolve the staged block against every partition, stopping early
    /// once `cancel` is set. The check happens between partitions only.
    pub(crate) fn run(&mut self, cancel: &CancellationToken) {
        let len = self.input_len;
        let input = &self.input[..len];

        for job in &mut self.jobs {
            if cancel.is_cancelled() {
                break;
            }
            let out = &mut job.output[..len];
            if job.convolver.convolve_block(input, out) != len {
                out.fill(0.0);
            }
            self.completed += 1;
        }
    }

    /// Add every finished partition into `ring`, placed relative to the
    /// stream `position` the block was dispatched at.
    pub(crate) fn merge_into(
        &mut self,
        ring: &mut AccumulationRing,
        position: usize,
        partition_len: usize,
    ) {
        let len = self.input_len;
        for job in &self.jobs[..self.completed] {
            ring.add_at(position + job.index * partition_len, &job.output[..len]);
        }
        self.completed = 0;
    }

    pub(crate) fn reset(&mut self) {
        for job in &mut self.jobs {
            job.convolver.reset();
        }
        self.input_len = 0;
        self.completed = 0;
    }
}
