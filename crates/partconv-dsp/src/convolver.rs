//! Partitioned convolution engine
//!
//! Convolves a stream against an impulse response much longer than one
//! block:
//! - the IR is cut into P uniform partitions of M = L samples
//! - partition 0 is convolved on the calling thread (no added latency)
//! - partitions 1..P run on up to `max_threads` worker threads; partition i
//!   lands `i · M` samples in the future, so its result is not needed before
//!   the next block
//! - everything is summed in an [`AccumulationRing`] that the caller reads
//!   one block at a time
//!
//! Workers of a block are joined at the start of the next `push_block`, so
//! background work is never more than one block stale. Workers write only to
//! their own slot; the caller merges finished slots into the ring after the
//! join, so no sample is ever written by two threads.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::cancel::CancellationToken;
use crate::config::ConvolverConfig;
use crate::fft_convolver::FftConvolver;
use crate::impulse::{ImpulseResponse, IrSegment};
use crate::plan::FftPlan;
use crate::ring::AccumulationRing;
use crate::worker::{SharedSlot, WorkerSlot};
use crate::{Processor, try_vec};
use partconv_core::{PcError, PcResult, Sample};

/// Multi-partition, multi-threaded uniform partitioned convolver
pub struct PartitionedConvolver {
    /// Partition 0, convolved synchronously
    head: FftConvolver,
    head_output: Vec<Sample>,
    /// Partitions 1..P split into contiguous ranges
    slots: Vec<SharedSlot>,
    /// Run slots on spawned threads (false: inline on the caller)
    threaded: bool,
    handles: Vec<JoinHandle<()>>,
    /// Ring position the in-flight generation was dispatched at
    pending: Option<usize>,
    ring: AccumulationRing,
    cancel: CancellationToken,
    block_len: usize,
    partition_count: usize,
    ir_length: usize,
    /// Length of the previous block; the cursor advances by it
    last_len: usize,
    /// Output samples still owed after the last real input
    flush_remaining: usize,
}

impl PartitionedConvolver {
    /// Build from pre-transformed segments.
    ///
    /// `plan` fixes the block length L = N/2, which must match
    /// `config.block_size`. `ir_length` is the time-domain IR length and
    /// must fit in the supplied segments.
    pub fn new(
        segments: Vec<IrSegment>,
        ir_length: usize,
        plan: Arc<FftPlan>,
        config: &ConvolverConfig,
    ) -> PcResult<Self> {
        config.validate()?;

        let block_len = plan.block_len();
        if config.block_size != block_len {
            return Err(PcError::invalid(format!(
                "config block size {} does not match plan block length {}",
                config.block_size, block_len
            )));
        }

        let partition_count = segments.len();
        if partition_count == 0 {
            return Err(PcError::invalid("at least one IR segment is required"));
        }
        if ir_length == 0 || ir_length > partition_count * block_len {
            return Err(PcError::invalid(format!(
                "IR length {} does not fit {} segments of {} samples",
                ir_length, partition_count, block_len
            )));
        }

        let mut segments = segments.into_iter();
        let head = match segments.next() {
            Some(segment) => FftConvolver::new(segment, Arc::clone(&plan))?,
            None => return Err(PcError::invalid("at least one IR segment is required")),
        };

        let rest = segments
            .enumerate()
            .map(|(k, segment)| Ok((k + 1, FftConvolver::new(segment, Arc::clone(&plan))?)))
            .collect::<PcResult<Vec<_>>>()?;

        let slots = Self::split_into_slots(rest, config.max_threads, block_len)?;
        let threaded = config.max_threads > 0 && !slots.is_empty();

        // Each half must hold the full reach of the IR, P·M samples.
        let ring = AccumulationRing::new(partition_count * block_len)?;

        log::info!(
            "Partitioned convolver: {} partitions x {} samples, IR {} samples, {} worker thread(s)",
            partition_count,
            block_len,
            ir_length,
            if threaded { slots.len() } else { 0 }
        );

        Ok(Self {
            head,
            head_output: try_vec(block_len, 0.0)?,
            slots,
            threaded,
            handles: Vec::new(),
            pending: None,
            ring,
            cancel: CancellationToken::new(),
            block_len,
            partition_count,
            ir_length,
            last_len: 0,
            flush_remaining: 0,
        })
    }

    /// Partition a time-domain impulse response and build the engine
    pub fn from_samples(ir: &[Sample], config: &ConvolverConfig) -> PcResult<Self> {
        config.validate()?;
        let plan = Arc::new(FftPlan::for_block(config.block_size)?);
        let (segments, ir_length) = ImpulseResponse::from_samples(ir, &plan)?.into_parts();
        Self::new(segments, ir_length, plan, config)
    }

    /// Evenly divide partitions 1..P over `min(max_threads, P - 1)` slots.
    /// With no threads everything goes into one slot run inline.
    fn split_into_slots(
        partitions: Vec<(usize, FftConvolver)>,
        max_threads: usize,
        block_len: usize,
    ) -> PcResult<Vec<SharedSlot>> {
        if partitions.is_empty() {
            return Ok(Vec::new());
        }

        let slot_count = max_threads.clamp(1, partitions.len());
        let share = partitions.len().div_ceil(slot_count);

        let mut iter = partitions.into_iter();
        let mut slots = Vec::with_capacity(slot_count);
        loop {
            let jobs: Vec<_> = iter.by_ref().take(share).collect();
            if jobs.is_empty() {
                break;
            }
            slots.push(WorkerSlot::new(jobs, block_len)?.into_shared());
        }
        Ok(slots)
    }

    /// Convolve `length` samples of `buffer` in place.
    ///
    /// Returns the number of samples produced: `length`, or 0 when `length`
    /// is zero, exceeds the block length, or exceeds `buffer`. On 0 nothing
    /// is read, written or advanced.
    pub fn push_block(&mut self, buffer: &mut [Sample], length: usize) -> usize {
        if length == 0 || length > self.block_len || length > buffer.len() {
            return 0;
        }

        self.process(&mut buffer[..length]);
        self.flush_remaining = self.ir_length - 1;
        length
    }

    /// Drain the convolution reach left after the last pushed input.
    ///
    /// Writes up to `min(buffer.len(), L)` samples, the result of feeding
    /// silence, and returns how many were written. 0 means the stream is
    /// exhausted. Pushing new input re-arms it.
    pub fn flush(&mut self, buffer: &mut [Sample]) -> usize {
        let frames = buffer.len().min(self.block_len).min(self.flush_remaining);
        if frames == 0 {
            return 0;
        }

        let block = &mut buffer[..frames];
        block.fill(0.0);
        self.process(block);

        self.flush_remaining -= frames;
        if self.flush_remaining == 0 {
            log::debug!("Convolution tail drained");
        }
        frames
    }

    fn process(&mut self, block: &mut [Sample]) {
        let len = block.len();

        // Previous generation must be complete before its samples are due.
        self.collect();
        self.ring.advance(self.last_len);

        let produced = self.head.convolve_block(block, &mut self.head_output[..len]);
        if produced == len {
            self.ring.add_at_offset(0, &self.head_output[..len]);
        }
        self.last_len = len;

        self.dispatch(block);
        self.ring.read(block);
    }

    /// Stage `input` in every slot and start the next generation
    fn dispatch(&mut self, input: &[Sample]) {
        if self.slots.is_empty() {
            return;
        }

        for slot in &self.slots {
            slot.lock().stage(input);
        }

        if self.threaded {
            for (id, slot) in self.slots.iter().enumerate() {
                let shared = Arc::clone(slot);
                let cancel = self.cancel.clone();

                match thread::Builder::new()
                    .name(format!("partconv-worker-{id}"))
                    .spawn(move || {
                        shared.lock().run(&cancel);
                    })
                {
                    Ok(handle) => self.handles.push(handle),
                    Err(e) => {
                        log::error!(
                            "Failed to spawn convolution worker {}: {}. Running inline.",
                            id,
                            e
                        );
                        slot.lock().run(&self.cancel);
                    }
                }
            }
        } else {
            for slot in &self.slots {
                slot.lock().run(&self.cancel);
            }
        }

        self.pending = Some(self.ring.write_position());
    }

    fn join_workers(&mut self) {
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                log::error!("Convolution worker panicked; its partitions are dropped for this block");
            }
        }
    }

    /// Join the in-flight generation and merge its results
    fn collect(&mut self) {
        self.join_workers();
        if let Some(position) = self.pending.take() {
            for slot in &self.slots {
                slot.lock().merge_into(&mut self.ring, position, self.block_len);
            }
        }
    }

    /// Block length L
    #[inline]
    pub fn block_len(&self) -> usize {
        self.block_len
    }

    /// Number of partitions P
    #[inline]
    pub fn partition_count(&self) -> usize {
        self.partition_count
    }

    /// Threads spawned per block (0 when everything runs inline)
    #[inline]
    pub fn worker_count(&self) -> usize {
        if self.threaded { self.slots.len() } else { 0 }
    }

    /// Time-domain IR length
    #[inline]
    pub fn ir_length(&self) -> usize {
        self.ir_length
    }

    /// Accumulation ring capacity in samples
    #[inline]
    pub fn ring_capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Partition index ranges assigned to each slot
    pub fn worker_ranges(&self) -> Vec<(usize, usize)> {
        self.slots
            .iter()
            .filter_map(|slot| slot.lock().range())
            .collect()
    }

    /// Current write cursor of the ring
    #[inline]
    pub fn write_position(&self) -> usize {
        self.ring.write_position()
    }
}

impl Processor for PartitionedConvolver {
    /// Restart from silence. In-flight workers are cancelled and joined
    /// before any state is cleared, and their results are discarded.
    fn reset(&mut self) {
        self.cancel.cancel();
        self.join_workers();
        self.cancel.clear();
        self.pending = None;

        self.head.reset();
        for slot in &self.slots {
            slot.lock().reset();
        }
        self.ring.clear();
        self.last_len = 0;
        self.flush_remaining = 0;

        log::debug!("Partitioned convolver reset");
    }
}

impl Drop for PartitionedConvolver {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.join_workers();
    }
}
