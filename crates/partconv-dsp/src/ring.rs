//! Accumulation ring buffer
//!
//! Holds the running sum of every convolution contribution that has not been
//! read yet, indexed by stream position modulo the capacity. The capacity is
//! two halves, each at least as long as the full reach of the impulse
//! response, so contributions written from the current cursor never reach the
//! half that is still being read.
//!
//! Lazy clearing: instead of zeroing what was read on every block, a whole
//! half is zeroed when the write cursor leaves it. Crossing the midpoint
//! clears the first half, wrapping past the end clears the second. At either
//! moment every sample of the cleared half has been read and nothing live
//! has been written into it.

use partconv_core::{PcError, PcResult, Sample, mix_into};

use crate::try_vec;

/// Circular double buffer with lazy half clearing
#[derive(Debug, Clone)]
pub struct AccumulationRing {
    buffer: Vec<Sample>,
    half: usize,
    write_pos: usize,
}

impl AccumulationRing {
    /// Create a ring whose halves are `half_len` samples each
    pub fn new(half_len: usize) -> PcResult<Self> {
        if half_len == 0 {
            return Err(PcError::invalid("ring half length must be non-zero"));
        }
        let capacity = half_len
            .checked_mul(2)
            .ok_or(PcError::Allocation { requested: usize::MAX })?;

        Ok(Self {
            buffer: try_vec(capacity, 0.0)?,
            half: half_len,
            write_pos: 0,
        })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    #[inline]
    pub fn half_len(&self) -> usize {
        self.half
    }

    /// Position the next block is read from and its delay-0 part written to
    #[inline]
    pub fn write_position(&self) -> usize {
        self.write_pos
    }

    /// Move the cursor forward by `frames` (at most one half), clearing the
    /// half that was just left behind.
    pub fn advance(&mut self, frames: usize) {
        debug_assert!(frames <= self.half);

        let old = self.write_pos;
        let mut new = old + frames;

        if new >= self.buffer.len() {
            new -= self.buffer.len();
            self.buffer[self.half..].fill(0.0);
        } else if old < self.half && new >= self.half {
            self.buffer[..self.half].fill(0.0);
        }

        self.write_pos = new;
    }

    /// Add `data` starting `offset` samples after the write cursor
    #[inline]
    pub fn add_at_offset(&mut self, offset: usize, data: &[Sample]) {
        self.add_at(self.write_pos + offset, data);
    }

    /// Add `data` starting at absolute `position` (taken modulo capacity)
    pub fn add_at(&mut self, position: usize, data: &[Sample]) {
        let cap = self.buffer.len();
        let mut start = position % cap;
        let mut remaining = data;

        while !remaining.is_empty() {
            let run = remaining.len().min(cap - start);
            mix_into(&mut self.buffer[start..start + run], &remaining[..run]);
            remaining = &remaining[run..];
            start = 0;
        }
    }

    /// Copy `out.len()` samples starting at the write cursor
    pub fn read(&self, out: &mut [Sample]) {
        let cap = self.buffer.len();
        let mut start = self.write_pos;
        let mut filled = 0;

        while filled < out.len() {
            let run = (out.len() - filled).min(cap - start);
            out[filled..filled + run].copy_from_slice(&self.buffer[start..start + run]);
            filled += run;
            start = 0;
        }
    }

    /// Zero everything and rewind the cursor
    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }

    #[cfg(test)]
    fn raw(&self) -> &[Sample] {
        &self.buffer
    }
}
