//! Single-partition FFT convolver
//!
//! Convolves blocks of at most L samples against one impulse-response
//! segment of M = L samples using an N = 2·L point real FFT:
//! - zero pad, forward FFT, complex multiply, inverse FFT
//! - overlap-add: the M-1 samples past the block end are kept as a tail and
//!   added to the front of the next result
//! - spectrum hooks so a caller can transform an input once and reuse it
//!   across many segments, or sum several products before one inverse FFT
//!
//! Every block call reports how many samples it produced. `0` means the
//! call violated its contract (block too long, buffer too short, spectrum of
//! the wrong size) and nothing was written.

use std::sync::Arc;

use rustfft::num_complex::Complex;

use crate::impulse::IrSegment;
use crate::plan::FftPlan;
use crate::{Processor, try_vec};
use partconv_core::{PcError, PcResult, Sample};

/// Outcome of [`FftConvolver::read_tail`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TailRead {
    /// Samples written into the caller's buffer
    pub frames: usize,
    /// No buffered tail remains
    pub end_of_stream: bool,
}

/// FFT convolver for one impulse-response segment
pub struct FftConvolver {
    plan: Arc<FftPlan>,
    segment: IrSegment,
    /// Block length L (max input per call)
    block_len: usize,
    /// Time-domain work buffer, N samples
    time_buf: Vec<Sample>,
    /// Frequency-domain work buffer, N/2+1 bins
    freq_buf: Vec<Complex<Sample>>,
    forward_scratch: Vec<Complex<Sample>>,
    inverse_scratch: Vec<Complex<Sample>>,
    /// Unconsumed overlap from the previous result, M-1 samples
    tail: Vec<Sample>,
    /// Read cursor into `tail`; `tail.len()` when nothing is pending
    tail_pos: usize,
}

impl FftConvolver {
    /// Create a convolver for `segment` using the shared `plan`
    pub fn new(segment: IrSegment, plan: Arc<FftPlan>) -> PcResult<Self> {
        if segment.len() != plan.spectrum_len() {
            return Err(PcError::invalid(format!(
                "segment has {} bins, plan of size {} needs {}",
                segment.len(),
                plan.size(),
                plan.spectrum_len()
            )));
        }

        let block_len = plan.block_len();
        let zero = Complex::new(0.0, 0.0);
        let tail = try_vec(block_len - 1, 0.0)?;
        let tail_pos = tail.len();

        Ok(Self {
            time_buf: try_vec(plan.size(), 0.0)?,
            freq_buf: try_vec(plan.spectrum_len(), zero)?,
            forward_scratch: try_vec(plan.forward_scratch_len(), zero)?,
            inverse_scratch: try_vec(plan.inverse_scratch_len(), zero)?,
            tail,
            tail_pos,
            block_len,
            segment,
            plan,
        })
    }

    /// Maximum block length L
    #[inline]
    pub fn block_len(&self) -> usize {
        self.block_len
    }

    /// Number of spectrum bins expected by the spectrum variants
    #[inline]
    pub fn spectrum_len(&self) -> usize {
        self.freq_buf.len()
    }

    /// Convolve `input` and write `input.len()` samples into `output`.
    pub fn convolve_block(&mut self, input: &[Sample], output: &mut [Sample]) -> usize {
        let len = input.len();
        if !self.block_fits(len, output.len()) || !self.transform_input(input) {
            return 0;
        }
        self.multiply_segment();
        self.finish(output, len)
    }

    /// Like [`FftConvolver::convolve_block`], also copying the forward
    /// transform of `input` into `spectrum_out` for reuse.
    pub fn convolve_block_with_spectrum(
        &mut self,
        input: &[Sample],
        output: &mut [Sample],
        spectrum_out: &mut [Complex<Sample>],
    ) -> usize {
        let len = input.len();
        if !self.block_fits(len, output.len())
            || spectrum_out.len() != self.freq_buf.len()
            || !self.transform_input(input)
        {
            return 0;
        }
        spectrum_out.copy_from_slice(&self.freq_buf);
        self.multiply_segment();
        self.finish(output, len)
    }

    /// Convolve an already transformed block. `output.len()` is the number
    /// of time-domain samples the spectrum was built from.
    pub fn convolve_spectrum(
        &mut self,
        spectrum: &[Complex<Sample>],
        output: &mut [Sample],
    ) -> usize {
        let len = output.len();
        if len == 0 || len > self.block_len || spectrum.len() != self.freq_buf.len() {
            return 0;
        }
        for ((dst, &x), &h) in self.freq_buf.iter_mut().zip(spectrum).zip(self.segment.iter()) {
            *dst = x * h;
        }
        self.finish(output, len)
    }

    /// Multiply `spectrum` by this segment and add the product into `acc`.
    ///
    /// Returns the number of bins accumulated (0 on a size mismatch).
    pub fn accumulate_spectrum(
        &self,
        spectrum: &[Complex<Sample>],
        acc: &mut [Complex<Sample>],
    ) -> usize {
        let bins = self.freq_buf.len();
        if spectrum.len() != bins || acc.len() != bins {
            return 0;
        }
        for ((a, &x), &h) in acc.iter_mut().zip(spectrum).zip(self.segment.iter()) {
            *a += x * h;
        }
        bins
    }

    /// Transform `input`, add its product with this segment into `acc` and
    /// expose the transform through `spectrum_out`.
    pub fn accumulate_block(
        &mut self,
        input: &[Sample],
        acc: &mut [Complex<Sample>],
        spectrum_out: &mut [Complex<Sample>],
    ) -> usize {
        let len = input.len();
        let bins = self.freq_buf.len();
        if len == 0
            || len > self.block_len
            || acc.len() != bins
            || spectrum_out.len() != bins
            || !self.transform_input(input)
        {
            return 0;
        }
        spectrum_out.copy_from_slice(&self.freq_buf);
        for ((a, &x), &h) in acc.iter_mut().zip(&self.freq_buf).zip(self.segment.iter()) {
            *a += x * h;
        }
        len
    }

    /// Inverse-transform an accumulated spectrum and overlap-add it with the
    /// buffered tail, writing `output.len()` samples.
    pub fn inverse_accumulated(
        &mut self,
        acc: &[Complex<Sample>],
        output: &mut [Sample],
    ) -> usize {
        let len = output.len();
        if len == 0 || len > self.block_len || acc.len() != self.freq_buf.len() {
            return 0;
        }
        self.freq_buf.copy_from_slice(acc);
        self.finish(output, len)
    }

    /// Drain the buffered tail into `buffer`.
    ///
    /// Drained samples are consumed and will not be added to a later block.
    pub fn read_tail(&mut self, buffer: &mut [Sample]) -> TailRead {
        let available = self.tail.len() - self.tail_pos;
        let frames = buffer.len().min(available);
        let range = self.tail_pos..self.tail_pos + frames;

        buffer[..frames].copy_from_slice(&self.tail[range.clone()]);
        self.tail[range].fill(0.0);
        self.tail_pos += frames;

        TailRead {
            frames,
            end_of_stream: self.tail_pos == self.tail.len(),
        }
    }

    #[inline]
    fn block_fits(&self, len: usize, out_len: usize) -> bool {
        len > 0 && len <= self.block_len && out_len >= len
    }

    /// Zero pad `input` into the work buffer and forward transform it
    fn transform_input(&mut self, input: &[Sample]) -> bool {
        let (head, rest) = self.time_buf.split_at_mut(input.len());
        head.copy_from_slice(input);
        rest.fill(0.0);

        self.plan
            .forward(&mut self.time_buf, &mut self.freq_buf, &mut self.forward_scratch)
            .is_ok()
    }

    #[inline]
    fn multiply_segment(&mut self) {
        for (x, &h) in self.freq_buf.iter_mut().zip(self.segment.iter()) {
            *x *= h;
        }
    }

    /// Inverse transform `freq_buf`, overlap-add and re-buffer the tail
    fn finish(&mut self, output: &mut [Sample], len: usize) -> usize {
        if self
            .plan
            .inverse(&mut self.freq_buf, &mut self.time_buf, &mut self.inverse_scratch)
            .is_err()
        {
            return 0;
        }

        // Samples already drained by read_tail were zeroed there.
        for (t, &prev) in self.time_buf.iter_mut().zip(&self.tail) {
            *t += prev;
        }

        output[..len].copy_from_slice(&self.time_buf[..len]);

        let tail_len = self.tail.len();
        self.tail
            .copy_from_slice(&self.time_buf[len..len + tail_len]);
        self.tail_pos = 0;

        len
    }
}

impl Processor for FftConvolver {
    fn reset(&mut self) {
        self.tail.fill(0.0);
        self.tail_pos = self.tail.len();
    }
}
