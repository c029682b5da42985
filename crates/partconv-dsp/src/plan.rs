//! FFT plan shared by every convolver of one impulse response
//!
//! Wraps a pair of RealFFT plans (forward real->complex, inverse
//! complex->real) of a fixed, even size N. Plans are immutable and shared
//! through `Arc`, scratch memory is always supplied by the caller so the
//! audio path never allocates.

use std::fmt;
use std::sync::Arc;

use realfft::{ComplexToReal, FftError, RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex;

use partconv_core::{PcError, PcResult, Sample};

/// Forward/inverse real transform pair of size N
pub struct FftPlan {
    size: usize,
    forward: Arc<dyn RealToComplex<Sample>>,
    inverse: Arc<dyn ComplexToReal<Sample>>,
}

impl FftPlan {
    /// Plan transforms of `size` points. `size` must be even and at least 2.
    pub fn new(size: usize) -> PcResult<Self> {
        if size < 2 || size % 2 != 0 {
            return Err(PcError::invalid(format!(
                "FFT size must be even and >= 2, got {size}"
            )));
        }

        let mut planner = RealFftPlanner::<Sample>::new();
        let forward = planner.plan_fft_forward(size);
        let inverse = planner.plan_fft_inverse(size);

        Ok(Self {
            size,
            forward,
            inverse,
        })
    }

    /// Plan for a given block length L (N = 2·L)
    pub fn for_block(block_len: usize) -> PcResult<Self> {
        if block_len == 0 {
            return Err(PcError::invalid("block length must be non-zero"));
        }
        Self::new(block_len * 2)
    }

    /// Transform size N
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Block length L = N/2
    #[inline]
    pub fn block_len(&self) -> usize {
        self.size / 2
    }

    /// Number of complex bins, N/2 + 1
    #[inline]
    pub fn spectrum_len(&self) -> usize {
        self.size / 2 + 1
    }

    /// Scratch buffer sized for [`FftPlan::forward`]
    pub fn make_forward_scratch(&self) -> Vec<Complex<Sample>> {
        self.forward.make_scratch_vec()
    }

    /// Scratch buffer sized for [`FftPlan::inverse`]
    pub fn make_inverse_scratch(&self) -> Vec<Complex<Sample>> {
        self.inverse.make_scratch_vec()
    }

    #[inline]
    pub fn forward_scratch_len(&self) -> usize {
        self.forward.get_scratch_len()
    }

    #[inline]
    pub fn inverse_scratch_len(&self) -> usize {
        self.inverse.get_scratch_len()
    }

    /// Forward transform. `input` (length N) is used as scratch and
    /// destroyed; `output` must hold N/2+1 bins.
    #[inline]
    pub fn forward(
        &self,
        input: &mut [Sample],
        output: &mut [Complex<Sample>],
        scratch: &mut [Complex<Sample>],
    ) -> Result<(), FftError> {
        self.forward.process_with_scratch(input, output, scratch)
    }

    /// Unnormalized inverse transform. `input` is destroyed.
    ///
    /// The DC and Nyquist bins of a real signal carry no imaginary part; any
    /// rounding residue there is dropped before the transform.
    #[inline]
    pub fn inverse(
        &self,
        input: &mut [Complex<Sample>],
        output: &mut [Sample],
        scratch: &mut [Complex<Sample>],
    ) -> Result<(), FftError> {
        if let Some(first) = input.first_mut() {
            first.im = 0.0;
        }
        if let Some(last) = input.last_mut() {
            last.im = 0.0;
        }
        self.inverse.process_with_scratch(input, output, scratch)
    }
}

impl fmt::Debug for FftPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FftPlan").field("size", &self.size).finish()
    }
}

/// Map an FFT failure to the workspace error type
pub(crate) fn fft_error(err: FftError) -> PcError {
    PcError::Fft(err.to_string())
}
