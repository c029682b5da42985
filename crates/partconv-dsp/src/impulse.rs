//! Impulse-response segments
//!
//! A long impulse response is cut into equal slices of L samples. Each slice
//! is zero padded to N = 2·L, transformed once and kept as an immutable
//! half-spectrum shared by every convolver that uses it.

use std::ops::Deref;
use std::sync::Arc;

use rustfft::num_complex::Complex;

use crate::plan::{FftPlan, fft_error};
use crate::try_vec;
use partconv_core::{PcError, PcResult, Sample};

/// Frequency-domain impulse-response slice (N/2+1 bins)
///
/// The inverse transform of the plan is unnormalized, so spectra built by
/// [`IrSegment::from_time_domain`] already carry the 1/N factor.
#[derive(Debug, Clone)]
pub struct IrSegment {
    spectrum: Arc<[Complex<Sample>]>,
}

impl IrSegment {
    /// Wrap an already transformed (and 1/N scaled) spectrum
    pub fn from_spectrum(spectrum: Vec<Complex<Sample>>) -> Self {
        Self {
            spectrum: spectrum.into(),
        }
    }

    /// Transform one time-domain slice (at most L samples)
    pub fn from_time_domain(slice: &[Sample], plan: &FftPlan) -> PcResult<Self> {
        if slice.len() > plan.block_len() {
            return Err(PcError::invalid(format!(
                "IR slice of {} samples exceeds block length {}",
                slice.len(),
                plan.block_len()
            )));
        }

        let mut padded = try_vec(plan.size(), 0.0)?;
        padded[..slice.len()].copy_from_slice(slice);

        let mut spectrum = try_vec(plan.spectrum_len(), Complex::new(0.0, 0.0))?;
        let mut scratch = try_vec(plan.forward_scratch_len(), Complex::new(0.0, 0.0))?;
        plan.forward(&mut padded, &mut spectrum, &mut scratch)
            .map_err(fft_error)?;

        let norm = 1.0 / plan.size() as Sample;
        for bin in &mut spectrum {
            *bin *= norm;
        }

        Ok(Self::from_spectrum(spectrum))
    }

    /// Number of bins
    #[inline]
    pub fn len(&self) -> usize {
        self.spectrum.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.spectrum.is_empty()
    }
}

impl Deref for IrSegment {
    type Target = [Complex<Sample>];

    fn deref(&self) -> &Self::Target {
        &self.spectrum
    }
}

/// Impulse response split into uniform frequency-domain segments
#[derive(Debug, Clone)]
pub struct ImpulseResponse {
    segments: Vec<IrSegment>,
    length: usize,
}

impl ImpulseResponse {
    /// Split `samples` into `ceil(len / L)` segments and transform each
    pub fn from_samples(samples: &[Sample], plan: &FftPlan) -> PcResult<Self> {
        if samples.is_empty() {
            return Err(PcError::invalid("impulse response is empty"));
        }

        let segments = samples
            .chunks(plan.block_len())
            .map(|chunk| IrSegment::from_time_domain(chunk, plan))
            .collect::<PcResult<Vec<_>>>()?;

        Ok(Self {
            segments,
            length: samples.len(),
        })
    }

    /// Original time-domain length in samples
    #[inline]
    pub fn len(&self) -> usize {
        self.length
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    #[inline]
    pub fn segments(&self) -> &[IrSegment] {
        &self.segments
    }

    /// Hand the segments over, together with the time-domain length
    pub fn into_parts(self) -> (Vec<IrSegment>, usize) {
        (self.segments, self.length)
    }
}
