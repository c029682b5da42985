//! Sample types and block helpers

/// Type alias for audio samples (always f64 for maximum precision)
pub type Sample = f64;

/// Add `src` element-wise into `dst`.
///
/// Only the overlapping prefix is mixed; extra samples on either side are
/// left alone.
#[inline]
pub fn mix_into(dst: &mut [Sample], src: &[Sample]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d += s;
    }
}
