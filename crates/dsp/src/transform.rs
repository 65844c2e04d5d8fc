//! Forward/inverse transform of a fixed frame size.

use std::sync::Arc;

use num_complex::Complex32;
use rustfft::{Fft, FftPlanner};

use crate::Sample;

/// Complex FFT pair of a fixed size with preallocated scratch space.
///
/// The plans are reference counted so several channels can share them; the
/// scratch buffer is owned so each channel can run without allocating.
pub struct SpectralTransform {
    size: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex32>,
}

impl SpectralTransform {
    /// Plans a forward/inverse pair of `size` points.
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(size);
        let inverse = planner.plan_fft_inverse(size);
        Self::from_plans(forward, inverse)
    }

    /// Builds a transform around existing plans.
    ///
    /// # Panics
    ///
    /// Panics if the plans disagree on their length.
    pub fn from_plans(forward: Arc<dyn Fft<f32>>, inverse: Arc<dyn Fft<f32>>) -> Self {
        let size = forward.len();
        assert_eq!(size, inverse.len(), "forward and inverse plans differ in size");
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());
        Self {
            size,
            forward,
            inverse,
            scratch: vec![Complex32::new(0.0, 0.0); scratch_len],
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Transforms a real frame into `spectrum` (both `size` long).
    pub fn forward(&mut self, frame: &[Sample], spectrum: &mut [Complex32]) {
        debug_assert_eq!(frame.len(), self.size);
        debug_assert_eq!(spectrum.len(), self.size);
        for (bin, &sample) in spectrum.iter_mut().zip(frame) {
            *bin = Complex32::new(sample, 0.0);
        }
        self.forward.process_with_scratch(spectrum, &mut self.scratch);
    }

    /// Reconstructs the real part of the inverse transform into `frame`,
    /// scaled by `1 / size`. `spectrum` is used as the work buffer and holds
    /// the unscaled time-domain signal afterwards.
    pub fn inverse(&mut self, spectrum: &mut [Complex32], frame: &mut [Sample]) {
        debug_assert_eq!(frame.len(), self.size);
        debug_assert_eq!(spectrum.len(), self.size);
        self.inverse.process_with_scratch(spectrum, &mut self.scratch);
        let scale = 1.0 / self.size as f32;
        for (sample, bin) in frame.iter_mut().zip(spectrum.iter()) {
            *sample = bin.re * scale;
        }
    }
}
