//! Analysis/synthesis window.

use std::f32::consts::PI;

use crate::Sample;

const TWO_PI: f32 = 2.0 * PI;

/// Periodic Hann window applied to every frame twice: once before the
/// forward transform and once after the inverse transform.
///
/// The synthesis coefficients are the analysis coefficients divided by the
/// overlap gain `sum_k w[j + k * hop]^2`, so that windowing twice and
/// overlap-adding at `hop` reconstructs the input at unit gain.
#[derive(Debug, Clone)]
pub struct Window {
    analysis: Vec<Sample>,
    synthesis: Vec<Sample>,
    overlap_gain: Sample,
}

impl Window {
    /// Builds a Hann window of `len` samples normalized for overlap-add at `hop`.
    ///
    /// # Panics
    ///
    /// Panics if `len` or `hop` is zero, or if `hop` exceeds `len`.
    pub fn hann(len: usize, hop: usize) -> Self {
        assert!(len > 0, "window length must be non-zero");
        assert!(hop > 0 && hop <= len, "hop must be in 1..=len");

        let analysis: Vec<Sample> = (0..len)
            .map(|i| {
                let phase = TWO_PI * i as f32 / len as f32;
                0.5 - 0.5 * phase.cos()
            })
            .collect();

        let overlap_gain = overlap_gain(&analysis, hop);
        let synthesis = analysis.iter().map(|w| w / overlap_gain).collect();

        Self {
            analysis,
            synthesis,
            overlap_gain,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.analysis.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.analysis.is_empty()
    }

    pub fn coefficients(&self) -> &[Sample] {
        &self.analysis
    }

    /// Summed squared-window gain removed by the synthesis pass.
    pub fn overlap_gain(&self) -> Sample {
        self.overlap_gain
    }

    /// Multiplies `frame` by the analysis window.
    pub fn apply_analysis(&self, frame: &mut [Sample]) {
        for (sample, w) in frame.iter_mut().zip(&self.analysis) {
            *sample *= w;
        }
    }

    /// Multiplies `frame` by the normalized synthesis window.
    pub fn apply_synthesis(&self, frame: &mut [Sample]) {
        for (sample, w) in frame.iter_mut().zip(&self.synthesis) {
            *sample *= w;
        }
    }
}

/// Mean over one hop of the summed squared window at every overlap offset.
fn overlap_gain(window: &[Sample], hop: usize) -> Sample {
    let mut total = 0.0f64;
    for offset in 0..hop {
        let mut sum = 0.0f64;
        let mut index = offset;
        while index < window.len() {
            let w = window[index] as f64;
            sum += w * w;
            index += hop;
        }
        total += sum;
    }
    let gain = total / hop as f64;
    if gain > f64::EPSILON {
        gain as Sample
    } else {
        1.0
    }
}
