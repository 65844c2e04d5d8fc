//! Per-channel STFT analysis/resynthesis engine.
//!
//! One [`SpectralChannel`] owns every piece of running state a single audio
//! channel needs: the input block ring, the spectrum buffer, the policy state
//! and the pending output blocks. Its [`SpectralChannel::process`] method is
//! the only entry point and runs once per host callback.

use std::sync::Arc;

use num_complex::Complex32;
use thiserror::Error;
use tracing::debug;

use crate::{
    assembler::FrameAssembler,
    mirror::{mirror_spectrum, MirrorMode},
    overlap::OverlapAdd,
    transform::SpectralTransform,
    window::Window,
    Sample,
};

/// Number of host blocks in one analysis frame.
pub const N_BLOCK_BUFF: usize = 4;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SpectralError {
    #[error("block size must be non-zero")]
    InvalidBlockSize,
    #[error("sample rate must be positive and finite, got {0}")]
    InvalidSampleRate(f32),
    #[error("{what} has {found} points but the frame size is {expected}")]
    FrameSizeMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
}

/// Fixed configuration of one spectral channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralConfig {
    pub sample_rate: f32,
    pub block_size: usize,
    pub mirror: MirrorMode,
}

impl SpectralConfig {
    pub fn new(sample_rate: f32, block_size: usize) -> Result<Self, SpectralError> {
        if block_size == 0 {
            return Err(SpectralError::InvalidBlockSize);
        }
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(SpectralError::InvalidSampleRate(sample_rate));
        }
        Ok(Self {
            sample_rate,
            block_size,
            mirror: MirrorMode::default(),
        })
    }

    pub fn with_mirror(mut self, mirror: MirrorMode) -> Self {
        self.mirror = mirror;
        self
    }

    /// Analysis frame length, `N_BLOCK_BUFF * block_size`.
    #[inline]
    pub fn frame_size(&self) -> usize {
        N_BLOCK_BUFF * self.block_size
    }

    /// Index of the highest (Nyquist) bin, `frame_size / 2`.
    #[inline]
    pub fn half(&self) -> usize {
        self.frame_size() / 2
    }

    /// Bin index of `hz`, rounded down. Negative frequencies map to bin 0.
    pub fn hz_to_bin(&self, hz: f32) -> usize {
        (self.frame_size() as f32 * hz / self.sample_rate).max(0.0) as usize
    }

    /// Delay between a sample entering and leaving the channel.
    #[inline]
    pub fn latency(&self) -> usize {
        (N_BLOCK_BUFF - 1) * self.block_size
    }
}

/// Per-bin reshaping applied between the forward and inverse transforms.
pub trait MagnitudePolicy: Send {
    /// Reshapes the non-negative frequency bins `0..=N/2`.
    ///
    /// The slice is exactly `N/2 + 1` long; the negative-frequency half is
    /// rebuilt by the channel afterwards.
    fn shape(&mut self, bins: &mut [Complex32]);
}

/// Policy that leaves every bin untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unity;

impl MagnitudePolicy for Unity {
    fn shape(&mut self, _bins: &mut [Complex32]) {}
}

/// Block-buffered STFT pipeline for one audio channel.
pub struct SpectralChannel<P> {
    config: SpectralConfig,
    window: Arc<Window>,
    assembler: FrameAssembler,
    transform: SpectralTransform,
    spectrum: Vec<Complex32>,
    synthesis: Vec<Sample>,
    overlap: OverlapAdd,
    policy: P,
    output_gain: f32,
}

impl<P: MagnitudePolicy> SpectralChannel<P> {
    /// Builds a channel that plans its own transform and window.
    pub fn new(config: SpectralConfig, policy: P) -> Self {
        let frame_size = config.frame_size();
        Self::assemble(
            config,
            Arc::new(Window::hann(frame_size, config.block_size)),
            SpectralTransform::new(frame_size),
            policy,
        )
    }

    /// Builds a channel around a window and transform shared with sibling channels.
    pub fn with_shared(
        config: SpectralConfig,
        window: Arc<Window>,
        transform: SpectralTransform,
        policy: P,
    ) -> Result<Self, SpectralError> {
        let expected = config.frame_size();
        if window.len() != expected {
            return Err(SpectralError::FrameSizeMismatch {
                what: "window",
                expected,
                found: window.len(),
            });
        }
        if transform.size() != expected {
            return Err(SpectralError::FrameSizeMismatch {
                what: "transform",
                expected,
                found: transform.size(),
            });
        }
        Ok(Self::assemble(config, window, transform, policy))
    }

    fn assemble(
        config: SpectralConfig,
        window: Arc<Window>,
        transform: SpectralTransform,
        policy: P,
    ) -> Self {
        let frame_size = config.frame_size();
        debug!(
            block_size = config.block_size,
            frame_size,
            sample_rate = config.sample_rate,
            mirror = ?config.mirror,
            "spectral channel ready"
        );
        Self {
            config,
            window,
            assembler: FrameAssembler::new(N_BLOCK_BUFF, config.block_size),
            transform,
            spectrum: vec![Complex32::new(0.0, 0.0); frame_size],
            synthesis: vec![0.0; frame_size],
            overlap: OverlapAdd::new(N_BLOCK_BUFF, config.block_size),
            policy,
            output_gain: 1.0,
        }
    }

    pub fn config(&self) -> &SpectralConfig {
        &self.config
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn policy_mut(&mut self) -> &mut P {
        &mut self.policy
    }

    pub fn set_output_gain(&mut self, gain: f32) {
        self.output_gain = gain;
    }

    pub fn output_gain(&self) -> f32 {
        self.output_gain
    }

    #[inline]
    pub fn latency(&self) -> usize {
        self.config.latency()
    }

    /// Runs one callback: consumes `block` and overwrites it with the
    /// output block delayed by [`SpectralChannel::latency`] samples.
    ///
    /// `block` must be exactly `block_size` samples long.
    pub fn process(&mut self, block: &mut [Sample]) {
        debug_assert_eq!(block.len(), self.config.block_size);

        let frame = self.assembler.push_block(block);
        self.window.apply_analysis(frame);
        self.transform.forward(frame, &mut self.spectrum);

        let half = self.spectrum.len() / 2;
        self.policy.shape(&mut self.spectrum[..=half]);
        mirror_spectrum(&mut self.spectrum, self.config.mirror);

        self.transform.inverse(&mut self.spectrum, &mut self.synthesis);
        self.window.apply_synthesis(&mut self.synthesis);
        self.overlap.add_frame(&self.synthesis, block);

        if self.output_gain != 1.0 {
            for sample in block.iter_mut() {
                *sample *= self.output_gain;
            }
        }
    }

    /// Clears the input history and pending output without touching the policy.
    pub fn reset(&mut self) {
        self.assembler.reset();
        self.overlap.reset();
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;

    const BLOCK: usize = 64;

    fn config() -> SpectralConfig {
        SpectralConfig::new(48_000.0, BLOCK).expect("valid config")
    }

    fn run<P: MagnitudePolicy>(channel: &mut SpectralChannel<P>, input: &[Sample]) -> Vec<Sample> {
        let mut output = Vec::with_capacity(input.len());
        let mut block = vec![0.0; BLOCK];
        for chunk in input.chunks_exact(BLOCK) {
            block.copy_from_slice(chunk);
            channel.process(&mut block);
            output.extend_from_slice(&block);
        }
        output
    }

    fn noise(len: usize, seed: u64) -> Vec<Sample> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..len).map(|_| rng.random_range(-0.8f32..0.8)).collect()
    }

    struct HalfLength(Vec<usize>);

    impl MagnitudePolicy for HalfLength {
        fn shape(&mut self, bins: &mut [Complex32]) {
            self.0.push(bins.len());
        }
    }

    #[test]
    fn config_rejects_degenerate_values() {
        assert_eq!(
            SpectralConfig::new(48_000.0, 0),
            Err(SpectralError::InvalidBlockSize)
        );
        assert!(matches!(
            SpectralConfig::new(0.0, 64),
            Err(SpectralError::InvalidSampleRate(_))
        ));
        assert!(SpectralConfig::new(f32::NAN, 64).is_err());
    }

    #[test]
    fn config_derives_frame_geometry() {
        let config = config();
        assert_eq!(config.frame_size(), 256);
        assert_eq!(config.half(), 128);
        assert_eq!(config.latency(), 192);
        assert_eq!(config.hz_to_bin(500.0), 2);
        assert_eq!(config.hz_to_bin(24_000.0), 128);
        assert_eq!(config.hz_to_bin(-10.0), 0);
    }

    #[test]
    fn unity_pipeline_is_a_pure_delay() {
        let mut channel = SpectralChannel::new(config(), Unity);
        let input = noise(BLOCK * 40, 11);
        let output = run(&mut channel, &input);

        let delay = channel.latency();
        for n in 0..output.len() {
            let expected = if n >= delay { input[n - delay] } else { 0.0 };
            assert_abs_diff_eq!(output[n], expected, epsilon = 1e-4);
        }
    }

    #[test]
    fn impulse_reappears_after_three_blocks() {
        let mut channel = SpectralChannel::new(config(), Unity);
        let mut input = vec![0.0; BLOCK * 8];
        input[0] = 1.0;
        let output = run(&mut channel, &input);

        let delay = 3 * BLOCK;
        assert_abs_diff_eq!(output[delay], 1.0, epsilon = 1e-5);
        for (n, value) in output.iter().enumerate() {
            if n != delay {
                assert_abs_diff_eq!(*value, 0.0, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn silence_in_gives_silence_out() {
        let mut channel = SpectralChannel::new(config(), Unity);
        let output = run(&mut channel, &vec![0.0; BLOCK * 8]);
        assert!(output.iter().all(|&s| s == 0.0));

        // After real signal, the pipeline drains within one frame of silence.
        run(&mut channel, &noise(BLOCK * 8, 3));
        let mut tail = vec![0.0; BLOCK * 8];
        tail = run(&mut channel, &tail);
        assert!(tail[BLOCK * 3..].iter().all(|s| s.abs() < 1e-6));
    }

    #[test]
    fn output_gain_scales_emitted_blocks() {
        let mut channel = SpectralChannel::new(config(), Unity);
        channel.set_output_gain(2.0);
        let input = noise(BLOCK * 12, 5);
        let output = run(&mut channel, &input);
        let delay = channel.latency();
        for n in delay..output.len() {
            assert_abs_diff_eq!(output[n], 2.0 * input[n - delay], epsilon = 2e-4);
        }
    }

    #[test]
    fn verbatim_mirror_is_not_transparent() {
        let config = config().with_mirror(MirrorMode::Verbatim);
        let mut channel = SpectralChannel::new(config, Unity);
        let input = noise(BLOCK * 12, 9);
        let output = run(&mut channel, &input);
        let delay = channel.latency();

        let max_error = (delay..output.len())
            .map(|n| (output[n] - input[n - delay]).abs())
            .fold(0.0f32, f32::max);
        assert!(max_error > 1e-3, "verbatim mirror unexpectedly transparent");
        assert!(output.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn policy_only_sees_non_negative_bins() {
        let mut channel = SpectralChannel::new(config(), HalfLength(Vec::new()));
        run(&mut channel, &noise(BLOCK * 3, 1));
        assert_eq!(channel.policy().0, vec![129, 129, 129]);
    }

    #[test]
    fn shared_parts_must_match_frame_size() {
        let config = config();
        let window = Arc::new(Window::hann(128, 32));
        let transform = SpectralTransform::new(config.frame_size());
        let result = SpectralChannel::with_shared(config, window, transform, Unity);
        assert!(matches!(
            result,
            Err(SpectralError::FrameSizeMismatch { what: "window", .. })
        ));
    }
}
