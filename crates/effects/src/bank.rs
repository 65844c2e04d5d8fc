//! Per-channel [`SpectralChannel`] set driven from an interleaved host block.

use std::sync::Arc;

use anyhow::Result;
use rustfft::FftPlanner;
use stomp_dsp::{
    MagnitudePolicy, ProcessBlock, ProcessContext, Sample, SpectralChannel, SpectralConfig,
    SpectralTransform, Window,
};
use tracing::warn;

/// One spectral channel per audio channel, sharing window and FFT plans.
pub(crate) struct ChannelBank<P> {
    config: SpectralConfig,
    channels: Vec<SpectralChannel<P>>,
    scratch: Vec<Sample>,
}

impl<P: MagnitudePolicy> ChannelBank<P> {
    pub(crate) fn new(
        config: SpectralConfig,
        channels: usize,
        mut make_policy: impl FnMut(&SpectralConfig) -> P,
    ) -> Result<Self> {
        let frame_size = config.frame_size();
        let mut planner = FftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(frame_size);
        let inverse = planner.plan_fft_inverse(frame_size);
        let window = Arc::new(Window::hann(frame_size, config.block_size));

        let channels = (0..channels)
            .map(|_| {
                SpectralChannel::with_shared(
                    config,
                    Arc::clone(&window),
                    SpectralTransform::from_plans(Arc::clone(&forward), Arc::clone(&inverse)),
                    make_policy(&config),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            config,
            channels,
            scratch: vec![0.0; config.block_size],
        })
    }

    #[inline]
    pub(crate) fn latency(&self) -> usize {
        self.config.latency()
    }

    pub(crate) fn channels(&self) -> &[SpectralChannel<P>] {
        &self.channels
    }

    pub(crate) fn for_each_policy(&mut self, mut apply: impl FnMut(&mut P)) {
        for channel in &mut self.channels {
            apply(channel.policy_mut());
        }
    }

    pub(crate) fn set_output_gain(&mut self, gain: f32) {
        for channel in &mut self.channels {
            channel.set_output_gain(gain);
        }
    }

    /// Runs every channel over one host block. A block whose geometry does
    /// not match the configuration is left untouched.
    pub(crate) fn process(
        &mut self,
        effect: &str,
        block: &mut ProcessBlock<'_>,
        context: &ProcessContext,
    ) {
        let block_size = self.config.block_size;
        if context.frame_count != block_size || block.frames() != block_size {
            warn!(
                "block size mismatch for {} effect (expected {}, got {}); skipping processing",
                effect,
                block_size,
                block.frames()
            );
            return;
        }
        if block.channels() != self.channels.len() {
            warn!(
                "channel mismatch for {} effect (expected {}, got {}); skipping processing",
                effect,
                self.channels.len(),
                block.channels()
            );
            return;
        }

        for (index, channel) in self.channels.iter_mut().enumerate() {
            block.read_channel(index, &mut self.scratch);
            channel.process(&mut self.scratch);
            block.write_channel(index, &self.scratch);
        }
    }

    pub(crate) fn reset(&mut self) {
        for channel in &mut self.channels {
            channel.reset();
        }
    }
}
