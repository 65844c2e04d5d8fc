//! Core DSP abstractions for the stomp spectral effects.
//!
//! The crate provides the trait-based effect interface consumed by the host,
//! a sequential effect chain, and the block-buffered STFT engine shared by
//! the spectral effects: a ring of recent input blocks is assembled into an
//! analysis frame, windowed, transformed, reshaped by a [`MagnitudePolicy`],
//! resynthesized and overlap-added into an output ring.

use std::{borrow::Cow, sync::Arc};

use serde::Serialize;
use tracing::instrument;

pub mod assembler;
pub mod channel;
pub mod mirror;
pub mod overlap;
pub mod ring;
pub mod transform;
pub mod window;

pub use assembler::FrameAssembler;
pub use channel::{
    MagnitudePolicy, SpectralChannel, SpectralConfig, SpectralError, Unity, N_BLOCK_BUFF,
};
pub use mirror::MirrorMode;
pub use overlap::OverlapAdd;
pub use ring::BlockRing;
pub use transform::SpectralTransform;
pub use window::Window;

/// Primary floating-point sample type used across the engine.
pub type Sample = f32;

/// Interleaved audio block wrapping a mutable slice of samples.
///
/// The block does not allocate and is suitable for use on the real-time thread.
pub struct ProcessBlock<'a> {
    data: &'a mut [Sample],
    channels: usize,
}

impl<'a> ProcessBlock<'a> {
    /// Creates a new process block from an interleaved buffer.
    ///
    /// # Panics
    ///
    /// Panics if `channels` is zero or if the sample count is not divisible by `channels`.
    pub fn new(data: &'a mut [Sample], channels: usize) -> Self {
        assert!(channels > 0, "channels must be non-zero");
        assert!(
            data.len() % channels == 0,
            "buffer length {} must be divisible by channels {}",
            data.len(),
            channels
        );
        Self { data, channels }
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    #[inline]
    pub fn frames(&self) -> usize {
        self.data.len() / self.channels
    }

    #[inline]
    pub fn data(&self) -> &[Sample] {
        self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [Sample] {
        self.data
    }

    /// Copies one channel out of the interleaved buffer into `dest`.
    ///
    /// Copies `min(dest.len(), frames)` samples.
    pub fn read_channel(&self, channel: usize, dest: &mut [Sample]) {
        assert!(channel < self.channels, "channel index out of range");
        let frames = self.frames().min(dest.len());
        for (frame, value) in dest.iter_mut().enumerate().take(frames) {
            *value = self.data[frame * self.channels + channel];
        }
    }

    /// Writes `source` back into one channel of the interleaved buffer.
    pub fn write_channel(&mut self, channel: usize, source: &[Sample]) {
        assert!(channel < self.channels, "channel index out of range");
        let frames = self.frames().min(source.len());
        for (frame, value) in source.iter().enumerate().take(frames) {
            self.data[frame * self.channels + channel] = *value;
        }
    }
}

/// Processing configuration for a block.
#[derive(Clone, Debug)]
pub struct ProcessContext {
    pub sample_rate: u32,
    pub channels: usize,
    pub frame_count: usize,
    pub time_since_start: f64,
}

/// Metadata describing a parameter exposed by an effect.
///
/// Hosts deliver every control normalized to `range`; effects map the
/// normalized value onto their internal units themselves.
#[derive(Debug, Clone, Serialize)]
pub struct ParameterSpec {
    pub id: &'static str,
    pub name: &'static str,
    pub range: ParameterRange,
    pub default: f32,
    pub unit: ParameterUnit,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParameterRange {
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

impl ParameterRange {
    /// The `[0, 1]` range used by host-normalized controls.
    pub const NORMALIZED: ParameterRange = ParameterRange {
        min: 0.0,
        max: 1.0,
        step: 0.001,
    };

    /// A two-state control (released/pressed).
    pub const MOMENTARY: ParameterRange = ParameterRange {
        min: 0.0,
        max: 1.0,
        step: 1.0,
    };
}

#[derive(Debug, Clone, Serialize)]
pub enum ParameterUnit {
    Decibels,
    Hertz,
    Ratio,
    Seconds,
    Milliseconds,
    Percent,
    Toggle,
    Custom(Cow<'static, str>),
    None,
}

impl Default for ParameterUnit {
    fn default() -> Self {
        Self::None
    }
}

/// Lightweight value update used to avoid heap allocations on the audio thread.
#[derive(Debug, Clone, Copy)]
pub struct ParameterValue {
    pub id: &'static str,
    pub value: f32,
}

/// Shared metadata for an effect implementation.
#[derive(Debug, Clone, Serialize)]
pub struct EffectMetadata {
    pub id: &'static str,
    pub name: &'static str,
    pub parameters: Arc<[ParameterSpec]>,
}

impl EffectMetadata {
    pub fn new(id: &'static str, name: &'static str, parameters: &[ParameterSpec]) -> Self {
        Self {
            id,
            name,
            parameters: Arc::from(parameters),
        }
    }

    /// Looks up a parameter by id, returning the `'static` spec entry.
    pub fn parameter(&self, id: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|spec| spec.id == id)
    }
}

/// Trait implemented by every DSP effect in the engine.
pub trait Effect: Send {
    /// Returns effect metadata used by the host for introspection.
    fn metadata(&self) -> &EffectMetadata;

    /// Processes an interleaved buffer in-place.
    fn process(&mut self, block: &mut ProcessBlock<'_>, context: &ProcessContext);

    /// Applies a control parameter update.
    fn update_parameter(&mut self, update: ParameterValue);

    /// Enables or disables the effect in the processing chain.
    fn set_enabled(&mut self, enabled: bool);

    /// Returns whether the effect is currently active.
    fn is_enabled(&self) -> bool;

    /// Algorithmic delay introduced by the effect, in samples.
    fn latency(&self) -> usize {
        0
    }
}

/// Trait for factories that create effect instances with runtime configuration.
///
/// Sample rate and block size are fixed for the lifetime of the created instance.
pub trait EffectFactory: Send + Sync {
    fn metadata(&self) -> &EffectMetadata;
    fn create(
        &self,
        sample_rate: u32,
        channels: usize,
        block_size: usize,
    ) -> anyhow::Result<Box<dyn Effect>>;
}

/// A sequential processing chain for real-time audio.
pub struct EffectChain {
    effects: Vec<Box<dyn Effect>>,
}

impl EffectChain {
    pub fn new() -> Self {
        Self {
            effects: Vec::new(),
        }
    }

    pub fn add_effect(&mut self, effect: Box<dyn Effect>) {
        self.effects.push(effect);
    }

    pub fn clear(&mut self) {
        self.effects.clear();
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Total latency of the enabled effects, in samples.
    pub fn latency(&self) -> usize {
        self.effects
            .iter()
            .filter(|effect| effect.is_enabled())
            .map(|effect| effect.latency())
            .sum()
    }

    #[instrument(skip_all, level = "trace")]
    pub fn process(&mut self, block: &mut ProcessBlock<'_>, ctx: &ProcessContext) {
        for effect in self.effects.iter_mut() {
            if effect.is_enabled() {
                effect.process(block, ctx);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Box<dyn Effect>> {
        self.effects.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn Effect>> {
        self.effects.iter_mut()
    }
}

impl Default for EffectChain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Gain {
        metadata: EffectMetadata,
        gain: Sample,
        enabled: bool,
    }

    impl Gain {
        fn new() -> Self {
            Self {
                metadata: EffectMetadata::new(
                    "gain",
                    "Unity Gain",
                    &[ParameterSpec {
                        id: "gain",
                        name: "Gain",
                        range: ParameterRange {
                            min: 0.0,
                            max: 2.0,
                            step: 0.01,
                        },
                        default: 1.0,
                        unit: ParameterUnit::Ratio,
                    }],
                ),
                gain: 1.0,
                enabled: true,
            }
        }
    }

    impl Effect for Gain {
        fn metadata(&self) -> &EffectMetadata {
            &self.metadata
        }

        fn process(&mut self, block: &mut ProcessBlock<'_>, _context: &ProcessContext) {
            for sample in block.data_mut() {
                *sample *= self.gain;
            }
        }

        fn update_parameter(&mut self, update: ParameterValue) {
            if update.id == "gain" {
                self.gain = update.value;
            }
        }

        fn set_enabled(&mut self, enabled: bool) {
            self.enabled = enabled;
        }

        fn is_enabled(&self) -> bool {
            self.enabled
        }

        fn latency(&self) -> usize {
            7
        }
    }

    #[test]
    fn process_chain_applies_gain() {
        let mut chain = EffectChain::new();
        chain.add_effect(Box::new(Gain::new()));

        let mut samples = [1.0, -1.0, 0.5, -0.5];
        let mut block = ProcessBlock::new(&mut samples, 2);
        let ctx = ProcessContext {
            sample_rate: 48_000,
            channels: 2,
            frame_count: block.frames(),
            time_since_start: 0.0,
        };

        chain.process(&mut block, &ctx);
        assert_eq!(block.data(), &[1.0, -1.0, 0.5, -0.5]);

        for effect in chain.iter_mut() {
            effect.update_parameter(ParameterValue {
                id: "gain",
                value: 0.5,
            });
        }

        chain.process(&mut block, &ctx);
        assert_eq!(block.data(), &[0.5, -0.5, 0.25, -0.25]);
    }

    #[test]
    fn chain_latency_skips_disabled_effects() {
        let mut chain = EffectChain::new();
        chain.add_effect(Box::new(Gain::new()));
        chain.add_effect(Box::new(Gain::new()));
        assert_eq!(chain.latency(), 14);

        if let Some(effect) = chain.iter_mut().next() {
            effect.set_enabled(false);
        }
        assert_eq!(chain.latency(), 7);
    }

    #[test]
    fn channel_round_trip_through_interleaved_block() {
        let mut samples = [1.0, 10.0, 2.0, 20.0, 3.0, 30.0];
        let mut block = ProcessBlock::new(&mut samples, 2);

        let mut right = [0.0; 3];
        block.read_channel(1, &mut right);
        assert_eq!(right, [10.0, 20.0, 30.0]);

        for value in &mut right {
            *value *= -1.0;
        }
        block.write_channel(1, &right);
        assert_eq!(block.data(), &[1.0, -10.0, 2.0, -20.0, 3.0, -30.0]);
    }

    #[test]
    fn metadata_finds_parameter_by_id() {
        let gain = Gain::new();
        assert!(gain.metadata().parameter("gain").is_some());
        assert!(gain.metadata().parameter("mix").is_none());
    }
}
