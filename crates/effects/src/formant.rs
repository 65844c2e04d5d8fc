//! Spectral formant shifter.
//!
//! Each output bin `d` takes its magnitude from source position `d / shift`
//! (linearly interpolated) while keeping its own phase, which moves the
//! spectral envelope up or down without changing the pitch.

use std::sync::Arc;

use anyhow::Result;
use num_complex::Complex32;
use once_cell::sync::Lazy;
use stomp_dsp::{
    Effect, EffectFactory, EffectMetadata, MagnitudePolicy, ParameterRange, ParameterSpec,
    ParameterUnit, ParameterValue, ProcessBlock, ProcessContext, SpectralConfig,
};
use tracing::{debug, warn};

use crate::{bank::ChannelBank, controls, EffectKind};

/// Source bins at or above this frequency produce silence.
pub const CEILING_HZ: f32 = 10_000.0;

/// Below this magnitude a bin's phase is treated as undefined.
const MAGNITUDE_FLOOR: f32 = 1e-9;
const MIN_SHIFT: f32 = 1e-3;

/// Magnitude remapping policy for one channel.
#[derive(Debug, Clone)]
pub struct FormantWarp {
    config: SpectralConfig,
    magnitudes: Vec<f32>,
    shift: f32,
    ceiling: usize,
    treble_cutoff: usize,
    treble_gain: f32,
    bypass: bool,
}

impl FormantWarp {
    pub fn new(config: &SpectralConfig) -> Self {
        let half = config.half();
        Self {
            config: *config,
            magnitudes: vec![0.0; half + 1],
            shift: 1.0,
            ceiling: ((half + 1) as f32 * CEILING_HZ / (config.sample_rate / 2.0)) as usize,
            treble_cutoff: config.hz_to_bin(controls::treble_cutoff_hz(0.5)),
            treble_gain: 1.0,
            bypass: false,
        }
    }

    pub fn set_shift(&mut self, shift: f32) {
        self.shift = shift.max(MIN_SHIFT);
    }

    pub fn set_treble_cutoff_hz(&mut self, hz: f32) {
        self.treble_cutoff = self.config.hz_to_bin(hz);
    }

    pub fn set_treble_gain(&mut self, gain: f32) {
        self.treble_gain = gain;
    }

    pub fn set_bypass(&mut self, bypass: bool) {
        self.bypass = bypass;
    }

    pub fn shift(&self) -> f32 {
        self.shift
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypass
    }

    /// First source bin that is muted.
    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    pub fn treble_cutoff_bin(&self) -> usize {
        self.treble_cutoff
    }
}

impl MagnitudePolicy for FormantWarp {
    fn shape(&mut self, bins: &mut [Complex32]) {
        if self.bypass {
            return;
        }

        for (magnitude, bin) in self.magnitudes.iter_mut().zip(bins.iter()) {
            *magnitude = bin.norm();
        }

        let half = bins.len() - 1;
        let max_source = half.saturating_sub(1).max(1);
        for dest in 1..=half {
            let position = dest as f32 / self.shift;
            let source = (position as usize).clamp(1, max_source);
            if source >= self.ceiling {
                bins[dest] = Complex32::new(0.0, 0.0);
                continue;
            }

            let frac = (position - source as f32).clamp(0.0, 1.0);
            let lower = self.magnitudes[source];
            let upper = self.magnitudes[(source + 1).min(half)];
            let target = lower + frac * (lower - upper);

            let gain = if dest > self.treble_cutoff {
                self.treble_gain
            } else {
                1.0
            };

            let current = self.magnitudes[dest];
            if current > MAGNITUDE_FLOOR {
                bins[dest] *= gain * target / current;
            } else {
                bins[dest] = Complex32::new(gain * target, 0.0);
            }
        }
    }
}

pub(crate) struct FormantShiftFactory {
    metadata: Arc<EffectMetadata>,
}

impl FormantShiftFactory {
    pub(crate) fn new() -> Self {
        Self {
            metadata: Arc::clone(&FORMANT_METADATA),
        }
    }
}

impl EffectFactory for FormantShiftFactory {
    fn metadata(&self) -> &EffectMetadata {
        self.metadata.as_ref()
    }

    fn create(
        &self,
        sample_rate: u32,
        channels: usize,
        block_size: usize,
    ) -> Result<Box<dyn Effect>> {
        Ok(Box::new(FormantShiftEffect::new(
            Arc::clone(&self.metadata),
            sample_rate,
            channels,
            block_size,
        )?))
    }
}

pub struct FormantShiftEffect {
    metadata: Arc<EffectMetadata>,
    enabled: bool,
    bank: ChannelBank<FormantWarp>,
}

impl FormantShiftEffect {
    pub fn new(
        metadata: Arc<EffectMetadata>,
        sample_rate: u32,
        channels: usize,
        block_size: usize,
    ) -> Result<Self> {
        let config = SpectralConfig::new(sample_rate as f32, block_size)?;
        let mut effect = Self {
            metadata,
            enabled: true,
            bank: ChannelBank::new(config, channels, FormantWarp::new)?,
        };
        for spec in effect.metadata.parameters.clone().iter() {
            effect.apply(spec.id, spec.default);
        }
        Ok(effect)
    }

    pub fn reset(&mut self) {
        self.bank.reset();
    }

    fn apply(&mut self, id: &str, value: f32) -> bool {
        match id {
            "shift" => {
                let shift = controls::shift_factor(value);
                debug!(shift, "formant shift");
                self.bank.for_each_policy(|warp| warp.set_shift(shift));
            }
            "treble_cutoff" => {
                let hz = controls::treble_cutoff_hz(value);
                self.bank
                    .for_each_policy(|warp| warp.set_treble_cutoff_hz(hz));
            }
            "treble_gain" => {
                let gain = controls::bipolar_treble_gain(value);
                self.bank.for_each_policy(|warp| warp.set_treble_gain(gain));
            }
            "output_gain" => self
                .bank
                .set_output_gain(controls::formant_output_gain(value)),
            "bypass" => {
                let bypass = controls::is_pressed(value);
                self.bank.for_each_policy(|warp| warp.set_bypass(bypass));
            }
            _ => return false,
        }
        true
    }
}

impl Effect for FormantShiftEffect {
    fn metadata(&self) -> &EffectMetadata {
        self.metadata.as_ref()
    }

    fn process(&mut self, block: &mut ProcessBlock<'_>, context: &ProcessContext) {
        if !self.enabled {
            return;
        }
        self.bank.process(self.metadata.id, block, context);
    }

    fn update_parameter(&mut self, update: ParameterValue) {
        if !self.apply(update.id, update.value) {
            warn!(
                "parameter `{}` not found for effect `{}`",
                update.id, self.metadata.id
            );
        }
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn latency(&self) -> usize {
        self.bank.latency()
    }
}

static FORMANT_PARAMS: Lazy<Vec<ParameterSpec>> = Lazy::new(|| {
    vec![
        ParameterSpec {
            id: "shift",
            name: "Formant Shift",
            range: ParameterRange::NORMALIZED,
            default: 0.5,
            unit: ParameterUnit::Ratio,
        },
        ParameterSpec {
            id: "treble_cutoff",
            name: "Treble Cutoff",
            range: ParameterRange::NORMALIZED,
            default: 0.5,
            unit: ParameterUnit::Hertz,
        },
        ParameterSpec {
            id: "treble_gain",
            name: "Treble Boost/Cut",
            range: ParameterRange::NORMALIZED,
            default: 0.5,
            unit: ParameterUnit::Ratio,
        },
        ParameterSpec {
            id: "output_gain",
            name: "Output Gain",
            range: ParameterRange::NORMALIZED,
            default: controls::FORMANT_UNITY_GAIN,
            unit: ParameterUnit::Ratio,
        },
        ParameterSpec {
            id: "bypass",
            name: "Bypass",
            range: ParameterRange::MOMENTARY,
            default: 0.0,
            unit: ParameterUnit::Toggle,
        },
    ]
});

static FORMANT_METADATA: Lazy<Arc<EffectMetadata>> = Lazy::new(|| {
    Arc::new(EffectMetadata::new(
        EffectKind::FormantShift.id(),
        EffectKind::FormantShift.name(),
        FORMANT_PARAMS.as_slice(),
    ))
});
