//! Adaptive feedback suppression.
//!
//! Every frame the tracker compares each bin of the voice band against its
//! running average. The bin whose current magnitude towers furthest above
//! its history (beyond the SNR threshold) is taken to be ringing and gets a
//! deep notch, with shallower cuts on its two neighbours. The notch stays on
//! that bin until another bin crosses the threshold.

use std::sync::Arc;

use anyhow::Result;
use num_complex::Complex32;
use once_cell::sync::Lazy;
use stomp_dsp::{
    Effect, EffectFactory, EffectMetadata, MagnitudePolicy, ParameterRange, ParameterSpec,
    ParameterUnit, ParameterValue, ProcessBlock, ProcessContext, SpectralConfig,
};
use tracing::{trace, warn};

use crate::{bank::ChannelBank, controls, EffectKind};

/// Weight of the current magnitude in the running average.
pub const LEARN_RATE: f32 = 0.05;
/// Retained share of the previous average; slightly leaky.
pub const UNLEARN_RATE: f32 = 1.0 - LEARN_RATE - 1e-6;

/// Search band for ringing bins.
pub const BAND_LOW_HZ: f32 = 500.0;
pub const BAND_HIGH_HZ: f32 = 5_000.0;
/// Bins at or above this frequency are muted.
pub const CEILING_HZ: f32 = 10_000.0;

/// Gain applied to the held bin (about -30 dB).
pub const NOTCH_GAIN: f32 = 0.03;
/// Gain applied to the bins either side of the held bin (about -10 dB).
pub const NEIGHBOR_GAIN: f32 = 0.3;

const AVERAGE_FLOOR: f32 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotchState {
    /// No bin has crossed the threshold yet; nothing is notched.
    Tracking,
    /// `bin` is being notched.
    Suppressing { bin: usize },
}

/// Running-average tracker that notches the most prominent ringing bin.
#[derive(Debug, Clone)]
pub struct NotchTracker {
    config: SpectralConfig,
    average: Vec<f32>,
    state: NotchState,
    band_low: usize,
    band_high: usize,
    ceiling: usize,
    threshold: f32,
    treble_cutoff: usize,
    treble_gain: f32,
}

impl NotchTracker {
    pub fn new(config: &SpectralConfig) -> Self {
        let half = config.half();
        let ceiling = ((half + 1) as f32 * CEILING_HZ / (config.sample_rate / 2.0)) as usize;
        Self {
            config: *config,
            average: vec![0.0; half + 1],
            state: NotchState::Tracking,
            band_low: config.hz_to_bin(BAND_LOW_HZ).max(1),
            band_high: config.hz_to_bin(BAND_HIGH_HZ).min(half),
            ceiling,
            threshold: controls::snr_threshold(0.5),
            treble_cutoff: config.hz_to_bin(controls::treble_cutoff_hz(0.5)),
            treble_gain: 1.0,
        }
    }

    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold;
    }

    pub fn set_treble_cutoff_hz(&mut self, hz: f32) {
        self.treble_cutoff = self.config.hz_to_bin(hz);
    }

    pub fn set_treble_gain(&mut self, gain: f32) {
        self.treble_gain = gain;
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn treble_cutoff_bin(&self) -> usize {
        self.treble_cutoff
    }

    pub fn state(&self) -> NotchState {
        self.state
    }

    pub fn held_bin(&self) -> Option<usize> {
        match self.state {
            NotchState::Tracking => None,
            NotchState::Suppressing { bin } => Some(bin),
        }
    }

    /// Inclusive search band, in bins.
    pub fn band(&self) -> (usize, usize) {
        (self.band_low, self.band_high)
    }

    /// First muted bin.
    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    pub fn average(&self) -> &[f32] {
        &self.average
    }

    pub fn reset(&mut self) {
        self.average.fill(0.0);
        self.state = NotchState::Tracking;
    }

    /// Scores the band against the averages as they stood before this frame,
    /// then folds the frame into every average.
    fn track(&mut self, bins: &[Complex32]) {
        let mut best: Option<(usize, f32)> = None;
        for bin in self.band_low..=self.band_high {
            let ratio = bins[bin].norm() / self.average[bin].max(AVERAGE_FLOOR);
            if ratio > self.threshold && best.map_or(true, |(_, top)| ratio > top) {
                best = Some((bin, ratio));
            }
        }

        for (average, value) in self.average.iter_mut().zip(bins) {
            *average = *average * UNLEARN_RATE + value.norm() * LEARN_RATE;
        }

        if let Some((bin, ratio)) = best {
            if self.held_bin() != Some(bin) {
                trace!(bin, ratio, "notch retargeted");
            }
            self.state = NotchState::Suppressing { bin };
        }
    }

    fn bin_gain(&self, bin: usize) -> f32 {
        if bin >= self.ceiling {
            return 0.0;
        }
        let mut gain = if bin > self.treble_cutoff {
            self.treble_gain
        } else {
            1.0
        };
        if let NotchState::Suppressing { bin: held } = self.state {
            if bin == held {
                gain *= NOTCH_GAIN;
            } else if bin + 1 == held || bin == held + 1 {
                gain *= NEIGHBOR_GAIN;
            }
        }
        gain
    }
}

impl MagnitudePolicy for NotchTracker {
    fn shape(&mut self, bins: &mut [Complex32]) {
        self.track(bins);
        for bin in 1..bins.len() {
            let gain = self.bin_gain(bin);
            if gain != 1.0 {
                bins[bin] *= gain;
            }
        }
    }
}

pub(crate) struct FeedbackSuppressionFactory {
    metadata: Arc<EffectMetadata>,
}

impl FeedbackSuppressionFactory {
    pub(crate) fn new() -> Self {
        Self {
            metadata: Arc::clone(&FEEDBACK_METADATA),
        }
    }
}

impl EffectFactory for FeedbackSuppressionFactory {
    fn metadata(&self) -> &EffectMetadata {
        self.metadata.as_ref()
    }

    fn create(
        &self,
        sample_rate: u32,
        channels: usize,
        block_size: usize,
    ) -> Result<Box<dyn Effect>> {
        Ok(Box::new(FeedbackSuppressionEffect::new(
            Arc::clone(&self.metadata),
            sample_rate,
            channels,
            block_size,
        )?))
    }
}

/// Multichannel feedback suppressor with one [`NotchTracker`] per channel.
pub struct FeedbackSuppressionEffect {
    metadata: Arc<EffectMetadata>,
    enabled: bool,
    bank: ChannelBank<NotchTracker>,
}

impl FeedbackSuppressionEffect {
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
            bank: ChannelBank::new(config, channels, NotchTracker::new)?,
        };
        for spec in effect.metadata.parameters.clone().iter() {
            effect.apply(spec.id, spec.default);
        }
        Ok(effect)
    }

    /// Held bin of every channel, in channel order.
    pub fn held_bins(&self) -> Vec<Option<usize>> {
        self.bank
            .channels()
            .iter()
            .map(|channel| channel.policy().held_bin())
            .collect()
    }

    pub fn reset(&mut self) {
        self.bank.reset();
        self.bank.for_each_policy(NotchTracker::reset);
    }

    fn apply(&mut self, id: &str, value: f32) -> bool {
        match id {
            "snr_threshold" => {
                let threshold = controls::snr_threshold(value);
                self.bank
                    .for_each_policy(|tracker| tracker.set_threshold(threshold));
            }
            "treble_cutoff" => {
                let hz = controls::treble_cutoff_hz(value);
                self.bank
                    .for_each_policy(|tracker| tracker.set_treble_cutoff_hz(hz));
            }
            "treble_gain" => {
                let gain = controls::squared_gain(value);
                self.bank
                    .for_each_policy(|tracker| tracker.set_treble_gain(gain));
            }
            "output_gain" => self.bank.set_output_gain(controls::squared_gain(value)),
            _ => return false,
        }
        true
    }
}

impl Effect for FeedbackSuppressionEffect {
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

static FEEDBACK_PARAMS: Lazy<Vec<ParameterSpec>> = Lazy::new(|| {
    vec![
        ParameterSpec {
            id: "snr_threshold",
            name: "Sensitivity",
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
            name: "Treble Gain",
            range: ParameterRange::NORMALIZED,
            default: 0.0,
            unit: ParameterUnit::Ratio,
        },
        ParameterSpec {
            id: "output_gain",
            name: "Output Gain",
            range: ParameterRange::NORMALIZED,
            default: 0.0,
            unit: ParameterUnit::Ratio,
        },
    ]
});

static FEEDBACK_METADATA: Lazy<Arc<EffectMetadata>> = Lazy::new(|| {
    Arc::new(EffectMetadata::new(
        EffectKind::FeedbackSuppression.id(),
        EffectKind::FeedbackSuppression.name(),
        FEEDBACK_PARAMS.as_slice(),
    ))
});
