//! Mappings from host-normalized `[0, 1]` controls onto internal units.
//!
//! Mapped values are resolved once per parameter change, never per sample.

use std::f32::consts::SQRT_2;

/// Upper end of the treble cutoff control.
pub const TREBLE_CUTOFF_MAX_HZ: f32 = 4_000.0;

/// Normalized output-gain setting at which the formant shifter has unit gain.
pub const FORMANT_UNITY_GAIN: f32 = 0.5 + (SQRT_2 - 1.0) / 4.0;

#[inline]
fn unit(x: f32) -> f32 {
    x.clamp(0.0, 1.0)
}

/// Notch trigger level, `(1 + 5x)^2`: 1.0 ..= 36.0.
pub fn snr_threshold(x: f32) -> f32 {
    let v = 1.0 + 5.0 * unit(x);
    v * v
}

/// Squared-law gain, `(1 + 3x)^2`: 1.0 ..= 16.0.
pub fn squared_gain(x: f32) -> f32 {
    let v = 1.0 + 3.0 * unit(x);
    v * v
}

/// Treble shelf corner, 0 ..= 4000 Hz.
pub fn treble_cutoff_hz(x: f32) -> f32 {
    unit(x) * TREBLE_CUTOFF_MAX_HZ
}

/// Formant shift factor. The lower half of the control spans 0.33 ..= 1.0
/// and the upper half 1.0 ..= 2.5, meeting at unity in the middle.
pub fn shift_factor(x: f32) -> f32 {
    let x = unit(x);
    if x < 0.5 {
        (x * 2.0) * 0.67 + 0.33
    } else {
        ((x - 0.5) * 2.0) * 1.5 + 1.0
    }
}

/// Boost/cut treble gain. Above the midpoint the control boosts from 1 to 9,
/// below it cuts from 1 down to 1/9.
pub fn bipolar_treble_gain(x: f32) -> f32 {
    let x = unit(x);
    let depth = ((x - 0.5) * 2.0).abs() * 2.0 + 1.0;
    let gain = depth * depth;
    if x >= 0.5 {
        gain.clamp(1.0, 9.0)
    } else {
        (1.0 / gain).min(1.0)
    }
}

/// Formant shifter output level: half of the bipolar treble mapping.
pub fn formant_output_gain(x: f32) -> f32 {
    bipolar_treble_gain(x) / 2.0
}

/// Momentary switch state.
pub fn is_pressed(x: f32) -> bool {
    x >= 0.5
}
