//! Rebuilds the negative-frequency half of a spectrum after its positive
//! half has been reshaped.

use num_complex::Complex32;

/// How the upper half of the spectrum is restored before the inverse transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MirrorMode {
    /// `X[N - d] = conj(X[d])` for `d` in `1..N/2`. The inverse transform of
    /// the result is real, and an untouched spectrum round-trips exactly.
    #[default]
    Conjugate,
    /// `X[N - 1 - d] = X[d]` for every `d` whose mirror index lies above
    /// `N/2`, copying real and imaginary parts without negation. The legacy
    /// pedal voicing; bin `N - 1` keeps its analysis value.
    Verbatim,
}

/// Restores the upper half of `spectrum` from bins `1..=N/2`.
pub fn mirror_spectrum(spectrum: &mut [Complex32], mode: MirrorMode) {
    let size = spectrum.len();
    let half = size / 2;
    match mode {
        MirrorMode::Conjugate => {
            for bin in 1..half {
                spectrum[size - bin] = spectrum[bin].conj();
            }
        }
        MirrorMode::Verbatim => {
            for bin in 1..=half {
                let mirror = size - 1 - bin;
                if mirror > half {
                    spectrum[mirror] = spectrum[bin];
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(size: usize) -> Vec<Complex32> {
        (0..size)
            .map(|i| Complex32::new(i as f32, 100.0 + i as f32))
            .collect()
    }

    #[test]
    fn conjugate_mode_negates_imaginary_part() {
        let mut spectrum = ramp(8);
        mirror_spectrum(&mut spectrum, MirrorMode::Conjugate);
        assert_eq!(spectrum[7], Complex32::new(1.0, -101.0));
        assert_eq!(spectrum[5], Complex32::new(3.0, -103.0));
        // DC and Nyquist are left alone.
        assert_eq!(spectrum[0], Complex32::new(0.0, 100.0));
        assert_eq!(spectrum[4], Complex32::new(4.0, 104.0));
    }

    #[test]
    fn verbatim_mode_copies_with_off_by_one_index() {
        let mut spectrum = ramp(8);
        mirror_spectrum(&mut spectrum, MirrorMode::Verbatim);
        // d = 1 -> 6, d = 2 -> 5; d = 3 would land on the Nyquist bin and is skipped.
        assert_eq!(spectrum[6], Complex32::new(1.0, 101.0));
        assert_eq!(spectrum[5], Complex32::new(2.0, 102.0));
        assert_eq!(spectrum[4], Complex32::new(4.0, 104.0));
        // The last bin is never written.
        assert_eq!(spectrum[7], Complex32::new(7.0, 107.0));
    }

    #[test]
    fn conjugate_mode_restores_real_signal_symmetry() {
        let size = 16;
        let mut spectrum = ramp(size);
        mirror_spectrum(&mut spectrum, MirrorMode::Conjugate);
        for bin in 1..size / 2 {
            assert_eq!(spectrum[size - bin], spectrum[bin].conj());
        }
    }
}
