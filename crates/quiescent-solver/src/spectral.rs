//! Harmonic analysis of transient waveforms.
//!
//! A Hann-windowed FFT plus peak search around each expected harmonic,
//! feeding the usual THD figure:
//!
//! `THD = sqrt(V2^2 + V3^2 + ... + Vn^2) / V1 * 100%`
//!
//! Operates on raw uniformly sampled data so it composes directly with
//! [`TransientTrace::unknown`](crate::transient::TransientTrace::unknown).

use std::f64::consts::PI;

use rustfft::{FftPlanner, num_complex::Complex};

/// One measured harmonic.
#[derive(Debug, Clone)]
pub struct Harmonic {
    /// Harmonic number; 1 is the fundamental.
    pub number: usize,
    /// Measured frequency (Hz).
    pub frequency: f64,
    /// Window-corrected magnitude.
    pub magnitude: f64,
}

/// Result of a THD measurement.
#[derive(Debug, Clone)]
pub struct ThdResult {
    /// THD as a percentage of the fundamental.
    pub thd_percent: f64,
    /// Magnitude of the fundamental.
    pub fundamental_magnitude: f64,
    /// Fundamental plus the analysed harmonics.
    pub harmonics: Vec<Harmonic>,
}

/// Measure THD of a uniformly sampled signal.
///
/// `fundamental` is the expected fundamental frequency; `num_harmonics`
/// counts the overtones included in the sum (2nd, 3rd, ...). Harmonics
/// beyond Nyquist are dropped.
pub fn compute_thd(
    samples: &[f64],
    sample_rate: f64,
    fundamental: f64,
    num_harmonics: usize,
) -> ThdResult {
    let n = samples.len();
    if n < 4 || fundamental <= 0.0 || sample_rate <= 0.0 {
        return ThdResult {
            thd_percent: 0.0,
            fundamental_magnitude: 0.0,
            harmonics: Vec::new(),
        };
    }

    // Hann window; correct magnitudes by the coherent gain (window mean).
    let mut buffer: Vec<Complex<f64>> = samples
        .iter()
        .enumerate()
        .map(|(i, &s)| {
            let w = 0.5 * (1.0 - (2.0 * PI * i as f64 / n as f64).cos());
            Complex::new(s * w, 0.0)
        })
        .collect();

    FftPlanner::new().plan_fft_forward(n).process(&mut buffer);

    let coherent_gain = 0.5;
    let bin_width = sample_rate / n as f64;
    let half = n / 2;
    let magnitude: Vec<f64> = buffer[..half]
        .iter()
        .map(|c| 2.0 * c.norm() / (n as f64 * coherent_gain))
        .collect();

    // Search a couple of bins either side of each expected harmonic; the
    // simulated fundamental rarely lands exactly on a bin.
    let peak_near = |freq: f64| -> Option<(usize, f64)> {
        let center = (freq / bin_width).round() as i64;
        let lo = (center - 2).max(0) as usize;
        let hi = ((center + 2) as usize).min(half.saturating_sub(1));
        (lo..=hi)
            .map(|b| (b, magnitude[b]))
            .max_by(|a, b| a.1.total_cmp(&b.1))
    };

    let Some((fund_bin, fund_mag)) = peak_near(fundamental) else {
        return ThdResult {
            thd_percent: 0.0,
            fundamental_magnitude: 0.0,
            harmonics: Vec::new(),
        };
    };

    let mut harmonics = vec![Harmonic {
        number: 1,
        frequency: fund_bin as f64 * bin_width,
        magnitude: fund_mag,
    }];

    let mut harmonic_sum_sq = 0.0;
    for number in 2..=(num_harmonics + 1) {
        let target = fundamental * number as f64;
        if target >= sample_rate / 2.0 {
            break;
        }
        if let Some((bin, mag)) = peak_near(target) {
            harmonic_sum_sq += mag * mag;
            harmonics.push(Harmonic {
                number,
                frequency: bin as f64 * bin_width,
                magnitude: mag,
            });
        }
    }

    let thd_percent = if fund_mag > 1e-20 {
        harmonic_sum_sq.sqrt() / fund_mag * 100.0
    } else {
        0.0
    };

    ThdResult {
        thd_percent,
        fundamental_magnitude: fund_mag,
        harmonics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone_mix(fundamental: f64, amplitudes: &[f64], sample_rate: f64, duration: f64) -> Vec<f64> {
        let n = (sample_rate * duration) as usize;
        (0..n)
            .map(|i| {
                let t = i as f64 / sample_rate;
                amplitudes
                    .iter()
                    .enumerate()
                    .map(|(h, &a)| a * (2.0 * PI * fundamental * (h + 1) as f64 * t).sin())
                    .sum()
            })
            .collect()
    }

    #[test]
    fn test_pure_tone_near_zero_thd() {
        let samples = tone_mix(1000.0, &[1.0], 48000.0, 0.1);
        let result = compute_thd(&samples, 48000.0, 1000.0, 10);
        assert!(result.thd_percent < 1.0, "THD = {}", result.thd_percent);
    }

    #[test]
    fn test_known_harmonic_mix() {
        // 10% second harmonic, 5% third: THD = sqrt(0.01 + 0.0025) * 100.
        let samples = tone_mix(1000.0, &[1.0, 0.1, 0.05], 48000.0, 0.1);
        let result = compute_thd(&samples, 48000.0, 1000.0, 10);

        let expected = (0.1f64.powi(2) + 0.05f64.powi(2)).sqrt() * 100.0;
        assert!(
            (result.thd_percent - expected).abs() < 2.0,
            "THD = {} (expected ~{expected})",
            result.thd_percent
        );
        assert_eq!(result.harmonics[0].number, 1);
        assert!((result.harmonics[0].magnitude - 1.0).abs() < 0.1);
    }

    #[test]
    fn test_square_wave_thd() {
        // Odd harmonics at 4/(n*pi): THD is roughly 48%.
        let sample_rate = 96000.0;
        let n = (sample_rate * 0.1) as usize;
        let samples: Vec<f64> = (0..n)
            .map(|i| {
                let phase = 2.0 * PI * 1000.0 * i as f64 / sample_rate;
                if phase.sin() >= 0.0 { 1.0 } else { -1.0 }
            })
            .collect();

        let result = compute_thd(&samples, sample_rate, 1000.0, 20);
        assert!(
            result.thd_percent > 30.0 && result.thd_percent < 60.0,
            "square wave THD = {}",
            result.thd_percent
        );
    }

    #[test]
    fn test_empty_input() {
        let result = compute_thd(&[], 48000.0, 1000.0, 5);
        assert_eq!(result.thd_percent, 0.0);
        assert!(result.harmonics.is_empty());
    }
}
