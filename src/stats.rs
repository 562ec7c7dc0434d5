//! Per-channel signal statistics: band power, mean, variance, line length.
use anyhow::{bail, Result};
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use serde::Serialize;

/// Named frequency bands in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyBands {
    bands: Vec<(String, f64, f64)>,
}

impl Default for FrequencyBands {
    /// delta 1–4, theta 4–8, alpha 8–14, beta 14–30, gamma 30–45 Hz.
    fn default() -> Self {
        let bands = [
            ("delta", 1.0, 4.0),
            ("theta", 4.0, 8.0),
            ("alpha", 8.0, 14.0),
            ("beta", 14.0, 30.0),
            ("gamma", 30.0, 45.0),
        ];
        Self { bands: bands.iter().map(|&(n, lo, hi)| (n.to_string(), lo, hi)).collect() }
    }
}

impl FrequencyBands {
    /// Add a band, or move the edges of an existing one with the same name.
    pub fn add(&mut self, name: &str, low: f64, high: f64) -> Result<()> {
        if !(low >= 0.0 && high > low) {
            bail!("band {name:?} needs 0 <= low < high (got {low}..{high} Hz)");
        }
        match self.bands.iter_mut().find(|(n, _, _)| n == name) {
            Some(b) => *b = (name.to_string(), low, high),
            None => self.bands.push((name.to_string(), low, high)),
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<(f64, f64)> {
        self.bands.iter().find(|(n, _, _)| n == name).map(|&(_, lo, hi)| (lo, hi))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64, f64)> {
        self.bands.iter().map(|(n, lo, hi)| (n.as_str(), *lo, *hi))
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandPower {
    pub band: String,
    pub power: f64,
}

/// Narrow `(low, high)` to the passband left by the active filters.
///
/// `hp` raises the lower edge, `lp` lowers the upper edge; zero means the
/// stage is off. Returns `None` when the band lies entirely outside.
fn clip_band(low: f64, high: f64, hp: f64, lp: f64) -> Option<(f64, f64)> {
    let (mut lo, mut hi) = (low, high);
    if lp != 0.0 {
        if lo < lp && lp < hi {
            hi = lp;
        } else if lp < hi {
            return None;
        }
    }
    if hp != 0.0 {
        if lo < hp && hp < hi {
            lo = hp;
        } else if hp > lo {
            return None;
        }
    }
    Some((lo, hi))
}

/// Mean spectral power of `signal[start..end]` in each band.
///
/// Power is the mean of `|X_k|²` over the one-sided FFT bins whose frequency
/// `k·fs/n` lies in the (filter-narrowed) band, both edges inclusive. A band
/// with no bins, or one outside the passband, has power 0.
pub fn get_power(
    signal: &[f32],
    start: usize,
    end: usize,
    hp: f64,
    lp: f64,
    fs: f64,
    bands: &FrequencyBands,
) -> Result<Vec<BandPower>> {
    if start > end || end > signal.len() {
        bail!("sample range {start}..{end} outside signal of {} samples", signal.len());
    }
    let spectrum = power_spectrum(&signal[start..end]);
    let n = end - start;

    let out = bands
        .iter()
        .map(|(name, low, high)| {
            let power = match clip_band(low, high, hp, lp) {
                Some((lo, hi)) if n > 0 => {
                    let (sum, count) = spectrum
                        .iter()
                        .enumerate()
                        .filter(|(k, _)| {
                            let f = *k as f64 * fs / n as f64;
                            f >= lo && f <= hi
                        })
                        .fold((0.0, 0usize), |(s, c), (_, &p)| (s + p, c + 1));
                    if count == 0 { 0.0 } else { sum / count as f64 }
                }
                _ => 0.0,
            };
            BandPower { band: name.to_string(), power }
        })
        .collect();
    Ok(out)
}

/// `|rfft(x)|²` for bins `0..=n/2`.
fn power_spectrum(x: &[f32]) -> Vec<f64> {
    let n = x.len();
    if n == 0 {
        return vec![];
    }
    let mut buf: Vec<Complex<f64>> = x.iter().map(|&v| Complex::new(v as f64, 0.0)).collect();
    FftPlanner::<f64>::new().plan_fft_forward(n).process(&mut buf);
    buf[..n / 2 + 1].iter().map(|c| c.norm_sqr()).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SignalStats {
    pub mean: f64,
    /// Population variance (ddof 0).
    pub var: f64,
    /// `sqrt(Σ (x[i+1] - x[i])² + 1)`.
    pub line_length: f64,
}

/// Mean, variance and line length of `signal[start..end]`.
pub fn get_stats(signal: &[f32], start: usize, end: usize) -> Result<SignalStats> {
    if start >= end || end > signal.len() {
        bail!("sample range {start}..{end} is empty or outside signal of {} samples", signal.len());
    }
    let x = &signal[start..end];
    let n = x.len() as f64;
    let mean = x.iter().map(|&v| v as f64).sum::<f64>() / n;
    let var = x.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n;
    let line_length = x
        .windows(2)
        .map(|w| (w[1] as f64 - w[0] as f64).powi(2) + 1.0)
        .sum::<f64>()
        .sqrt();
    Ok(SignalStats { mean, var, line_length })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_band_rules() {
        assert_eq!(clip_band(8.0, 14.0, 0.0, 0.0), Some((8.0, 14.0)));
        assert_eq!(clip_band(8.0, 14.0, 0.0, 10.0), Some((8.0, 10.0)));
        assert_eq!(clip_band(8.0, 14.0, 10.0, 0.0), Some((10.0, 14.0)));
        // Low-pass below the band.
        assert_eq!(clip_band(30.0, 45.0, 0.0, 20.0), None);
        // High-pass above the band.
        assert_eq!(clip_band(1.0, 4.0, 5.0, 0.0), None);
        // Cutoff above the band top leaves it alone.
        assert_eq!(clip_band(1.0, 4.0, 0.0, 30.0), Some((1.0, 4.0)));
    }

    #[test]
    fn stats_of_ramp() {
        let x = [0.0_f32, 1.0, 2.0, 3.0];
        let s = get_stats(&x, 0, 4).unwrap();
        approx::assert_abs_diff_eq!(s.mean, 1.5, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(s.var, 1.25, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(s.line_length, 6.0_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn add_band_replaces_by_name() {
        let mut b = FrequencyBands::default();
        b.add("alpha", 8.0, 12.0).unwrap();
        b.add("spindle", 11.0, 16.0).unwrap();
        assert_eq!(b.len(), 6);
        assert_eq!(b.get("alpha"), Some((8.0, 12.0)));
        assert!(b.add("bad", 5.0, 5.0).is_err());
    }
}
