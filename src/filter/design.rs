//! IIR filter design: Butterworth low/high/band-pass and second-order notch.
//!
//! Butterworth filters follow the classic analog-prototype route:
//!   • prototype poles `p_k = -exp(jπ·m/2N)`, `m = -N+1, -N+3, …, N-1`
//!   • pre-warp the cutoff(s): `w = 4·tan(π·Wn/2)` with `Wn = f / (fs/2)`
//!   • frequency transform (lp→lp, lp→hp, lp→bp) in zpk form
//!   • bilinear transform at normalised rate 2, zeros at infinity → `z = -1`
//!   • pair conjugate poles into second-order sections
//!
//! Every section is `[b0, b1, b2, 1, a1, a2]`; the overall gain sits in the
//! first section.
use std::f64::consts::PI;

use anyhow::{bail, Result};
use rustfft::num_complex::Complex64;

/// One second-order section `[b0, b1, b2, a0, a1, a2]` with `a0 == 1`.
pub type Sos = [f64; 6];

/// Butterworth order used by every display/export filter stage.
pub const BUTTER_ORDER: usize = 4;

/// Quality factor of the notch stage.
pub const NOTCH_Q: f64 = 20.0;

struct Zpk {
    z: Vec<Complex64>,
    p: Vec<Complex64>,
    k: f64,
}

fn normalized(f: f64, fs: f64) -> Result<f64> {
    let wn = f / (fs / 2.0);
    if !(wn > 0.0 && wn < 1.0) {
        bail!("cutoff {f} Hz must lie strictly between 0 and fs/2 = {} Hz", fs / 2.0);
    }
    Ok(wn)
}

#[inline]
fn prewarp(wn: f64) -> f64 {
    4.0 * (PI * wn / 2.0).tan()
}

fn prototype(order: usize) -> Vec<Complex64> {
    let n = order as f64;
    (0..order)
        .map(|i| {
            let m = -n + 1.0 + 2.0 * i as f64;
            -Complex64::from_polar(1.0, PI * m / (2.0 * n))
        })
        .collect()
}

/// Butterworth low-pass at `cutoff` Hz.
pub fn butter_lowpass(order: usize, cutoff: f64, fs: f64) -> Result<Vec<Sos>> {
    let wo = prewarp(normalized(cutoff, fs)?);
    let p = prototype(order).into_iter().map(|p| p * wo).collect();
    Ok(to_sos(bilinear(Zpk { z: vec![], p, k: wo.powi(order as i32) })))
}

/// Butterworth high-pass at `cutoff` Hz.
pub fn butter_highpass(order: usize, cutoff: f64, fs: f64) -> Result<Vec<Sos>> {
    let wo = prewarp(normalized(cutoff, fs)?);
    let proto = prototype(order);
    let prod_neg_p = proto.iter().fold(Complex64::new(1.0, 0.0), |acc, &p| acc * -p);
    let p = proto.iter().map(|&p| wo / p).collect();
    let z = vec![Complex64::new(0.0, 0.0); order];
    Ok(to_sos(bilinear(Zpk { z, p, k: (1.0 / prod_neg_p).re })))
}

/// Butterworth band-pass between `low` and `high` Hz (order doubles).
pub fn butter_bandpass(order: usize, low: f64, high: f64, fs: f64) -> Result<Vec<Sos>> {
    if high <= low {
        bail!("band-pass edges must be increasing (got {low}..{high} Hz)");
    }
    let wl = prewarp(normalized(low, fs)?);
    let wh = prewarp(normalized(high, fs)?);
    let bw = wh - wl;
    let wo2 = wl * wh;

    let mut p = Vec::with_capacity(2 * order);
    let scaled: Vec<Complex64> = prototype(order).into_iter().map(|p| p * (bw / 2.0)).collect();
    for &s in &scaled {
        p.push(s + (s * s - wo2).sqrt());
    }
    for &s in &scaled {
        p.push(s - (s * s - wo2).sqrt());
    }
    let z = vec![Complex64::new(0.0, 0.0); order];
    Ok(to_sos(bilinear(Zpk { z, p, k: bw.powi(order as i32) })))
}

/// Second-order IIR notch at `f0` Hz with quality factor `q`.
///
/// Bandwidth `f0 / q` measured at the -3 dB points.
pub fn iir_notch(f0: f64, q: f64, fs: f64) -> Result<Sos> {
    let w0 = normalized(f0, fs)?;
    let bw = w0 / q * PI;
    let w0 = w0 * PI;
    let beta = (bw / 2.0).tan();
    let gain = 1.0 / (1.0 + beta);
    let c = w0.cos();
    Ok([gain, -2.0 * c * gain, gain, 1.0, -2.0 * c * gain, 2.0 * gain - 1.0])
}

fn bilinear(zpk: Zpk) -> Zpk {
    let fs2 = Complex64::new(4.0, 0.0);
    let degree = zpk.p.len() - zpk.z.len();
    let num = zpk.z.iter().fold(Complex64::new(1.0, 0.0), |acc, &z| acc * (fs2 - z));
    let den = zpk.p.iter().fold(Complex64::new(1.0, 0.0), |acc, &p| acc * (fs2 - p));

    let mut z: Vec<Complex64> = zpk.z.iter().map(|&z| (fs2 + z) / (fs2 - z)).collect();
    z.extend(std::iter::repeat(Complex64::new(-1.0, 0.0)).take(degree));
    let p = zpk.p.iter().map(|&p| (fs2 + p) / (fs2 - p)).collect();
    Zpk { z, p, k: zpk.k * (num / den).re }
}

fn to_sos(zpk: Zpk) -> Vec<Sos> {
    const EPS: f64 = 1e-12;

    // Poles: one section per conjugate pair, real poles paired in order.
    let mut pole_pairs: Vec<(Complex64, Complex64)> = Vec::new();
    let mut real: Vec<f64> = Vec::new();
    for &p in &zpk.p {
        if p.im > EPS {
            pole_pairs.push((p, p.conj()));
        } else if p.im.abs() <= EPS {
            real.push(p.re);
        }
    }
    for chunk in real.chunks(2) {
        let a = Complex64::new(chunk[0], 0.0);
        let b = Complex64::new(chunk.get(1).copied().unwrap_or(0.0), 0.0);
        pole_pairs.push((a, b));
    }

    // Zeros are real (±1) for these designs; pair the ends of the sorted list
    // so band-pass sections each get one zero at DC and one at Nyquist.
    let mut zeros: Vec<f64> = zpk.z.iter().map(|z| z.re).collect();
    zeros.sort_by(|a, b| a.total_cmp(b));
    let mut zero_pairs: Vec<(f64, f64)> = Vec::new();
    let (mut lo, mut hi) = (0usize, zeros.len());
    while lo < hi {
        hi -= 1;
        if lo == hi {
            zero_pairs.push((zeros[lo], 0.0));
        } else {
            zero_pairs.push((zeros[lo], zeros[hi]));
        }
        lo += 1;
    }

    let mut sos: Vec<Sos> = pole_pairs
        .iter()
        .enumerate()
        .map(|(i, (p1, p2))| {
            let (z1, z2) = zero_pairs.get(i).copied().unwrap_or((0.0, 0.0));
            let a1 = -(p1 + p2).re;
            let a2 = (p1 * p2).re;
            [1.0, -(z1 + z2), z1 * z2, 1.0, a1, a2]
        })
        .collect();
    if let Some(first) = sos.first_mut() {
        first[0] *= zpk.k;
        first[1] *= zpk.k;
        first[2] *= zpk.k;
    }
    sos
}

/// Magnitude response of a section cascade at `f` Hz.
pub fn sos_gain(sos: &[Sos], f: f64, fs: f64) -> f64 {
    let w = 2.0 * PI * f / fs;
    let z1 = Complex64::from_polar(1.0, -w);
    let z2 = z1 * z1;
    sos.iter()
        .map(|s| {
            let num = s[0] + z1 * s[1] + z2 * s[2];
            let den = s[3] + z1 * s[4] + z2 * s[5];
            (num / den).norm()
        })
        .product()
}
