//! Zero-phase second-order-section filtering.
//!
//! Forward-backward (`filtfilt`) cascade of transposed direct-form II
//! biquads. Edge transients are suppressed two ways:
//!   • odd reflection of `3·(2·n_sections + 1)` samples on each side
//!     (clamped to `len - 1`)
//!   • steady-state initial conditions scaled by the first sample of each
//!     pass
use ndarray::Array2;

use super::design::Sos;

/// Zero-phase filter every channel of `data` ([C, T]) in place.
pub fn filtfilt_channels(data: &mut Array2<f32>, sos: &[Sos]) {
    for mut row in data.rows_mut() {
        let x: Vec<f64> = row.iter().map(|&v| v as f64).collect();
        let y = filtfilt(sos, &x);
        row.iter_mut().zip(&y).for_each(|(o, &v)| *o = v as f32);
    }
}

/// Forward-backward filter `x` through the section cascade.
///
/// Returns a vector of the same length as `x`.
pub fn filtfilt(sos: &[Sos], x: &[f64]) -> Vec<f64> {
    let n = x.len();
    if n == 0 || sos.is_empty() {
        return x.to_vec();
    }
    let padlen = (3 * (2 * sos.len() + 1)).min(n - 1);
    let mut y = reflect_limited_pad(x, padlen, padlen);
    let zi = sosfilt_zi(sos);

    let mut state = scaled(&zi, y[0]);
    sosfilt(sos, &mut y, &mut state);

    y.reverse();
    let mut state = scaled(&zi, y[0]);
    sosfilt(sos, &mut y, &mut state);
    y.reverse();

    y[padlen..padlen + n].to_vec()
}

/// Run the cascade over `x` in place, carrying per-section state `zi`.
pub fn sosfilt(sos: &[Sos], x: &mut [f64], zi: &mut [[f64; 2]]) {
    for (s, z) in sos.iter().zip(zi.iter_mut()) {
        let [b0, b1, b2, _, a1, a2] = *s;
        for v in x.iter_mut() {
            let xin = *v;
            let y = b0 * xin + z[0];
            z[0] = b1 * xin - a1 * y + z[1];
            z[1] = b2 * xin - a2 * y;
            *v = y;
        }
    }
}

/// Steady-state section states for a unit step input.
///
/// Each section's state is scaled by the DC gain of the sections before it.
pub fn sosfilt_zi(sos: &[Sos]) -> Vec<[f64; 2]> {
    let mut scale = 1.0;
    sos.iter()
        .map(|s| {
            let [b0, b1, b2, _, a1, a2] = *s;
            let big_b0 = b1 - a1 * b0;
            let big_b1 = b2 - a2 * b0;
            let z0 = (big_b0 + big_b1) / (1.0 + a1 + a2);
            let z1 = big_b1 - a2 * z0;
            let out = [z0 * scale, z1 * scale];
            scale *= (b0 + b1 + b2) / (1.0 + a1 + a2);
            out
        })
        .collect()
}

fn scaled(zi: &[[f64; 2]], x0: f64) -> Vec<[f64; 2]> {
    zi.iter().map(|z| [z[0] * x0, z[1] * x0]).collect()
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Odd reflection around the end samples.
///
/// Left:  `pad[i] = 2*x[0] - x[n_l-i]`  for i in 1..=n_l
/// Right: `pad[i] = 2*x[-1] - x[-(i+1)]` for i in 1..=n_r
fn reflect_limited_pad(x: &[f64], n_l: usize, n_r: usize) -> Vec<f64> {
    let n = x.len();
    let actual_l = n_l.min(n - 1);
    let actual_r = n_r.min(n - 1);

    let mut out = Vec::with_capacity(actual_l + n + actual_r);
    for i in (1..=actual_l).rev() {
        out.push(2.0 * x[0] - x[i]);
    }
    out.extend_from_slice(x);
    let last = x[n - 1];
    for i in 1..=actual_r {
        out.push(2.0 * last - x[n - 1 - i]);
    }
    out
}
