//! FFT resampling used to bring slower channels up to the session rate.
//!
//! EDF files may store each signal at its own rate. The viewer works on a
//! single `[C, T]` grid at the fastest rate, so every slower channel goes
//! through [`resample_channel`]:
//!
//!   1. Reflect-limited padding to the next power of two (see [`auto_npad`]).
//!   2. Forward FFT of the padded signal, keep the half spectrum.
//!   3. Adjust the Nyquist bin (×2 when shrinking, ×½ when growing).
//!   4. Scale by `new_len / old_len`, zero-pad or truncate the spectrum.
//!   5. Inverse FFT, strip the resampled padding.
use anyhow::{bail, Result};
use ndarray::Array2;
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// Padding `(left, right)` that brings `n` samples to the next power of two
/// with at least `min(n / 8, 100)` samples on each side.
pub fn auto_npad(n: usize) -> (usize, usize) {
    let min_add = (n / 8).min(100) * 2;
    let sum = n + min_add;
    let next_pow2 = 1usize << ((sum as f64).log2().ceil() as u32);
    let total = next_pow2 - n;
    (total / 2, total - total / 2)
}

/// Output length for `n` input samples: `round(n · dst / src)`.
#[inline]
pub fn resampled_len(n: usize, src_fs: f64, dst_fs: f64) -> usize {
    (n as f64 * dst_fs / src_fs).round() as usize
}

/// Resample every row of `data` ([C, T]) from `src_fs` to `dst_fs`.
pub fn resample(data: &Array2<f32>, src_fs: f64, dst_fs: f64) -> Result<Array2<f32>> {
    if (src_fs - dst_fs).abs() < 1e-9 {
        return Ok(data.clone());
    }
    let n_out = resampled_len(data.ncols(), src_fs, dst_fs);
    let mut out = Array2::<f32>::zeros((data.nrows(), n_out));
    for (ch, row) in data.rows().into_iter().enumerate() {
        let y = resample_channel(&row.to_vec(), src_fs, dst_fs)?;
        out.row_mut(ch).assign(&ndarray::ArrayView1::from(&y));
    }
    Ok(out)
}

/// Resample one channel from `src_fs` to `dst_fs`.
pub fn resample_channel(x: &[f32], src_fs: f64, dst_fs: f64) -> Result<Vec<f32>> {
    if src_fs <= 0.0 || dst_fs <= 0.0 {
        bail!("sample rates must be positive (src={src_fs}, dst={dst_fs})");
    }
    let n_in = x.len();
    if n_in == 0 {
        return Ok(vec![]);
    }
    if (src_fs - dst_fs).abs() < 1e-9 {
        return Ok(x.to_vec());
    }
    let ratio = dst_fs / src_fs;
    let final_len = resampled_len(n_in, src_fs, dst_fs);
    let (npad_l, npad_r) = auto_npad(n_in);

    let pad_l = npad_l.min(n_in - 1);
    let pad_r = npad_r.min(n_in - 1);
    let old_len = n_in + pad_l + pad_r;

    let mut x_ext = Vec::with_capacity(old_len);
    for i in (1..=pad_l).rev() {
        x_ext.push(2.0 * x[0] as f64 - x[i] as f64);
    }
    x_ext.extend(x.iter().map(|&v| v as f64));
    let last = x[n_in - 1] as f64;
    for i in 1..=pad_r {
        x_ext.push(2.0 * last - x[n_in - 1 - i] as f64);
    }

    let new_len = (ratio * old_len as f64).round() as usize;
    if new_len == 0 {
        return Ok(vec![0.0; final_len]);
    }
    let shorter = new_len < old_len;
    let use_len = if shorter { new_len } else { old_len };

    let mut planner: FftPlanner<f64> = FftPlanner::new();
    let mut buf: Vec<Complex<f64>> = x_ext.iter().map(|&v| Complex::new(v, 0.0)).collect();
    planner.plan_fft_forward(old_len).process(&mut buf);

    let mut half: Vec<Complex<f64>> = buf[..old_len / 2 + 1].to_vec();
    if use_len % 2 == 0 {
        let nyq = use_len / 2;
        if nyq < half.len() {
            half[nyq] *= if shorter { 2.0 } else { 0.5 };
        }
    }
    let scale = new_len as f64 / old_len as f64;
    half.iter_mut().for_each(|v| *v *= scale);

    // Rebuild a Hermitian spectrum of length new_len.
    let new_half = new_len / 2 + 1;
    let mut spec = vec![Complex::<f64>::default(); new_len];
    let n_copy = half.len().min(new_half);
    spec[..n_copy].copy_from_slice(&half[..n_copy]);
    for i in 1..new_half {
        let mirror = new_len - i;
        if mirror >= new_half {
            spec[mirror] = spec[i].conj();
        }
    }
    planner.plan_fft_inverse(new_len).process(&mut spec);
    let inv = 1.0 / new_len as f64;

    let strip_l = (ratio * npad_l as f64).round() as usize;
    let strip_r = new_len.saturating_sub(final_len + strip_l);
    let end = new_len.saturating_sub(strip_r).max(strip_l);

    let mut y: Vec<f32> = spec[strip_l.min(end)..end]
        .iter()
        .map(|c| (c.re * inv) as f32)
        .collect();
    y.resize(final_len, 0.0);
    Ok(y)
}
