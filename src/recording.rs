//! The loaded recording: a `[C, T]` sample grid at one rate plus labels and
//! annotations.
//!
//! Samples and labels are fixed once built. Only the annotation list is
//! editable afterwards.
use std::collections::HashSet;

use anyhow::{bail, Result};
use ndarray::{s, Array2};

use crate::annotation::Annotations;
use crate::resample::resample_channel;

#[derive(Debug, Clone)]
pub struct Recording {
    data: Array2<f32>,
    fs: usize,
    max_time: usize,
    labels: Vec<String>,
    annotations: Annotations,
}

impl Recording {
    /// Build from a `[C, T]` buffer sampled at `fs` Hz.
    ///
    /// `max_time` is the whole number of seconds covered by the samples.
    /// Labels must be unique and one per channel.
    pub fn new(data: Array2<f32>, fs: usize, labels: Vec<String>) -> Result<Self> {
        if fs == 0 {
            bail!("sample rate must be positive");
        }
        if labels.len() != data.nrows() {
            bail!(
                "{} labels for {} channels",
                labels.len(),
                data.nrows()
            );
        }
        let mut seen = HashSet::new();
        if let Some(dup) = labels.iter().find(|l| !seen.insert(l.as_str())) {
            bail!("duplicate channel label {dup:?}");
        }
        let max_time = data.ncols() / fs;
        Ok(Self { data, fs, max_time, labels, annotations: Annotations::new() })
    }

    /// Build from per-channel buffers that may each have their own rate.
    ///
    /// The session rate is the fastest channel rate. Slower channels are FFT
    /// resampled up to it; all channels are then cut (or zero-padded) to the
    /// length of the longest-covering channel.
    pub fn from_channels(channels: Vec<Vec<f32>>, rates: &[f64], labels: Vec<String>) -> Result<Self> {
        if channels.len() != rates.len() {
            bail!("{} sample rates for {} channels", rates.len(), channels.len());
        }
        let fs = rates.iter().copied().fold(0.0_f64, f64::max);
        if fs <= 0.0 || fs.fract() != 0.0 {
            bail!("unified sample rate must be a positive integer (got {fs})");
        }

        let mut rows = Vec::with_capacity(channels.len());
        for (ch, (x, &rate)) in channels.into_iter().zip(rates).enumerate() {
            if rate != fs {
                log::debug!("channel {ch}: resampling {rate} Hz -> {fs} Hz");
                rows.push(resample_channel(&x, rate, fs)?);
            } else {
                rows.push(x);
            }
        }

        let n_t = rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut data = Array2::<f32>::zeros((rows.len(), n_t));
        for (ch, row) in rows.iter().enumerate() {
            data.slice_mut(s![ch, ..row.len()])
                .assign(&ndarray::ArrayView1::from(row.as_slice()));
        }
        Self::new(data, fs as usize, labels)
    }

    pub fn with_annotations(mut self, annotations: Annotations) -> Self {
        self.annotations = annotations;
        self
    }

    /// Keep only the channels named in `wanted`, in that order.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace.
    pub fn select_channels<S: AsRef<str>>(&self, wanted: &[S]) -> Result<Self> {
        let norm = |s: &str| s.trim().to_uppercase();
        let mut idx = Vec::with_capacity(wanted.len());
        for w in wanted {
            let w = w.as_ref();
            match self.labels.iter().position(|l| norm(l) == norm(w)) {
                Some(i) => idx.push(i),
                None => bail!("channel {w:?} not found in recording"),
            }
        }
        let data = self.data.select(ndarray::Axis(0), &idx);
        let labels = idx.iter().map(|&i| self.labels[i].clone()).collect();
        Ok(Self::new(data, self.fs, labels)?.with_annotations(self.annotations.clone()))
    }

    #[inline]
    pub fn fs(&self) -> usize {
        self.fs
    }

    /// Whole seconds covered by the recording.
    #[inline]
    pub fn max_time(&self) -> usize {
        self.max_time
    }

    #[inline]
    pub fn n_channels(&self) -> usize {
        self.data.nrows()
    }

    #[inline]
    pub fn n_samples(&self) -> usize {
        self.data.ncols()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn data(&self) -> &Array2<f32> {
        &self.data
    }

    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    pub fn annotations_mut(&mut self) -> &mut Annotations {
        &mut self.annotations
    }

    /// Copy of samples `[start, end)` for every channel.
    ///
    /// Samples past the end of the recording read as zero, so the result
    /// always has `end - start` columns.
    pub fn window(&self, start: usize, end: usize) -> Array2<f32> {
        let mut out = Array2::<f32>::zeros((self.n_channels(), end.saturating_sub(start)));
        let stop = end.min(self.n_samples());
        if start < stop {
            out.slice_mut(s![.., ..stop - start])
                .assign(&self.data.slice(s![.., start..stop]));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("CH{i}")).collect()
    }

    #[test]
    fn max_time_truncates_partial_second() {
        let rec = Recording::new(Array2::zeros((2, 256 * 10 + 100)), 256, labels(2)).unwrap();
        assert_eq!(rec.max_time(), 10);
    }

    #[test]
    fn rejects_duplicate_labels() {
        let err = Recording::new(Array2::zeros((2, 10)), 1, vec!["A".into(), "A".into()]);
        assert!(err.is_err());
    }

    #[test]
    fn mixed_rates_unify_to_fastest() {
        let rec = Recording::from_channels(
            vec![vec![1.0; 512], vec![1.0; 256]],
            &[256.0, 128.0],
            labels(2),
        )
        .unwrap();
        assert_eq!(rec.fs(), 256);
        assert_eq!(rec.n_samples(), 512);
        approx::assert_abs_diff_eq!(rec.data()[[1, 300]], 1.0, epsilon = 1e-2);
    }

    #[test]
    fn window_pads_past_end() {
        let data = Array2::from_shape_fn((1, 20), |(_, t)| t as f32);
        let rec = Recording::new(data, 10, labels(1)).unwrap();
        let w = rec.window(15, 25);
        assert_eq!(w.ncols(), 10);
        assert_eq!(w[[0, 0]], 15.0);
        assert_eq!(w[[0, 9]], 0.0);
    }

    #[test]
    fn select_channels_reorders() {
        let data = Array2::from_shape_fn((3, 4), |(c, _)| c as f32);
        let rec = Recording::new(data, 2, labels(3)).unwrap();
        let sub = rec.select_channels(&["ch2", " CH0 "]).unwrap();
        assert_eq!(sub.labels(), &["CH2".to_string(), "CH0".to_string()]);
        assert_eq!(sub.data()[[0, 0]], 2.0);
        assert!(rec.select_channels(&["FP1"]).is_err());
    }
}
