//! Decode the prediction bins that fall inside a viewing window.
use ndarray::Axis;
use serde::Serialize;

use super::store::{argmax, PredictionGrid, PredictionStore};

/// Per-bin channel detail for per-channel predictions, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ChannelRow {
    /// Binary: which displayed channels exceed the threshold.
    Active(Vec<bool>),
    /// Multi-class: predicted class per displayed channel.
    Classes(Vec<usize>),
}

/// Emitted intervals in samples, `[starts[i], ends[i])`.
///
/// `chns` has one row per interval for per-channel predictions and is empty
/// otherwise; `class_vals` has one class per interval for single-channel
/// multi-class predictions and is empty otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WindowPredictions {
    pub starts: Vec<usize>,
    pub ends: Vec<usize>,
    pub chns: Vec<ChannelRow>,
    pub class_vals: Vec<usize>,
}

impl WindowPredictions {
    pub fn len(&self) -> usize {
        self.starts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    pub fn intervals(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.starts.iter().copied().zip(self.ends.iter().copied())
    }

    fn push(&mut self, start: usize, end: usize) {
        self.starts.push(start);
        self.ends.push(end);
    }
}

/// Map a stored-order channel row onto `n_plot` displayed channels.
///
/// Stored order is the reverse of display order. With more stored than
/// displayed channels the last `n_plot` flipped entries are kept; with fewer,
/// the leading displayed channels get `pad`.
pub fn remap_channels<T: Copy>(stored: &[T], n_plot: usize, pad: T) -> Vec<T> {
    let n_stored = stored.len();
    let flipped = stored.iter().rev().copied();
    if n_stored >= n_plot {
        flipped.skip(n_stored - n_plot).collect()
    } else {
        std::iter::repeat(pad).take(n_plot - n_stored).chain(flipped).collect()
    }
}

impl PredictionStore {
    /// Prediction intervals inside the window `[count, count + window_size)`
    /// seconds.
    ///
    /// Bins straddling either window edge are truncated to it. Binary bins are
    /// emitted when their score (the max over stored channels for
    /// per-channel predictions) exceeds `threshold`; multi-class bins are
    /// always emitted.
    pub fn compute_starts_ends_chns(
        &self,
        threshold: f64,
        count: usize,
        window_size: usize,
        fs: usize,
        n_channels_to_plot: usize,
    ) -> WindowPredictions {
        let mut out = WindowPredictions::default();
        let pw = self.pred_width();
        let grid = match self.grid() {
            Some(g) if pw > 0 => g,
            _ => return out,
        };

        let start_t = count * fs;
        let end_t = start_t + window_size * fs;
        let n_bins = grid.n_bins();

        let mut bin = start_t / pw;
        while bin < n_bins && bin * pw < end_t {
            let lo = (bin * pw).max(start_t);
            let hi = ((bin + 1) * pw).min(end_t);
            match grid {
                PredictionGrid::Binary(a) => {
                    if f64::from(a[bin]) > threshold {
                        out.push(lo, hi);
                    }
                }
                PredictionGrid::BinaryByChannel(a) => {
                    let row = a.row(bin);
                    let peak = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                    if f64::from(peak) > threshold {
                        out.push(lo, hi);
                        let flags: Vec<bool> = row.iter().map(|&v| f64::from(v) > threshold).collect();
                        out.chns
                            .push(ChannelRow::Active(remap_channels(&flags, n_channels_to_plot, false)));
                    }
                }
                PredictionGrid::MultiClass(a) => {
                    out.push(lo, hi);
                    out.class_vals.push(argmax(a.row(bin).iter().copied()));
                }
                PredictionGrid::MultiClassByChannel(a) => {
                    out.push(lo, hi);
                    let classes: Vec<usize> = a
                        .index_axis(Axis(0), bin)
                        .rows()
                        .into_iter()
                        .map(|r| argmax(r.iter().copied()))
                        .collect();
                    out.chns
                        .push(ChannelRow::Classes(remap_channels(&classes, n_channels_to_plot, 0)));
                }
            }
            bin += 1;
        }
        out
    }
}
