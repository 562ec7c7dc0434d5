//! The display/export filter bank.
//!
//! Stages run per channel in a fixed order: notch → low-pass → high-pass →
//! band-pass. Each armed stage is a zero-phase IIR pass; disarmed or
//! out-of-range stages are skipped but still count towards progress.
use anyhow::Result;
use ndarray::Array2;

use super::apply::filtfilt;
use super::design::{
    butter_bandpass, butter_highpass, butter_lowpass, iir_notch, Sos, BUTTER_ORDER, NOTCH_Q,
};
use crate::config::FilterState;

/// Stages per channel, armed or not.
pub const STAGES_PER_CHANNEL: usize = 4;

/// Progress sink for long filter passes.
///
/// `advance` is called after every channel × stage step; the pass stops at
/// the next step once `is_canceled` returns true.
pub trait FilterProgress {
    fn advance(&mut self, done: usize, total: usize);

    fn is_canceled(&self) -> bool {
        false
    }
}

/// Progress sink that never cancels.
pub struct NoProgress;

impl FilterProgress for NoProgress {
    fn advance(&mut self, _done: usize, _total: usize) {}
}

/// Result of a cancellable filter pass.
#[derive(Debug, Clone, PartialEq)]
pub enum Filtered {
    Done(Array2<f32>),
    /// The pass stopped after `completed` of `total` steps; the partial
    /// output was dropped.
    Canceled { completed: usize, total: usize },
}

impl Filtered {
    pub fn is_canceled(&self) -> bool {
        matches!(self, Filtered::Canceled { .. })
    }

    /// The filtered buffer, or `None` when the pass was canceled.
    pub fn into_data(self) -> Option<Array2<f32>> {
        match self {
            Filtered::Done(data) => Some(data),
            Filtered::Canceled { .. } => None,
        }
    }
}

/// Designed sections for each stage of a [`FilterState`] at one rate.
#[derive(Debug, Clone, Default)]
pub struct FilterBank {
    notch: Option<Sos>,
    lowpass: Option<Vec<Sos>>,
    highpass: Option<Vec<Sos>>,
    bandpass: Option<Vec<Sos>>,
}

impl FilterBank {
    /// Design every armed, in-range stage of `state` for sample rate `fs`.
    pub fn design(state: &FilterState, fs: usize) -> Result<Self> {
        let f = fs as f64;
        let notch = state.active_notch(f).map(|f0| iir_notch(f0, NOTCH_Q, f)).transpose()?;
        let lowpass = state.active_lp(f).map(|c| butter_lowpass(BUTTER_ORDER, c, f)).transpose()?;
        let highpass = state.active_hp(f).map(|c| butter_highpass(BUTTER_ORDER, c, f)).transpose()?;
        let bandpass = state
            .active_bp(f)
            .map(|(lo, hi)| butter_bandpass(BUTTER_ORDER, lo, hi, f))
            .transpose()?;
        Ok(Self { notch, lowpass, highpass, bandpass })
    }

    /// True when no stage will touch the signal.
    pub fn is_identity(&self) -> bool {
        self.notch.is_none()
            && self.lowpass.is_none()
            && self.highpass.is_none()
            && self.bandpass.is_none()
    }

    fn stages(&self) -> [Option<&[Sos]>; STAGES_PER_CHANNEL] {
        [
            self.notch.as_ref().map(std::slice::from_ref),
            self.lowpass.as_deref(),
            self.highpass.as_deref(),
            self.bandpass.as_deref(),
        ]
    }

    /// Filter one channel through every armed stage.
    pub fn apply_channel(&self, x: &[f32]) -> Vec<f32> {
        let mut y: Vec<f64> = x.iter().map(|&v| v as f64).collect();
        for sos in self.stages().into_iter().flatten() {
            y = filtfilt(sos, &y);
        }
        y.into_iter().map(|v| v as f32).collect()
    }

    /// Filter a copy of `data` ([C, T]), reporting progress per channel ×
    /// stage. `data` itself is never modified.
    pub fn apply(&self, data: &Array2<f32>, progress: &mut dyn FilterProgress) -> Filtered {
        let total = data.nrows() * STAGES_PER_CHANNEL;
        let mut out = data.clone();
        let mut done = 0;

        for (ch, mut row) in out.rows_mut().into_iter().enumerate() {
            let mut y: Vec<f64> = row.iter().map(|&v| v as f64).collect();
            for sos in self.stages() {
                if let Some(sos) = sos {
                    y = filtfilt(sos, &y);
                }
                done += 1;
                progress.advance(done, total);
                if progress.is_canceled() {
                    log::info!("filter pass canceled at channel {ch} ({done}/{total} steps)");
                    return Filtered::Canceled { completed: done, total };
                }
            }
            row.iter_mut().zip(&y).for_each(|(o, &v)| *o = v as f32);
        }
        Filtered::Done(out)
    }
}

/// Design a bank for `state` at `fs` and run it over `data`.
pub fn apply_filters(
    data: &Array2<f32>,
    fs: usize,
    state: &FilterState,
    progress: &mut dyn FilterProgress,
) -> Result<Filtered> {
    let bank = FilterBank::design(state, fs)?;
    log::debug!(
        "filtering {} channels at {fs} Hz (identity: {})",
        data.nrows(),
        bank.is_identity()
    );
    Ok(bank.apply(data, progress))
}
