//! Viewer configuration.
//!
//! [`ViewerConfig`] is the initialization struct a front end hands to the
//! core: file paths, initial time offset, window width, the six-element
//! filter spec and the prediction threshold. [`FilterState`] holds the
//! per-stage filter toggles and cutoffs that the filter bank, the
//! compositor and the EDF exporter all read.
use std::fmt;
use std::path::PathBuf;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Visible window width. Only the enumerated widths are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum WindowSize {
    S1,
    S5,
    S10,
    S15,
    S20,
    S25,
    S30,
}

impl WindowSize {
    /// Every accepted width, narrowest first.
    pub const ALL: [WindowSize; 7] = [
        WindowSize::S1,
        WindowSize::S5,
        WindowSize::S10,
        WindowSize::S15,
        WindowSize::S20,
        WindowSize::S25,
        WindowSize::S30,
    ];

    /// Width in whole seconds.
    pub fn seconds(self) -> usize {
        match self {
            WindowSize::S1 => 1,
            WindowSize::S5 => 5,
            WindowSize::S10 => 10,
            WindowSize::S15 => 15,
            WindowSize::S20 => 20,
            WindowSize::S25 => 25,
            WindowSize::S30 => 30,
        }
    }

    /// Spacing of the x-axis tick labels in seconds.
    ///
    /// 1 s below 15 s windows, 2 s for 15–25 s, 3 s above.
    pub fn tick_step(self) -> usize {
        match self.seconds() {
            s if s > 25 => 3,
            s if s >= 15 => 2,
            _ => 1,
        }
    }
}

impl Default for WindowSize {
    fn default() -> Self {
        WindowSize::S10
    }
}

impl TryFrom<u32> for WindowSize {
    type Error = anyhow::Error;

    fn try_from(secs: u32) -> Result<Self> {
        match WindowSize::ALL.iter().find(|w| w.seconds() == secs as usize) {
            Some(w) => Ok(*w),
            None => bail!("window width must be one of 1, 5, 10, 15, 20, 25, 30 s (got {secs})"),
        }
    }
}

impl From<WindowSize> for u32 {
    fn from(w: WindowSize) -> u32 {
        w.seconds() as u32
    }
}

impl fmt::Display for WindowSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.seconds())
    }
}

/// Filter toggles and cutoffs (Hz).
///
/// `enabled` is the master switch the display and export paths consult; the
/// per-stage `do_*` flags decide which stages the filter bank runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
    pub enabled: bool,
    pub do_lp: bool,
    pub lp: f64,
    pub do_hp: bool,
    pub hp: f64,
    pub do_notch: bool,
    pub notch: f64,
    pub do_bp: bool,
    pub bp1: f64,
    pub bp2: f64,
}

impl Default for FilterState {
    /// 30 Hz low-pass and 2 Hz high-pass armed, notch at 60 Hz and band-pass
    /// disarmed, master switch off.
    fn default() -> Self {
        Self {
            enabled: false,
            do_lp: true,
            lp: 30.0,
            do_hp: true,
            hp: 2.0,
            do_notch: false,
            notch: 60.0,
            do_bp: false,
            bp1: 0.0,
            bp2: 0.0,
        }
    }
}

impl FilterState {
    /// Build from the six-element spec `[enabled, lp, hp, notch, bp1, bp2]`.
    ///
    /// A zero cutoff disables its stage. The master switch is only turned on
    /// when `enabled == 1` and at least one stage is armed.
    pub fn from_spec(spec: [f64; 6]) -> Self {
        let [on, lp, hp, notch, bp1, bp2] = spec;
        let mut fs = Self {
            enabled: false,
            do_lp: lp != 0.0,
            lp,
            do_hp: hp != 0.0,
            hp,
            do_notch: notch != 0.0,
            notch,
            do_bp: bp1 != 0.0 && bp2 != 0.0,
            bp1,
            bp2,
        };
        fs.enabled = on == 1.0 && fs.any_stage();
        fs
    }

    /// Whether any stage is armed.
    pub fn any_stage(&self) -> bool {
        self.do_lp || self.do_hp || self.do_notch || self.do_bp
    }

    /// Low-pass cutoff if the stage is armed and inside `(0, fs/2)`.
    pub fn active_lp(&self, fs: f64) -> Option<f64> {
        (self.do_lp && in_band(self.lp, fs)).then_some(self.lp)
    }

    /// High-pass cutoff if the stage is armed and inside `(0, fs/2)`.
    pub fn active_hp(&self, fs: f64) -> Option<f64> {
        (self.do_hp && in_band(self.hp, fs)).then_some(self.hp)
    }

    /// Notch frequency if the stage is armed and inside `(0, fs/2)`.
    pub fn active_notch(&self, fs: f64) -> Option<f64> {
        (self.do_notch && in_band(self.notch, fs)).then_some(self.notch)
    }

    /// Band-pass edges if armed, both inside `(0, fs/2)` and ordered.
    pub fn active_bp(&self, fs: f64) -> Option<(f64, f64)> {
        (self.do_bp && in_band(self.bp1, fs) && in_band(self.bp2, fs) && self.bp2 > self.bp1)
            .then_some((self.bp1, self.bp2))
    }

    /// The five filter-history annotation texts written on export.
    ///
    /// Disarmed stages report 0.
    pub fn history(&self) -> [String; 5] {
        let gate = |on: bool, v: f64| if on { v } else { 0.0 };
        [
            HISTORY_MARKER.to_string(),
            format!("LP: {}Hz", gate(self.do_lp, self.lp)),
            format!("HP: {}Hz", gate(self.do_hp, self.hp)),
            format!("N: {}Hz", gate(self.do_notch, self.notch)),
            format!(
                "BP: {}-{}Hz",
                gate(self.do_bp, self.bp1),
                gate(self.do_bp, self.bp2)
            ),
        ]
    }

    /// Restore a filter state from a filter history written by [`history`].
    ///
    /// Returns `None` when `texts` does not start with a complete history.
    /// The restored state has the master switch on.
    ///
    /// [`history`]: FilterState::history
    pub fn from_history<S: AsRef<str>>(texts: &[S]) -> Option<Self> {
        if texts.len() < 5 || texts[0].as_ref() != HISTORY_MARKER {
            return None;
        }
        let value = |s: &str, prefix: &str| -> Option<f64> {
            s.strip_prefix(prefix)?.strip_suffix("Hz")?.trim().parse().ok()
        };
        let lp = value(texts[1].as_ref(), "LP:")?;
        let hp = value(texts[2].as_ref(), "HP:")?;
        let notch = value(texts[3].as_ref(), "N:")?;
        let (bp1, bp2) = {
            let body = texts[4].as_ref().strip_prefix("BP:")?.strip_suffix("Hz")?;
            let (a, b) = body.split_once('-')?;
            (a.trim().parse::<f64>().ok()?, b.trim().parse::<f64>().ok()?)
        };

        let defaults = Self::default();
        Some(Self {
            enabled: true,
            do_lp: lp > 0.0,
            lp: if lp > 0.0 { lp } else { defaults.lp },
            do_hp: hp > 0.0,
            hp: if hp > 0.0 { hp } else { defaults.hp },
            do_notch: notch > 0.0,
            notch: if notch > 0.0 { notch } else { defaults.notch },
            do_bp: bp1 > 0.0 && bp2 > 0.0,
            bp1: if bp1 > 0.0 && bp2 > 0.0 { bp1 } else { defaults.bp1 },
            bp2: if bp1 > 0.0 && bp2 > 0.0 { bp2 } else { defaults.bp2 },
        })
    }
}

/// First annotation of an exported filter history.
pub const HISTORY_MARKER: &str = "filtered";

fn in_band(f: f64, fs: f64) -> bool {
    f > 0.0 && f < fs / 2.0
}

/// Initialization settings for a viewer session.
///
/// All fields are `pub` so you can construct one with struct-update syntax:
///
/// ```
/// use eegview::{ViewerConfig, WindowSize};
///
/// let cfg = ViewerConfig {
///     window: WindowSize::S30,
///     threshold: 0.8,
///     ..ViewerConfig::default()
/// };
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// Recording to open.
    pub recording: Option<PathBuf>,

    /// Prediction tensor file to overlay.
    pub predictions: Option<PathBuf>,

    /// Text file with one channel label per line, in display order.
    pub channel_list: Option<PathBuf>,

    /// Initial window start in seconds.
    ///
    /// Ignored (left at 0) if it would put the window past the end of the
    /// recording.
    ///
    /// Default: `0`.
    pub location: usize,

    /// Visible window width.
    ///
    /// Default: `10` s.
    pub window: WindowSize,

    /// `[enabled, lp, hp, notch, bp1, bp2]`; a zero cutoff disables its stage.
    ///
    /// Default: `[0, 30, 2, 0, 0, 0]`.
    pub filter: [f64; 6],

    /// Probability cutoff for binary predictions.
    ///
    /// Default: `0.5`.
    pub threshold: f64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            recording: None,
            predictions: None,
            channel_list: None,
            location: 0,
            window: WindowSize::S10,
            filter: [0.0, 30.0, 2.0, 0.0, 0.0, 0.0],
            threshold: 0.5,
        }
    }
}

impl ViewerConfig {
    /// Check values a front end cannot be trusted to have clamped.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            bail!("prediction threshold must be between 0 and 1 (got {})", self.threshold);
        }
        if self.filter[0] != 0.0 && self.filter[0] != 1.0 {
            bail!("filter[0] must be 0 or 1 (got {})", self.filter[0]);
        }
        if self.filter[1..].iter().any(|&f| f < 0.0) {
            bail!("filter cutoffs must be non-negative: {:?}", &self.filter[1..]);
        }
        if self.predictions.is_some() && self.recording.is_none() {
            bail!("a prediction file needs a recording to overlay");
        }
        Ok(())
    }

    /// Filter state described by [`ViewerConfig::filter`].
    pub fn filter_state(&self) -> FilterState {
        FilterState::from_spec(self.filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_size_rejects_unlisted_widths() {
        assert_eq!(WindowSize::try_from(15).unwrap(), WindowSize::S15);
        assert!(WindowSize::try_from(7).is_err());
        assert!(WindowSize::try_from(0).is_err());
    }

    #[test]
    fn tick_step_by_width() {
        assert_eq!(WindowSize::S10.tick_step(), 1);
        assert_eq!(WindowSize::S15.tick_step(), 2);
        assert_eq!(WindowSize::S25.tick_step(), 2);
        assert_eq!(WindowSize::S30.tick_step(), 3);
    }

    #[test]
    fn spec_zero_cutoffs_disarm_stages() {
        let f = FilterState::from_spec([1.0, 30.0, 0.0, 0.0, 0.0, 0.0]);
        assert!(f.enabled);
        assert!(f.do_lp);
        assert!(!f.do_hp && !f.do_notch && !f.do_bp);

        // Master switch stays off when nothing is armed.
        let f = FilterState::from_spec([1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert!(!f.enabled);
    }

    #[test]
    fn cutoffs_outside_nyquist_are_inactive() {
        let f = FilterState { lp: 200.0, ..FilterState::default() };
        assert_eq!(f.active_lp(256.0), None);
        assert_eq!(f.active_hp(256.0), Some(2.0));
        let f = FilterState { do_bp: true, bp1: 30.0, bp2: 10.0, ..FilterState::default() };
        assert_eq!(f.active_bp(256.0), None);
    }

    #[test]
    fn history_round_trips() {
        let f = FilterState {
            enabled: true,
            do_notch: true,
            notch: 50.0,
            do_hp: false,
            ..FilterState::default()
        };
        let texts = f.history();
        assert_eq!(texts[1], "LP: 30Hz");
        assert_eq!(texts[2], "HP: 0Hz");
        assert_eq!(texts[4], "BP: 0-0Hz");
        let back = FilterState::from_history(&texts).unwrap();
        assert!(back.do_lp && !back.do_hp && back.do_notch && !back.do_bp);
        assert_eq!(back.notch, 50.0);
    }

    #[test]
    fn history_requires_marker() {
        assert!(FilterState::from_history(&["LP: 30Hz"]).is_none());
    }

    #[test]
    fn threshold_validated() {
        let cfg = ViewerConfig { threshold: 1.5, ..ViewerConfig::default() };
        assert!(cfg.validate().is_err());
        assert!(ViewerConfig::default().validate().is_ok());
    }
}
