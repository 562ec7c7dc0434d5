//! Viewer session: navigation state plus frame composition.
//!
//! A [`Session`] owns the recording, the filter settings, the prediction
//! store and the window state. Every navigation call returns a
//! [`RenderFrame`] describing what a front end should draw: clipped traces,
//! prediction overlays, axis ticks and annotation labels. Frames depend only
//! on `(count, window_size, y_lim, filter, threshold)` and the loaded data.
use anyhow::{bail, Result};
use ndarray::{Array2, Array3, ArrayD};
use serde::Serialize;

use crate::annotation::{check_annotations, label_positions, Annotation, AnnotationError, AnnotationLabel};
use crate::config::{FilterState, ViewerConfig, WindowSize};
use crate::filter::{apply_filters, FilterBank, NoProgress};
use crate::predict::{
    ChannelModel, ChannelRow, Model, Palette, PredictionError, PredictionStore, Rgba, BINARY_COLOR,
};
use crate::recording::Recording;
use crate::stats::{get_power, get_stats, BandPower, FrequencyBands, SignalStats};

/// Default `[unfiltered, filtered]` channel spacing.
pub const DEFAULT_Y_LIM: [f64; 2] = [150.0, 100.0];
const Y_LIM_STEP: [f64; 2] = [15.0, 10.0];
const Y_LIM_MIN: f64 = 50.0;
const Y_LIM_MAX: f64 = 250.0;

/// Display clip, in standard deviations of the window.
const CLIP_RAW: f32 = 5.0;
const CLIP_FILTERED: f32 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

/// Mutable navigation state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowState {
    /// Window start in whole seconds.
    pub count: usize,
    pub window_size: WindowSize,
    /// Channel spacing `[unfiltered, filtered]`.
    pub y_lim: [f64; 2],
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trace {
    pub label: String,
    /// Baseline the samples are drawn around.
    pub offset: f64,
    pub samples: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Overlay {
    /// Full-height shaded span `[x0, x1)` in samples from the window start.
    Region { x0: usize, x1: usize, color: Rgba },
    /// Rectangle over one channel's band.
    ChannelBand {
        channel: usize,
        x: usize,
        y: f64,
        width: usize,
        height: f64,
        color: Rgba,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tick {
    pub pos: f64,
    pub label: String,
}

/// Everything needed to draw one window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderFrame {
    pub count: usize,
    pub window_size: usize,
    pub fs: usize,
    pub time_label: String,
    pub filtered: bool,
    /// Channel spacing in effect for this frame.
    pub y_lim: f64,
    pub y_range: (f64, f64),
    pub traces: Vec<Trace>,
    pub overlays: Vec<Overlay>,
    pub x_ticks: Vec<Tick>,
    pub y_ticks: Vec<Tick>,
    pub annotations: Vec<AnnotationLabel>,
}

pub struct Session {
    recording: Recording,
    filter: FilterState,
    predictions: PredictionStore,
    palette: Palette,
    state: WindowState,
    bands: FrequencyBands,
}

impl Session {
    /// Open a session on `recording` with the settings in `cfg`.
    ///
    /// A filter history at the head of the recording's annotations takes
    /// precedence over `cfg.filter`. An initial location that would put the
    /// window past the end is ignored.
    pub fn new(recording: Recording, cfg: &ViewerConfig) -> Result<Self> {
        cfg.validate()?;
        let window_size = cfg.window;
        if window_size.seconds() > recording.max_time() {
            bail!(
                "window of {window_size} is longer than the recording ({} s)",
                recording.max_time()
            );
        }

        let texts: Vec<&str> = recording.annotations().iter().take(5).map(|a| a.text.as_str()).collect();
        let filter = match FilterState::from_history(&texts) {
            Some(f) => {
                log::info!("restoring filter settings from recording history");
                f
            }
            None => cfg.filter_state(),
        };

        let count = if cfg.location + window_size.seconds() <= recording.max_time() {
            cfg.location
        } else {
            log::warn!("initial location {} s is past the end; starting at 0", cfg.location);
            0
        };

        Ok(Self {
            recording,
            filter,
            predictions: PredictionStore::new(),
            palette: Palette::new(),
            state: WindowState { count, window_size, y_lim: DEFAULT_Y_LIM, threshold: cfg.threshold },
            bands: FrequencyBands::default(),
        })
    }

    pub fn recording(&self) -> &Recording {
        &self.recording
    }

    pub fn state(&self) -> &WindowState {
        &self.state
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn set_filter(&mut self, filter: FilterState) {
        self.filter = filter;
    }

    pub fn predictions(&self) -> &PredictionStore {
        &self.predictions
    }

    pub fn bands_mut(&mut self) -> &mut FrequencyBands {
        &mut self.bands
    }

    fn last_start(&self) -> usize {
        self.recording.max_time().saturating_sub(self.state.window_size.seconds())
    }

    // ── Navigation ───────────────────────────────────────────────────────────

    /// Shift the window by `seconds` and render.
    ///
    /// A move that would leave `[0, max_time - window_size]` leaves `count`
    /// unchanged.
    pub fn move_plot(&mut self, direction: Direction, seconds: usize) -> Result<RenderFrame> {
        let ws = self.state.window_size.seconds();
        let fs = self.recording.fs();
        match direction {
            Direction::Left if self.state.count >= seconds => self.state.count -= seconds,
            Direction::Right
                if (self.state.count + seconds + ws) * fs <= self.recording.n_samples() =>
            {
                self.state.count += seconds
            }
            _ => log::debug!("move {direction:?} by {seconds} s ignored at count {}", self.state.count),
        }
        self.render()
    }

    /// Put the window start at `seconds`, clamped to the last full window.
    pub fn jump_to(&mut self, seconds: usize) -> Result<RenderFrame> {
        self.state.count = seconds.min(self.last_start());
        self.render()
    }

    /// Jump to the whole-second onset of annotation `index`.
    pub fn jump_to_annotation(&mut self, index: usize) -> Result<RenderFrame> {
        let anns = self.recording.annotations();
        let Some(ann) = anns.as_slice().get(index) else {
            return Err(AnnotationError::NoSuchIndex { index, len: anns.len() }.into());
        };
        let second = ann.second().max(0) as usize;
        self.jump_to(second)
    }

    pub fn set_window_size(&mut self, window_size: WindowSize) -> Result<RenderFrame> {
        if window_size.seconds() > self.recording.max_time() {
            bail!(
                "window of {window_size} is longer than the recording ({} s)",
                self.recording.max_time()
            );
        }
        self.state.window_size = window_size;
        self.state.count = self.state.count.min(self.last_start());
        self.render()
    }

    /// Tighter channel spacing (larger apparent amplitude).
    pub fn inc_amplitude(&mut self) -> Result<RenderFrame> {
        if self.state.y_lim[0] > Y_LIM_MIN {
            self.state.y_lim[0] -= Y_LIM_STEP[0];
            self.state.y_lim[1] -= Y_LIM_STEP[1];
        }
        self.render()
    }

    /// Wider channel spacing (smaller apparent amplitude).
    pub fn dec_amplitude(&mut self) -> Result<RenderFrame> {
        if self.state.y_lim[0] < Y_LIM_MAX {
            self.state.y_lim[0] += Y_LIM_STEP[0];
            self.state.y_lim[1] += Y_LIM_STEP[1];
        }
        self.render()
    }

    pub fn set_threshold(&mut self, threshold: f64) -> Result<RenderFrame> {
        if !(0.0..=1.0).contains(&threshold) {
            bail!("prediction threshold must be between 0 and 1 (got {threshold})");
        }
        self.state.threshold = threshold;
        self.render()
    }

    // ── Predictions ──────────────────────────────────────────────────────────

    /// Validate and install a prediction tensor.
    ///
    /// On rejection the previously installed predictions stay in place.
    pub fn load_predictions(&mut self, tensor: ArrayD<f32>, binary: bool) -> Result<(), PredictionError> {
        let mut fresh = PredictionStore::new();
        fresh.set_predictions(
            tensor,
            self.recording.max_time(),
            self.recording.fs(),
            self.recording.n_channels(),
            binary,
        )?;
        self.predictions = fresh;
        Ok(())
    }

    /// Run `model` on `features` (`[T, C, F]`) and install its predictions.
    pub fn predict_with<M: Model + ?Sized>(
        &mut self,
        model: &M,
        features: &Array3<f32>,
        binary: bool,
    ) -> Result<(), PredictionError> {
        let mut fresh = PredictionStore::new();
        fresh.set_from_model(
            model,
            features,
            self.recording.max_time(),
            self.recording.fs(),
            self.recording.n_channels(),
            binary,
        )?;
        self.predictions = fresh;
        Ok(())
    }

    /// Per-channel variant of [`predict_with`](Self::predict_with).
    pub fn predict_channels_with<M: ChannelModel + ?Sized>(
        &mut self,
        model: &M,
        features: &Array3<f32>,
    ) -> Result<(), PredictionError> {
        let mut fresh = PredictionStore::new();
        fresh.set_from_channel_model(
            model,
            features,
            self.recording.max_time(),
            self.recording.fs(),
            self.recording.n_channels(),
        )?;
        self.predictions = fresh;
        Ok(())
    }

    pub fn clear_predictions(&mut self) {
        self.predictions.clear();
    }

    // ── Annotations ──────────────────────────────────────────────────────────

    pub fn add_annotation(&mut self, ann: Annotation) -> Result<usize, AnnotationError> {
        let max_time = self.recording.max_time();
        self.recording.annotations_mut().insert(ann, max_time)
    }

    pub fn update_annotation(&mut self, index: usize, ann: Annotation) -> Result<(), AnnotationError> {
        let max_time = self.recording.max_time();
        self.recording.annotations_mut().update(index, ann, max_time)
    }

    pub fn remove_annotation(&mut self, index: usize) -> Result<Annotation, AnnotationError> {
        self.recording.annotations_mut().remove(index)
    }

    // ── Statistics ───────────────────────────────────────────────────────────

    /// Mean, variance and line length of `channel` over samples
    /// `[start, end)`, on the filtered signal when filtering is on.
    pub fn get_stats(&self, channel: usize, start: usize, end: usize) -> Result<SignalStats> {
        let row = self.channel_row(channel)?;
        if self.filter.enabled {
            let bank = FilterBank::design(&self.filter, self.recording.fs())?;
            get_stats(&bank.apply_channel(&row), start, end)
        } else {
            get_stats(&row, start, end)
        }
    }

    /// Band powers of the unfiltered `channel` over samples `[start, end)`,
    /// with bands narrowed to the active filter passband.
    pub fn get_power(&self, channel: usize, start: usize, end: usize) -> Result<Vec<BandPower>> {
        let row = self.channel_row(channel)?;
        let (hp, lp) = if self.filter.enabled {
            (
                if self.filter.do_hp { self.filter.hp } else { 0.0 },
                if self.filter.do_lp { self.filter.lp } else { 0.0 },
            )
        } else {
            (0.0, 0.0)
        };
        get_power(&row, start, end, hp, lp, self.recording.fs() as f64, &self.bands)
    }

    fn channel_row(&self, channel: usize) -> Result<Vec<f32>> {
        if channel >= self.recording.n_channels() {
            bail!("no channel {channel} ({} channels)", self.recording.n_channels());
        }
        Ok(self.recording.data().row(channel).to_vec())
    }

    // ── Composition ──────────────────────────────────────────────────────────

    /// Compose the frame for the current state.
    pub fn render(&mut self) -> Result<RenderFrame> {
        let fs = self.recording.fs();
        let ws = self.state.window_size.seconds();
        let count = self.state.count;
        let start = count * fs;
        let end = (count + ws) * fs;
        let n_ch = self.recording.n_channels();

        let raw = self.recording.window(start, end);
        let filtered = self.filter.enabled;
        let mut data = if filtered {
            apply_filters(&raw, fs, &self.filter, &mut NoProgress)?
                .into_data()
                .unwrap_or(raw)
        } else {
            raw
        };
        clip_to_std(&mut data, if filtered { CLIP_FILTERED } else { CLIP_RAW });

        let y_lim = if filtered { self.state.y_lim[1] } else { self.state.y_lim[0] };
        let traces = self
            .recording
            .labels()
            .iter()
            .zip(data.rows())
            .enumerate()
            .map(|(i, (label, row))| Trace {
                label: label.clone(),
                offset: (i + 1) as f64 * y_lim,
                samples: row.to_vec(),
            })
            .collect();

        let overlays = self.overlays(y_lim);

        let step = self.state.window_size.tick_step();
        let x_ticks = (0..=ws / step)
            .map(|i| Tick { pos: (i * step * fs) as f64, label: (count + i * step).to_string() })
            .collect();
        let y_ticks = std::iter::once(Tick { pos: 0.0, label: String::new() })
            .chain(self.recording.labels().iter().enumerate().map(|(i, l)| Tick {
                pos: (i + 1) as f64 * y_lim,
                label: l.clone(),
            }))
            .collect();

        let ann_window = check_annotations(count, ws, self.recording.annotations().as_slice());
        let annotations = label_positions(&ann_window, count, fs, y_lim);

        Ok(RenderFrame {
            count,
            window_size: ws,
            fs,
            time_label: get_time(count),
            filtered,
            y_lim,
            y_range: (-y_lim, (n_ch + 1) as f64 * y_lim),
            traces,
            overlays,
            x_ticks,
            y_ticks,
            annotations,
        })
    }

    fn overlays(&mut self, y_lim: f64) -> Vec<Overlay> {
        let fs = self.recording.fs();
        let n_ch = self.recording.n_channels();
        let origin = self.state.count * fs;
        let win = self.predictions.compute_starts_ends_chns(
            self.state.threshold,
            self.state.count,
            self.state.window_size.seconds(),
            fs,
            n_ch,
        );

        let mut out = Vec::new();
        let band = |channel: usize, s: usize, e: usize, color: Rgba| Overlay::ChannelBand {
            channel,
            x: s - origin,
            y: (channel as f64 + 0.5) * y_lim,
            width: e - s,
            height: y_lim,
            color,
        };
        for (k, (s, e)) in win.intervals().enumerate() {
            match win.chns.get(k) {
                Some(ChannelRow::Active(flags)) => {
                    for (i, _) in flags.iter().enumerate().filter(|&(_, &on)| on) {
                        out.push(band(i, s, e, BINARY_COLOR));
                    }
                }
                Some(ChannelRow::Classes(classes)) => {
                    for (i, &class) in classes.iter().enumerate() {
                        out.push(band(i, s, e, self.palette.get_color(class)));
                    }
                }
                None => {
                    let color = match win.class_vals.get(k) {
                        Some(&class) => self.palette.get_color(class),
                        None => BINARY_COLOR,
                    };
                    out.push(Overlay::Region { x0: s - origin, x1: e - origin, color });
                }
            }
        }
        out
    }
}

/// Clip every sample to `±k·σ`, σ being the population standard deviation
/// of the whole buffer.
fn clip_to_std(data: &mut Array2<f32>, k: f32) {
    let std = data.std(0.0);
    if !std.is_finite() || std == 0.0 {
        return;
    }
    let bound = k * std;
    data.mapv_inplace(|v| v.clamp(-bound, bound));
}

/// `(hours, minutes, seconds)` for a whole-second offset.
pub fn convert_from_count(count: usize) -> (usize, usize, usize) {
    (count / 3600, count % 3600 / 60, count % 60)
}

/// `h:mm:ss`, hours unpadded.
pub fn get_time(count: usize) -> String {
    let (h, m, s) = convert_from_count(count);
    format!("{h}:{m:02}:{s:02}")
}
