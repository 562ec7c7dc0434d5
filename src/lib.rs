//! # eegview: prediction overlays and windowed rendering for long EEG
//!
//! `eegview` is the data core behind an EEG review tool: it holds a
//! multi-channel recording, validates classifier output against it, and
//! turns the current viewing window into a drawable frame.
//!
//! ## Overview
//!
//! ```text
//! recording.safetensors ─┐
//!                        ├─ io::load_recording()      [C, T] @ fs, labels
//! preds.safetensors ─────┤
//!                        ├─ io::load_predictions()    tensor of rank 1–3
//!                        │
//!                        ▼
//!                   compositor::Session
//!                        ├─ PredictionStore           4 layouts, pred_width
//!                        ├─ FilterBank                notch → LP → HP → BP
//!                        ├─ move / jump / amplitude   WindowState
//!                        └─ render()  ──────────────→ RenderFrame
//!                                                     (traces, overlays,
//!                                                      ticks, annotations)
//!
//! edf::plan_export()  ──────────────────────────────→ ExportPlan
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use eegview::{Session, ViewerConfig, Direction};
//! use eegview::io::{load_predictions, load_recording};
//! use std::path::Path;
//!
//! let rec = load_recording(Path::new("data/rec.safetensors")).unwrap();
//! let mut session = Session::new(rec, &ViewerConfig::default()).unwrap();
//!
//! let preds = load_predictions(Path::new("data/preds.safetensors")).unwrap();
//! session.load_predictions(preds, true).unwrap();
//!
//! let frame = session.move_plot(Direction::Right, 10).unwrap();
//! println!("{} overlays at {}", frame.overlays.len(), frame.time_label);
//! ```
//!
//! ## Prediction layouts
//!
//! | tensor shape      | mode        | layout                 |
//! |-------------------|-------------|------------------------|
//! | `[n]`, `[n, 2]`   | binary      | one probability per bin |
//! | `[n, C]`          | binary      | per-channel probability |
//! | `[n, K]`          | multi-class | class scores per bin   |
//! | `[n, C, K]`       | multi-class | class scores per channel |
//!
//! `n` must divide `max_time · fs`; each bin covers
//! `pred_width = max_time · fs / n` samples.

pub mod annotation;
pub mod compositor;
pub mod config;
pub mod edf;
pub mod filter;
pub mod io;
pub mod predict;
pub mod recording;
pub mod resample;
pub mod stats;

// ── Crate-root re-exports ─────────────────────────────────────────────────

// annotation
pub use annotation::{
    check_annotations, label_positions, Annotation, AnnotationError, AnnotationLabel,
    AnnotationWindow, Annotations,
};

// compositor
pub use compositor::{
    convert_from_count, get_time, Direction, Overlay, RenderFrame, Session, Tick, Trace, WindowState,
};

// config
pub use config::{FilterState, ViewerConfig, WindowSize};

// edf
pub use edf::{plan_export, EdfHeader, ExportPlan, SignalSpec};

// filter
pub use filter::{apply_filters, FilterBank, FilterProgress, Filtered, NoProgress};

// predict
pub use predict::{
    ChannelRow, Palette, PredictionError, PredictionGrid, PredictionStore, WindowPredictions,
};

// recording
pub use recording::Recording;

// stats
pub use stats::{get_power, get_stats, BandPower, FrequencyBands, SignalStats};
