//! Export layout: which signals and annotations an EDF+ file gets.
use anyhow::Result;
use ndarray::Array2;
use serde::Serialize;

use super::header::EdfHeader;
use crate::annotation::{Annotation, Annotations};
use crate::config::{FilterState, HISTORY_MARKER};
use crate::filter::{apply_filters, FilterProgress};
use crate::predict::PredictionStore;
use crate::recording::Recording;

/// Number of annotations in a filter history.
pub const HISTORY_LEN: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalSpec {
    pub label: String,
    pub sample_rate: f64,
    pub physical_min: f64,
    pub physical_max: f64,
    #[serde(skip)]
    pub samples: Vec<f32>,
}

impl SignalSpec {
    fn new(label: String, sample_rate: f64, (physical_min, physical_max): (f64, f64), samples: Vec<f32>) -> Self {
        Self { label, sample_rate, physical_min, physical_max, samples }
    }
}

/// Everything needed to write one EDF+ file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportPlan {
    pub header: EdfHeader,
    /// Recording channels first, then prediction channels.
    pub signals: Vec<SignalSpec>,
    pub annotations: Vec<Annotation>,
}

/// Lay out an export of `recording`.
///
/// With filtering on, every channel is filtered first; a canceled pass
/// returns `Ok(None)` and nothing is exported. Any filter history already at
/// the head of the annotations is dropped, and a fresh one is written when
/// filtering is on.
pub fn plan_export(
    recording: &Recording,
    filter: &FilterState,
    predictions: &PredictionStore,
    header: EdfHeader,
    progress: &mut dyn FilterProgress,
) -> Result<Option<ExportPlan>> {
    let fs = recording.fs();
    let data: Array2<f32> = if filter.enabled {
        match apply_filters(recording.data(), fs, filter, progress)?.into_data() {
            Some(d) => d,
            None => {
                log::info!("export aborted: filter pass canceled");
                return Ok(None);
            }
        }
    } else {
        recording.data().clone()
    };

    let mut signals: Vec<SignalSpec> = recording
        .labels()
        .iter()
        .zip(data.rows())
        .map(|(label, row)| {
            let samples = row.to_vec();
            SignalSpec::new(label.clone(), fs as f64, physical_range(&samples), samples)
        })
        .collect();

    if let Some(grid) = predictions.grid() {
        let rate = fs as f64 / predictions.pred_width() as f64;
        let range = match grid.n_classes() {
            Some(k) if k > 1 => (0.0, (k - 1) as f64),
            _ => (0.0, 1.0),
        };
        let series = grid.series();
        if grid.by_channel() {
            for (i, s) in series.into_iter().enumerate() {
                signals.push(SignalSpec::new(format!("PREDICTIONS_{i}"), rate, range, s));
            }
        } else {
            for s in series {
                signals.push(SignalSpec::new("PREDICTIONS".to_string(), rate, range, s));
            }
        }
    }

    let annotations = with_history(recording.annotations(), filter);
    log::debug!(
        "export plan: {} signals, {} annotations",
        signals.len(),
        annotations.len()
    );
    Ok(Some(ExportPlan { header, signals, annotations }))
}

/// Annotations to write: old filter history removed, new one prepended when
/// filtering is on.
pub fn with_history(annotations: &Annotations, filter: &FilterState) -> Vec<Annotation> {
    let mut out = annotations.clone();
    if out.iter().next().is_some_and(|a| a.text == HISTORY_MARKER) {
        log::warn!("replacing the filter history already stored in the recording");
        out.drain_front(HISTORY_LEN);
    }
    if filter.enabled {
        out.prepend(filter.history().into_iter().map(|t| Annotation::instant(0.0, t)).collect());
    }
    out.into()
}

/// `(min, max)` of `samples`, widened when flat so the range is never empty.
fn physical_range(samples: &[f32]) -> (f64, f64) {
    let (lo, hi) = samples
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if !lo.is_finite() || !hi.is_finite() {
        return (-1.0, 1.0);
    }
    let (lo, hi) = (lo as f64, hi as f64);
    if hi > lo {
        (lo, hi)
    } else {
        (lo - 1.0, hi + 1.0)
    }
}
