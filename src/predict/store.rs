//! Validated prediction tensors.
//!
//! A tensor is accepted in one of four layouts, always with the bin index on
//! the leading axis:
//!
//! | layout                    | shape         | binary | multi-class |
//! |---------------------------|---------------|--------|-------------|
//! | single-channel            | `[B]`         | yes    |             |
//! | per-channel               | `[B, C]`      | yes    |             |
//! | single-channel, classes   | `[B, K]`      |        | yes         |
//! | per-channel, classes      | `[B, C, K]`   |        | yes         |
//!
//! Binary tensors may also carry a length-2 class axis (`[B, 2]`,
//! `[B, C, 2]`, …); only the positive-class slice is kept.
use ndarray::{Array1, Array2, Array3, ArrayD, Axis, Ix1, Ix2, Ix3};

use super::error::PredictionError;
use super::model::{ChannelModel, Model};

/// One of the four accepted prediction layouts.
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionGrid {
    /// `[B]` positive-class scores.
    Binary(Array1<f32>),
    /// `[B, C]` positive-class scores per stored channel.
    BinaryByChannel(Array2<f32>),
    /// `[B, K]` class scores.
    MultiClass(Array2<f32>),
    /// `[B, C, K]` class scores per stored channel.
    MultiClassByChannel(Array3<f32>),
}

impl PredictionGrid {
    pub fn n_bins(&self) -> usize {
        match self {
            PredictionGrid::Binary(a) => a.len(),
            PredictionGrid::BinaryByChannel(a) | PredictionGrid::MultiClass(a) => a.nrows(),
            PredictionGrid::MultiClassByChannel(a) => a.shape()[0],
        }
    }

    pub fn by_channel(&self) -> bool {
        matches!(
            self,
            PredictionGrid::BinaryByChannel(_) | PredictionGrid::MultiClassByChannel(_)
        )
    }

    pub fn multi_class(&self) -> bool {
        matches!(self, PredictionGrid::MultiClass(_) | PredictionGrid::MultiClassByChannel(_))
    }

    /// Stored channel count (1 for single-channel layouts).
    pub fn n_stored_channels(&self) -> usize {
        match self {
            PredictionGrid::BinaryByChannel(a) => a.ncols(),
            PredictionGrid::MultiClassByChannel(a) => a.shape()[1],
            _ => 1,
        }
    }

    /// Class count for multi-class layouts.
    pub fn n_classes(&self) -> Option<usize> {
        match self {
            PredictionGrid::MultiClass(a) => Some(a.ncols()),
            PredictionGrid::MultiClassByChannel(a) => Some(a.shape()[2]),
            _ => None,
        }
    }

    /// One value series per stored channel, one value per bin.
    ///
    /// Binary layouts yield the scores; multi-class layouts yield the argmax
    /// class index.
    pub fn series(&self) -> Vec<Vec<f32>> {
        match self {
            PredictionGrid::Binary(a) => vec![a.to_vec()],
            PredictionGrid::BinaryByChannel(a) => a.columns().into_iter().map(|c| c.to_vec()).collect(),
            PredictionGrid::MultiClass(a) => {
                vec![a.rows().into_iter().map(|r| argmax(r.iter().copied()) as f32).collect()]
            }
            PredictionGrid::MultiClassByChannel(a) => (0..a.shape()[1])
                .map(|c| {
                    a.index_axis(Axis(1), c)
                        .rows()
                        .into_iter()
                        .map(|r| argmax(r.iter().copied()) as f32)
                        .collect()
                })
                .collect(),
        }
    }
}

/// Index of the first maximum; 0 for an empty sequence.
pub(crate) fn argmax(values: impl IntoIterator<Item = f32>) -> usize {
    let mut best = 0;
    let mut best_v = f32::NEG_INFINITY;
    for (i, v) in values.into_iter().enumerate() {
        if v > best_v {
            best = i;
            best_v = v;
        }
    }
    best
}

/// Holds the currently plotted predictions and the bin width in samples.
///
/// A failed validation leaves the store empty: `pred_by_chn()` and
/// `multi_class()` read false until the next successful load.
#[derive(Debug, Clone, Default)]
pub struct PredictionStore {
    grid: Option<PredictionGrid>,
    pred_width: usize,
}

impl PredictionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `tensor` against a recording of `n_channels` channels,
    /// `fs` Hz and `max_time` seconds, and store it on success.
    pub fn set_predictions(
        &mut self,
        tensor: ArrayD<f32>,
        max_time: usize,
        fs: usize,
        n_channels: usize,
        binary: bool,
    ) -> Result<(), PredictionError> {
        self.clear();
        let shape = tensor.shape().to_vec();
        let grid = if binary {
            binary_grid(tensor, n_channels)?
        } else {
            multi_class_grid(tensor, n_channels)?
        };

        let total_samples = fs * max_time;
        let bins = grid.n_bins();
        if bins == 0 || total_samples % bins != 0 {
            log::warn!("rejecting predictions of shape {shape:?}: {bins} bins for {total_samples} samples");
            return Err(PredictionError::Length { bins, total_samples });
        }

        self.pred_width = total_samples / bins;
        log::debug!(
            "predictions accepted: shape {shape:?}, {bins} bins of {} samples, by_channel={}, multi_class={}",
            self.pred_width,
            grid.by_channel(),
            grid.multi_class()
        );
        self.grid = Some(grid);
        Ok(())
    }

    /// Run `model` on `data` (`[T, C, F]`) and validate its class
    /// probabilities like a loaded tensor.
    pub fn set_from_model<M: Model + ?Sized>(
        &mut self,
        model: &M,
        data: &Array3<f32>,
        max_time: usize,
        fs: usize,
        n_channels: usize,
        binary: bool,
    ) -> Result<(), PredictionError> {
        match model.predict_proba(data) {
            Ok(proba) => self.set_predictions(proba.into_dyn(), max_time, fs, n_channels, binary),
            Err(e) => {
                self.clear();
                Err(PredictionError::ModelInvocation(format!("{e:#}")))
            }
        }
    }

    /// Like [`set_from_model`](Self::set_from_model) but keeps the
    /// per-channel probabilities (`[T, C, 2]`), giving binary per-channel
    /// predictions.
    pub fn set_from_channel_model<M: ChannelModel + ?Sized>(
        &mut self,
        model: &M,
        data: &Array3<f32>,
        max_time: usize,
        fs: usize,
        n_channels: usize,
    ) -> Result<(), PredictionError> {
        match model.predict_channel_proba(data) {
            Ok(proba) => self.set_predictions(proba.into_dyn(), max_time, fs, n_channels, true),
            Err(e) => {
                self.clear();
                Err(PredictionError::ModelInvocation(format!("{e:#}")))
            }
        }
    }

    pub fn clear(&mut self) {
        self.grid = None;
        self.pred_width = 0;
    }

    pub fn is_loaded(&self) -> bool {
        self.grid.is_some()
    }

    pub fn grid(&self) -> Option<&PredictionGrid> {
        self.grid.as_ref()
    }

    /// Samples per bin; 0 when nothing is loaded.
    pub fn pred_width(&self) -> usize {
        self.pred_width
    }

    pub fn pred_by_chn(&self) -> bool {
        self.grid.as_ref().is_some_and(PredictionGrid::by_channel)
    }

    pub fn multi_class(&self) -> bool {
        self.grid.as_ref().is_some_and(PredictionGrid::multi_class)
    }
}

fn binary_grid(tensor: ArrayD<f32>, n_channels: usize) -> Result<PredictionGrid, PredictionError> {
    let shape = tensor.shape().to_vec();
    let shape_err = || PredictionError::Shape { shape: shape.clone() };
    let mut t = tensor;

    if t.ndim() == 3 {
        if let Some(ax) = [2, 1, 0].into_iter().find(|&ax| t.shape()[ax] == 2) {
            t = t.index_axis_move(Axis(ax), 1);
        }
    }
    // The leading axis is always bins, even when there is only one.
    let mut ax = 1;
    while ax < t.ndim() {
        if t.shape()[ax] == 1 {
            t = t.index_axis_move(Axis(ax), 0);
        } else {
            ax += 1;
        }
    }

    let dims = t.shape().to_vec();
    match dims.as_slice() {
        [_] => t.into_dimensionality::<Ix1>().map(PredictionGrid::Binary).map_err(|_| shape_err()),
        [_, 2] => t
            .index_axis_move(Axis(1), 1)
            .into_dimensionality::<Ix1>()
            .map(PredictionGrid::Binary)
            .map_err(|_| shape_err()),
        [_, c] if *c == n_channels => t
            .into_dimensionality::<Ix2>()
            .map(PredictionGrid::BinaryByChannel)
            .map_err(|_| shape_err()),
        _ => Err(shape_err()),
    }
}

fn multi_class_grid(tensor: ArrayD<f32>, n_channels: usize) -> Result<PredictionGrid, PredictionError> {
    let shape = tensor.shape().to_vec();
    let shape_err = || PredictionError::Shape { shape: shape.clone() };
    match shape.len() {
        2 if shape[1] > 0 => Ok(PredictionGrid::MultiClass(
            tensor.into_dimensionality::<Ix2>().map_err(|_| shape_err())?,
        )),
        3 if shape[1] != n_channels => {
            Err(PredictionError::ChannelMismatch { expected: n_channels, found: shape[1] })
        }
        3 if shape[2] > 0 => Ok(PredictionGrid::MultiClassByChannel(
            tensor.into_dimensionality::<Ix3>().map_err(|_| shape_err())?,
        )),
        _ => Err(shape_err()),
    }
}
