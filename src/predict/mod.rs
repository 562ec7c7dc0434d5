//! Prediction overlays.
//!
//! - [`store`]: shape validation of prediction tensors into one of four
//!   layouts and the derived bin width.
//! - [`window`]: decoding the bins inside a viewing window into sample
//!   intervals, per-channel rows and class values.
//! - [`palette`]: class colours.
//! - [`model`]: classifiers that produce prediction tensors from features.
//! - [`error`]: the tagged rejection reasons.

pub mod error;
pub mod model;
pub mod palette;
pub mod store;
pub mod window;

pub use error::PredictionError;
pub use model::{
    ChannelLogisticModel, ChannelModel, Classifier, Dataset, LogisticModel, LogisticRegression,
    LogisticRegressionChannel, Model,
};
pub use palette::{Palette, Rgba, BINARY_COLOR, CLASS_COLORS};
pub use store::{PredictionGrid, PredictionStore};
pub use window::{remap_channels, ChannelRow, WindowPredictions};
