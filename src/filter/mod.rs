//! IIR filter design and application.
//!
//! - [`design`]: Butterworth (order 4) low/high/band-pass and Q=20 notch,
//!   emitted as second-order sections.
//! - [`apply`]: zero-phase forward-backward section filtering with odd-reflect
//!   padding and steady-state initial conditions.
//! - [`bank`]: the ordered notch → LP → HP → BP bank with progress reporting
//!   and cooperative cancellation.

pub mod apply;
pub mod bank;
pub mod design;

pub use apply::{filtfilt, filtfilt_channels, sosfilt, sosfilt_zi};
pub use bank::{apply_filters, FilterBank, FilterProgress, Filtered, NoProgress, STAGES_PER_CHANNEL};
pub use design::{butter_bandpass, butter_highpass, butter_lowpass, iir_notch, sos_gain, Sos};
