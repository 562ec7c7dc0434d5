//! EDF boundary: the fixed main header and the export layout.

pub mod export;
pub mod header;

pub use export::{plan_export, with_history, ExportPlan, SignalSpec, HISTORY_LEN};
pub use header::{EdfHeader, HeaderFields, PatientFields, RecordingFields, HEADER_LEN};
