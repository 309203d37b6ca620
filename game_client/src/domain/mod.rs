// Client-side prediction model: input capture, prediction history,
// reconciliation and the mirror of remote entities.

pub mod history;
pub mod input;
pub mod interpolation;
pub mod mirror;
pub mod prediction;
pub mod reconcile;

pub use history::{HistoryEntry, PredictionHistory};
pub use input::{InputCapture, RawInput};
pub use interpolation::InterpolationBuffer;
pub use mirror::{ApplyReport, ClientWorld};
pub use prediction::{LocalActions, PredictionEngine};
pub use reconcile::{Authoritative, Correction, ReconcileConfig, reconcile};
