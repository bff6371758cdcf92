use serde::{Deserialize, Serialize};

/// Behavior knobs for a reconciliation run.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileSettings {
    /// When set, per-cell type mismatches are appended to the result's
    /// warning list instead of only being logged. Warnings never block a
    /// save.
    #[serde(default)]
    pub report_validation_skips: bool,
}
