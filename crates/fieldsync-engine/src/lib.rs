//! `fieldsync-engine` reconciles live cell bindings into record updates.
//!
//! The engine is read-only over a [`fieldsync_model::BindingStore`]: given
//! the current document state and the external record-list data sources, it
//! resolves every binding of the active sheet to a record identity, validates
//! cell values against field kinds, detects write conflicts, and emits an
//! idempotent batch of per-record update operations.
//!
//! External collaborators plug in through small traits ([`CellResolver`],
//! [`RecordListSource`], [`ListProvider`], [`UpdateSink`]); the engine never
//! evaluates formulas, fetches records, or persists anything itself.

mod cast;
mod reconcile;
mod save;
mod settings;
mod sources;

pub use cast::{cast_cell_value, FieldValue};
pub use reconcile::{
    extrapolate_binding, record_id_at, ReconcileResult, Reconciler, RecordUpdate, UpdateBatch,
};
pub use save::{save_active_sheet, SaveError, SaveReport, UpdateSink};
pub use settings::ReconcileSettings;
pub use sources::{
    CellResolver, ListDescriptor, ListProvider, RecordId, RecordListSource, SourceError,
};
