use std::collections::BTreeMap;

use thiserror::Error;

use crate::reconcile::{Reconciler, RecordUpdate};
use crate::sources::{CellResolver, ListProvider, SourceError};

/// Record-storage collaborator the save driver forwards batches to.
pub trait UpdateSink {
    /// Atomically write a batch of record updates to one record collection.
    fn write(&mut self, record_type: &str, updates: &[RecordUpdate]) -> Result<(), SourceError>;
}

/// Why a save attempt did not go through.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SaveError {
    /// Conflicts or list failures were reported; nothing was forwarded.
    #[error("save blocked:\n{}", messages.join("\n"))]
    Blocked { messages: Vec<String> },
    /// Record storage rejected a batch.
    #[error(transparent)]
    Sink(#[from] SourceError),
}

/// Summary of a successful save.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SaveReport {
    pub records_written: usize,
    pub collections_written: usize,
}

/// Reconcile the active sheet and forward the result to record storage.
///
/// All-or-nothing per attempt: any blocking message aborts the save before a
/// single write. Otherwise updates are grouped per target record collection
/// and written once per collection.
pub fn save_active_sheet(
    reconciler: &Reconciler<'_>,
    active_sheet_id: &str,
    document: &impl CellResolver,
    lists: &mut impl ListProvider,
    sink: &mut impl UpdateSink,
) -> Result<SaveReport, SaveError> {
    let result = reconciler.compute_update_commands(active_sheet_id, document, lists);
    if result.is_blocked() {
        return Err(SaveError::Blocked {
            messages: result.errors,
        });
    }

    let mut per_collection: BTreeMap<String, Vec<RecordUpdate>> = BTreeMap::new();
    for batch in result.batches {
        per_collection
            .entry(batch.record_type)
            .or_default()
            .extend(batch.updates);
    }

    let mut report = SaveReport::default();
    for (record_type, updates) in per_collection {
        sink.write(&record_type, &updates)?;
        report.collections_written += 1;
        report.records_written += updates.len();
    }
    Ok(report)
}
