use serde::{Deserialize, Serialize};
use thiserror::Error;

use fieldsync_model::{EvaluatedCell, FieldSchema, ListId, Position, SheetId};

/// Identity of one record in external storage.
pub type RecordId = i64;

/// Fault raised by an external collaborator (data source or record storage).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("record list backend error: {0}")]
    Backend(String),
}

/// Read-only description of one externally managed record list.
///
/// Owned by the host application; the engine only consults it to decide which
/// lists participate in a reconciliation run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ListDescriptor {
    pub id: ListId,
    /// Schema name of the records in the list (resolved against the
    /// record-type registry once per run).
    pub record_type: String,
    /// Columns the list displays in the grid.
    #[serde(default)]
    pub columns: Vec<String>,
    /// Host-defined record filter, passed through untouched.
    #[serde(default)]
    pub domain: serde_json::Value,
    /// Host-defined evaluation context, passed through untouched.
    #[serde(default)]
    pub context: serde_json::Value,
    /// Sheet the list is anchored to. Reconciliation only visits lists
    /// anchored to the active sheet.
    pub sheet_id: SheetId,
    pub name: String,
}

impl ListDescriptor {
    pub fn new(
        id: impl Into<ListId>,
        record_type: impl Into<String>,
        sheet_id: impl Into<SheetId>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            record_type: record_type.into(),
            columns: Vec::new(),
            domain: serde_json::Value::Null,
            context: serde_json::Value::Null,
            sheet_id: sheet_id.into(),
            name: name.into(),
        }
    }
}

/// Evaluated-cell access provided by the document engine.
pub trait CellResolver {
    /// The cell's current evaluated value and display text. Unset cells
    /// resolve to an empty value.
    fn evaluated_cell(&self, position: &Position) -> EvaluatedCell;
}

/// One record list's data source: a lazily materialized window over the
/// ordered records, owned by the host.
///
/// `load`/`reload` are the engine's only suspension points; they block until
/// the window is materialized. Callers impose their own timeout at the save
/// boundary.
pub trait RecordListSource {
    /// True once the window has been materialized at least once.
    fn is_ready(&self) -> bool;

    /// Materialize the window.
    fn load(&mut self) -> Result<(), SourceError>;

    /// Re-materialize the window after its bounds changed.
    fn reload(&mut self) -> Result<(), SourceError>;

    /// Number of record slots currently materialized.
    fn max_position(&self) -> u32;

    /// Grow the window so at least `new_max` slots are materialized on the
    /// next (re)load.
    fn increase_max_position(&mut self, new_max: u32);

    /// Identity of the record at `index`, if the slot holds one.
    fn id_from_position(&self, index: u32) -> Option<RecordId>;

    /// Field schema of the list's record type.
    fn fields(&self) -> &FieldSchema;
}

/// Catalogue of record lists known to the host document.
pub trait ListProvider {
    /// Descriptors of every list in the document.
    fn descriptors(&self) -> Vec<ListDescriptor>;

    /// The data source backing `list_id`, if one is available.
    fn source(&mut self, list_id: &str) -> Option<&mut dyn RecordListSource>;
}
