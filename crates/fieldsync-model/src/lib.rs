//! `fieldsync-model` defines the data model for cell→record-field bindings.
//!
//! The crate is intentionally self-contained so it can be reused by:
//! - the reconciliation engine (`fieldsync-engine`)
//! - the host document's persistence layer via `serde` (JSON-safe schema)
//! - side-panel / picker UI layers that only need read access
//!
//! It owns the sparse position-indexed [`BindingStore`], the structural-change
//! remapping that keeps bindings valid across document edits, and the closed
//! [`RecordTypeRegistry`] of record types supported for synchronization.

mod address;
mod binding;
mod document;
mod fields;
mod registry;
mod store;
mod structural;
mod value;

pub use address::{A1ParseError, CellKey, CellRef, Range, GRID_MAX_COLS, GRID_MAX_ROWS};
pub use binding::{Binding, ListId, Position, SheetId};
pub use document::{DocumentData, DocumentError, SheetData, SCHEMA_VERSION};
pub use fields::{FieldDescriptor, FieldKind, FieldSchema};
pub use registry::{RecordTypeRegistry, RecordTypeSpec};
pub use store::{BindingChange, BindingStore, CommandOutcome, CommandRejection};
pub use structural::{CellEffect, StructuralChange};
pub use value::{CellValue, EvaluatedCell};
