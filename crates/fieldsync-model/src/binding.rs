use core::fmt;

use serde::{Deserialize, Serialize};

use crate::CellRef;

/// Identifier of a sheet within the host document.
///
/// Sheet identity is owned by the document engine; the store treats ids as
/// opaque strings.
pub type SheetId = String;

/// Identifier of an externally managed record list.
pub type ListId = String;

/// Structural coordinates of one cell within the document.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Sheet the cell lives on.
    pub sheet_id: SheetId,
    /// Cell coordinates within the sheet.
    pub cell: CellRef,
}

impl Position {
    /// Create a new [`Position`].
    pub fn new(sheet_id: impl Into<SheetId>, row: u32, col: u32) -> Self {
        Self {
            sheet_id: sheet_id.into(),
            cell: CellRef::new(row, col),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}", self.sheet_id, self.cell)
    }
}

/// A cell's declared role: source of one field of one record-list slot.
///
/// `index_in_list` is a zero-based position into the list, not a record
/// identifier; identity is resolved lazily through the list's data source.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    /// The record list this cell feeds.
    pub list_id: ListId,
    /// Zero-based slot within the list.
    pub index_in_list: u32,
    /// Target field on the record's schema.
    pub field_name: String,
}

impl Binding {
    /// Create a new [`Binding`].
    pub fn new(list_id: impl Into<ListId>, index_in_list: u32, field_name: impl Into<String>) -> Self {
        Self {
            list_id: list_id.into(),
            index_in_list,
            field_name: field_name.into(),
        }
    }
}
