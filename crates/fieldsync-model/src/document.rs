use std::collections::BTreeMap;

use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{A1ParseError, Binding, BindingStore, CellRef, Position, SheetId};

/// Current serialization schema version, embedded in persisted payloads.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Persisted shape of one sheet: its id plus an optional sparse table of
/// A1 address → binding.
///
/// The table is keyed by address strings so the payload stays readable and
/// diff-friendly inside the host document file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SheetData {
    pub id: SheetId,

    /// Sparse binding table. Sheets without bindings serialize no table at
    /// all.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub bindings: BTreeMap<String, Binding>,
}

impl SheetData {
    pub fn new(id: impl Into<SheetId>) -> Self {
        Self {
            id: id.into(),
            bindings: BTreeMap::new(),
        }
    }
}

/// Persisted document payload the store reads and writes its state through.
///
/// The host document owns the full file; this is the slice of it the binding
/// layer contributes.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DocumentData {
    /// Serialization schema version.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Sheets of the document, in tab order.
    #[serde(default)]
    pub sheets: Vec<SheetData>,
}

impl DocumentData {
    pub fn new(sheets: Vec<SheetData>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            sheets,
        }
    }
}

impl<'de> Deserialize<'de> for DocumentData {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Helper {
            #[serde(default = "default_schema_version")]
            schema_version: u32,
            #[serde(default)]
            sheets: Vec<SheetData>,
        }

        let helper = Helper::deserialize(deserializer)?;
        if helper.schema_version > SCHEMA_VERSION {
            return Err(D::Error::custom(format!(
                "unsupported schema_version {} (max supported: {})",
                helper.schema_version, SCHEMA_VERSION
            )));
        }

        Ok(DocumentData {
            schema_version: helper.schema_version,
            sheets: helper.sheets,
        })
    }
}

/// Errors raised while rehydrating a store from persisted document data.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("invalid cell address {address:?} on sheet {sheet_id}: {source}")]
    InvalidAddress {
        sheet_id: SheetId,
        address: String,
        source: A1ParseError,
    },
}

impl BindingStore {
    /// Write every sheet's bindings into `data` as a sparse A1 table.
    ///
    /// Sheets with zero bindings are left untouched (no empty tables);
    /// sheets present in the store but missing from `data` are skipped.
    pub fn export(&self, data: &mut DocumentData) {
        for sheet in &mut data.sheets {
            let mut table = BTreeMap::new();
            for (position, binding) in self.all_bindings() {
                if position.sheet_id == sheet.id {
                    table.insert(position.cell.to_a1(), binding.clone());
                }
            }
            if !table.is_empty() {
                sheet.bindings = table;
            }
        }
    }

    /// Reinsert every persisted `(address, binding)` pair from `data`.
    pub fn import(&mut self, data: &DocumentData) -> Result<(), DocumentError> {
        for sheet in &data.sheets {
            for (address, binding) in &sheet.bindings {
                let cell = CellRef::from_a1(address).map_err(|source| {
                    DocumentError::InvalidAddress {
                        sheet_id: sheet.id.clone(),
                        address: address.clone(),
                        source,
                    }
                })?;
                let position = Position {
                    sheet_id: sheet.id.clone(),
                    cell,
                };
                // Import bypasses command validation: persisted indices are
                // already non-negative by construction.
                let _ = self.add_binding(
                    position,
                    binding.list_id.clone(),
                    binding.index_in_list as i64,
                    binding.field_name.clone(),
                );
            }
        }
        Ok(())
    }
}
