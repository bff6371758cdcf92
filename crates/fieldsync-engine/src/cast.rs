use serde::{Deserialize, Serialize};

use fieldsync_model::{CellValue, EvaluatedCell, FieldKind};

/// A validated value ready to be written into a record field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Boolean(bool),
    Text(String),
}

/// Validate an evaluated cell against a field kind and extract the value to
/// write.
///
/// Returns `None` when the cell's runtime type does not fit the field: the
/// binding is then dropped from the output rather than failing the run.
pub fn cast_cell_value(kind: FieldKind, cell: &EvaluatedCell) -> Option<FieldValue> {
    match kind {
        FieldKind::Float | FieldKind::Monetary => match cell.value {
            CellValue::Number(n) => Some(FieldValue::Number(n)),
            _ => None,
        },
        // Relation references are integer record ids on the wire.
        FieldKind::Integer | FieldKind::ManyToOne => match cell.value {
            CellValue::Number(n) if n.fract() == 0.0 => Some(FieldValue::Number(n)),
            _ => None,
        },
        FieldKind::Boolean => match cell.value {
            CellValue::Boolean(b) => Some(FieldValue::Boolean(b)),
            _ => None,
        },
        // Text-like fields take whatever the user sees in the grid.
        FieldKind::Char | FieldKind::Text | FieldKind::Unclassified => {
            (!cell.is_blank()).then(|| FieldValue::Text(cell.formatted.clone()))
        }
    }
}
