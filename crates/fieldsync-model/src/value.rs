use serde::{Deserialize, Serialize};

/// Evaluated value of a grid cell, as reported by the document engine.
///
/// The enum uses an explicit `{type, value}` tagged layout so payloads stay
/// stable across IPC boundaries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    /// Empty / unset cell value.
    Empty,
    /// IEEE-754 double precision number.
    Number(f64),
    /// Boolean.
    Boolean(bool),
    /// Plain string.
    Text(String),
}

impl Default for CellValue {
    fn default() -> Self {
        CellValue::Empty
    }
}

impl CellValue {
    /// Returns true if the value is [`CellValue::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Boolean(value)
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

/// A cell's evaluated value together with its user-visible rendering.
///
/// Produced by the document engine; the reconciliation layer never evaluates
/// formulas itself.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluatedCell {
    /// The evaluated (post-formula) value.
    pub value: CellValue,
    /// The formatted display text, as the user sees it in the grid.
    #[serde(default)]
    pub formatted: String,
}

impl EvaluatedCell {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn number(value: f64, formatted: impl Into<String>) -> Self {
        Self {
            value: CellValue::Number(value),
            formatted: formatted.into(),
        }
    }

    pub fn boolean(value: bool) -> Self {
        Self {
            value: CellValue::Boolean(value),
            formatted: if value { "TRUE" } else { "FALSE" }.to_string(),
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            formatted: value.clone(),
            value: CellValue::Text(value),
        }
    }

    /// True when the cell contributes nothing to a record update.
    ///
    /// Both truly empty cells and cells evaluating to the empty string count
    /// as blank: omission, not a null-write.
    pub fn is_blank(&self) -> bool {
        match &self.value {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }
}
