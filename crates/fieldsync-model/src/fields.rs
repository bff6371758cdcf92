use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Declared kind of a record field, as reported by the record schema.
///
/// Closed set; anything the schema reports outside it collapses to
/// [`FieldKind::Unclassified`] and is treated like text.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Float,
    Monetary,
    Integer,
    /// Single-relation reference to another record, stored as an integer id.
    ManyToOne,
    Boolean,
    Char,
    Text,
    Unclassified,
}

impl FieldKind {
    /// Map a schema type name to a kind. Unknown names are unclassified.
    pub fn from_schema_name(name: &str) -> Self {
        match name {
            "float" => FieldKind::Float,
            "monetary" => FieldKind::Monetary,
            "integer" => FieldKind::Integer,
            "many2one" => FieldKind::ManyToOne,
            "boolean" => FieldKind::Boolean,
            "char" => FieldKind::Char,
            "text" => FieldKind::Text,
            _ => FieldKind::Unclassified,
        }
    }

    /// The schema spelling of this kind.
    pub fn schema_name(self) -> &'static str {
        match self {
            FieldKind::Float => "float",
            FieldKind::Monetary => "monetary",
            FieldKind::Integer => "integer",
            FieldKind::ManyToOne => "many2one",
            FieldKind::Boolean => "boolean",
            FieldKind::Char => "char",
            FieldKind::Text => "text",
            FieldKind::Unclassified => "unclassified",
        }
    }

    /// True for kinds a grid cell can feed at all.
    pub fn is_syncable(self) -> bool {
        !matches!(self, FieldKind::Unclassified)
    }
}

impl Serialize for FieldKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.schema_name())
    }
}

impl<'de> Deserialize<'de> for FieldKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Ok(FieldKind::from_schema_name(&name))
    }
}

/// Schema entry for one record field.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    #[serde(rename = "type")]
    pub kind: FieldKind,
    #[serde(default)]
    pub readonly: bool,
}

impl FieldDescriptor {
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            readonly: false,
        }
    }

    pub fn readonly(kind: FieldKind) -> Self {
        Self {
            kind,
            readonly: true,
        }
    }
}

/// Field name → descriptor map for one record type, as served by the list
/// data source.
pub type FieldSchema = BTreeMap<String, FieldDescriptor>;
