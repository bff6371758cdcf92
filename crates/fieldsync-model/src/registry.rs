use crate::{CommandRejection, FieldDescriptor};

/// One supported record type: which fields a cell may feed, and how the type
/// presents in pickers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordTypeSpec {
    /// Schema name of the record type.
    pub name: &'static str,
    /// Human-readable name for pickers and messages.
    pub display_name: &'static str,
    /// Fields a binding may target on this type.
    pub allowed_fields: &'static [&'static str],
    /// Field linking a line back to its parent record; never writable from
    /// the grid.
    pub parent_link_field: &'static str,
    /// The parent record type whose global filters are protected while this
    /// type is synchronized.
    pub parent_record_type: &'static str,
}

impl RecordTypeSpec {
    /// True if `field_name` may be the target of a binding.
    pub fn is_field_allowed(&self, field_name: &str) -> bool {
        self.allowed_fields.contains(&field_name)
    }
}

/// Closed registry of record types supported for synchronization.
///
/// Resolved once per list; lists of unsupported types never participate in
/// reconciliation, and supported lists (plus their parents' filters) are
/// protected from removal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordTypeRegistry {
    entries: &'static [RecordTypeSpec],
}

const BUILTIN_RECORD_TYPES: &[RecordTypeSpec] = &[
    RecordTypeSpec {
        name: "material.line",
        display_name: "Material Line",
        allowed_fields: &[
            "product_id",
            "description",
            "quantity",
            "width",
            "height",
            "length",
            "thickness",
        ],
        parent_link_field: "estimate_id",
        parent_record_type: "estimate",
    },
    RecordTypeSpec {
        name: "order.line",
        display_name: "Order Line",
        allowed_fields: &[
            "product_id",
            "quantity",
            "unit_price",
            "width",
            "height",
            "length",
            "thickness",
        ],
        parent_link_field: "order_id",
        parent_record_type: "order",
    },
];

impl Default for RecordTypeRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl RecordTypeRegistry {
    /// The built-in registry.
    pub fn builtin() -> Self {
        Self {
            entries: BUILTIN_RECORD_TYPES,
        }
    }

    /// All supported record types.
    pub fn iter(&self) -> impl Iterator<Item = &RecordTypeSpec> {
        self.entries.iter()
    }

    /// Look up a record type by schema name.
    pub fn get(&self, record_type: &str) -> Option<&RecordTypeSpec> {
        self.entries.iter().find(|spec| spec.name == record_type)
    }

    /// True if `record_type` is supported for synchronization.
    pub fn is_supported(&self, record_type: &str) -> bool {
        self.get(record_type).is_some()
    }

    /// Display name for a supported record type.
    pub fn display_name(&self, record_type: &str) -> Option<&'static str> {
        self.get(record_type).map(|spec| spec.display_name)
    }

    /// True if a global filter on `record_type` is protected from removal.
    pub fn is_protected_filter_target(&self, record_type: &str) -> bool {
        self.entries
            .iter()
            .any(|spec| spec.parent_record_type == record_type)
    }

    /// Guard for removing a record list: supported lists may not be removed.
    pub fn guard_remove_list(&self, list_record_type: &str) -> Result<(), CommandRejection> {
        if self.is_supported(list_record_type) {
            return Err(CommandRejection::Readonly);
        }
        Ok(())
    }

    /// Guard for removing a global filter: filters on parents of supported
    /// record types may not be removed.
    pub fn guard_remove_filter(&self, filter_record_type: &str) -> Result<(), CommandRejection> {
        if self.is_protected_filter_target(filter_record_type) {
            return Err(CommandRejection::Readonly);
        }
        Ok(())
    }

    /// Field-picker filter: writable, not the parent link, and of a kind the
    /// grid can feed.
    pub fn is_writable_field(
        &self,
        record_type: &str,
        field_name: &str,
        descriptor: &FieldDescriptor,
    ) -> bool {
        let Some(spec) = self.get(record_type) else {
            return false;
        };
        !descriptor.readonly
            && field_name != spec.parent_link_field
            && descriptor.kind.is_syncable()
    }
}
