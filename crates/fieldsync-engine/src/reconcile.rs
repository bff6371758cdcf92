use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use fieldsync_model::{Binding, BindingStore, ListId, Position, RecordTypeRegistry};

use crate::cast::{cast_cell_value, FieldValue};
use crate::settings::ReconcileSettings;
use crate::sources::{
    CellResolver, ListDescriptor, ListProvider, RecordId, RecordListSource, SourceError,
};

/// All validated field writes for one record, keyed by field name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordUpdate {
    pub record_id: RecordId,
    pub values: BTreeMap<String, FieldValue>,
}

/// Update operations for one record list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpdateBatch {
    pub list_id: ListId,
    pub record_type: String,
    /// One entry per resolved record identity, in ascending id order.
    pub updates: Vec<RecordUpdate>,
}

/// Transient output of one reconciliation run. Never persisted.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconcileResult {
    pub batches: Vec<UpdateBatch>,
    /// Blocking messages: conflicts and per-list failures. Any entry here
    /// means the save must not proceed.
    pub errors: Vec<String>,
    /// Informational messages (e.g. opted-in validation skips). Never block.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ReconcileResult {
    /// True when the caller must refuse to persist any command.
    pub fn is_blocked(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Every update operation across all batches.
    pub fn updates(&self) -> impl Iterator<Item = &RecordUpdate> {
        self.batches.iter().flat_map(|batch| batch.updates.iter())
    }
}

#[derive(Default)]
struct ListOutcome {
    updates: Vec<RecordUpdate>,
    conflicts: Vec<String>,
    skips: Vec<String>,
}

/// Read-only reconciliation engine over a binding store.
///
/// Walks the live bindings of the active sheet's record lists, resolves cell
/// values against record identities, and accumulates per-record update
/// operations. All store mutations happen elsewhere; the engine never writes.
pub struct Reconciler<'a> {
    store: &'a BindingStore,
    registry: &'a RecordTypeRegistry,
    settings: ReconcileSettings,
}

impl<'a> Reconciler<'a> {
    pub fn new(store: &'a BindingStore, registry: &'a RecordTypeRegistry) -> Self {
        Self::with_settings(store, registry, ReconcileSettings::default())
    }

    pub fn with_settings(
        store: &'a BindingStore,
        registry: &'a RecordTypeRegistry,
        settings: ReconcileSettings,
    ) -> Self {
        Self {
            store,
            registry,
            settings,
        }
    }

    /// Compute the update-command batch for the active sheet.
    ///
    /// Only lists anchored to `active_sheet_id` (and of a supported record
    /// type) participate; a conflicted list contributes its conflict messages
    /// and no commands; a list whose collaborators fault degrades to one
    /// generic error without aborting the other lists.
    pub fn compute_update_commands(
        &self,
        active_sheet_id: &str,
        document: &impl CellResolver,
        lists: &mut impl ListProvider,
    ) -> ReconcileResult {
        let mut result = ReconcileResult::default();

        for descriptor in lists.descriptors() {
            if descriptor.sheet_id != active_sheet_id
                || !self.registry.is_supported(&descriptor.record_type)
            {
                continue;
            }

            match self.process_list(&descriptor, active_sheet_id, document, lists) {
                Ok(outcome) => {
                    if !outcome.conflicts.is_empty() {
                        result.errors.extend(outcome.conflicts);
                        continue;
                    }
                    if self.settings.report_validation_skips {
                        result.warnings.extend(outcome.skips);
                    }
                    if !outcome.updates.is_empty() {
                        result.batches.push(UpdateBatch {
                            list_id: descriptor.id.clone(),
                            record_type: descriptor.record_type.clone(),
                            updates: outcome.updates,
                        });
                    }
                }
                Err(err) => {
                    log::warn!(
                        "record list {} failed during reconciliation: {err}",
                        descriptor.id
                    );
                    result
                        .errors
                        .push(format!("Could not process list {}: {err}", descriptor.name));
                }
            }
        }

        result
    }

    fn process_list(
        &self,
        descriptor: &ListDescriptor,
        active_sheet_id: &str,
        document: &impl CellResolver,
        lists: &mut impl ListProvider,
    ) -> Result<ListOutcome, SourceError> {
        let mut outcome = ListOutcome::default();

        // A list without a data source contributes nothing.
        let Some(source) = lists.source(&descriptor.id) else {
            return Ok(outcome);
        };

        outcome.conflicts = self.find_duplicate_bindings(&descriptor.id, document);
        if !outcome.conflicts.is_empty() {
            return Ok(outcome);
        }

        let fields = source.fields().clone();
        let mut per_record: BTreeMap<RecordId, BTreeMap<String, FieldValue>> = BTreeMap::new();

        for (position, binding) in self.store.bindings_for_list(&descriptor.id) {
            if position.sheet_id != active_sheet_id {
                continue;
            }

            let Some(record_id) = record_id_at(&mut *source, binding.index_in_list)? else {
                continue;
            };

            let cell = document.evaluated_cell(&position);
            if cell.is_blank() {
                // Omission, not a null-write.
                continue;
            }

            let Some(field) = fields.get(&binding.field_name) else {
                continue;
            };

            match cast_cell_value(field.kind, &cell) {
                Some(value) => {
                    per_record
                        .entry(record_id)
                        .or_default()
                        .insert(binding.field_name.clone(), value);
                }
                None => {
                    log::debug!(
                        "cell {position} does not fit field {} ({:?}); skipped",
                        binding.field_name,
                        field.kind
                    );
                    outcome.skips.push(format!(
                        "Cell {position} was skipped: its value does not fit field {}",
                        binding.field_name
                    ));
                }
            }
        }

        outcome.updates = per_record
            .into_iter()
            .map(|(record_id, values)| RecordUpdate { record_id, values })
            .collect();
        Ok(outcome)
    }

    /// Conflict pre-check for one list, usable independently of a full run.
    ///
    /// Emits one message per `(slot, field)` pair that more than one
    /// non-blank cell feeds, naming every contributing cell range.
    pub fn find_duplicate_bindings(
        &self,
        list_id: &str,
        document: &impl CellResolver,
    ) -> Vec<String> {
        let mut by_target: BTreeMap<(u32, String), Vec<Position>> = BTreeMap::new();
        for (position, binding) in self.store.bindings_for_list(list_id) {
            if document.evaluated_cell(&position).is_blank() {
                continue;
            }
            by_target
                .entry((binding.index_in_list, binding.field_name))
                .or_default()
                .push(position);
        }

        let mut messages = Vec::new();
        for (_, positions) in by_target {
            if positions.len() > 1 {
                let ranges = positions
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                messages.push(format!(
                    "Multiple cells are updating the same field of the same record; \
                     unable to determine which one to keep: {ranges}"
                ));
            }
        }
        messages
    }

    /// All bindings feeding `list_id`, with positions.
    pub fn bindings_for_list(&self, list_id: &str) -> Vec<(Position, Binding)> {
        self.store.bindings_for_list(list_id)
    }

    /// Greatest live slot index for `list_id`, or 0 if none.
    pub fn max_index_in_list(&self, list_id: &str) -> u32 {
        self.store.max_index_in_list(list_id)
    }

    /// Ids of the supported lists anchored to the active sheet.
    pub fn active_sheet_list_ids(
        &self,
        active_sheet_id: &str,
        lists: &impl ListProvider,
    ) -> Vec<ListId> {
        lists
            .descriptors()
            .into_iter()
            .filter(|descriptor| {
                descriptor.sheet_id == active_sheet_id
                    && self.registry.is_supported(&descriptor.record_type)
            })
            .map(|descriptor| descriptor.id)
            .collect()
    }

    /// True when a binding participates in the active sheet's reconciliation.
    pub fn is_binding_on_active_sheet(
        &self,
        position: &Position,
        binding: &Binding,
        active_sheet_id: &str,
        lists: &impl ListProvider,
    ) -> bool {
        position.sheet_id == active_sheet_id
            && self
                .active_sheet_list_ids(active_sheet_id, lists)
                .contains(&binding.list_id)
    }
}

/// Resolve the record identity at `index`, growing the source's materialized
/// window first when the slot is beyond it.
pub fn record_id_at(
    source: &mut dyn RecordListSource,
    index: u32,
) -> Result<Option<RecordId>, SourceError> {
    if !source.is_ready() {
        source.load()?;
    }
    if index >= source.max_position() {
        source.increase_max_position(index + 1);
        source.reload()?;
    }
    Ok(source.id_from_position(index))
}

/// Derive the binding for a drag-fill target from the fill origin.
///
/// The slot index follows the fill's row delta; `list_id` and `field_name`
/// stay fixed. Filling upward past slot 0 yields no binding.
pub fn extrapolate_binding(
    origin: &Binding,
    origin_position: &Position,
    target_position: &Position,
) -> Option<Binding> {
    let delta = target_position.cell.row as i64 - origin_position.cell.row as i64;
    let index = u32::try_from(origin.index_in_list as i64 + delta).ok()?;
    Some(Binding::new(
        origin.list_id.clone(),
        index,
        origin.field_name.clone(),
    ))
}
