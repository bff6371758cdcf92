use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    Binding, CellEffect, CellKey, ListId, Position, Range, SheetId, StructuralChange,
};

/// Rejection codes for store commands, checked before any mutation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum CommandRejection {
    /// The requested record slot does not exist (e.g. a negative index).
    #[error("invalid target record slot")]
    InvalidTarget,
    /// The target is protected because a supported record type depends on it.
    #[error("a supported record type still depends on this target")]
    Readonly,
}

/// One reversible store mutation: the binding at `position` went from
/// `before` to `after`.
///
/// The host document records these on its undo stack; replaying them through
/// [`BindingStore::apply`] / [`BindingStore::revert`] redoes/undoes the
/// command they came from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BindingChange {
    pub position: Position,
    pub before: Option<Binding>,
    pub after: Option<Binding>,
}

/// Result of an accepted store command.
#[derive(Clone, Debug, PartialEq)]
pub enum CommandOutcome {
    /// The command mutated the store; the changes are reversible.
    Applied(Vec<BindingChange>),
    /// The command was a no-op (idempotent re-application). Not an error,
    /// and must not create an undo step.
    NoChanges,
}

impl CommandOutcome {
    fn from_changes(changes: Vec<BindingChange>) -> Self {
        if changes.is_empty() {
            CommandOutcome::NoChanges
        } else {
            CommandOutcome::Applied(changes)
        }
    }

    /// The reversible changes this command produced (empty for a no-op).
    pub fn changes(&self) -> &[BindingChange] {
        match self {
            CommandOutcome::Applied(changes) => changes,
            CommandOutcome::NoChanges => &[],
        }
    }

    /// True if the command left the store untouched.
    pub fn is_no_op(&self) -> bool {
        matches!(self, CommandOutcome::NoChanges)
    }
}

/// Sparse mapping from grid positions to [`Binding`]s.
///
/// One ordered map per sheet, keyed by packed cell coordinates. Sheets with
/// no bindings hold no entry at all, so enumeration never visits them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BindingStore {
    sheets: HashMap<SheetId, BTreeMap<CellKey, Binding>>,
}

impl BindingStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live bindings across all sheets.
    pub fn len(&self) -> usize {
        self.sheets.values().map(BTreeMap::len).sum()
    }

    /// True if no bindings exist.
    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    /// The binding at `position`, if any.
    pub fn get_binding(&self, position: &Position) -> Option<&Binding> {
        self.sheets
            .get(&position.sheet_id)?
            .get(&CellKey::from_ref(position.cell))
    }

    /// True if `position` already carries a binding.
    pub fn is_bound(&self, position: &Position) -> bool {
        self.get_binding(position).is_some()
    }

    /// Bindings inside `region` on `sheet_id`, in col-major (sheet/col/row)
    /// order.
    pub fn bindings_in_region(&self, sheet_id: &str, region: Range) -> Vec<Binding> {
        let Some(sheet) = self.sheets.get(sheet_id) else {
            return Vec::new();
        };
        region
            .cells_col_major()
            .filter_map(|cell| sheet.get(&CellKey::from_ref(cell)).cloned())
            .collect()
    }

    /// Every `(position, binding)` pair in the store.
    ///
    /// Exhaustive and side-effect-free; relative order across sheets is
    /// unspecified.
    pub fn all_bindings(&self) -> impl Iterator<Item = (Position, &Binding)> + '_ {
        self.sheets.iter().flat_map(|(sheet_id, cells)| {
            cells.iter().map(move |(key, binding)| {
                (
                    Position {
                        sheet_id: sheet_id.clone(),
                        cell: key.to_ref(),
                    },
                    binding,
                )
            })
        })
    }

    /// All bindings feeding `list_id`, with their positions, sorted by
    /// (sheet, col, row).
    pub fn bindings_for_list(&self, list_id: &str) -> Vec<(Position, Binding)> {
        let mut result: Vec<(Position, Binding)> = self
            .all_bindings()
            .filter(|(_, binding)| binding.list_id == list_id)
            .map(|(position, binding)| (position, binding.clone()))
            .collect();
        result.sort_by(|(a, _), (b, _)| {
            (&a.sheet_id, a.cell.col, a.cell.row).cmp(&(&b.sheet_id, b.cell.col, b.cell.row))
        });
        result
    }

    /// Greatest `index_in_list` among `list_id`'s live bindings, or 0 if the
    /// list has none. Used to size the data source's materialized window.
    pub fn max_index_in_list(&self, list_id: &str) -> u32 {
        self.all_bindings()
            .filter(|(_, binding)| binding.list_id == list_id)
            .map(|(_, binding)| binding.index_in_list)
            .max()
            .unwrap_or(0)
    }

    /// Insert or overwrite the binding at `position`.
    ///
    /// Rejects `InvalidTarget` for a negative slot index. Re-applying an
    /// identical binding yields `NoChanges`.
    pub fn add_binding(
        &mut self,
        position: Position,
        list_id: impl Into<ListId>,
        index_in_list: i64,
        field_name: impl Into<String>,
    ) -> Result<CommandOutcome, CommandRejection> {
        let index = u32::try_from(index_in_list).map_err(|_| CommandRejection::InvalidTarget)?;
        let binding = Binding::new(list_id, index, field_name);
        if self.get_binding(&position) == Some(&binding) {
            return Ok(CommandOutcome::NoChanges);
        }
        let changes: Vec<_> = self.set(&position, Some(binding)).into_iter().collect();
        Ok(CommandOutcome::from_changes(changes))
    }

    /// Remove every binding inside `region` on `sheet_id`.
    pub fn delete_bindings(&mut self, sheet_id: &str, region: Range) -> CommandOutcome {
        let mut changes = Vec::new();
        for cell in region.cells_col_major() {
            let position = Position {
                sheet_id: sheet_id.to_string(),
                cell,
            };
            changes.extend(self.set(&position, None));
        }
        CommandOutcome::from_changes(changes)
    }

    /// Remap every binding for a structural document edit.
    ///
    /// Per binding, the change either removes it, leaves it alone, or moves
    /// it to translated coordinates. Moves are recorded as a delete + insert
    /// pair so the persisted view never holds the same binding twice.
    pub fn remap_on_structural_change(&mut self, change: &StructuralChange) -> CommandOutcome {
        if let StructuralChange::DuplicateSheet {
            sheet_id,
            new_sheet_id,
        } = change
        {
            return self.copy_sheet_bindings(sheet_id, new_sheet_id);
        }

        let mut removals: Vec<Position> = Vec::new();
        let mut inserts: Vec<(Position, Binding)> = Vec::new();
        for (position, binding) in self.all_bindings() {
            match change.effect_on(&position.sheet_id, position.cell) {
                CellEffect::Unchanged => {}
                CellEffect::Removed => removals.push(position),
                CellEffect::MovedTo(cell) => {
                    inserts.push((
                        Position {
                            sheet_id: position.sheet_id.clone(),
                            cell,
                        },
                        binding.clone(),
                    ));
                    removals.push(position);
                }
            }
        }

        // Clear all vacated positions before inserting, so bindings shifting
        // into each other's old cells don't clobber one another.
        let mut changes = Vec::new();
        for position in removals {
            changes.extend(self.set(&position, None));
        }
        for (position, binding) in inserts {
            changes.extend(self.set(&position, Some(binding)));
        }
        CommandOutcome::from_changes(changes)
    }

    fn copy_sheet_bindings(&mut self, sheet_id: &str, new_sheet_id: &str) -> CommandOutcome {
        let copies: Vec<(CellKey, Binding)> = self
            .sheets
            .get(sheet_id)
            .map(|cells| {
                cells
                    .iter()
                    .map(|(key, binding)| (*key, binding.clone()))
                    .collect()
            })
            .unwrap_or_default();

        let mut changes = Vec::new();
        for (key, binding) in copies {
            let position = Position {
                sheet_id: new_sheet_id.to_string(),
                cell: key.to_ref(),
            };
            changes.extend(self.set(&position, Some(binding)));
        }
        CommandOutcome::from_changes(changes)
    }

    /// Re-apply a recorded change list (redo).
    pub fn apply(&mut self, changes: &[BindingChange]) {
        for change in changes {
            self.set(&change.position, change.after.clone());
        }
    }

    /// Reverse a recorded change list (undo), restoring the prior state.
    pub fn revert(&mut self, changes: &[BindingChange]) {
        for change in changes.iter().rev() {
            self.set(&change.position, change.before.clone());
        }
    }

    /// Set the binding at `position`, returning the change if the store
    /// actually mutated. Sheets left without bindings are pruned.
    fn set(&mut self, position: &Position, after: Option<Binding>) -> Option<BindingChange> {
        let key = CellKey::from_ref(position.cell);
        let before = match &after {
            Some(binding) => self
                .sheets
                .entry(position.sheet_id.clone())
                .or_default()
                .insert(key, binding.clone()),
            None => self
                .sheets
                .get_mut(&position.sheet_id)
                .and_then(|cells| cells.remove(&key)),
        };
        if let Some(cells) = self.sheets.get(&position.sheet_id) {
            if cells.is_empty() {
                self.sheets.remove(&position.sheet_id);
            }
        }
        if before == after {
            return None;
        }
        Some(BindingChange {
            position: position.clone(),
            before,
            after,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CellRef;

    fn store_with_one() -> (BindingStore, Position) {
        let mut store = BindingStore::new();
        let position = Position::new("s1", 2, 1);
        store
            .add_binding(position.clone(), "L1", 0, "quantity")
            .unwrap();
        (store, position)
    }

    #[test]
    fn set_prunes_empty_sheets() {
        let (mut store, position) = store_with_one();
        assert_eq!(store.len(), 1);
        store.delete_bindings("s1", Range::single(position.cell));
        assert!(store.is_empty());
    }

    #[test]
    fn negative_index_is_rejected_before_mutation() {
        let mut store = BindingStore::new();
        let err = store
            .add_binding(Position::new("s1", 0, 0), "L1", -1, "quantity")
            .unwrap_err();
        assert_eq!(err, CommandRejection::InvalidTarget);
        assert!(store.is_empty());
    }

    #[test]
    fn overwrite_records_previous_binding() {
        let (mut store, position) = store_with_one();
        let outcome = store
            .add_binding(position.clone(), "L1", 4, "quantity")
            .unwrap();
        let changes = outcome.changes();
        assert_eq!(changes.len(), 1);
        assert_eq!(
            changes[0].before,
            Some(Binding::new("L1", 0, "quantity"))
        );
        assert_eq!(changes[0].after, Some(Binding::new("L1", 4, "quantity")));
    }

    #[test]
    fn max_index_defaults_to_zero() {
        let store = BindingStore::new();
        assert_eq!(store.max_index_in_list("L1"), 0);
    }

    #[test]
    fn region_query_is_col_major() {
        let mut store = BindingStore::new();
        store
            .add_binding(Position::new("s1", 0, 1), "L1", 1, "b")
            .unwrap();
        store
            .add_binding(Position::new("s1", 1, 0), "L1", 0, "a")
            .unwrap();
        let region = Range::new(CellRef::new(0, 0), CellRef::new(1, 1));
        let bindings = store.bindings_in_region("s1", region);
        assert_eq!(bindings.len(), 2);
        // col 0 first, then col 1.
        assert_eq!(bindings[0].field_name, "a");
        assert_eq!(bindings[1].field_name, "b");
    }
}
