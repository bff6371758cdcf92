use crate::{CellRef, Range, SheetId, GRID_MAX_COLS, GRID_MAX_ROWS};

/// A document edit that shifts or invalidates cell coordinates.
///
/// Mirrors the structural command set of the host document engine; the store
/// only needs each change's effect on individual cells.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StructuralChange {
    InsertRows {
        sheet_id: SheetId,
        /// Row index the new rows are inserted at; existing rows at or below
        /// this index shift down.
        row: u32,
        count: u32,
    },
    DeleteRows {
        sheet_id: SheetId,
        /// First deleted row index; `count` rows starting here disappear.
        row: u32,
        count: u32,
    },
    InsertCols {
        sheet_id: SheetId,
        col: u32,
        count: u32,
    },
    DeleteCols {
        sheet_id: SheetId,
        col: u32,
        count: u32,
    },
    /// A rectangular region moved to a new top-left anchor. Cells already in
    /// the destination are overwritten.
    MoveRange {
        sheet_id: SheetId,
        src: Range,
        dst_top_left: CellRef,
    },
    /// A rectangular region deleted in place (no shift).
    DeleteRange { sheet_id: SheetId, range: Range },
    /// The whole sheet removed from the document.
    RemoveSheet { sheet_id: SheetId },
    /// The sheet copied under a new id; the copy inherits the original's
    /// cell contents.
    DuplicateSheet {
        sheet_id: SheetId,
        new_sheet_id: SheetId,
    },
}

/// Effect of a structural change on one cell.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CellEffect {
    /// The cell keeps its coordinates.
    Unchanged,
    /// The cell no longer exists after the change.
    Removed,
    /// The cell's content now lives at the given coordinates.
    MovedTo(CellRef),
}

impl StructuralChange {
    /// Sheet the change applies to.
    pub fn sheet_id(&self) -> &str {
        match self {
            StructuralChange::InsertRows { sheet_id, .. }
            | StructuralChange::DeleteRows { sheet_id, .. }
            | StructuralChange::InsertCols { sheet_id, .. }
            | StructuralChange::DeleteCols { sheet_id, .. }
            | StructuralChange::MoveRange { sheet_id, .. }
            | StructuralChange::DeleteRange { sheet_id, .. }
            | StructuralChange::RemoveSheet { sheet_id }
            | StructuralChange::DuplicateSheet { sheet_id, .. } => sheet_id,
        }
    }

    /// Compute this change's effect on a single cell.
    ///
    /// Cells on other sheets are never affected. A shift that would push a
    /// cell past the grid edge removes it.
    pub fn effect_on(&self, sheet_id: &str, cell: CellRef) -> CellEffect {
        if sheet_id != self.sheet_id() {
            return CellEffect::Unchanged;
        }

        match self {
            StructuralChange::InsertRows { row, count, .. } => {
                if cell.row < *row {
                    CellEffect::Unchanged
                } else {
                    shifted(cell, *count as i64, 0)
                }
            }
            StructuralChange::DeleteRows { row, count, .. } => {
                if cell.row < *row {
                    CellEffect::Unchanged
                } else if cell.row < row.saturating_add(*count) {
                    CellEffect::Removed
                } else {
                    shifted(cell, -(*count as i64), 0)
                }
            }
            StructuralChange::InsertCols { col, count, .. } => {
                if cell.col < *col {
                    CellEffect::Unchanged
                } else {
                    shifted(cell, 0, *count as i64)
                }
            }
            StructuralChange::DeleteCols { col, count, .. } => {
                if cell.col < *col {
                    CellEffect::Unchanged
                } else if cell.col < col.saturating_add(*count) {
                    CellEffect::Removed
                } else {
                    shifted(cell, 0, -(*count as i64))
                }
            }
            StructuralChange::MoveRange {
                src, dst_top_left, ..
            } => {
                let delta_row = dst_top_left.row as i64 - src.start.row as i64;
                let delta_col = dst_top_left.col as i64 - src.start.col as i64;
                if src.contains(cell) {
                    shifted(cell, delta_row, delta_col)
                } else if destination_of(src, *dst_top_left).contains(cell) {
                    // Overwritten by the moved region.
                    CellEffect::Removed
                } else {
                    CellEffect::Unchanged
                }
            }
            StructuralChange::DeleteRange { range, .. } => {
                if range.contains(cell) {
                    CellEffect::Removed
                } else {
                    CellEffect::Unchanged
                }
            }
            StructuralChange::RemoveSheet { .. } => CellEffect::Removed,
            // Duplication leaves the source sheet untouched; the copy is
            // handled by the store.
            StructuralChange::DuplicateSheet { .. } => CellEffect::Unchanged,
        }
    }
}

fn destination_of(src: &Range, dst_top_left: CellRef) -> Range {
    let end = CellRef::new(
        dst_top_left.row.saturating_add(src.height() - 1),
        dst_top_left.col.saturating_add(src.width() - 1),
    );
    Range::new(dst_top_left, end)
}

fn shifted(cell: CellRef, delta_row: i64, delta_col: i64) -> CellEffect {
    let row = cell.row as i64 + delta_row;
    let col = cell.col as i64 + delta_col;
    if row < 0 || row >= GRID_MAX_ROWS as i64 || col < 0 || col >= GRID_MAX_COLS as i64 {
        return CellEffect::Removed;
    }
    CellEffect::MovedTo(CellRef::new(row as u32, col as u32))
}
