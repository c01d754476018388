use super::Workbook;
use crate::error::Result;
use super::Cell;
use sheetlink_engine::engine::{CellRef, ShiftOperation, shift_formula_references};

impl Workbook {
    /// Insert `count` empty rows above row `at` (0-based) of `sheet`.
    pub fn insert_rows(&mut self, sheet: &str, at: usize, count: usize) -> Result<()> {
        self.apply_shift(sheet, ShiftOperation::InsertRows { at, count })
    }

    /// Delete rows `start..=end` (0-based) of `sheet`.
    pub fn delete_rows(&mut self, sheet: &str, start: usize, end: usize) -> Result<()> {
        self.apply_shift(sheet, ShiftOperation::DeleteRows { start, end })
    }

    /// Insert `count` empty columns left of column `at` (0-based) of `sheet`.
    pub fn insert_columns(&mut self, sheet: &str, at: usize, count: usize) -> Result<()> {
        self.apply_shift(sheet, ShiftOperation::InsertColumns { at, count })
    }

    /// Delete columns `start..=end` (0-based) of `sheet`.
    pub fn delete_columns(&mut self, sheet: &str, start: usize, end: usize) -> Result<()> {
        self.apply_shift(sheet, ShiftOperation::DeleteColumns { start, end })
    }

    /// Move the edited sheet's cells, then rewrite every formula in the
    /// workbook that points into it.
    fn apply_shift(&mut self, sheet: &str, op: ShiftOperation) -> Result<()> {
        let index = self.sheet_index(sheet)?;
        if matches!(
            op,
            ShiftOperation::InsertRows { count: 0, .. } | ShiftOperation::InsertColumns { count: 0, .. }
        ) {
            return Ok(());
        }

        let grid = &self.sheets[index].cells;
        let cells: Vec<(CellRef, Cell)> = grid
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        grid.clear();
        let mut dropped = 0usize;
        for (cell, content) in cells {
            match op.map_cell(cell) {
                Some(new_cell) => {
                    grid.insert(new_cell, content);
                }
                None => dropped += 1,
            }
        }

        let edited = self.sheets[index].name().to_string();
        let mut rewritten = 0usize;
        for formula_sheet in &self.sheets {
            for mut entry in formula_sheet.cells.iter_mut() {
                if !entry.is_formula() {
                    continue;
                }
                let shifted =
                    shift_formula_references(entry.text(), op, &edited, formula_sheet.name());
                if shifted != entry.text() {
                    entry.set_text(&shifted);
                    rewritten += 1;
                }
            }
        }

        tracing::debug!(sheet = %edited, ?op, dropped, rewritten, "structural edit");
        Ok(())
    }
}
