//! Circular dependency tracking for formula resolution.
//!
//! While a formula is resolved, every referenced formula cell is pushed onto
//! its sheet's list before recursing and popped afterwards. Seeing a cell that
//! is already on its sheet's list means the chain has looped back on itself.
//! A depth counter bounds long acyclic chains as well.

use std::collections::HashMap;

use super::{CellRef, ErrorKind};

/// Default bound on nested formula resolution.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Per-sheet list of cells currently being resolved.
#[derive(Clone, Debug)]
pub struct CallStack {
    frames: HashMap<String, Vec<CellRef>>,
    depth: usize,
    max_depth: usize,
}

impl CallStack {
    pub fn new(max_depth: usize) -> Self {
        CallStack {
            frames: HashMap::new(),
            depth: 0,
            max_depth,
        }
    }

    pub fn contains(&self, sheet: &str, cell: &CellRef) -> bool {
        self.frames
            .get(sheet)
            .is_some_and(|cells| cells.contains(cell))
    }

    /// Push `cell` on `sheet`'s list. Fails without pushing when the cell is
    /// already in progress or the depth bound is reached.
    pub fn enter(&mut self, sheet: &str, cell: CellRef) -> Result<(), ErrorKind> {
        if self.contains(sheet, &cell) {
            tracing::debug!(sheet, cell = %cell, "circular reference");
            return Err(ErrorKind::CircularDependency);
        }
        if self.depth >= self.max_depth {
            tracing::warn!(sheet, cell = %cell, max_depth = self.max_depth, "resolution depth limit reached");
            return Err(ErrorKind::General);
        }
        self.frames.entry(sheet.to_string()).or_default().push(cell);
        self.depth += 1;
        Ok(())
    }

    /// Pop `cell` from `sheet`'s list.
    pub fn leave(&mut self, sheet: &str, cell: &CellRef) {
        let Some(cells) = self.frames.get_mut(sheet) else {
            return;
        };
        if let Some(pos) = cells.iter().rposition(|c| c == cell) {
            cells.remove(pos);
            self.depth -= 1;
        }
        if cells.is_empty() {
            self.frames.remove(sheet);
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_empty(&self) -> bool {
        self.frames.values().all(|cells| cells.is_empty())
    }
}

impl Default for CallStack {
    fn default() -> Self {
        CallStack::new(DEFAULT_MAX_DEPTH)
    }
}
