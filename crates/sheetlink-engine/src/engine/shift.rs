//! Reference shifting for structural edits.
//!
//! When rows or columns are inserted or deleted on a sheet, every formula
//! that points into that sheet has to follow the cells it referred to.
//!
//! Rules:
//! - Insert `count` at `at`: indices >= `at` move by `count`
//! - Delete `start..=end`: indices after the block move back, indices inside
//!   it become `#REF!`
//! - A range shrinks to its surviving part; it is `#REF!` only when every
//!   row (or column) of it was deleted
//! - `$` markers are kept, string literals are left alone

use regex::{Captures, Regex};
use std::sync::OnceLock;

use super::rewrite::{is_standalone, map_outside_strings, try_replace_all};
use super::{CellRef, ErrorKind};

/// Operation for shifting cell references in formulas. Indices are 0-based
/// and delete bounds are inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShiftOperation {
    InsertRows { at: usize, count: usize },
    DeleteRows { start: usize, end: usize },
    InsertColumns { at: usize, count: usize },
    DeleteColumns { start: usize, end: usize },
}

impl ShiftOperation {
    fn is_rows(&self) -> bool {
        matches!(
            self,
            ShiftOperation::InsertRows { .. } | ShiftOperation::DeleteRows { .. }
        )
    }

    /// New position of a row or column index on the shifted axis, None when
    /// it was deleted.
    pub fn map_index(&self, index: usize) -> Option<usize> {
        match *self {
            ShiftOperation::InsertRows { at, count } | ShiftOperation::InsertColumns { at, count } => {
                if index >= at {
                    index.checked_add(count)
                } else {
                    Some(index)
                }
            }
            ShiftOperation::DeleteRows { start, end } | ShiftOperation::DeleteColumns { start, end } => {
                let (lo, hi) = (start.min(end), start.max(end));
                if index < lo {
                    Some(index)
                } else if index <= hi {
                    None
                } else {
                    Some(index - (hi - lo + 1))
                }
            }
        }
    }

    /// Surviving part of an inclusive span `lo..=hi`, None when all of it
    /// was deleted.
    fn map_span(&self, lo: usize, hi: usize) -> Option<(usize, usize)> {
        match *self {
            ShiftOperation::InsertRows { .. } | ShiftOperation::InsertColumns { .. } => {
                Some((self.map_index(lo)?, self.map_index(hi)?))
            }
            ShiftOperation::DeleteRows { start, end } | ShiftOperation::DeleteColumns { start, end } => {
                let (del_lo, del_hi) = (start.min(end), start.max(end));
                if lo >= del_lo && hi <= del_hi {
                    return None;
                }
                let removed = del_hi - del_lo + 1;
                let new_lo = if lo < del_lo {
                    lo
                } else if lo <= del_hi {
                    del_lo
                } else {
                    lo - removed
                };
                let new_hi = if hi < del_lo {
                    hi
                } else if hi <= del_hi {
                    del_lo - 1
                } else {
                    hi - removed
                };
                Some((new_lo, new_hi))
            }
        }
    }

    /// New position of a cell, None when its row or column was deleted.
    pub fn map_cell(&self, cell: CellRef) -> Option<CellRef> {
        if self.is_rows() {
            Some(CellRef::new(cell.col, self.map_index(cell.row)?))
        } else {
            Some(CellRef::new(self.map_index(cell.col)?, cell.row))
        }
    }
}

fn shift_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?:(?:'(?<quoted>[^']*)'|(?<plain>[A-Za-z0-9_]+))!)?(?<start>\$?[A-Za-z]+\$?[1-9][0-9]*)(?::(?<end>\$?[A-Za-z]+\$?[1-9][0-9]*))?",
        )
        .expect("shift reference regex must compile")
    })
}

fn marked_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?<col_abs>\$?)(?<letters>[A-Za-z]+)(?<row_abs>\$?)(?<numbers>[0-9]+)$")
            .expect("marked reference regex must compile")
    })
}

/// A reference as written, `$` markers included.
#[derive(Clone, Copy, Debug)]
struct MarkedRef {
    cell: CellRef,
    col_abs: bool,
    row_abs: bool,
}

impl MarkedRef {
    fn parse(text: &str) -> Option<MarkedRef> {
        let caps = marked_ref_re().captures(text)?;
        Some(MarkedRef {
            cell: CellRef::from_str(text)?,
            col_abs: !caps["col_abs"].is_empty(),
            row_abs: !caps["row_abs"].is_empty(),
        })
    }

    fn with_cell(self, cell: CellRef) -> MarkedRef {
        MarkedRef { cell, ..self }
    }

    fn render(&self) -> String {
        format!(
            "{}{}{}{}",
            if self.col_abs { "$" } else { "" },
            CellRef::col_to_letters(self.cell.col),
            if self.row_abs { "$" } else { "" },
            self.cell.row + 1
        )
    }

    fn axis(&self, rows: bool) -> usize {
        if rows { self.cell.row } else { self.cell.col }
    }

    fn set_axis(self, rows: bool, index: usize) -> MarkedRef {
        if rows {
            self.with_cell(CellRef::new(self.cell.col, index))
        } else {
            self.with_cell(CellRef::new(index, self.cell.row))
        }
    }
}

/// Shift cell references in `formula` (stored on `formula_sheet`) after
/// `op` was applied to `edited_sheet`. Returns the updated formula string.
///
/// Bare references follow the edit only when the formula lives on the edited
/// sheet; qualified references only when they name it.
pub fn shift_formula_references(
    formula: &str,
    op: ShiftOperation,
    edited_sheet: &str,
    formula_sheet: &str,
) -> String {
    let shifted = map_outside_strings(formula, |seg| {
        try_replace_all(shift_re(), seg, |caps| {
            Ok(shift_match(seg, caps, op, edited_sheet, formula_sheet))
        })
    });
    shifted.unwrap_or_else(|_| formula.to_string())
}

fn shift_match(
    seg: &str,
    caps: &Captures<'_>,
    op: ShiftOperation,
    edited_sheet: &str,
    formula_sheet: &str,
) -> Option<String> {
    let whole = caps.get(0)?;
    let start = caps.name("start")?;
    let qualifier = caps.name("quoted").or_else(|| caps.name("plain"));

    let target_sheet = match qualifier {
        Some(sheet) => sheet.as_str(),
        None => {
            if !is_standalone(seg, whole.start(), whole.end()) {
                return None;
            }
            formula_sheet
        }
    };
    if target_sheet != edited_sheet {
        return None;
    }

    let prefix = &seg[whole.start()..start.start()];
    let first = MarkedRef::parse(start.as_str())?;
    let rows = op.is_rows();

    let body = match caps.name("end") {
        None => match op.map_cell(first.cell) {
            Some(cell) => first.with_cell(cell).render(),
            None => return Some(ErrorKind::Ref.sentinel().to_string()),
        },
        Some(end) => {
            let second = MarkedRef::parse(end.as_str())?;
            let (a, b) = (first.axis(rows), second.axis(rows));
            let Some((lo, hi)) = op.map_span(a.min(b), a.max(b)) else {
                return Some(ErrorKind::Ref.sentinel().to_string());
            };
            let (new_a, new_b) = if a <= b { (lo, hi) } else { (hi, lo) };
            format!(
                "{}:{}",
                first.set_axis(rows, new_a).render(),
                second.set_axis(rows, new_b).render()
            )
        }
    };
    Some(format!("{}{}", prefix, body))
}
