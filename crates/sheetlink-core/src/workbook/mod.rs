//! Workbook state and logic (UI-agnostic).

mod cell;
mod eval;
mod ops;
mod state;

pub use cell::Cell;
pub use state::{Grid, Sheet, Workbook, validate_sheet_name};
