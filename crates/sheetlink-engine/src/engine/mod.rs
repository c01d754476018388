//! Formula resolution API.
//!
//! - [`CellRef`], [`CellRange`] - A1 notation <-> 0-indexed coordinates
//! - [`CellSource`], [`VariableResolver`] - what a formula reads from
//! - [`FormulaResolver`], [`resolve`] - rewrite references to literals and evaluate
//! - [`CallStack`] - circular reference and depth guard
//! - [`Evaluator`], [`RhaiEvaluator`] - literal infix -> [`CellValue`]
//! - [`shift_formula_references`] - follow structural edits
//! - [`ErrorKind`] - sentinel outcomes (`#REF!`, `#CIRCULAR!`, ...)

mod cell_ref;
mod cycle;
mod error;
mod eval;
mod format;
mod infix;
mod resolve;
mod rewrite;
mod shift;
mod source;

pub use cell_ref::{CellRange, CellRef, parse_range};
pub use cycle::{CallStack, DEFAULT_MAX_DEPTH};
pub use error::{ERROR_LITERALS, ErrorKind, EvalError};
pub use eval::{Evaluator, RhaiEvaluator, create_engine};
pub use format::{CellValue, format_number};
pub use infix::to_rhai;
pub(crate) use infix::CONCAT_OPERATOR;
pub use resolve::{DEFAULT_MAX_RANGE_CELLS, FORMULA_SIGIL, FormulaResolver, ResolveOptions, resolve};
pub use rewrite::variable_tokens;
pub use shift::{ShiftOperation, shift_formula_references};
pub use source::{CellSource, NoVariables, VariableResolver, VariableState};
