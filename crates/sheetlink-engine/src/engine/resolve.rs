//! Formula entry point.
//!
//! [`FormulaResolver`] turns stored cell text into a [`CellValue`] or an
//! [`ErrorKind`]. Plain text comes back unchanged, a trigger-prefixed cell is
//! looked up as a dynamic variable, and a formula is rewritten to a literal
//! infix string (see `rewrite.rs`) and handed to the [`Evaluator`].

use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};

use super::cycle::{CallStack, DEFAULT_MAX_DEPTH};
use super::error::ERROR_LITERALS;
use super::{CellSource, CellValue, ErrorKind, Evaluator, VariableResolver, VariableState};

/// Leading character that marks cell text as a formula.
pub const FORMULA_SIGIL: char = '=';

/// Default bound on the number of cells one range may expand to.
pub const DEFAULT_MAX_RANGE_CELLS: usize = 100_000;

/// Resolution settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveOptions {
    /// Character that starts a dynamic variable token. None disables variables.
    pub trigger: Option<char>,
    /// Maximum nesting of referenced formula cells.
    pub max_depth: usize,
    /// Maximum number of cells a single range may expand to.
    pub max_range_cells: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        ResolveOptions {
            trigger: None,
            max_depth: DEFAULT_MAX_DEPTH,
            max_range_cells: DEFAULT_MAX_RANGE_CELLS,
        }
    }
}

/// Resolves cell text against a cell source, a variable resolver and an evaluator.
pub struct FormulaResolver<'a> {
    cells: &'a dyn CellSource,
    variables: &'a dyn VariableResolver,
    evaluator: &'a dyn Evaluator,
    options: ResolveOptions,
}

impl<'a> FormulaResolver<'a> {
    pub fn new(
        cells: &'a dyn CellSource,
        variables: &'a dyn VariableResolver,
        evaluator: &'a dyn Evaluator,
    ) -> Self {
        FormulaResolver {
            cells,
            variables,
            evaluator,
            options: ResolveOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ResolveOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    pub(crate) fn cells(&self) -> &'a dyn CellSource {
        self.cells
    }

    pub(crate) fn variables(&self) -> &'a dyn VariableResolver {
        self.variables
    }

    /// Resolve cell text with a fresh call stack.
    pub fn resolve(&self, cell_text: &str, sheet: &str) -> Result<CellValue, ErrorKind> {
        let mut stack = CallStack::new(self.options.max_depth);
        self.resolve_with_stack(cell_text, sheet, &mut stack)
    }

    /// Resolve the stored text of (col, row) on `sheet`.
    pub fn resolve_cell(&self, col: usize, row: usize, sheet: &str) -> Result<CellValue, ErrorKind> {
        let text = self.cells.cell_text(col, row, Some(sheet));
        self.resolve(&text, sheet)
    }

    /// Resolve cell text using a caller-owned call stack. The stack is left as
    /// it was found.
    pub fn resolve_with_stack(
        &self,
        cell_text: &str,
        sheet: &str,
        stack: &mut CallStack,
    ) -> Result<CellValue, ErrorKind> {
        if let Some(body) = cell_text.strip_prefix(FORMULA_SIGIL) {
            return self.resolve_formula(body, sheet, stack);
        }
        if self.is_variable_text(cell_text) {
            return self.resolve_variable_text(cell_text);
        }
        Ok(CellValue::Text(cell_text.to_string()))
    }

    pub(crate) fn resolve_formula(
        &self,
        body: &str,
        sheet: &str,
        stack: &mut CallStack,
    ) -> Result<CellValue, ErrorKind> {
        let infix = self.rewrite(body, sheet, stack)?;
        if infix.is_empty() {
            return Ok(CellValue::Text(String::new()));
        }
        tracing::debug!(sheet, formula = body, infix = %infix, "evaluating formula");

        let evaluator = self.evaluator;
        match panic::catch_unwind(AssertUnwindSafe(|| evaluator.evaluate(&infix))) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                tracing::debug!(infix = %infix, error = %err, "evaluation failed");
                Err(err.into())
            }
            Err(_) => {
                tracing::warn!(infix = %infix, "evaluator panicked");
                Err(ErrorKind::General)
            }
        }
    }

    /// Cell text that is a whole dynamic variable token (error literals excluded).
    pub(crate) fn is_variable_text(&self, text: &str) -> bool {
        match self.options.trigger {
            Some(trigger) => {
                text.starts_with(trigger) && !ERROR_LITERALS.iter().any(|lit| text.trim() == *lit)
            }
            None => false,
        }
    }

    pub(crate) fn resolve_variable_text(&self, text: &str) -> Result<CellValue, ErrorKind> {
        match self.variables.variable(text) {
            VariableState::Resolved(value) => Ok(CellValue::Text(value)),
            VariableState::Pending => Err(ErrorKind::DynamicVariableResolving),
            VariableState::Unresolved => Err(ErrorKind::DynamicVariable),
        }
    }
}

/// Resolve `cell_text` on `sheet` in one call.
pub fn resolve(
    cell_text: &str,
    cells: &dyn CellSource,
    variables: &dyn VariableResolver,
    evaluator: &dyn Evaluator,
    options: &ResolveOptions,
    sheet: &str,
) -> Result<CellValue, ErrorKind> {
    FormulaResolver::new(cells, variables, evaluator)
        .with_options(options.clone())
        .resolve(cell_text, sheet)
}
