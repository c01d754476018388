use super::Workbook;
use crate::error::Result;
use sheetlink_engine::engine::{
    CellRef, CellSource, CellValue, ErrorKind, FormulaResolver, variable_tokens,
};

impl Workbook {
    fn resolver(&self) -> FormulaResolver<'_> {
        FormulaResolver::new(self, self.variables(), &self.evaluator)
            .with_options(self.options().clone())
    }

    /// Resolve the stored text of `cell` on `sheet`. An unknown sheet is `#REF!`.
    pub fn resolve_cell(&self, sheet: &str, cell: CellRef) -> std::result::Result<CellValue, ErrorKind> {
        if !self.has_sheet(sheet) {
            return Err(ErrorKind::Ref);
        }
        let value = self.resolver().resolve_cell(cell.col, cell.row, sheet);
        tracing::debug!(sheet, cell = %cell, ?value, "resolved cell");
        value
    }

    /// Resolve arbitrary cell text as if it were stored on `sheet`.
    pub fn resolve_text(&self, sheet: &str, text: &str) -> std::result::Result<CellValue, ErrorKind> {
        if !self.has_sheet(sheet) {
            return Err(ErrorKind::Ref);
        }
        self.resolver().resolve(text, sheet)
    }

    /// What a renderer shows for `cell`: the value, or the error sentinel.
    pub fn display_value(&self, sheet: &str, cell: CellRef) -> String {
        match self.resolve_cell(sheet, cell) {
            Ok(value) => value.to_string(),
            Err(kind) => kind.sentinel().to_string(),
        }
    }

    /// Dynamic variable tokens used by the cells of `sheet`, in row-major
    /// order of first use. Empty when no trigger is configured.
    pub fn variables_in(&self, sheet: &str) -> Result<Vec<String>> {
        let sheet = &self.sheets[self.sheet_index(sheet)?];
        let Some(trigger) = self.options().trigger else {
            return Ok(Vec::new());
        };
        let mut tokens: Vec<String> = Vec::new();
        for (_, text) in sheet.cells() {
            for token in variable_tokens(&text, trigger) {
                if !tokens.contains(&token) {
                    tokens.push(token);
                }
            }
        }
        Ok(tokens)
    }
}
