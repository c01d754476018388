use dashmap::DashMap;

use super::cell::Cell;
use crate::config::{DEFAULT_SHEET_NAME, Settings};
use crate::error::{Result, SheetlinkError};
use crate::variables::VariableMap;
use sheetlink_engine::engine::{CellRange, CellRef, CellSource, ResolveOptions, RhaiEvaluator};

/// Sparse cell storage keyed by position.
pub type Grid = DashMap<CellRef, Cell>;

/// A named grid of cells.
pub struct Sheet {
    name: String,
    pub(crate) cells: Grid,
}

impl Sheet {
    pub fn new(name: &str) -> Self {
        Sheet {
            name: name.to_string(),
            cells: Grid::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stored text at `cell`, `""` when empty.
    pub fn get(&self, cell: &CellRef) -> String {
        self.cells
            .get(cell)
            .map(|entry| entry.text().to_string())
            .unwrap_or_default()
    }

    pub fn cell(&self, cell: &CellRef) -> Option<Cell> {
        self.cells.get(cell).map(|entry| entry.value().clone())
    }

    /// Store `text` at `cell`. Empty text clears the cell unless it still
    /// carries style, merge or metadata.
    pub fn set(&self, cell: CellRef, text: &str) {
        if text.is_empty() && !self.cells.contains_key(&cell) {
            return;
        }
        self.update(cell, |c| c.set_text(text));
    }

    /// Apply `update` to the cell at `cell`, creating it when missing. Cells
    /// left empty and bare are removed.
    pub fn update(&self, cell: CellRef, update: impl FnOnce(&mut Cell)) {
        let mut entry = self.cells.entry(cell).or_default();
        update(entry.value_mut());
        let remove = entry.text().is_empty() && entry.is_bare();
        drop(entry);
        if remove {
            self.cells.remove(&cell);
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cells with text, in row-major order.
    pub fn cells(&self) -> Vec<(CellRef, String)> {
        let mut cells: Vec<(CellRef, String)> = self
            .cells
            .iter()
            .filter(|entry| !entry.text().is_empty())
            .map(|entry| (*entry.key(), entry.text().to_string()))
            .collect();
        cells.sort_by_key(|(cell, _)| (cell.row, cell.col));
        cells
    }

    /// Smallest range covering every cell with text.
    pub fn used_range(&self) -> Option<CellRange> {
        let mut bounds: Option<(CellRef, CellRef)> = None;
        for entry in self.cells.iter().filter(|entry| !entry.text().is_empty()) {
            let cell = *entry.key();
            bounds = Some(match bounds {
                None => (cell, cell),
                Some((min, max)) => (
                    CellRef::new(min.col.min(cell.col), min.row.min(cell.row)),
                    CellRef::new(max.col.max(cell.col), max.row.max(cell.row)),
                ),
            });
        }
        bounds.map(|(min, max)| CellRange::new(min, max))
    }
}

/// UI-agnostic workbook: ordered sheets, host variables and resolution settings.
pub struct Workbook {
    pub(crate) sheets: Vec<Sheet>,
    active: usize,
    variables: VariableMap,
    options: ResolveOptions,
    pub(crate) evaluator: RhaiEvaluator,
}

impl Workbook {
    /// Create a workbook with a single empty `Sheet1`.
    pub fn new() -> Self {
        Self::with_settings(&Settings::default())
    }

    pub fn with_settings(settings: &Settings) -> Self {
        let name = settings.workbook.default_sheet.trim();
        let name = if validate_sheet_name(name).is_ok() {
            name
        } else {
            tracing::warn!(name, "invalid default sheet name, using {}", DEFAULT_SHEET_NAME);
            DEFAULT_SHEET_NAME
        };
        Workbook {
            sheets: vec![Sheet::new(name)],
            active: 0,
            variables: VariableMap::new(),
            options: settings.engine.clone(),
            evaluator: RhaiEvaluator::new(),
        }
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(Sheet::name).collect()
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|sheet| sheet.name == name)
    }

    pub(crate) fn sheet_index(&self, name: &str) -> Result<usize> {
        self.sheets
            .iter()
            .position(|sheet| sheet.name == name)
            .ok_or_else(|| SheetlinkError::UnknownSheet(name.to_string()))
    }

    fn require_sheet(&self, name: &str) -> Result<&Sheet> {
        Ok(&self.sheets[self.sheet_index(name)?])
    }

    pub fn add_sheet(&mut self, name: &str) -> Result<&Sheet> {
        validate_sheet_name(name)?;
        if self.sheet(name).is_some() {
            return Err(SheetlinkError::DuplicateSheet(name.to_string()));
        }
        tracing::debug!(sheet = name, "added sheet");
        self.sheets.push(Sheet::new(name));
        Ok(&self.sheets[self.sheets.len() - 1])
    }

    pub fn active_sheet(&self) -> &Sheet {
        &self.sheets[self.active]
    }

    pub fn set_active(&mut self, name: &str) -> Result<()> {
        self.active = self.sheet_index(name)?;
        Ok(())
    }

    pub fn set_cell_text(&mut self, sheet: &str, cell: CellRef, text: &str) -> Result<()> {
        self.require_sheet(sheet)?.set(cell, text);
        Ok(())
    }

    pub fn cell_text(&self, sheet: &str, cell: CellRef) -> Result<String> {
        Ok(self.require_sheet(sheet)?.get(&cell))
    }

    pub fn cell(&self, sheet: &str, cell: CellRef) -> Result<Option<Cell>> {
        Ok(self.require_sheet(sheet)?.cell(&cell))
    }

    pub fn set_cell_style(&mut self, sheet: &str, cell: CellRef, style: Option<usize>) -> Result<()> {
        self.require_sheet(sheet)?.update(cell, |c| c.style = style);
        Ok(())
    }

    /// Record a merge of `cols` x `rows` cells anchored at `cell`.
    pub fn set_cell_merge(&mut self, sheet: &str, cell: CellRef, span: Option<(usize, usize)>) -> Result<()> {
        self.require_sheet(sheet)?.update(cell, |c| c.merge = span);
        Ok(())
    }

    /// Set (or with `None`, clear) one metadata entry of a cell.
    pub fn set_cell_meta(&mut self, sheet: &str, cell: CellRef, key: &str, value: Option<&str>) -> Result<()> {
        self.require_sheet(sheet)?.update(cell, |c| match value {
            Some(value) => {
                c.meta.insert(key.to_string(), value.to_string());
            }
            None => {
                c.meta.remove(key);
            }
        });
        Ok(())
    }

    pub fn used_range(&self, sheet: &str) -> Result<Option<CellRange>> {
        Ok(self.require_sheet(sheet)?.used_range())
    }

    pub fn variables(&self) -> &VariableMap {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut VariableMap {
        &mut self.variables
    }

    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: ResolveOptions) {
        self.options = options;
    }
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}

/// Cell text as the resolver sees it. `None` means the active sheet.
impl CellSource for Workbook {
    fn cell_text(&self, col: usize, row: usize, sheet: Option<&str>) -> String {
        let sheet = match sheet {
            Some(name) => self.sheet(name),
            None => Some(self.active_sheet()),
        };
        sheet
            .map(|sheet| sheet.get(&CellRef::new(col, row)))
            .unwrap_or_default()
    }

    fn has_sheet(&self, sheet: &str) -> bool {
        self.sheet(sheet).is_some()
    }
}

/// Sheet names must be non-empty and must not contain `'` or `!`, which
/// delimit qualified references.
pub fn validate_sheet_name(name: &str) -> Result<()> {
    if name.trim().is_empty() || name.contains(['\'', '!']) {
        return Err(SheetlinkError::InvalidSheetName(name.to_string()));
    }
    Ok(())
}
