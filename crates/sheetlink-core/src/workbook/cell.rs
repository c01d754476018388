//! Stored cell content.
//!
//! A [`Cell`] keeps the raw text the author typed. Whether it is a formula is
//! decided by the leading `=` alone; the formula body is cached alongside and
//! kept in sync by [`Cell::set_text`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sheetlink_engine::engine::FORMULA_SIGIL;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    text: String,
    formula: Option<String>,
    pub style: Option<usize>,
    /// Columns and rows spanned when this cell is the top-left of a merge.
    pub merge: Option<(usize, usize)>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, String>,
}

impl Cell {
    pub fn new(text: &str) -> Cell {
        let mut cell = Cell::default();
        cell.set_text(text);
        cell
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Formula body without the sigil, trimmed. `None` for plain content.
    pub fn formula(&self) -> Option<&str> {
        self.formula.as_deref()
    }

    pub fn is_formula(&self) -> bool {
        self.formula.is_some()
    }

    pub fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
        self.formula = text
            .strip_prefix(FORMULA_SIGIL)
            .map(|body| body.trim().to_string());
    }

    /// True when the cell carries nothing but (possibly empty) text.
    pub fn is_bare(&self) -> bool {
        self.style.is_none() && self.merge.is_none() && self.meta.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formula_cache_follows_text() {
        let mut cell = Cell::new("= A1 + 2 ");
        assert_eq!(cell.formula(), Some("A1 + 2"));
        assert_eq!(cell.text(), "= A1 + 2 ");

        cell.set_text("plain");
        assert!(!cell.is_formula());
        assert_eq!(cell.formula(), None);

        cell.set_text("=");
        assert_eq!(cell.formula(), Some(""));
    }

    #[test]
    fn test_is_bare() {
        let mut cell = Cell::new("x");
        assert!(cell.is_bare());
        cell.meta.insert("note".into(), "checked".into());
        assert!(!cell.is_bare());
    }
}
