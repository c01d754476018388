//! Settings file (`config.toml`).
//!
//! ```toml
//! [engine]
//! trigger = "#"
//! max_depth = 64
//! max_range_cells = 100000
//!
//! [workbook]
//! default_sheet = "Sheet1"
//! ```
//!
//! Every key is optional.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use sheetlink_engine::engine::ResolveOptions;

pub const DEFAULT_SHEET_NAME: &str = "Sheet1";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub engine: ResolveOptions,
    pub workbook: WorkbookSettings,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkbookSettings {
    /// Name of the sheet a new workbook starts with.
    pub default_sheet: String,
}

impl Default for WorkbookSettings {
    fn default() -> Self {
        WorkbookSettings {
            default_sheet: DEFAULT_SHEET_NAME.to_string(),
        }
    }
}

impl Settings {
    pub fn from_toml_str(text: &str) -> Result<Settings> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Settings> {
        let content = std::fs::read_to_string(path)?;
        let settings = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    /// Like [`Settings::load`], but a missing file means defaults.
    pub fn load_or_default(path: &Path) -> Result<Settings> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Settings::default());
        }
        Self::load(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SheetlinkError;
    use sheetlink_engine::engine::{DEFAULT_MAX_DEPTH, DEFAULT_MAX_RANGE_CELLS};

    #[test]
    fn test_full_settings() {
        let settings = Settings::from_toml_str(
            r#"
            [engine]
            trigger = "@"
            max_depth = 8
            max_range_cells = 500

            [workbook]
            default_sheet = "Main"
            "#,
        )
        .unwrap();
        assert_eq!(settings.engine.trigger, Some('@'));
        assert_eq!(settings.engine.max_depth, 8);
        assert_eq!(settings.engine.max_range_cells, 500);
        assert_eq!(settings.workbook.default_sheet, "Main");
    }

    #[test]
    fn test_missing_keys_take_defaults() {
        let settings = Settings::from_toml_str("[engine]\ntrigger = \"#\"\n").unwrap();
        assert_eq!(settings.engine.trigger, Some('#'));
        assert_eq!(settings.engine.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(settings.engine.max_range_cells, DEFAULT_MAX_RANGE_CELLS);
        assert_eq!(settings.workbook.default_sheet, DEFAULT_SHEET_NAME);

        assert_eq!(Settings::from_toml_str("").unwrap(), Settings::default());
    }

    #[test]
    fn test_invalid_settings_are_errors() {
        let err = Settings::from_toml_str("[engine]\nmax_depth = \"deep\"\n").unwrap_err();
        assert!(matches!(err, SheetlinkError::Settings(_)));
    }

    #[test]
    fn test_load_or_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        assert_eq!(Settings::load_or_default(&path).unwrap(), Settings::default());

        std::fs::write(&path, "[workbook]\ndefault_sheet = \"Data\"\n").unwrap();
        let settings = Settings::load_or_default(&path).unwrap();
        assert_eq!(settings.workbook.default_sheet, "Data");
    }
}
