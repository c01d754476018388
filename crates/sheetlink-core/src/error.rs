//! Error types for Sheetlink core.

use thiserror::Error;

/// Errors that can occur while building or loading a workbook
#[derive(Error, Debug)]
pub enum SheetlinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings error: {0}")]
    Settings(#[from] toml::de::Error),

    #[error("Unknown sheet: {0}")]
    UnknownSheet(String),

    #[error("Sheet already exists: {0}")]
    DuplicateSheet(String),

    #[error("Invalid sheet name: {0:?}")]
    InvalidSheetName(String),

    #[error("Invalid cell reference: {0}")]
    InvalidCellRef(String),

    #[error("CSV file is empty")]
    EmptyCsv,
}

pub type Result<T> = std::result::Result<T, SheetlinkError>;
