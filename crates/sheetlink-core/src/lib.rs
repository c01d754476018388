//! sheetlink-core - UI-agnostic workbook model + storage.

pub mod config;
pub mod error;
pub mod storage;
pub mod variables;
pub mod workbook;

pub use config::Settings;
pub use error::{Result, SheetlinkError};
pub use variables::VariableMap;
pub use workbook::{Cell, Sheet, Workbook};

pub use sheetlink_engine::engine::{CellRef, CellValue, ErrorKind};
