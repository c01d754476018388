//! sheetlink_engine - formula resolution for multi-sheet workbooks.

pub(crate) mod builtins;
pub mod engine;
