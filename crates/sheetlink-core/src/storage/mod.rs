//! File formats for workbook persistence.

pub mod csv;

pub use csv::{export_csv, import_csv, import_csv_as, parse_csv, write_csv};
