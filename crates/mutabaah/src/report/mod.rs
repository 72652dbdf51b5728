mod export;
mod pivot;
pub mod views;

pub use export::{write_csv, ExportError};
pub use pivot::build_pivot;
pub use views::{PersonFilter, PivotMatrix, PivotRow, PivotTotalRow};
