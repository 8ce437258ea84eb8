pub mod export;
pub mod filter;
pub mod import;

pub use export::{form_entries_sheet, schools_sheet, to_xlsx, ExportError, Sheet};
pub use filter::{Filter, FilterData, FilterError};
pub use import::{import_schools, import_users, parse_users, ImportError, ImportReport, SkippedRow};
