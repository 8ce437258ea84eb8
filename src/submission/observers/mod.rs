mod access;
mod data_preparation;
mod database;
mod enrichment;
mod notification;
mod validation;

pub use access::{AccessObserver, TransitionObserver};
pub use data_preparation::DataPreparationObserver;
pub use database::FormWriterObserver;
pub use enrichment::RecordBuilderObserver;
pub use notification::StatusNotificationObserver;
pub use validation::SchemaValidationObserver;
