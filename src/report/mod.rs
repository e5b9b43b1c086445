pub mod envelope;
pub mod export;
pub mod pivot;

pub use envelope::{Envelope, EnvelopeData, ReadingView, NO_DATA_MESSAGE};
pub use export::{CsvSink, ExportError, ExportRow, SensorLabels, SpreadsheetSink, TableSink};
pub use pivot::{format_value, PivotRow, PivotTable};
