mod reading;
mod request;

pub use reading::Reading;
pub use request::{
    ExportRequest, MonthYear, OutputFormat, Period, QueryRequest, ReadMode, ValueAggregate,
};
