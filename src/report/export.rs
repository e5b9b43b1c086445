//! Tabular export: a pivot table becomes a header plus numbered rows, and a
//! [`TableSink`] renders that stream as CSV text or a spreadsheet.

use std::collections::HashMap;

use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use thiserror::Error;

use crate::query::DisplayZone;
use crate::report::pivot::{format_value, PivotTable};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const SHEET_NAME: &str = "Data Sensor";
const COLUMN_WIDTH: f64 = 15.0;
const NUMBER_FORMAT: &str = "0.00";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("spreadsheet error: {0}")]
    Spreadsheet(#[from] XlsxError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("too many columns for a worksheet: {0}")]
    TooManyColumns(usize),
}

/// Header labels keyed by sensor code, parsed from `code:label,...`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorLabels(HashMap<String, String>);

impl SensorLabels {
    /// Entries without a `:` or with an empty side are ignored.
    pub fn parse(raw: &str) -> Self {
        let labels = raw
            .split(',')
            .filter_map(|pair| {
                let (code, label) = pair.split_once(':')?;
                let (code, label) = (code.trim(), label.trim());
                (!code.is_empty() && !label.is_empty())
                    .then(|| (code.to_string(), label.to_string()))
            })
            .collect();
        Self(labels)
    }

    /// Configured label, or the upper-cased code.
    pub fn label_for(&self, code: &str) -> String {
        self.0
            .get(code)
            .cloned()
            .unwrap_or_else(|| code.to_uppercase())
    }
}

/// `["No", <sensor labels>..., "Waktu (<ZONE>)"]`
pub fn header(parameters: &[String], labels: &SensorLabels, zone: DisplayZone) -> Vec<String> {
    let mut header = Vec::with_capacity(parameters.len() + 2);
    header.push("No".to_string());
    header.extend(parameters.iter().map(|p| labels.label_for(p)));
    header.push(format!("Waktu ({})", zone.label()));
    header
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportRow {
    /// 1-based.
    pub number: usize,
    /// One per requested parameter, in header order.
    pub values: Vec<f64>,
    pub time_key: String,
}

pub fn rows(table: &PivotTable) -> Vec<ExportRow> {
    table
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| ExportRow {
            number: i + 1,
            values: table.parameters.iter().map(|p| row.value(p)).collect(),
            time_key: row.key.clone(),
        })
        .collect()
}

/// Renders the row stream. Sinks decide presentation only, never content.
pub trait TableSink {
    fn write_header(&mut self, header: &[String]) -> Result<(), ExportError>;
    fn write_row(&mut self, row: &ExportRow) -> Result<(), ExportError>;
    fn finish(self) -> Result<Vec<u8>, ExportError>;
}

pub fn serialize<S: TableSink>(
    mut sink: S,
    header: &[String],
    rows: &[ExportRow],
) -> Result<Vec<u8>, ExportError> {
    sink.write_header(header)?;
    for row in rows {
        sink.write_row(row)?;
    }
    sink.finish()
}

/// UTF-8 CSV with a byte-order mark so spreadsheet tools pick the encoding.
pub struct CsvSink {
    writer: csv::Writer<Vec<u8>>,
}

impl CsvSink {
    pub fn new() -> Self {
        Self {
            writer: csv::Writer::from_writer(UTF8_BOM.to_vec()),
        }
    }
}

impl Default for CsvSink {
    fn default() -> Self {
        Self::new()
    }
}

impl TableSink for CsvSink {
    fn write_header(&mut self, header: &[String]) -> Result<(), ExportError> {
        self.writer.write_record(header)?;
        Ok(())
    }

    fn write_row(&mut self, row: &ExportRow) -> Result<(), ExportError> {
        let mut record = Vec::with_capacity(row.values.len() + 2);
        record.push(row.number.to_string());
        record.extend(row.values.iter().map(|v| format_value(*v)));
        record.push(row.time_key.clone());
        self.writer.write_record(&record)?;
        Ok(())
    }

    fn finish(self) -> Result<Vec<u8>, ExportError> {
        self.writer
            .into_inner()
            .map_err(|e| ExportError::Io(e.into_error()))
    }
}

/// Single-sheet workbook. Sensor cells are numbers shown with two decimals;
/// the time column is text.
pub struct SpreadsheetSink {
    sheet: Worksheet,
    number_format: Format,
    next_row: u32,
}

impl SpreadsheetSink {
    pub fn new() -> Result<Self, ExportError> {
        let mut sheet = Worksheet::new();
        sheet.set_name(SHEET_NAME)?;
        Ok(Self {
            sheet,
            number_format: Format::new().set_num_format(NUMBER_FORMAT),
            next_row: 0,
        })
    }

    fn advance(&mut self) -> u32 {
        let row = self.next_row;
        self.next_row += 1;
        row
    }
}

fn column(index: usize) -> Result<u16, ExportError> {
    u16::try_from(index).map_err(|_| ExportError::TooManyColumns(index))
}

impl TableSink for SpreadsheetSink {
    fn write_header(&mut self, header: &[String]) -> Result<(), ExportError> {
        let row = self.advance();
        for (i, label) in header.iter().enumerate() {
            let col = column(i)?;
            self.sheet.write_string(row, col, label.as_str())?;
            self.sheet.set_column_width(col, COLUMN_WIDTH)?;
        }
        Ok(())
    }

    fn write_row(&mut self, row: &ExportRow) -> Result<(), ExportError> {
        let at = self.advance();
        self.sheet.write_number(at, 0, row.number as f64)?;
        for (i, value) in row.values.iter().enumerate() {
            self.sheet
                .write_number_with_format(at, column(i + 1)?, *value, &self.number_format)?;
        }
        self.sheet
            .write_string(at, column(row.values.len() + 1)?, row.time_key.as_str())?;
        Ok(())
    }

    fn finish(self) -> Result<Vec<u8>, ExportError> {
        let mut workbook = Workbook::new();
        workbook.push_worksheet(self.sheet);
        Ok(workbook.save_to_buffer()?)
    }
}
