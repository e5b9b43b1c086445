use chrono::NaiveDate;

use crate::query::timezone::DisplayZone;
use crate::report::export::SensorLabels;

/// Time span a read covers (`periode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Period {
    #[default]
    Day,
    WeekToDate,
    Month,
    Now,
}

impl Period {
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_lowercase().as_str() {
            "" | "hari" | "day" => Some(Self::Day),
            "minggu_ini" | "week" => Some(Self::WeekToDate),
            "bulan" | "month" => Some(Self::Month),
            "now" => Some(Self::Now),
            _ => None,
        }
    }

    /// Wire token, also used as the envelope filter label.
    pub const fn token(self) -> &'static str {
        match self {
            Self::Day => "hari",
            Self::WeekToDate => "minggu_ini",
            Self::Month => "bulan",
            Self::Now => "now",
        }
    }
}

/// Read strategy requested by the caller (`mode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadMode {
    #[default]
    Raw,
    Rollup,
    Latest,
}

impl ReadMode {
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_lowercase().as_str() {
            "" | "raw" => Some(Self::Raw),
            "ringkas" | "rollup" => Some(Self::Rollup),
            "latest" => Some(Self::Latest),
            _ => None,
        }
    }

    pub const fn token(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Rollup => "ringkas",
            Self::Latest => "latest",
        }
    }
}

/// High/low/average selector (`value`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueAggregate {
    #[default]
    None,
    Max,
    Min,
    Avg,
}

impl ValueAggregate {
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_lowercase().as_str() {
            "" => Some(Self::None),
            "high" => Some(Self::Max),
            "low" => Some(Self::Min),
            "avg" => Some(Self::Avg),
            _ => None,
        }
    }

    pub const fn token(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Max => "high",
            Self::Min => "low",
            Self::Avg => "avg",
        }
    }

    pub const fn is_none(self) -> bool {
        matches!(self, Self::None)
    }
}

/// Export file flavour (`out`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Excel,
    Csv,
}

impl OutputFormat {
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_lowercase().as_str() {
            "" | "excel" => Some(Self::Excel),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }

    pub const fn extension(self) -> &'static str {
        match self {
            Self::Excel => "xlsx",
            Self::Csv => "csv",
        }
    }

    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Excel => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Self::Csv => "text/csv; charset=utf-8",
        }
    }
}

/// Calendar month selected with `bulan` (and optionally `tahun`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthYear {
    pub month: u32,
    pub year: i32,
}

impl MonthYear {
    pub fn first_day(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                month: 1,
                year: self.year + 1,
            }
        } else {
            Self {
                month: self.month + 1,
                year: self.year,
            }
        }
    }

    pub fn month_label(self) -> String {
        format!("{:02}", self.month)
    }

    pub fn year_label(self) -> String {
        self.year.to_string()
    }
}

/// Validated view of the read endpoint's query string.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    /// `device_id` exactly as supplied; echoed back in the envelope.
    pub device_param: String,
    pub device_ids: Vec<String>,
    /// True when `device_id` was written as a comma list.
    pub device_list: bool,
    pub parameters: Vec<String>,
    /// True when `jenis` was written as a comma list.
    pub parameter_list: bool,
    pub period: Period,
    pub mode: ReadMode,
    pub value: ValueAggregate,
    pub date: Option<NaiveDate>,
    pub month: Option<MonthYear>,
    pub zone: DisplayZone,
    /// Caller-supplied row limit; `None` means the mode default.
    pub limit: Option<u32>,
}

impl QueryRequest {
    /// Minimal request for one device, everything else defaulted.
    pub fn for_device(device_id: &str) -> Self {
        Self {
            device_param: device_id.to_string(),
            device_ids: vec![device_id.to_string()],
            device_list: false,
            parameters: Vec::new(),
            parameter_list: false,
            period: Period::Day,
            mode: ReadMode::Raw,
            value: ValueAggregate::None,
            date: None,
            month: None,
            zone: DisplayZone::Wib,
            limit: None,
        }
    }

    pub fn has_parameter(&self) -> bool {
        !self.parameters.is_empty()
    }
}

/// Validated view of the export endpoint's query string.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub device_id: String,
    pub month: MonthYear,
    /// `bulan` and `tahun` as supplied, used verbatim in the file name.
    pub month_param: String,
    pub year_param: String,
    pub sensors: Vec<String>,
    pub labels: SensorLabels,
    pub zone: DisplayZone,
    pub format: OutputFormat,
}

impl ExportRequest {
    pub fn filename(&self) -> String {
        format!(
            "Report_AllSensors_{}_{}_{}.{}",
            self.month_param,
            self.year_param,
            self.zone.label(),
            self.format.extension()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_accepts_both_vocabularies() {
        assert_eq!(Period::parse(""), Some(Period::Day));
        assert_eq!(Period::parse("hari"), Some(Period::Day));
        assert_eq!(Period::parse("Minggu_Ini"), Some(Period::WeekToDate));
        assert_eq!(Period::parse("month"), Some(Period::Month));
        assert_eq!(Period::parse("now"), Some(Period::Now));
        assert_eq!(Period::parse("tahun"), None);
    }

    #[test]
    fn test_value_aggregate_tokens() {
        assert_eq!(ValueAggregate::parse("high"), Some(ValueAggregate::Max));
        assert_eq!(ValueAggregate::parse("LOW"), Some(ValueAggregate::Min));
        assert_eq!(ValueAggregate::parse(""), Some(ValueAggregate::None));
        assert_eq!(ValueAggregate::parse("median"), None);
        assert_eq!(ValueAggregate::Avg.token(), "avg");
    }

    #[test]
    fn test_month_rollover() {
        let dec = MonthYear { month: 12, year: 2024 };
        assert_eq!(dec.next(), MonthYear { month: 1, year: 2025 });
        assert_eq!(dec.month_label(), "12");
        let feb = MonthYear { month: 2, year: 2024 };
        assert_eq!(feb.month_label(), "02");
    }

    #[test]
    fn test_output_format() {
        assert_eq!(OutputFormat::parse(""), Some(OutputFormat::Excel));
        assert_eq!(OutputFormat::parse("CSV"), Some(OutputFormat::Csv));
        assert_eq!(OutputFormat::parse("pdf"), None);
    }
}
