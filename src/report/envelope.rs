use serde::Serialize;

use crate::models::{QueryRequest, Reading};
use crate::query::compiler::{Cardinality, CompiledQuery, TimeLabel};
use crate::query::ResolvedMode;

pub const NO_DATA_MESSAGE: &str = "Tidak ada data ditemukan";

/// One reading as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadingView {
    pub id: i64,
    pub device_unique_id: String,
    pub parameter_name: String,
    pub value: f64,
    pub recorded_at: String,
}

impl ReadingView {
    pub fn new(reading: Reading, label: TimeLabel) -> Self {
        Self {
            id: reading.id,
            recorded_at: label.format(reading.recorded_at),
            device_unique_id: reading.device_id,
            parameter_name: reading.parameter_name,
            value: reading.value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EnvelopeData {
    List(Vec<ReadingView>),
    One(ReadingView),
    /// Serialized as `null`.
    Empty,
}

impl EnvelopeData {
    pub fn len(&self) -> usize {
        match self {
            Self::List(rows) => rows.len(),
            Self::One(_) => 1,
            Self::Empty => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Uniform response wrapper for every flat read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub status: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_range: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    total: usize,
    data: EnvelopeData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Envelope {
    /// Wrap fetched rows. `rows` must already be in response order.
    pub fn from_rows(compiled: &CompiledQuery, req: &QueryRequest, rows: Vec<Reading>) -> Self {
        let label = compiled.time_label;
        let data = match compiled.cardinality {
            Cardinality::One if rows.len() <= 1 => match rows.into_iter().next() {
                Some(row) => EnvelopeData::One(ReadingView::new(row, label)),
                // A latest read with nothing to show is still an empty list.
                None if compiled.mode == ResolvedMode::SingleLatest => EnvelopeData::List(Vec::new()),
                None => EnvelopeData::Empty,
            },
            // Several summaries (one per parameter) stay a list.
            _ => EnvelopeData::List(
                rows.into_iter()
                    .map(|row| ReadingView::new(row, label))
                    .collect(),
            ),
        };

        let status = !data.is_empty();
        let echo = &compiled.echo;
        Self {
            status,
            filter: Some(compiled.filter.clone()),
            mode: Some(compiled.mode_label),
            timezone: Some(req.zone.label()),
            device_id: Some(req.device_param.clone()),
            month: echo.month.map(|m| m.month_label()),
            year: echo.month.map(|m| m.year_label()),
            time_range: echo.time_range,
            value: echo.value.map(|v| v.token()),
            limit: echo.limit,
            total: data.len(),
            data,
            message: (!status).then(|| NO_DATA_MESSAGE.to_string()),
        }
    }

    /// Rejected request: nothing was queried.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: false,
            filter: None,
            mode: None,
            timezone: None,
            device_id: None,
            month: None,
            year: None,
            time_range: None,
            value: None,
            limit: None,
            total: 0,
            data: EnvelopeData::List(Vec::new()),
            message: Some(message.into()),
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn data(&self) -> &EnvelopeData {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MonthYear, Period, ReadMode, ValueAggregate};
    use crate::query::{compile, resolve, DisplayZone};
    use chrono::NaiveDate;

    fn now() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 11, 20)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn reading(id: i64, parameter: &str, value: f64) -> Reading {
        Reading {
            id,
            device_id: "dev1".into(),
            parameter_name: parameter.into(),
            value,
            recorded_at: NaiveDate::from_ymd_opt(2024, 11, 20)
                .unwrap()
                .and_hms_opt(9, 15, 0)
                .unwrap(),
        }
    }

    fn compiled(req: &QueryRequest) -> CompiledQuery {
        compile(resolve(req).unwrap(), req, now()).unwrap()
    }

    #[test]
    fn test_total_matches_list() {
        let req = QueryRequest::for_device("dev1");
        let env = Envelope::from_rows(
            &compiled(&req),
            &req,
            vec![reading(1, "suhu", 20.0), reading(2, "kelembapan", 60.0)],
        );
        assert!(env.status);
        assert_eq!(env.total(), 2);
        assert_eq!(env.data().len(), env.total());

        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["filter"], "all_parameters");
        assert_eq!(json["mode"], "raw");
        assert_eq!(json["timezone"], "WIB");
        assert_eq!(json["time_range"], "24_hours");
        assert_eq!(json["data"][0]["recorded_at"], "2024-11-20 09:15:00");
        assert!(json.get("message").is_none());
        assert!(json.get("limit").is_none());
    }

    #[test]
    fn test_single_row_is_object() {
        let mut req = QueryRequest::for_device("dev1");
        req.mode = ReadMode::Latest;
        let env = Envelope::from_rows(&compiled(&req), &req, vec![reading(7, "suhu", 21.5)]);
        assert_eq!(env.total(), 1);
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["data"]["id"], 7);
        assert_eq!(json["data"]["value"], 21.5);
    }

    #[test]
    fn test_no_data_keeps_metadata() {
        let mut req = QueryRequest::for_device("dev1");
        req.mode = ReadMode::Latest;
        req.zone = DisplayZone::Wit;
        let env = Envelope::from_rows(&compiled(&req), &req, Vec::new());
        assert!(!env.status);
        assert_eq!(env.total(), 0);
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["data"], serde_json::json!([]));
        assert_eq!(json["message"], NO_DATA_MESSAGE);
        assert_eq!(json["timezone"], "WIT");

        let mut req = QueryRequest::for_device("dev1");
        req.parameters = vec!["suhu".into()];
        req.value = ValueAggregate::Max;
        req.period = Period::WeekToDate;
        let json = serde_json::to_value(Envelope::from_rows(&compiled(&req), &req, Vec::new())).unwrap();
        assert_eq!(json["filter"], "minggu_ini_high");
        assert!(json["data"].is_null());

        let req = QueryRequest::for_device("dev1");
        let json = serde_json::to_value(Envelope::from_rows(&compiled(&req), &req, Vec::new())).unwrap();
        assert_eq!(json["data"], serde_json::json!([]));
    }

    #[test]
    fn test_month_is_echoed() {
        let mut req = QueryRequest::for_device("dev1");
        req.month = Some(MonthYear { month: 3, year: 2024 });
        req.limit = Some(10);
        let json = serde_json::to_value(Envelope::from_rows(&compiled(&req), &req, Vec::new())).unwrap();
        assert_eq!(json["month"], "03");
        assert_eq!(json["year"], "2024");
        assert_eq!(json["limit"], 10);
    }

    #[test]
    fn test_failure_envelope() {
        let json = serde_json::to_value(Envelope::failure("periode tidak valid")).unwrap();
        assert_eq!(json["status"], false);
        assert_eq!(json["total"], 0);
        assert_eq!(json["data"], serde_json::json!([]));
        assert_eq!(json["message"], "periode tidak valid");
        assert!(json.get("filter").is_none());
    }
}
