//! Raw query-string parameters and their validation.
//!
//! Every field is taken as an optional string so that malformed values can
//! be reported with a meaningful message instead of an extractor rejection.

use chrono::{Datelike, NaiveDate};
use serde::Deserialize;

use crate::error::{ServiceError, ServiceResult};
use crate::models::{
    ExportRequest, MonthYear, OutputFormat, Period, QueryRequest, ReadMode, ValueAggregate,
};
use crate::query::timezone::DisplayZone;
use crate::report::export::SensorLabels;

#[derive(Debug, Default, Clone, Deserialize)]
pub struct ReadParams {
    pub device_id: Option<String>,
    pub jenis: Option<String>,
    pub periode: Option<String>,
    pub mode: Option<String>,
    pub tahun: Option<String>,
    pub bulan: Option<String>,
    pub tanggal: Option<String>,
    pub value: Option<String>,
    pub zonawaktu: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct ExportParams {
    pub device_id: Option<String>,
    pub bulan: Option<String>,
    pub tahun: Option<String>,
    pub sensors: Option<String>,
    pub sensor_meta: Option<String>,
    pub zonawaktu: Option<String>,
    pub out: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Split a comma list, dropping blanks.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_zone(raw: &Option<String>) -> ServiceResult<DisplayZone> {
    DisplayZone::parse(raw.as_deref().unwrap_or(""))
        .ok_or_else(|| ServiceError::validation("zonawaktu harus wib, wita, atau wit"))
}

/// Parse `bulan` in one of the forms `MM`, `MM-YYYY` or `MM-DD-YYYY`.
///
/// A bare month takes its year from `tahun`, falling back to `current_year`.
pub fn parse_month(bulan: &str, tahun: Option<&str>, current_year: i32) -> ServiceResult<MonthYear> {
    let invalid = || ServiceError::validation("format bulan/tahun salah");
    let parts: Vec<&str> = bulan.trim().split('-').map(str::trim).collect();

    let (month, year) = match parts.as_slice() {
        [month] => (*month, tahun.map(str::trim).filter(|t| !t.is_empty())),
        [month, year] => (*month, Some(*year)),
        [month, _day, year] => (*month, Some(*year)),
        _ => return Err(invalid()),
    };

    let month: u32 = month.parse().map_err(|_| invalid())?;
    let year: i32 = match year {
        Some(y) => y.parse().map_err(|_| invalid())?,
        None => current_year,
    };

    if !(1..=12).contains(&month) || !(1..=9999).contains(&year) {
        return Err(invalid());
    }

    Ok(MonthYear { month, year })
}

/// Export month: `bulan` is a bare month number and `tahun` the year, both
/// plain digits since they are echoed into the download filename.
fn parse_export_month(bulan: &str, tahun: &str) -> ServiceResult<MonthYear> {
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !digits(bulan) || !digits(tahun) {
        return Err(ServiceError::validation("format bulan/tahun salah"));
    }
    parse_month(bulan, Some(tahun), 0)
}

fn parse_limit(raw: Option<&str>) -> ServiceResult<Option<u32>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let limit: u32 = raw
        .parse()
        .map_err(|_| ServiceError::validation("limit harus bilangan bulat positif"))?;
    Ok((limit > 0).then_some(limit))
}

impl ReadParams {
    /// Validate into a [`QueryRequest`]. `today` supplies the default year.
    pub fn into_request(self, today: NaiveDate) -> ServiceResult<QueryRequest> {
        let device_param = non_empty(&self.device_id)
            .ok_or_else(|| ServiceError::validation("device_id wajib diisi"))?
            .to_string();
        let device_ids = split_list(&device_param);
        if device_ids.is_empty() {
            return Err(ServiceError::validation("device_id wajib diisi"));
        }

        let jenis = non_empty(&self.jenis).unwrap_or("");
        let parameters = split_list(jenis);

        let period = Period::parse(self.periode.as_deref().unwrap_or(""))
            .ok_or_else(|| ServiceError::validation("periode tidak valid"))?;
        let mode = ReadMode::parse(self.mode.as_deref().unwrap_or(""))
            .ok_or_else(|| ServiceError::validation("mode hanya raw | ringkas | latest"))?;
        let value = ValueAggregate::parse(self.value.as_deref().unwrap_or(""))
            .ok_or_else(|| ServiceError::validation("value hanya high | low | avg"))?;
        let zone = parse_zone(&self.zonawaktu)?;

        let date = non_empty(&self.tanggal)
            .map(|t| NaiveDate::parse_from_str(t, "%Y-%m-%d"))
            .transpose()
            .map_err(|_| ServiceError::validation("format tanggal harus YYYY-MM-DD"))?;

        let month = non_empty(&self.bulan)
            .map(|b| parse_month(b, non_empty(&self.tahun), today.year()))
            .transpose()?;

        let limit = parse_limit(non_empty(&self.limit))?;

        Ok(QueryRequest {
            device_list: device_param.contains(','),
            device_param,
            device_ids,
            parameter_list: jenis.contains(','),
            parameters,
            period,
            mode,
            value,
            date,
            month,
            zone,
            limit,
        })
    }
}

impl ExportParams {
    pub fn into_request(self) -> ServiceResult<ExportRequest> {
        let zone = parse_zone(&self.zonawaktu)?;
        let format = OutputFormat::parse(self.out.as_deref().unwrap_or(""))
            .ok_or_else(|| ServiceError::validation("out harus excel atau csv"))?;

        let (Some(device_id), Some(bulan), Some(tahun), Some(sensors)) = (
            non_empty(&self.device_id),
            non_empty(&self.bulan),
            non_empty(&self.tahun),
            non_empty(&self.sensors),
        ) else {
            return Err(ServiceError::validation(
                "device_id, bulan, tahun, sensors wajib diisi",
            ));
        };

        let (bulan, tahun) = (bulan.trim(), tahun.trim());
        let month = parse_export_month(bulan, tahun)?;
        let sensors = split_list(sensors);
        if sensors.is_empty() {
            return Err(ServiceError::validation(
                "device_id, bulan, tahun, sensors wajib diisi",
            ));
        }

        Ok(ExportRequest {
            device_id: device_id.to_string(),
            month,
            month_param: bulan.to_string(),
            year_param: tahun.to_string(),
            sensors,
            labels: SensorLabels::parse(non_empty(&self.sensor_meta).unwrap_or("")),
            zone,
            format,
        })
    }
}
