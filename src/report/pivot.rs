//! Long-to-wide reshaping for the export: one row per display timestamp,
//! one column per requested parameter.

use std::collections::HashMap;

use chrono::NaiveDateTime;

use crate::models::Reading;

const PIVOT_KEY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq)]
pub struct PivotRow {
    pub time: NaiveDateTime,
    /// Display-zone timestamp, unique within a table.
    pub key: String,
    pub values: HashMap<String, f64>,
}

impl PivotRow {
    /// Value for `parameter`, zero when the row has no reading for it.
    pub fn value(&self, parameter: &str) -> f64 {
        self.values.get(parameter).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PivotTable {
    pub parameters: Vec<String>,
    pub rows: Vec<PivotRow>,
}

impl PivotTable {
    /// Build from readings whose `recorded_at` is already in the display
    /// zone. Readings outside `parameters` are dropped. Readings that format
    /// to the same key share a row, and a later reading for the same
    /// parameter replaces an earlier one.
    pub fn build(readings: Vec<Reading>, parameters: &[String]) -> Self {
        let mut rows: Vec<PivotRow> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for reading in readings {
            if !parameters.iter().any(|p| *p == reading.parameter_name) {
                continue;
            }
            let key = reading.recorded_at.format(PIVOT_KEY_FORMAT).to_string();
            let position = match index.get(&key) {
                Some(&position) => position,
                None => {
                    rows.push(PivotRow {
                        time: reading.recorded_at,
                        key: key.clone(),
                        values: HashMap::new(),
                    });
                    index.insert(key, rows.len() - 1);
                    rows.len() - 1
                }
            };
            rows[position]
                .values
                .insert(reading.parameter_name, reading.value);
        }

        rows.sort_by(|a, b| a.time.cmp(&b.time));

        Self {
            parameters: parameters.to_vec(),
            rows,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Shortest decimal text that round-trips the value; no trailing zeros,
/// no exponent, and never `-0`.
pub fn format_value(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    format!("{value}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 11, 3)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn reading(id: i64, parameter: &str, value: f64, time: NaiveDateTime) -> Reading {
        Reading {
            id,
            device_id: "dev1".into(),
            parameter_name: parameter.into(),
            value,
            recorded_at: time,
        }
    }

    fn params(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_readings_at_same_second_share_a_row() {
        let table = PivotTable::build(
            vec![
                reading(1, "su", 20.5, at(8, 0, 0)),
                reading(2, "ku", 61.0, at(8, 0, 0)),
                reading(3, "su", 21.0, at(9, 0, 0)),
            ],
            &params(&["su", "ku"]),
        );
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].key, "2024-11-03 08:00:00");
        assert_eq!(table.rows[0].value("su"), 20.5);
        assert_eq!(table.rows[0].value("ku"), 61.0);
        assert_eq!(table.rows[1].value("ku"), 0.0);
    }

    #[test]
    fn test_sub_second_collision_keeps_last_write() {
        let early = at(8, 0, 0);
        let late = early + chrono::TimeDelta::milliseconds(400);
        let table = PivotTable::build(
            vec![reading(1, "su", 20.0, early), reading(2, "su", 22.0, late)],
            &params(&["su"]),
        );
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].value("su"), 22.0);
    }

    #[test]
    fn test_unrequested_parameters_are_dropped() {
        let table = PivotTable::build(
            vec![
                reading(1, "su", 20.0, at(8, 0, 0)),
                reading(2, "co2", 400.0, at(8, 30, 0)),
            ],
            &params(&["su"]),
        );
        assert_eq!(table.rows.len(), 1);
        assert!(!table.rows[0].values.contains_key("co2"));
    }

    #[test]
    fn test_rows_sorted_by_time() {
        let table = PivotTable::build(
            vec![
                reading(1, "su", 3.0, at(10, 0, 0)),
                reading(2, "su", 1.0, at(8, 0, 0)),
                reading(3, "su", 2.0, at(9, 0, 0)),
            ],
            &params(&["su"]),
        );
        let keys: Vec<&str> = table.rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["2024-11-03 08:00:00", "2024-11-03 09:00:00", "2024-11-03 10:00:00"]
        );
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(12.37), "12.37");
        assert_eq!(format_value(21.6), "21.6");
        assert_eq!(format_value(20.0), "20");
        assert_eq!(format_value(0.0), "0");
        assert_eq!(format_value(-0.0), "0");
        assert_eq!(format_value(-3.5), "-3.5");
        let once = format_value(7.125);
        assert_eq!(format_value(once.parse().unwrap()), once);
    }
}
