//! Row decoding with a best-effort policy: a row that cannot be decoded is
//! logged and dropped, and the rest of the result set is still returned.

use chrono::NaiveDateTime;
use sqlx::{ColumnIndex, Decode, Row, Type};
use tracing::warn;

use crate::models::Reading;

/// Decode the five projected columns of one row. A NULL value is rejected
/// rather than read as zero.
pub fn decode_reading<'r, R>(row: &'r R) -> Result<Reading, sqlx::Error>
where
    R: Row,
    &'static str: ColumnIndex<R>,
    i64: Decode<'r, R::Database> + Type<R::Database>,
    String: Decode<'r, R::Database> + Type<R::Database>,
    Option<f64>: Decode<'r, R::Database> + Type<R::Database>,
    NaiveDateTime: Decode<'r, R::Database> + Type<R::Database>,
{
    let value: Option<f64> = row.try_get("value")?;
    Ok(Reading {
        id: row.try_get("id")?,
        device_id: row.try_get("device_unique_id")?,
        parameter_name: row.try_get("parameter_name")?,
        value: value.ok_or_else(|| sqlx::Error::ColumnDecode {
            index: "value".into(),
            source: "unexpected NULL".into(),
        })?,
        recorded_at: row.try_get("recorded_at")?,
    })
}

/// Apply `decode` to every row, skipping the ones it rejects.
pub fn skip_undecodable<R, F>(rows: &[R], decode: F) -> Vec<Reading>
where
    F: Fn(&R) -> Result<Reading, sqlx::Error>,
{
    let mut readings = Vec::with_capacity(rows.len());
    let mut skipped = 0usize;

    for (position, row) in rows.iter().enumerate() {
        match decode(row) {
            Ok(reading) => readings.push(reading),
            Err(e) => {
                skipped += 1;
                warn!(position, error = %e, "skipping undecodable reading row");
            }
        }
    }

    if skipped > 0 {
        warn!(skipped, kept = readings.len(), "result set returned without undecodable rows");
    }

    readings
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn reading(id: i64) -> Reading {
        Reading {
            id,
            device_id: "dev1".into(),
            parameter_name: "suhu".into(),
            value: 20.0,
            recorded_at: NaiveDate::from_ymd_opt(2024, 11, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn test_corrupt_row_does_not_abort_the_batch() {
        let rows = vec![1i64, -1, 3];
        let decoded = skip_undecodable(&rows, |id| {
            if *id < 0 {
                Err(sqlx::Error::ColumnNotFound("value".into()))
            } else {
                Ok(reading(*id))
            }
        });
        let ids: Vec<i64> = decoded.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_all_rows_rejected_yields_empty() {
        let rows = vec![(), ()];
        let decoded = skip_undecodable(&rows, |_| Err(sqlx::Error::RowNotFound));
        assert!(decoded.is_empty());
    }
}
