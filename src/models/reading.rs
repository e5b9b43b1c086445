use chrono::NaiveDateTime;

/// A row handed back by the store.
///
/// Raw reads carry the stored row as-is, except that `recorded_at` has already
/// been shifted into the requested display zone. Rollups and summaries reuse the
/// same shape: `id` is the representative id of the group (the smallest id, or
/// the extreme row's id for high/low summaries), `value` is the aggregated value
/// rounded to two decimals, and `recorded_at` is the bucket start.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub id: i64,
    pub device_id: String,
    pub parameter_name: String,
    pub value: f64,
    pub recorded_at: NaiveDateTime,
}
