//! Rendering of a [`QueryPlan`] into a parameterized SQL statement.
//!
//! This is the only place SQL text is assembled. Values always travel as
//! bind parameters; the table name is the only identifier spliced in, and
//! it is validated when the [`TableName`] is built.

use std::fmt;

use chrono::NaiveDateTime;

use crate::query::compiler::{AggregateFn, Granularity, Partition, QueryPlan, Selection, SortOrder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Text(String),
    Timestamp(NaiveDateTime),
    Int(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub binds: Vec<BindValue>,
}

/// A checked SQL identifier naming the readings table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName(String);

impl TableName {
    pub fn parse(name: &str) -> Option<Self> {
        let mut chars = name.chars();
        let first = chars.next()?;
        let valid = (first.is_ascii_alphabetic() || first == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            && name.len() <= 63;
        valid.then(|| Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TableName {
    fn default() -> Self {
        Self("sensor_logs".to_string())
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

struct Renderer {
    dialect: Dialect,
    binds: Vec<BindValue>,
    shift_slot: Option<String>,
}

impl Renderer {
    fn push(&mut self, value: BindValue) -> String {
        self.binds.push(value);
        let n = self.binds.len();
        match self.dialect {
            Dialect::Postgres => format!("${n}"),
            Dialect::Sqlite => format!("?{n}"),
        }
    }

    fn in_list(&mut self, column: &str, values: &[String]) -> String {
        let slots: Vec<String> = values
            .iter()
            .map(|v| self.push(BindValue::Text(v.clone())))
            .collect();
        format!("{column} IN ({})", slots.join(", "))
    }

    /// Placeholder carrying the display-zone offset, bound once and reused.
    fn shift(&mut self, hours: i64) -> String {
        if let Some(slot) = &self.shift_slot {
            return slot.clone();
        }
        let value = match self.dialect {
            Dialect::Postgres => BindValue::Int(hours),
            Dialect::Sqlite => BindValue::Text(format!("{hours:+} hours")),
        };
        let slot = self.push(value);
        self.shift_slot = Some(slot.clone());
        slot
    }

    /// `recorded_at` moved into the display zone.
    fn shifted(&mut self, hours: i64) -> String {
        let slot = self.shift(hours);
        match self.dialect {
            Dialect::Postgres => format!("(recorded_at + make_interval(hours => {slot}::int))"),
            Dialect::Sqlite => format!("datetime(recorded_at, {slot})"),
        }
    }

    fn bucket(&mut self, granularity: Granularity, hours: i64) -> String {
        match self.dialect {
            Dialect::Postgres => {
                let unit = match granularity {
                    Granularity::Hour => "hour",
                    Granularity::Day => "day",
                };
                let shifted = self.shifted(hours);
                format!("date_trunc('{unit}', {shifted})")
            }
            Dialect::Sqlite => {
                let pattern = match granularity {
                    Granularity::Hour => "%Y-%m-%d %H:00:00",
                    Granularity::Day => "%Y-%m-%d 00:00:00",
                };
                let slot = self.shift(hours);
                format!("strftime('{pattern}', recorded_at, {slot})")
            }
        }
    }

    fn id(&self, expr: &str) -> String {
        match self.dialect {
            Dialect::Postgres => format!("{expr}::int8"),
            Dialect::Sqlite => expr.to_string(),
        }
    }

    fn value(&self, expr: &str) -> String {
        match self.dialect {
            Dialect::Postgres => format!("{expr}::float8"),
            Dialect::Sqlite => expr.to_string(),
        }
    }

    fn rounded(&self, expr: &str) -> String {
        match self.dialect {
            Dialect::Postgres => format!("ROUND(({expr})::numeric, 2)::float8"),
            Dialect::Sqlite => format!("ROUND({expr}, 2)"),
        }
    }

    fn filters(&mut self, plan: &QueryPlan) -> String {
        let mut conditions = vec![self.in_list("device_unique_id", &plan.devices)];
        if !plan.parameters.is_empty() {
            conditions.push(self.in_list("parameter_name", &plan.parameters));
        }
        if let Some(from) = plan.window.from {
            let slot = self.push(BindValue::Timestamp(from));
            conditions.push(format!("recorded_at >= {slot}"));
        }
        if let Some(to) = plan.window.to {
            let slot = self.push(BindValue::Timestamp(to));
            conditions.push(format!("recorded_at < {slot}"));
        }
        conditions.join(" AND ")
    }

    fn limit(&mut self, plan: &QueryPlan) -> String {
        match plan.limit {
            Some(n) => format!(" LIMIT {}", self.push(BindValue::Int(i64::from(n)))),
            None => String::new(),
        }
    }
}

fn aggregate_sql(aggregate: AggregateFn) -> &'static str {
    match aggregate {
        AggregateFn::Max => "MAX(value)",
        AggregateFn::Min => "MIN(value)",
        AggregateFn::Avg => "AVG(value)",
    }
}

fn partition_column(partition: Partition) -> &'static str {
    match partition {
        Partition::Device => "device_unique_id",
        Partition::Parameter => "parameter_name",
    }
}

fn order_clause(order: SortOrder, partition: Option<Partition>) -> String {
    match (order, partition) {
        (SortOrder::NewestFirst, _) => "recorded_at DESC, parameter_name ASC".to_string(),
        (SortOrder::OldestFirst, _) => "recorded_at ASC, parameter_name ASC".to_string(),
        (SortOrder::GroupedOldestFirst, Some(p)) => {
            format!("{} ASC, recorded_at ASC", partition_column(p))
        }
        (SortOrder::GroupedOldestFirst, None) => {
            "device_unique_id ASC, parameter_name ASC, recorded_at ASC".to_string()
        }
    }
}

/// Render `plan` for `dialect` against `table`.
///
/// Every statement projects the same five columns: `id`, `device_unique_id`,
/// `parameter_name`, `value` and `recorded_at` (display zone).
pub fn render(plan: &QueryPlan, dialect: Dialect, table: &TableName) -> SqlStatement {
    let mut r = Renderer {
        dialect,
        binds: Vec::new(),
        shift_slot: None,
    };
    let hours = plan.offset_hours;

    let sql = match plan.selection {
        Selection::Raw => {
            let shifted = r.shifted(hours);
            let filters = r.filters(plan);
            let limit = r.limit(plan);
            format!(
                "SELECT {id} AS id, device_unique_id, parameter_name, {value} AS value, {shifted} AS recorded_at \
                 FROM {table} WHERE {filters} ORDER BY {order}{limit}",
                id = r.id("id"),
                value = r.value("value"),
                order = order_clause(plan.order, None),
            )
        }
        Selection::Rollup {
            granularity,
            aggregate,
        } => {
            let bucket = r.bucket(granularity, hours);
            let filters = r.filters(plan);
            let limit = r.limit(plan);
            format!(
                "SELECT {id} AS id, device_unique_id, parameter_name, {value} AS value, {bucket} AS recorded_at \
                 FROM {table} WHERE {filters} \
                 GROUP BY device_unique_id, parameter_name, {bucket} \
                 ORDER BY recorded_at DESC, parameter_name ASC{limit}",
                id = r.id("MIN(id)"),
                value = r.rounded(aggregate_sql(aggregate)),
            )
        }
        Selection::Extreme { highest } => {
            let shifted = r.shifted(hours);
            let filters = r.filters(plan);
            let limit = r.limit(plan);
            let direction = if highest { "DESC" } else { "ASC" };
            format!(
                "SELECT {id} AS id, device_unique_id, parameter_name, {value} AS value, {shifted} AS recorded_at \
                 FROM {table} WHERE {filters} AND value IS NOT NULL \
                 ORDER BY value {direction}, recorded_at ASC, id ASC{limit}",
                id = r.id("id"),
                value = r.rounded("value"),
            )
        }
        Selection::Summary { aggregate } => {
            let shifted = r.shifted(hours);
            let filters = r.filters(plan);
            let limit = r.limit(plan);
            format!(
                "SELECT {id} AS id, device_unique_id, parameter_name, {value} AS value, MIN({shifted}) AS recorded_at \
                 FROM {table} WHERE {filters} \
                 GROUP BY device_unique_id, parameter_name \
                 ORDER BY device_unique_id ASC, parameter_name ASC{limit}",
                id = r.id("MIN(id)"),
                value = r.rounded(aggregate_sql(aggregate)),
            )
        }
        Selection::NewestPer {
            partition,
            per_group,
        } => {
            let shifted = r.shifted(hours);
            let filters = r.filters(plan);
            let per_group = r.push(BindValue::Int(i64::from(per_group)));
            let limit = r.limit(plan);
            let column = partition_column(partition);
            format!(
                "SELECT id, device_unique_id, parameter_name, value, recorded_at FROM (\
                 SELECT {id} AS id, device_unique_id, parameter_name, {value} AS value, {shifted} AS recorded_at, \
                 ROW_NUMBER() OVER (PARTITION BY {column} ORDER BY recorded_at DESC, id DESC) AS rn \
                 FROM {table} WHERE {filters}\
                 ) ranked WHERE rn <= {per_group} ORDER BY {order}{limit}",
                id = r.id("id"),
                value = r.value("value"),
                order = order_clause(plan.order, Some(partition)),
            )
        }
    };

    SqlStatement {
        sql,
        binds: r.binds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::compiler::TimeWindow;
    use chrono::NaiveDate;

    fn ts(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 11, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn plan(selection: Selection) -> QueryPlan {
        QueryPlan {
            devices: vec!["dev1".into()],
            parameters: vec!["suhu".into()],
            window: TimeWindow {
                from: Some(ts(1)),
                to: Some(ts(2)),
            },
            offset_hours: 1,
            selection,
            order: SortOrder::NewestFirst,
            limit: Some(10),
        }
    }

    #[test]
    fn test_table_name_validation() {
        assert!(TableName::parse("sensor_logs").is_some());
        assert!(TableName::parse("_readings2").is_some());
        assert!(TableName::parse("").is_none());
        assert!(TableName::parse("2logs").is_none());
        assert!(TableName::parse("logs; DROP TABLE x").is_none());
        assert!(TableName::parse("public.logs").is_none());
    }

    #[test]
    fn test_raw_postgres() {
        let stmt = render(&plan(Selection::Raw), Dialect::Postgres, &TableName::default());
        assert_eq!(
            stmt.sql,
            "SELECT id::int8 AS id, device_unique_id, parameter_name, value::float8 AS value, \
             (recorded_at + make_interval(hours => $1::int)) AS recorded_at \
             FROM sensor_logs WHERE device_unique_id IN ($2) AND parameter_name IN ($3) \
             AND recorded_at >= $4 AND recorded_at < $5 \
             ORDER BY recorded_at DESC, parameter_name ASC LIMIT $6"
        );
        assert_eq!(
            stmt.binds,
            vec![
                BindValue::Int(1),
                BindValue::Text("dev1".into()),
                BindValue::Text("suhu".into()),
                BindValue::Timestamp(ts(1)),
                BindValue::Timestamp(ts(2)),
                BindValue::Int(10),
            ]
        );
    }

    #[test]
    fn test_raw_sqlite_uses_numbered_slots() {
        let stmt = render(&plan(Selection::Raw), Dialect::Sqlite, &TableName::default());
        assert!(stmt.sql.contains("datetime(recorded_at, ?1) AS recorded_at"));
        assert!(stmt.sql.contains("device_unique_id IN (?2)"));
        assert!(stmt.sql.ends_with("LIMIT ?6"));
        assert_eq!(stmt.binds[0], BindValue::Text("+1 hours".into()));
    }

    #[test]
    fn test_rollup_reuses_shift_slot() {
        let stmt = render(
            &plan(Selection::Rollup {
                granularity: Granularity::Hour,
                aggregate: AggregateFn::Avg,
            }),
            Dialect::Postgres,
            &TableName::default(),
        );
        assert!(stmt.sql.contains(
            "ROUND((AVG(value))::numeric, 2)::float8 AS value, \
             date_trunc('hour', (recorded_at + make_interval(hours => $1::int))) AS recorded_at"
        ));
        assert!(stmt.sql.contains(
            "GROUP BY device_unique_id, parameter_name, \
             date_trunc('hour', (recorded_at + make_interval(hours => $1::int)))"
        ));
        assert!(stmt.sql.contains("ORDER BY recorded_at DESC"));
        assert_eq!(stmt.binds.iter().filter(|b| **b == BindValue::Int(1)).count(), 1);
    }

    #[test]
    fn test_daily_rollup_sqlite() {
        let stmt = render(
            &plan(Selection::Rollup {
                granularity: Granularity::Day,
                aggregate: AggregateFn::Max,
            }),
            Dialect::Sqlite,
            &TableName::default(),
        );
        assert!(stmt
            .sql
            .contains("ROUND(MAX(value), 2) AS value, strftime('%Y-%m-%d 00:00:00', recorded_at, ?1)"));
    }

    #[test]
    fn test_extreme_picks_a_non_null_row() {
        let stmt = render(
            &plan(Selection::Extreme { highest: false }),
            Dialect::Postgres,
            &TableName::default(),
        );
        assert!(!stmt.sql.contains("GROUP BY"));
        assert!(stmt.sql.contains("recorded_at < $5 AND value IS NOT NULL ORDER BY"));
        assert!(stmt.sql.contains("ORDER BY value ASC, recorded_at ASC, id ASC LIMIT $6"));
    }

    #[test]
    fn test_max_summary_groups_on_lowest_id() {
        let mut p = plan(Selection::Summary {
            aggregate: AggregateFn::Max,
        });
        p.limit = None;
        let stmt = render(&p, Dialect::Postgres, &TableName::default());
        assert!(stmt.sql.contains("MIN(id)::int8 AS id"));
        assert!(stmt.sql.contains("ROUND((MAX(value))::numeric, 2)::float8 AS value"));
        assert!(stmt
            .sql
            .contains("MIN((recorded_at + make_interval(hours => $1::int))) AS recorded_at"));
        assert!(stmt.sql.contains("GROUP BY device_unique_id, parameter_name ORDER BY"));
        assert!(!stmt.sql.contains("LIMIT"));
    }

    #[test]
    fn test_average_summary_groups() {
        let mut p = plan(Selection::Summary {
            aggregate: AggregateFn::Avg,
        });
        p.limit = None;
        let stmt = render(&p, Dialect::Sqlite, &TableName::default());
        assert!(stmt.sql.contains("MIN(id) AS id"));
        assert!(stmt.sql.contains("ROUND(AVG(value), 2) AS value"));
        assert!(stmt.sql.contains("GROUP BY device_unique_id, parameter_name"));
        assert!(!stmt.sql.contains("LIMIT"));
    }

    #[test]
    fn test_newest_per_partition() {
        let mut p = plan(Selection::NewestPer {
            partition: Partition::Parameter,
            per_group: 100,
        });
        p.parameters = vec!["suhu".into(), "kelembapan".into()];
        p.order = SortOrder::GroupedOldestFirst;
        p.limit = None;
        let stmt = render(&p, Dialect::Postgres, &TableName::default());
        assert!(stmt.sql.contains("parameter_name IN ($3, $4)"));
        assert!(stmt
            .sql
            .contains("ROW_NUMBER() OVER (PARTITION BY parameter_name ORDER BY recorded_at DESC, id DESC)"));
        assert!(stmt
            .sql
            .ends_with("ranked WHERE rn <= $7 ORDER BY parameter_name ASC, recorded_at ASC"));
        assert_eq!(stmt.binds.last(), Some(&BindValue::Int(100)));
    }

    #[test]
    fn test_open_window_and_no_parameters() {
        let mut p = plan(Selection::Raw);
        p.parameters.clear();
        p.window = TimeWindow::default();
        p.limit = Some(1);
        let stmt = render(&p, Dialect::Sqlite, &TableName::parse("readings").unwrap());
        assert!(stmt.sql.contains("FROM readings WHERE device_unique_id IN (?2) ORDER BY"));
        assert_eq!(stmt.binds.len(), 3);
    }

    #[test]
    fn test_zero_offset_keeps_sign() {
        let mut p = plan(Selection::Raw);
        p.offset_hours = 0;
        let stmt = render(&p, Dialect::Sqlite, &TableName::default());
        assert_eq!(stmt.binds[0], BindValue::Text("+0 hours".into()));
    }
}
