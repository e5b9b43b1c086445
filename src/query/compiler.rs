//! Turns a resolved read mode into a bounded query descriptor.
//!
//! Every time predicate ends up as a half-open `[from, to)` range over the
//! stored reference-zone column. Calendar windows (explicit month, explicit
//! date, "last N calendar days") are laid out in the display zone first and
//! then shifted back, so the instant used for filtering is the same one the
//! store later groups and labels by.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

use crate::error::{ServiceError, ServiceResult};
use crate::models::{ExportRequest, MonthYear, Period, QueryRequest, ReadMode, ValueAggregate};
use crate::query::resolver::ResolvedMode;
use crate::query::timezone::DisplayZone;

/// Row cap for the all-parameters read, also the ceiling for caller limits.
pub const ALL_PARAMETERS_ROW_CAP: u32 = 20_000;
/// Default per-parameter sample size for the random-sample read.
pub const SAMPLE_ROWS_PER_PARAMETER: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Hour,
    Day,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFn {
    Max,
    Min,
    Avg,
}

impl AggregateFn {
    pub fn from_value(value: ValueAggregate) -> Option<Self> {
        match value {
            ValueAggregate::None => None,
            ValueAggregate::Max => Some(Self::Max),
            ValueAggregate::Min => Some(Self::Min),
            ValueAggregate::Avg => Some(Self::Avg),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    Device,
    Parameter,
}

/// What each output row represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Stored rows.
    Raw,
    /// One row per device, parameter and time bucket.
    Rollup {
        granularity: Granularity,
        aggregate: AggregateFn,
    },
    /// One row per device and parameter over the whole window, keyed by the
    /// group's lowest id and earliest instant.
    Summary { aggregate: AggregateFn },
    /// The single highest (or lowest) non-null reading in the window.
    Extreme { highest: bool },
    /// The newest `per_group` rows of every partition.
    NewestPer {
        partition: Partition,
        per_group: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    NewestFirst,
    OldestFirst,
    /// By partition key, then oldest first inside it.
    GroupedOldestFirst,
}

/// Half-open range over the stored `recorded_at` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeWindow {
    pub from: Option<NaiveDateTime>,
    pub to: Option<NaiveDateTime>,
}

/// Store-agnostic description of one read.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub devices: Vec<String>,
    /// Empty means every parameter.
    pub parameters: Vec<String>,
    pub window: TimeWindow,
    /// Hours added to stored instants before labelling and bucketing.
    pub offset_hours: i64,
    pub selection: Selection,
    pub order: SortOrder,
    pub limit: Option<u32>,
}

impl QueryPlan {
    fn new(devices: Vec<String>, zone: DisplayZone) -> Self {
        Self {
            devices,
            parameters: Vec::new(),
            window: TimeWindow::default(),
            offset_hours: zone.offset_hours(),
            selection: Selection::Raw,
            order: SortOrder::NewestFirst,
            limit: None,
        }
    }

    pub fn group_by(&self) -> Option<Granularity> {
        match self.selection {
            Selection::Rollup { granularity, .. } => Some(granularity),
            _ => None,
        }
    }

    pub fn aggregate_fn(&self) -> Option<AggregateFn> {
        match self.selection {
            Selection::Rollup { aggregate, .. } | Selection::Summary { aggregate } => {
                Some(aggregate)
            }
            Selection::Extreme { highest: true } => Some(AggregateFn::Max),
            Selection::Extreme { highest: false } => Some(AggregateFn::Min),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Many,
    One,
}

/// How `recorded_at` is printed in the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeLabel {
    Instant,
    Date,
}

impl TimeLabel {
    pub fn format(self, at: NaiveDateTime) -> String {
        match self {
            Self::Instant => at.format("%Y-%m-%d %H:%M:%S").to_string(),
            Self::Date => at.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Request facts echoed back in the envelope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Echo {
    pub month: Option<MonthYear>,
    pub time_range: Option<&'static str>,
    pub value: Option<ValueAggregate>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub mode: ResolvedMode,
    pub plan: QueryPlan,
    pub filter: String,
    pub mode_label: &'static str,
    pub cardinality: Cardinality,
    /// Fetched newest-first but returned oldest-first.
    pub chronological: bool,
    pub time_label: TimeLabel,
    pub echo: Echo,
}

impl CompiledQuery {
    fn new(mode: ResolvedMode, plan: QueryPlan, filter: impl Into<String>, mode_label: &'static str) -> Self {
        Self {
            mode,
            plan,
            filter: filter.into(),
            mode_label,
            cardinality: Cardinality::Many,
            chronological: false,
            time_label: TimeLabel::Instant,
            echo: Echo::default(),
        }
    }
}

/// Window arithmetic anchored on a reference-zone "now".
struct Windows {
    now: NaiveDateTime,
    zone: DisplayZone,
}

impl Windows {
    fn trailing(&self, span: TimeDelta) -> TimeWindow {
        TimeWindow {
            from: Some(self.now - span),
            to: None,
        }
    }

    /// Today plus the previous `days` calendar days of the display zone.
    fn calendar_days(&self, days: i64) -> TimeWindow {
        let today = self.zone.to_display(self.now).date();
        TimeWindow {
            from: Some(self.midnight(today - TimeDelta::days(days))),
            to: None,
        }
    }

    fn date(&self, date: NaiveDate) -> ServiceResult<TimeWindow> {
        let next = date
            .succ_opt()
            .ok_or_else(|| ServiceError::validation("format tanggal harus YYYY-MM-DD"))?;
        Ok(TimeWindow {
            from: Some(self.midnight(date)),
            to: Some(self.midnight(next)),
        })
    }

    fn month(&self, month: MonthYear) -> ServiceResult<TimeWindow> {
        let invalid = || ServiceError::validation("format bulan/tahun salah");
        let first = month.first_day().ok_or_else(invalid)?;
        let next = month.next().first_day().ok_or_else(invalid)?;
        Ok(TimeWindow {
            from: Some(self.midnight(first)),
            to: Some(self.midnight(next)),
        })
    }

    fn midnight(&self, date: NaiveDate) -> NaiveDateTime {
        self.zone.to_reference(date.and_time(NaiveTime::MIN))
    }
}

/// Compile `mode` for `req`. `now` is the current reference-zone time.
pub fn compile(mode: ResolvedMode, req: &QueryRequest, now: NaiveDateTime) -> ServiceResult<CompiledQuery> {
    let windows = Windows {
        now,
        zone: req.zone,
    };
    let mut plan = QueryPlan::new(req.device_ids.clone(), req.zone);
    // Latest reads cover every parameter of the device regardless of `jenis`.
    if !matches!(
        mode,
        ResolvedMode::MultiDeviceLatest | ResolvedMode::SingleLatest | ResolvedMode::LatestPerParameter
    ) {
        plan.parameters = req.parameters.clone();
    }

    let mut compiled = match mode {
        ResolvedMode::RandomSample => {
            let month = req
                .month
                .ok_or_else(|| ServiceError::validation("format bulan/tahun salah"))?;
            plan.window = windows.month(month)?;
            plan.selection = Selection::NewestPer {
                partition: Partition::Parameter,
                per_group: req.limit.unwrap_or(SAMPLE_ROWS_PER_PARAMETER),
            };
            plan.order = SortOrder::GroupedOldestFirst;
            let mut compiled = CompiledQuery::new(mode, plan, "multi_param_random", "random_sample");
            compiled.echo.month = Some(month);
            compiled
        }
        ResolvedMode::MultiDeviceLatest => {
            plan.selection = Selection::NewestPer {
                partition: Partition::Device,
                per_group: 1,
            };
            plan.order = SortOrder::GroupedOldestFirst;
            plan.limit = req.limit;
            CompiledQuery::new(mode, plan, "multi_device_latest", "latest")
        }
        ResolvedMode::SingleLatest => {
            plan.limit = Some(1);
            let mut compiled = CompiledQuery::new(mode, plan, "latest", "latest");
            compiled.cardinality = Cardinality::One;
            compiled
        }
        ResolvedMode::AllParameters => {
            plan.limit = Some(
                req.limit
                    .unwrap_or(ALL_PARAMETERS_ROW_CAP)
                    .min(ALL_PARAMETERS_ROW_CAP),
            );
            match req.month {
                Some(month) => {
                    plan.window = windows.month(month)?;
                    let mut compiled =
                        CompiledQuery::new(mode, plan, "all_parameters_by_month", "raw");
                    compiled.echo.month = Some(month);
                    compiled
                }
                None => {
                    plan.window = windows.trailing(TimeDelta::hours(24));
                    let mut compiled = CompiledQuery::new(mode, plan, "all_parameters", "raw");
                    compiled.echo.time_range = Some("24_hours");
                    compiled
                }
            }
        }
        ResolvedMode::LatestPerParameter => {
            plan.selection = Selection::NewestPer {
                partition: Partition::Parameter,
                per_group: 1,
            };
            plan.order = SortOrder::GroupedOldestFirst;
            plan.limit = req.limit;
            CompiledQuery::new(mode, plan, "now", "latest")
        }
        ResolvedMode::AggregateValue => {
            let aggregate = AggregateFn::from_value(req.value)
                .ok_or_else(|| ServiceError::validation("value hanya high | low | avg"))?;
            let mut month_echo = None;
            let scope = if let Some(date) = req.date {
                plan.window = windows.date(date)?;
                "tanggal"
            } else if let Some(month) = req.month {
                plan.window = windows.month(month)?;
                month_echo = Some(month);
                "bulan"
            } else {
                match req.period {
                    Period::WeekToDate => {
                        plan.window = windows.calendar_days(6);
                        "minggu_ini"
                    }
                    Period::Month => {
                        plan.window = windows.calendar_days(29);
                        "bulan"
                    }
                    Period::Day | Period::Now => {
                        plan.window = windows.trailing(TimeDelta::hours(24));
                        "hari"
                    }
                }
            };
            plan.selection = Selection::Summary { aggregate };
            let mut compiled = CompiledQuery::new(
                mode,
                plan,
                format!("{scope}_{}", req.value.token()),
                "aggregate",
            );
            compiled.cardinality = Cardinality::One;
            compiled.echo.value = Some(req.value);
            compiled.echo.month = month_echo;
            compiled
        }
        ResolvedMode::DateScoped => {
            let date = req
                .date
                .ok_or_else(|| ServiceError::validation("format tanggal harus YYYY-MM-DD"))?;
            plan.window = windows.date(date)?;
            if let Some(aggregate) = AggregateFn::from_value(req.value) {
                plan.selection = match aggregate {
                    AggregateFn::Max => Selection::Extreme { highest: true },
                    AggregateFn::Min => Selection::Extreme { highest: false },
                    AggregateFn::Avg => Selection::Summary { aggregate },
                };
                if aggregate != AggregateFn::Avg {
                    plan.limit = Some(1);
                }
                let mut compiled = CompiledQuery::new(
                    mode,
                    plan,
                    format!("tanggal_{}", req.value.token()),
                    "aggregate",
                );
                compiled.cardinality = Cardinality::One;
                compiled.echo.value = Some(req.value);
                compiled
            } else if req.mode == ReadMode::Rollup {
                plan.selection = Selection::Rollup {
                    granularity: Granularity::Hour,
                    aggregate: AggregateFn::Avg,
                };
                plan.limit = req.limit;
                let mut compiled = CompiledQuery::new(mode, plan, "tanggal", ReadMode::Rollup.token());
                compiled.chronological = true;
                compiled
            } else {
                plan.limit = req.limit;
                CompiledQuery::new(mode, plan, "tanggal", ReadMode::Raw.token())
            }
        }
        ResolvedMode::GenericPeriod => generic_period(mode, plan, req, &windows)?,
    };

    compiled.echo.limit = req.limit;
    tracing::debug!(
        filter = %compiled.filter,
        selection = ?compiled.plan.selection,
        window = ?compiled.plan.window,
        limit = ?compiled.plan.limit,
        "query compiled"
    );
    Ok(compiled)
}

fn generic_period(
    mode: ResolvedMode,
    mut plan: QueryPlan,
    req: &QueryRequest,
    windows: &Windows,
) -> ServiceResult<CompiledQuery> {
    let rollup = req.mode == ReadMode::Rollup;
    let mut month_echo = None;

    let (window, granularity) = match req.period {
        Period::Day | Period::Now => (windows.trailing(TimeDelta::hours(24)), Granularity::Hour),
        Period::WeekToDate if rollup => (windows.calendar_days(6), Granularity::Day),
        Period::WeekToDate => (windows.trailing(TimeDelta::days(7)), Granularity::Day),
        Period::Month => match req.month {
            Some(month) => {
                month_echo = Some(month);
                (windows.month(month)?, Granularity::Day)
            }
            None => (windows.calendar_days(29), Granularity::Day),
        },
    };

    plan.window = window;
    plan.limit = req.limit;
    if rollup {
        plan.selection = Selection::Rollup {
            granularity,
            aggregate: AggregateFn::Avg,
        };
    }

    let filter = match req.period {
        Period::Now => Period::Day.token(),
        period => period.token(),
    };
    let mut compiled = CompiledQuery::new(mode, plan, filter, req.mode.token());
    compiled.echo.month = month_echo;
    if rollup {
        compiled.chronological = true;
        if granularity == Granularity::Day {
            compiled.time_label = TimeLabel::Date;
        }
    }
    Ok(compiled)
}

/// Plan for the pivoted month export: every requested sensor of one device,
/// oldest first, no row cap.
pub fn compile_export(req: &ExportRequest) -> ServiceResult<QueryPlan> {
    let windows = Windows {
        now: NaiveDateTime::MIN,
        zone: req.zone,
    };
    let mut plan = QueryPlan::new(vec![req.device_id.clone()], req.zone);
    plan.parameters = req.sensors.clone();
    plan.window = windows.month(req.month)?;
    plan.order = SortOrder::OldestFirst;
    Ok(plan)
}
