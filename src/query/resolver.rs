//! Read-strategy selection.
//!
//! The request parameters overlap heavily, so the strategy is picked by an
//! ordered rule table: the first rule whose predicate matches wins, and later
//! rules are never consulted.

use crate::error::{ServiceError, ServiceResult};
use crate::models::{Period, QueryRequest, ReadMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedMode {
    /// Newest N readings per parameter within a month.
    RandomSample,
    /// Newest reading of each listed device.
    MultiDeviceLatest,
    /// Single newest reading across all parameters.
    SingleLatest,
    /// Every parameter of a device, month-scoped or trailing 24 hours.
    AllParameters,
    /// Newest reading of every distinct parameter.
    LatestPerParameter,
    /// One high/low/avg value over a window.
    AggregateValue,
    /// Raw, hourly rollup or single aggregate for one calendar date.
    DateScoped,
    /// Raw or rollup for day, week-to-date or month.
    GenericPeriod,
}

struct Rule {
    name: &'static str,
    applies: fn(&QueryRequest) -> bool,
    outcome: ServiceResult<ResolvedMode>,
}

fn sample_months(req: &QueryRequest) -> bool {
    req.parameter_list && req.month.is_some()
}

fn latest_of_devices(req: &QueryRequest) -> bool {
    req.device_list && req.mode == ReadMode::Latest
}

fn latest(req: &QueryRequest) -> bool {
    req.mode == ReadMode::Latest
}

fn everything_today(req: &QueryRequest) -> bool {
    !req.has_parameter() && req.value.is_none() && req.period == Period::Day
}

fn now(req: &QueryRequest) -> bool {
    req.period == Period::Now
}

fn parameter_missing(req: &QueryRequest) -> bool {
    !req.has_parameter()
}

fn aggregate_value(req: &QueryRequest) -> bool {
    !req.value.is_none()
        && (req.mode == ReadMode::Rollup
            || matches!(req.period, Period::WeekToDate | Period::Month))
}

fn dated(req: &QueryRequest) -> bool {
    req.date.is_some()
}

fn rules() -> [Rule; 8] {
    [
        Rule {
            name: "random_sample",
            applies: sample_months,
            outcome: Ok(ResolvedMode::RandomSample),
        },
        Rule {
            name: "multi_device_latest",
            applies: latest_of_devices,
            outcome: Ok(ResolvedMode::MultiDeviceLatest),
        },
        Rule {
            name: "single_latest",
            applies: latest,
            outcome: Ok(ResolvedMode::SingleLatest),
        },
        Rule {
            name: "all_parameters",
            applies: everything_today,
            outcome: Ok(ResolvedMode::AllParameters),
        },
        Rule {
            name: "latest_per_parameter",
            applies: now,
            outcome: Ok(ResolvedMode::LatestPerParameter),
        },
        Rule {
            name: "parameter_required",
            applies: parameter_missing,
            outcome: Err(ServiceError::validation("parameter jenis diperlukan")),
        },
        Rule {
            name: "aggregate_value",
            applies: aggregate_value,
            outcome: Ok(ResolvedMode::AggregateValue),
        },
        Rule {
            name: "date_scoped",
            applies: dated,
            outcome: Ok(ResolvedMode::DateScoped),
        },
    ]
}

/// Pick the read strategy for `req`. Pure; the same request always resolves
/// to the same mode.
pub fn resolve(req: &QueryRequest) -> ServiceResult<ResolvedMode> {
    for rule in rules() {
        if (rule.applies)(req) {
            tracing::debug!(rule = rule.name, "read mode resolved");
            return rule.outcome;
        }
    }
    Ok(ResolvedMode::GenericPeriod)
}
