//! The read and export pipelines: validate, resolve, compile, fetch, then
//! shape the rows into an envelope or a pivoted file.

use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::{error, info};

use crate::error::ServiceResult;
use crate::models::{ExportRequest, OutputFormat, QueryRequest};
use crate::query::timezone::reference_now;
use crate::query::{compile, compile_export, resolve, ExportParams, ReadParams};
use crate::report::envelope::Envelope;
use crate::report::export::{self, CsvSink, SpreadsheetSink};
use crate::report::pivot::PivotTable;
use crate::storage::{ReadingStore, StoreResult};

/// A rendered export ready to be sent or written to disk.
#[derive(Debug, Clone)]
pub struct ExportFile {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

#[derive(Clone)]
pub struct ReadingService {
    store: Arc<dyn ReadingStore>,
    clock: fn() -> NaiveDateTime,
}

impl ReadingService {
    pub fn new(store: Arc<dyn ReadingStore>) -> Self {
        Self::with_clock(store, reference_now)
    }

    /// `clock` returns the current reference-zone wall-clock time.
    pub fn with_clock(store: Arc<dyn ReadingStore>, clock: fn() -> NaiveDateTime) -> Self {
        Self { store, clock }
    }

    pub async fn ping(&self) -> StoreResult<()> {
        self.store.ping().await
    }

    pub async fn read_params(&self, params: ReadParams) -> ServiceResult<Envelope> {
        let now = (self.clock)();
        let req = params.into_request(now.date())?;
        self.read_at(&req, now).await
    }

    pub async fn read(&self, req: &QueryRequest) -> ServiceResult<Envelope> {
        self.read_at(req, (self.clock)()).await
    }

    /// Serve `req` with every window anchored on the single instant `now`.
    async fn read_at(&self, req: &QueryRequest, now: NaiveDateTime) -> ServiceResult<Envelope> {
        let mode = resolve(req)?;
        let compiled = compile(mode, req, now)?;

        let mut rows = self.store.fetch(&compiled.plan).await.inspect_err(|e| {
            error!(filter = %compiled.filter, error = %e, "reading query failed");
        })?;
        if compiled.chronological {
            rows.reverse();
        }

        info!(
            device_id = %req.device_param,
            mode = ?mode,
            filter = %compiled.filter,
            rows = rows.len(),
            "served reading query"
        );
        Ok(Envelope::from_rows(&compiled, req, rows))
    }

    pub async fn export_params(&self, params: ExportParams) -> ServiceResult<ExportFile> {
        let req = params.into_request()?;
        self.export(&req).await
    }

    pub async fn export(&self, req: &ExportRequest) -> ServiceResult<ExportFile> {
        let plan = compile_export(req)?;
        let readings = self.store.fetch(&plan).await.inspect_err(|e| {
            error!(device_id = %req.device_id, error = %e, "export query failed");
        })?;

        let table = PivotTable::build(readings, &req.sensors);
        let header = export::header(&req.sensors, &req.labels, req.zone);
        let rows = export::rows(&table);

        let bytes = match req.format {
            OutputFormat::Csv => export::serialize(CsvSink::new(), &header, &rows)?,
            OutputFormat::Excel => export::serialize(SpreadsheetSink::new()?, &header, &rows)?,
        };

        info!(
            device_id = %req.device_id,
            month = %req.month_param,
            year = %req.year_param,
            rows = rows.len(),
            format = req.format.extension(),
            "export rendered"
        );
        Ok(ExportFile {
            filename: req.filename(),
            content_type: req.format.content_type(),
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryPlan;
    use crate::models::Reading;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EmptyStore;

    #[async_trait]
    impl ReadingStore for EmptyStore {
        async fn ping(&self) -> StoreResult<()> {
            Ok(())
        }

        async fn fetch(&self, _plan: &QueryPlan) -> StoreResult<Vec<Reading>> {
            Ok(Vec::new())
        }
    }

    static CLOCK_READS: AtomicUsize = AtomicUsize::new(0);

    /// Ticks from 23:59:59 on New Year's Eve into the next year.
    fn ticking_clock() -> NaiveDateTime {
        let tick = CLOCK_READS.fetch_add(1, Ordering::SeqCst);
        NaiveDate::from_ymd_opt(2024, 12, 31)
            .unwrap()
            .and_hms_opt(23, 59, 59)
            .unwrap()
            + chrono::TimeDelta::seconds(tick as i64)
    }

    #[tokio::test]
    async fn test_one_request_reads_the_clock_once() {
        let service = ReadingService::with_clock(Arc::new(EmptyStore), ticking_clock);
        let params: ReadParams =
            serde_json::from_value(serde_json::json!({ "device_id": "dev1", "bulan": "12" })).unwrap();

        let env = service.read_params(params).await.unwrap();
        assert_eq!(CLOCK_READS.load(Ordering::SeqCst), 1);
        assert_eq!(env.year.as_deref(), Some("2024"));
    }
}
