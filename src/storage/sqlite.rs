use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::PoolConfig;
use crate::models::Reading;
use crate::query::sql::{render, BindValue, Dialect, TableName};
use crate::query::QueryPlan;
use crate::storage::decode::{decode_reading, skip_undecodable};
use crate::storage::{ReadingStore, StoreResult};

pub struct SqliteStore {
    pool: Arc<SqlitePool>,
    table: TableName,
}

impl SqliteStore {
    pub async fn new(database_url: &str, pool: &PoolConfig, table: TableName) -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(pool.max_connections)
            .min_connections(pool.min_connections)
            .max_lifetime(Duration::from_secs(pool.max_lifetime_secs))
            .acquire_timeout(Duration::from_secs(pool.acquire_timeout_secs))
            .connect(database_url)
            .await?;
        Ok(Self::from_pool(pool, table))
    }

    pub fn from_pool(pool: SqlitePool, table: TableName) -> Self {
        Self {
            pool: Arc::new(pool),
            table,
        }
    }
}

fn bind_all<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    binds: &'q [BindValue],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for value in binds {
        query = match value {
            BindValue::Text(s) => query.bind(s.as_str()),
            BindValue::Timestamp(t) => query.bind(*t),
            BindValue::Int(n) => query.bind(*n),
        };
    }
    query
}

#[async_trait]
impl ReadingStore for SqliteStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(self.pool.as_ref()).await?;
        Ok(())
    }

    async fn fetch(&self, plan: &QueryPlan) -> StoreResult<Vec<Reading>> {
        let statement = render(plan, Dialect::Sqlite, &self.table);
        debug!(sql = %statement.sql, binds = statement.binds.len(), "executing sqlite read");

        let rows = bind_all(sqlx::query(&statement.sql), &statement.binds)
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(skip_undecodable(&rows, |row| decode_reading(row)))
    }
}
