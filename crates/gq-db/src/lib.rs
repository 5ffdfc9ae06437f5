//! gq-db
//!
//! PostgreSQL-backed authoritative group source.
//!
//! Table shape (owned externally):
//!
//! ```sql
//! create table atlas_group_quotas (
//!   group_name        text primary key,
//!   quota             integer not null,
//!   priority          double precision not null,
//!   accept_surplus    boolean not null,
//!   surplus_threshold integer not null default 0
//! );
//! ```
//!
//! Columns are cast on read, so integer/bigint and real/double/numeric
//! variants of the same schema all work.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use gq_config::{is_sql_identifier, ResolvedSource, SourceConfig};
use gq_group::{GroupName, GroupRecord};
use gq_reconcile::GroupSource;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::debug;

/// Connect using the URL resolved from `cfg.database_url_env`.
pub async fn connect(source: &ResolvedSource, cfg: &SourceConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .acquire_timeout(Duration::from_secs(cfg.connect_timeout_secs))
        .connect(&source.database_url)
        .await
        .with_context(|| {
            format!(
                "failed to connect to Postgres (url from env var {})",
                source.env_var
            )
        })?;

    Ok(pool)
}

#[derive(Debug, Clone)]
pub struct PgGroupSource {
    pool: PgPool,
    table: String,
}

impl PgGroupSource {
    pub fn new(pool: PgPool, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        if !is_sql_identifier(&table) {
            bail!("invalid source table name '{table}'");
        }
        Ok(Self { pool, table })
    }

    pub async fn connect(source: &ResolvedSource, cfg: &SourceConfig) -> Result<Self> {
        let pool = connect(source, cfg).await?;
        Self::new(pool, cfg.table.clone())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// All rows ordered by name.
    pub async fn fetch_records(&self) -> Result<Vec<GroupRecord>> {
        let sql = format!(
            r#"
            select group_name::text,
                   quota::bigint,
                   priority::float8,
                   accept_surplus::boolean,
                   coalesce(surplus_threshold, 0)::bigint
            from {}
            order by group_name
            "#,
            self.table
        );

        let rows = sqlx::query_as::<_, (String, i64, f64, bool, i64)>(&sql)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("select from {} failed", self.table))?;

        debug!(table = %self.table, rows = rows.len(), "fetched group rows");
        Ok(rows
            .into_iter()
            .map(|(name, quota, priority, accept_surplus, threshold)| {
                GroupRecord::new(name, quota, priority, accept_surplus)
                    .with_surplus_threshold(threshold)
            })
            .collect())
    }

    async fn set_column(&self, column: &'static str, name: &str, value: u64) -> Result<()> {
        let value = i64::try_from(value)
            .with_context(|| format!("{column} value {value} for '{name}' exceeds bigint"))?;

        let sql = format!("update {} set {column} = $1 where group_name = $2", self.table);
        let res = sqlx::query(&sql)
            .bind(value)
            .bind(name)
            .execute(&self.pool)
            .await
            .with_context(|| format!("update {}.{column} for '{name}' failed", self.table))?;

        if res.rows_affected() != 1 {
            bail!(
                "update {}.{column} for '{name}' affected {} row(s), expected 1",
                self.table,
                res.rows_affected()
            );
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl GroupSource for PgGroupSource {
    fn source_name(&self) -> &'static str {
        "postgres"
    }

    async fn list_groups(&self) -> Result<Vec<GroupRecord>> {
        self.fetch_records().await
    }

    async fn update_quota(&self, name: &GroupName, quota: u64) -> Result<()> {
        self.set_column("quota", name.as_str(), quota).await
    }

    async fn update_surplus_threshold(&self, name: &GroupName, threshold: u64) -> Result<()> {
        self.set_column("surplus_threshold", name.as_str(), threshold)
            .await
    }
}
