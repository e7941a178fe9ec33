//! PostgreSQL planner gateway backed by sqlx
//!
//! Each session-scoped operation (EXPLAIN, hypothetical trial) acquires a
//! dedicated pooled connection, applies the statement timeout at session
//! scope, and releases the connection when done. Hypothetical state is reset
//! on entry and on every exit path of a trial.

use super::{HypotheticalTrial, PlanTree, PlannerFailure, PlannerGateway, PlannerResult, SchemaFilter};
use crate::model::SortDirection;
use crate::schema::{ColumnDef, ColumnKind, IndexDef, SchemaSnapshot, TableInfo};
use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Row};
use std::time::Instant;
use tokio::sync::OnceCell;

/// Gateway implementation over a shared connection pool.
pub struct PgPlannerGateway {
    pool: PgPool,
    hypopg_available: OnceCell<bool>,
}

impl PgPlannerGateway {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            hypopg_available: OnceCell::new(),
        }
    }

    async fn acquire_session(
        &self,
        timeout_ms: u64,
    ) -> PlannerResult<sqlx::pool::PoolConnection<sqlx::Postgres>> {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            tracing::warn!("Failed to acquire planner session: {}", e);
            map_sqlx_error(e)
        })?;
        sqlx::query(&format!("SET statement_timeout = {}", timeout_ms))
            .execute(&mut *conn)
            .await
            .map_err(map_sqlx_error)?;
        Ok(conn)
    }
}

#[async_trait]
impl PlannerGateway for PgPlannerGateway {
    async fn explain(&self, sql: &str, analyze: bool, timeout_ms: u64) -> PlannerResult<PlanTree> {
        if !super::looks_like_select(sql) {
            return Err(PlannerFailure::Syntax(
                "only SELECT statements can be explained".to_string(),
            ));
        }
        let mut conn = self.acquire_session(timeout_ms).await?;
        run_explain(&mut conn, sql, analyze).await
    }

    async fn explain_costs(&self, sql: &str, timeout_ms: u64) -> PlannerResult<PlanTree> {
        if !super::looks_like_select(sql) {
            return Err(PlannerFailure::Syntax(
                "only SELECT statements can be explained".to_string(),
            ));
        }
        let mut conn = self.acquire_session(timeout_ms).await?;
        run_explain(&mut conn, sql, false).await
    }

    async fn fetch_schema(
        &self,
        filter: &SchemaFilter,
        timeout_ms: u64,
    ) -> PlannerResult<SchemaSnapshot> {
        let mut conn = self.acquire_session(timeout_ms).await?;
        let schema = filter.schema_or_default();
        let mut snapshot = SchemaSnapshot::empty();

        // Columns with nullability, in ordinal order.
        let column_sql = match filter.table {
            Some(_) => {
                "SELECT table_name, column_name, data_type, is_nullable \
                 FROM information_schema.columns \
                 WHERE table_schema = $1 AND table_name = $2 \
                 ORDER BY table_name, ordinal_position"
            }
            None => {
                "SELECT table_name, column_name, data_type, is_nullable \
                 FROM information_schema.columns \
                 WHERE table_schema = $1 \
                 ORDER BY table_name, ordinal_position"
            }
        };
        let mut query = sqlx::query(column_sql).bind(schema);
        if let Some(table) = &filter.table {
            query = query.bind(table);
        }
        let rows = query
            .fetch_all(&mut *conn)
            .await
            .map_err(map_sqlx_error)?;
        for row in rows {
            let table: String = row.try_get("table_name").map_err(map_sqlx_error)?;
            let column: String = row.try_get("column_name").map_err(map_sqlx_error)?;
            let data_type: String = row.try_get("data_type").map_err(map_sqlx_error)?;
            let is_nullable: String = row.try_get("is_nullable").map_err(map_sqlx_error)?;
            snapshot
                .tables
                .entry(table)
                .or_insert_with(TableInfo::default)
                .columns
                .push(ColumnDef {
                    name: column,
                    kind: ColumnKind::from_pg_type(&data_type),
                    nullable: is_nullable.eq_ignore_ascii_case("yes"),
                    avg_width_bytes: None,
                });
        }

        // Average widths from the statistics collector, when sampled.
        let width_sql = match filter.table {
            Some(_) => {
                "SELECT tablename, attname, avg_width FROM pg_stats \
                 WHERE schemaname = $1 AND tablename = $2"
            }
            None => "SELECT tablename, attname, avg_width FROM pg_stats WHERE schemaname = $1",
        };
        let mut query = sqlx::query(width_sql).bind(schema);
        if let Some(table) = &filter.table {
            query = query.bind(table);
        }
        if let Ok(rows) = query.fetch_all(&mut *conn).await {
            for row in rows {
                let table: String = row.try_get("tablename").map_err(map_sqlx_error)?;
                let column: String = row.try_get("attname").map_err(map_sqlx_error)?;
                let width: Option<i32> = row.try_get("avg_width").map_err(map_sqlx_error)?;
                if let Some(info) = snapshot.tables.get_mut(&table)
                    && let Some(col) = info.columns.iter_mut().find(|c| c.name == column)
                {
                    col.avg_width_bytes = width.map(i64::from);
                }
            }
        }

        // Index definitions with per-column direction, in key order.
        let index_sql = format!(
            "SELECT t.relname AS table_name, \
                    i.relname AS index_name, \
                    ix.indisunique AS is_unique, \
                    a.attname AS column_name, \
                    (ix.indoption[k.ord - 1] & 1) <> 0 AS is_desc \
             FROM pg_index ix \
             JOIN pg_class t ON t.oid = ix.indrelid \
             JOIN pg_class i ON i.oid = ix.indexrelid \
             JOIN pg_namespace n ON n.oid = t.relnamespace \
             CROSS JOIN LATERAL unnest(ix.indkey) WITH ORDINALITY AS k(attnum, ord) \
             JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = k.attnum \
             WHERE n.nspname = $1 {} \
             ORDER BY t.relname, i.relname, k.ord",
            if filter.table.is_some() {
                "AND t.relname = $2"
            } else {
                ""
            }
        );
        let mut query = sqlx::query(&index_sql).bind(schema);
        if let Some(table) = &filter.table {
            query = query.bind(table);
        }
        let rows = query
            .fetch_all(&mut *conn)
            .await
            .map_err(map_sqlx_error)?;
        for row in rows {
            let table: String = row.try_get("table_name").map_err(map_sqlx_error)?;
            let index: String = row.try_get("index_name").map_err(map_sqlx_error)?;
            let unique: bool = row.try_get("is_unique").map_err(map_sqlx_error)?;
            let column: String = row.try_get("column_name").map_err(map_sqlx_error)?;
            let is_desc: bool = row.try_get("is_desc").map_err(map_sqlx_error)?;
            let info = snapshot
                .tables
                .entry(table)
                .or_insert_with(TableInfo::default);
            let direction = if is_desc {
                SortDirection::Desc
            } else {
                SortDirection::Asc
            };
            match info.indexes.iter_mut().find(|ix| ix.name == index) {
                Some(ix) => {
                    ix.columns.push(column);
                    ix.directions.push(direction);
                }
                None => info.indexes.push(IndexDef {
                    name: index,
                    columns: vec![column],
                    directions: vec![direction],
                    unique,
                }),
            }
        }

        // Approximate live-tuple counts.
        let estimate_sql = format!(
            "SELECT c.relname AS table_name, GREATEST(c.reltuples::bigint, 0) AS row_estimate \
             FROM pg_class c \
             JOIN pg_namespace n ON n.oid = c.relnamespace \
             WHERE n.nspname = $1 AND c.relkind IN ('r', 'm', 'p') {}",
            if filter.table.is_some() {
                "AND c.relname = $2"
            } else {
                ""
            }
        );
        let mut query = sqlx::query(&estimate_sql).bind(schema);
        if let Some(table) = &filter.table {
            query = query.bind(table);
        }
        let rows = query
            .fetch_all(&mut *conn)
            .await
            .map_err(map_sqlx_error)?;
        for row in rows {
            let table: String = row.try_get("table_name").map_err(map_sqlx_error)?;
            let estimate: i64 = row.try_get("row_estimate").map_err(map_sqlx_error)?;
            snapshot.row_estimates.insert(table, estimate);
        }

        tracing::debug!(
            "Schema snapshot: {} tables, {} estimates",
            snapshot.tables.len(),
            snapshot.row_estimates.len()
        );
        Ok(snapshot)
    }

    async fn with_hypothetical_index(
        &self,
        index_ddl: &str,
        sql: &str,
        timeout_ms: u64,
    ) -> PlannerResult<HypotheticalTrial> {
        if !self.hypothetical_capability().await {
            return Err(PlannerFailure::Unavailable);
        }
        let started = Instant::now();
        let mut conn = self.acquire_session(timeout_ms).await?;

        reset_hypothetical(&mut conn).await?;

        if let Err(e) = sqlx::query("SELECT * FROM hypopg_create_index($1)")
            .bind(index_ddl)
            .fetch_all(&mut *conn)
            .await
        {
            let _ = reset_hypothetical(&mut conn).await;
            tracing::debug!("Hypothetical index creation failed: {}", e);
            return Err(map_hypopg_error(e));
        }

        let plan = run_explain(&mut conn, sql, false).await;

        // Reset on every exit path so no hypothetical state leaks into the
        // next trial on this session.
        let _ = reset_hypothetical(&mut conn).await;

        Ok(HypotheticalTrial {
            plan: plan?,
            trial_duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn hypothetical_capability(&self) -> bool {
        *self
            .hypopg_available
            .get_or_init(|| async {
                let probe = sqlx::query_scalar::<_, i64>(
                    "SELECT count(*) FROM pg_extension WHERE extname = 'hypopg'",
                )
                .fetch_one(&self.pool)
                .await;
                match probe {
                    Ok(n) => {
                        let available = n > 0;
                        tracing::info!("hypopg capability probe: available={}", available);
                        available
                    }
                    Err(e) => {
                        tracing::warn!("hypopg capability probe failed: {}", e);
                        false
                    }
                }
            })
            .await
    }
}

async fn run_explain(conn: &mut PgConnection, sql: &str, analyze: bool) -> PlannerResult<PlanTree> {
    let options = if analyze {
        "ANALYZE, BUFFERS, TIMING, FORMAT JSON"
    } else {
        "FORMAT JSON"
    };
    let explain_sql = format!(
        "EXPLAIN ({}) {}",
        options,
        sql.trim().trim_end_matches(';')
    );

    let row = sqlx::query(&explain_sql)
        .fetch_one(conn)
        .await
        .map_err(map_sqlx_error)?;
    let value: serde_json::Value = row.try_get(0).map_err(map_sqlx_error)?;
    PlanTree::from_explain_json(&value)
        .map_err(|e| PlannerFailure::Transport(format!("unreadable EXPLAIN output: {}", e)))
}

async fn reset_hypothetical(conn: &mut PgConnection) -> PlannerResult<()> {
    sqlx::query("SELECT hypopg_reset()")
        .execute(conn)
        .await
        .map_err(map_hypopg_error)?;
    Ok(())
}

/// Map sqlx errors onto the gateway failure taxonomy.
///
/// 57014 is `query_canceled`, raised when the statement timeout fires. Class
/// 42 covers syntax errors and unknown relations/columns, which are user
/// errors on the submitted SQL.
fn map_sqlx_error(e: sqlx::Error) -> PlannerFailure {
    match &e {
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some("57014") => PlannerFailure::Timeout,
            Some(code) if code.starts_with("42") => {
                PlannerFailure::Syntax(db.message().to_string())
            }
            _ => PlannerFailure::Transport(db.message().to_string()),
        },
        _ => PlannerFailure::Transport(e.to_string()),
    }
}

/// Like `map_sqlx_error`, but an undefined hypopg function means the
/// extension is absent rather than a user syntax error.
fn map_hypopg_error(e: sqlx::Error) -> PlannerFailure {
    if let sqlx::Error::Database(db) = &e
        && db.code().as_deref() == Some("42883")
    {
        return PlannerFailure::Unavailable;
    }
    map_sqlx_error(e)
}
