//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `ReportStore` and `ChatStore` ports from the `core` crate. It handles
//! all interactions with the SQLite database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use report_core::domain::{
    Chat, ChatPage, EmployeeStat, NewReport, RecentReport, Report, ReportFilter, ReportPage,
    ReportStatistics,
};
use report_core::ports::{ChatStore, PortError, PortResult, ReportStore};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use std::fmt::Display;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

/// Attempts made on the initial database connection before giving up.
const CONNECT_ATTEMPTS: u32 = 5;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `ReportStore` and `ChatStore` ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: SqlitePool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter` from an already-connected pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connects to the database with a bounded retry and doubling backoff,
    /// then wraps the pool. The process owns the pool explicitly; there is
    /// no ambient global connection.
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let mut delay = Duration::from_millis(500);
        let mut attempt = 1;
        let pool = loop {
            match SqlitePoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await
            {
                Ok(pool) => break pool,
                Err(e) if attempt < CONNECT_ATTEMPTS => {
                    warn!(
                        "Database connection attempt {} failed: {}. Retrying in {:?}",
                        attempt, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        };
        Ok(Self::new(pool))
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: impl Display) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ReportRecord {
    id: String,
    employee_name: String,
    month: String,
    year: i64,
    report_file: String,
    file_name: String,
    file_size: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ReportRecord {
    fn to_domain(self) -> PortResult<Report> {
        Ok(Report {
            id: Uuid::parse_str(&self.id).map_err(unexpected)?,
            employee_name: self.employee_name,
            month: self.month,
            year: self.year as i32,
            report_file: self.report_file,
            file_name: self.file_name,
            file_size: self.file_size,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct RecentReportRecord {
    employee_name: String,
    month: String,
    year: i64,
    created_at: DateTime<Utc>,
}

impl RecentReportRecord {
    fn to_domain(self) -> RecentReport {
        RecentReport {
            employee_name: self.employee_name,
            month: self.month,
            year: self.year as i32,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct EmployeeStatRecord {
    employee_name: String,
    total_reports: i64,
    last_generated: DateTime<Utc>,
}

impl EmployeeStatRecord {
    fn to_domain(self) -> EmployeeStat {
        EmployeeStat {
            employee_name: self.employee_name,
            total_reports: self.total_reports,
            last_generated: self.last_generated,
        }
    }
}

#[derive(FromRow)]
struct ChatRecord {
    record_id: String,
    id: String,
    name: String,
    messagesss: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ChatRecord {
    fn to_domain(self) -> PortResult<Chat> {
        Ok(Chat {
            record_id: Uuid::parse_str(&self.record_id).map_err(unexpected)?,
            id: self.id,
            name: self.name,
            messagesss: self.messagesss,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const REPORT_COLUMNS: &str =
    "id, employee_name, month, year, report_file, file_name, file_size, created_at, updated_at";

/// Appends the report listing filters to a query. `employee_name` is a
/// substring match (SQLite LIKE is case-insensitive for ASCII), month and
/// year are exact.
fn push_report_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &ReportFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(name) = &filter.employee_name {
        // `%` and `_` in the search term act as LIKE wildcards; the pattern
        // is not escaped.
        qb.push(" AND employee_name LIKE ")
            .push_bind(format!("%{}%", name));
    }
    if let Some(month) = &filter.month {
        qb.push(" AND month = ").push_bind(month.clone());
    }
    if let Some(year) = filter.year {
        qb.push(" AND year = ").push_bind(year);
    }
}

/// Appends the chat pagination filters: exclusion of already-loaded record
/// identities and the optional case-insensitive name search.
fn push_chat_filters(qb: &mut QueryBuilder<'_, Sqlite>, exclude_ids: &[Uuid], search: &str) {
    qb.push(" WHERE 1 = 1");
    if !exclude_ids.is_empty() {
        qb.push(" AND record_id NOT IN (");
        let mut separated = qb.separated(", ");
        for id in exclude_ids {
            separated.push_bind(id.to_string());
        }
        qb.push(")");
    }
    if !search.is_empty() {
        // Same unescaped LIKE pattern as the report name filter.
        qb.push(" AND name LIKE ").push_bind(format!("%{}%", search));
    }
}

//=========================================================================================
// `ReportStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ReportStore for DbAdapter {
    async fn find_by_key(
        &self,
        employee_name: &str,
        month: &str,
        year: i32,
    ) -> PortResult<Option<Report>> {
        let record = sqlx::query_as::<_, ReportRecord>(
            "SELECT id, employee_name, month, year, report_file, file_name, file_size, \
             created_at, updated_at \
             FROM reports WHERE employee_name = ? AND month = ? AND year = ? \
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(employee_name)
        .bind(month)
        .bind(year)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        record.map(ReportRecord::to_domain).transpose()
    }

    async fn insert(&self, report: NewReport) -> PortResult<Report> {
        // Required-field enforcement lives here, in the store layer. A
        // violation surfaces as an Unexpected error (HTTP 500, not 400),
        // matching the historical behavior of the record schema.
        for (field, value) in [
            ("employeeName", &report.employee_name),
            ("month", &report.month),
            ("report_file", &report.report_file),
            ("fileName", &report.file_name),
        ] {
            if value.trim().is_empty() {
                return Err(PortError::Unexpected(format!(
                    "reports validation failed: `{}` is required",
                    field
                )));
            }
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO reports (id, employee_name, month, year, report_file, file_name, \
             file_size, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(&report.employee_name)
        .bind(&report.month)
        .bind(report.year)
        .bind(&report.report_file)
        .bind(&report.file_name)
        .bind(report.file_size)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(Report {
            id,
            employee_name: report.employee_name,
            month: report.month,
            year: report.year,
            report_file: report.report_file,
            file_name: report.file_name,
            file_size: report.file_size,
            created_at: now,
            updated_at: now,
        })
    }

    async fn list(&self, filter: &ReportFilter, page: i64, limit: i64) -> PortResult<ReportPage> {
        let page = page.max(1);
        let limit = limit.max(1);
        let offset = (page - 1) * limit;

        let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM reports");
        push_report_filters(&mut count_query, filter);
        let (total,): (i64,) = count_query
            .build_query_as()
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;

        let mut items_query =
            QueryBuilder::new(format!("SELECT {} FROM reports", REPORT_COLUMNS));
        push_report_filters(&mut items_query, filter);
        items_query.push(" ORDER BY created_at DESC LIMIT ");
        items_query.push_bind(limit);
        items_query.push(" OFFSET ");
        items_query.push_bind(offset);

        let records: Vec<ReportRecord> = items_query
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;

        let items = records
            .into_iter()
            .map(ReportRecord::to_domain)
            .collect::<PortResult<Vec<_>>>()?;

        Ok(ReportPage {
            items,
            total,
            page,
            total_pages: (total + limit - 1) / limit,
        })
    }

    async fn get_by_id(&self, id: Uuid) -> PortResult<Report> {
        let record = sqlx::query_as::<_, ReportRecord>(
            "SELECT id, employee_name, month, year, report_file, file_name, file_size, \
             created_at, updated_at FROM reports WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        match record {
            Some(record) => record.to_domain(),
            None => Err(PortError::NotFound(format!("Report {} not found", id))),
        }
    }

    async fn delete(&self, id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM reports WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Report {} not found", id)));
        }
        Ok(())
    }

    async fn statistics(&self) -> PortResult<ReportStatistics> {
        let (total_reports,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM reports")
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;

        let (total_employees,): (i64,) =
            sqlx::query_as("SELECT COUNT(DISTINCT employee_name) FROM reports")
                .fetch_one(&self.pool)
                .await
                .map_err(unexpected)?;

        let recent = sqlx::query_as::<_, RecentReportRecord>(
            "SELECT employee_name, month, year, created_at FROM reports \
             ORDER BY created_at DESC LIMIT 5",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let per_employee = sqlx::query_as::<_, EmployeeStatRecord>(
            "SELECT employee_name, COUNT(*) AS total_reports, MAX(created_at) AS last_generated \
             FROM reports GROUP BY employee_name ORDER BY total_reports DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(ReportStatistics {
            total_reports,
            total_employees,
            recent_reports: recent
                .into_iter()
                .map(RecentReportRecord::to_domain)
                .collect(),
            employee_stats: per_employee
                .into_iter()
                .map(EmployeeStatRecord::to_domain)
                .collect(),
        })
    }
}

//=========================================================================================
// `ChatStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ChatStore for DbAdapter {
    async fn paginate(
        &self,
        exclude_ids: &[Uuid],
        per_page: i64,
        search: &str,
    ) -> PortResult<ChatPage> {
        // Collection-wide count, ignoring the filter on purpose.
        let (total_in_db,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chats")
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;

        let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM chats");
        push_chat_filters(&mut count_query, exclude_ids, search);
        let (total_matching,): (i64,) = count_query
            .build_query_as()
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;

        let mut items_query = QueryBuilder::new(
            "SELECT record_id, id, name, messagesss, created_at, updated_at FROM chats",
        );
        push_chat_filters(&mut items_query, exclude_ids, search);
        // Oldest first: the client excludes what it has already seen.
        items_query.push(" ORDER BY created_at ASC LIMIT ");
        items_query.push_bind(per_page);

        let records: Vec<ChatRecord> = items_query
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;

        let data = records
            .into_iter()
            .map(ChatRecord::to_domain)
            .collect::<PortResult<Vec<_>>>()?;

        let has_more = data.len() as i64 == per_page;
        Ok(ChatPage {
            data,
            total_in_db,
            total_matching,
            has_more,
        })
    }
}

//=========================================================================================
// Tests
//=========================================================================================
