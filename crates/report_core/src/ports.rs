//! crates/report_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to be independent of the concrete database and document machinery.

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{
    ChatPage, NewReport, RenderContext, Report, ReportFilter, ReportPage, ReportStatistics,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// One structured diagnostic for a template problem, keyed the way the
/// template tooling has always reported them: `{type, tag, issue}`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TagIssue {
    #[serde(rename = "type")]
    pub kind: String,
    pub tag: String,
    pub issue: String,
}

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// The bundled (or uploaded) template file is missing entirely.
    #[error("Template file not found: {0}")]
    TemplateNotFound(String),
    /// The template exists but could not be processed; carries per-tag
    /// diagnostics for the caller.
    #[error("Template error ({} issue(s))", .0.len())]
    Template(Vec<TagIssue>),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// CRUD + query operations over the report collection.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Looks up the report for an exact (employeeName, month, year) triple.
    /// Newest record wins when regeneration has left several for one key.
    async fn find_by_key(
        &self,
        employee_name: &str,
        month: &str,
        year: i32,
    ) -> PortResult<Option<Report>>;

    async fn insert(&self, report: NewReport) -> PortResult<Report>;

    /// Filtered, newest-first, offset-paginated listing. Pages are 1-indexed.
    async fn list(&self, filter: &ReportFilter, page: i64, limit: i64) -> PortResult<ReportPage>;

    async fn get_by_id(&self, id: Uuid) -> PortResult<Report>;

    /// Removes the record. The caller is responsible for the file on disk.
    async fn delete(&self, id: Uuid) -> PortResult<()>;

    async fn statistics(&self) -> PortResult<ReportStatistics>;
}

/// Paginated search over the chat collection ("load more" style: the client
/// sends the identities it already has and receives the next oldest batch).
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn paginate(
        &self,
        exclude_ids: &[Uuid],
        per_page: i64,
        search: &str,
    ) -> PortResult<ChatPage>;
}

/// What template inspection returns: the distinct tag names plus a short
/// preview of the document text.
#[derive(Debug, Clone)]
pub struct TemplateInspection {
    pub tags: Vec<String>,
    pub preview: String,
}

/// Pure transform from template bytes + data bag to rendered document bytes.
pub trait TemplateRenderer: Send + Sync {
    /// Renders the template. Unresolved tags become the empty string.
    fn render(&self, template: &[u8], ctx: &RenderContext) -> PortResult<Vec<u8>>;

    /// Read-only validation pass: extracts tags and a text preview without
    /// rendering. Unlike `render`, delimiter problems are not forgiven.
    fn inspect(&self, template: &[u8]) -> PortResult<TemplateInspection>;
}
