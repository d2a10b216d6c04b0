//! crates/report_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application, plus the
//! deterministic pieces of the report lifecycle: name sanitization, the
//! on-disk folder/filename scheme, and the render-context merge.
//! These are independent of any database or web framework.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Represents one generated document instance persisted in the store.
///
/// Wire casing matches the historical API: camelCase except `report_file`,
/// which has always been snake_case.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: Uuid,
    pub employee_name: String,
    pub month: String,
    pub year: i32,
    #[serde(rename = "report_file")]
    pub report_file: String,
    pub file_name: String,
    pub file_size: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The attributes of a report that the workflow computes before the store
/// assigns identity and timestamps.
#[derive(Debug, Clone)]
pub struct NewReport {
    pub employee_name: String,
    pub month: String,
    pub year: i32,
    pub report_file: String,
    pub file_name: String,
    pub file_size: Option<i64>,
}

/// Represents a named conversation unit. Read/search only; no update surface.
///
/// `messagesss` is a single string blob, not a list. The triple-s is part of
/// the stored schema and the wire contract.
#[derive(Debug, Clone, Serialize)]
pub struct Chat {
    #[serde(rename = "_id")]
    pub record_id: Uuid,
    pub id: String,
    pub name: String,
    pub messagesss: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// Filter for the report listing. All fields optional; `employee_name` is a
/// case-insensitive substring match, month/year are exact.
#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub employee_name: Option<String>,
    pub month: Option<String>,
    pub year: Option<i32>,
}

/// One page of the report listing.
#[derive(Debug, Clone)]
pub struct ReportPage {
    pub items: Vec<Report>,
    pub total: i64,
    pub page: i64,
    pub total_pages: i64,
}

/// A recent report, projected down to the fields the dashboard shows.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentReport {
    pub employee_name: String,
    pub month: String,
    pub year: i32,
    pub created_at: DateTime<Utc>,
}

/// Per-employee aggregate: how many reports, and when the last one was made.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeStat {
    pub employee_name: String,
    pub total_reports: i64,
    pub last_generated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportStatistics {
    pub total_reports: i64,
    pub total_employees: i64,
    pub recent_reports: Vec<RecentReport>,
    pub employee_stats: Vec<EmployeeStat>,
}

/// One page of the chat listing.
///
/// `has_more` is an approximation: it is true iff the page came back full,
/// which only signals "possibly more" (a filter can leave exactly `per_page`
/// matching records, in which case the next page is empty).
#[derive(Debug, Clone)]
pub struct ChatPage {
    pub data: Vec<Chat>,
    pub total_in_db: i64,
    pub total_matching: i64,
    pub has_more: bool,
}

/// A parsed generation request: the four reserved fields plus the arbitrary
/// tabular data bag from the caller.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub employee_name: String,
    pub month: String,
    pub year: i32,
    pub generated_date: String,
    pub data: serde_json::Map<String, Value>,
}

/// The flat key/value bag handed to the template renderer.
pub type RenderContext = BTreeMap<String, String>;

/// Replaces each run of whitespace in an employee name with a single
/// underscore. Leading/trailing whitespace becomes a leading/trailing
/// underscore, matching the historical behavior.
pub fn sanitize_employee_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_run = false;
    for c in name.chars() {
        if c.is_whitespace() {
            if !in_run {
                out.push('_');
                in_run = true;
            }
        } else {
            out.push(c);
            in_run = false;
        }
    }
    out
}

/// The second directory level under the employee folder: `<month>_<year>`.
pub fn month_folder(month: &str, year: i32) -> String {
    format!("{}_{}", month, year)
}

/// The on-disk filename for a generated report. Day granularity only, so
/// regenerating within one calendar day overwrites the same file.
pub fn report_file_name(sanitized_name: &str, month: &str, year: i32, date: NaiveDate) -> String {
    format!(
        "{}_{}_{}_{}.docx",
        sanitized_name,
        month,
        year,
        date.format("%Y-%m-%d")
    )
}

/// The filename offered to the client in `Content-Disposition`.
pub fn download_file_name(sanitized_name: &str, month: &str, year: i32) -> String {
    format!("{}_{}_{}_report.docx", sanitized_name, month, year)
}

/// Builds the render context for a generation request.
///
/// Precedence rule (pinned by tests): the four reserved fields are inserted
/// first as defaults, then the caller's data bag is merged over them, so a
/// caller-supplied key wins on collision.
pub fn merge_render_context(request: &GenerateRequest) -> RenderContext {
    let mut ctx = RenderContext::new();
    ctx.insert("employeeName".to_string(), request.employee_name.clone());
    ctx.insert("month".to_string(), request.month.clone());
    ctx.insert("year".to_string(), request.year.to_string());
    ctx.insert("generatedDate".to_string(), request.generated_date.clone());
    for (key, value) in &request.data {
        ctx.insert(key.clone(), value_to_text(value));
    }
    ctx
}

/// Flattens an arbitrary JSON value into the text the template receives.
/// Arrays render as their items joined with line breaks, which the renderer
/// turns into document line breaks.
fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(value_to_text)
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Object(_) => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sanitize_collapses_whitespace_runs() {
        assert_eq!(sanitize_employee_name("Jane Doe"), "Jane_Doe");
        assert_eq!(sanitize_employee_name("Jane\t  van  Doe"), "Jane_van_Doe");
        assert_eq!(sanitize_employee_name(" Jane Doe "), "_Jane_Doe_");
        assert_eq!(sanitize_employee_name("Prince"), "Prince");
    }

    #[test]
    fn file_names_follow_the_folder_scheme() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(month_folder("March", 2024), "March_2024");
        assert_eq!(
            report_file_name("Jane_Doe", "March", 2024, date),
            "Jane_Doe_March_2024_2024-03-07.docx"
        );
        assert_eq!(
            download_file_name("Jane_Doe", "March", 2024),
            "Jane_Doe_March_2024_report.docx"
        );
    }

    #[test]
    fn reserved_fields_are_defaults() {
        let request = GenerateRequest {
            employee_name: "Jane Doe".to_string(),
            month: "March".to_string(),
            year: 2024,
            generated_date: "2024-03-07".to_string(),
            data: serde_json::Map::new(),
        };
        let ctx = merge_render_context(&request);
        assert_eq!(ctx.get("employeeName").unwrap(), "Jane Doe");
        assert_eq!(ctx.get("month").unwrap(), "March");
        assert_eq!(ctx.get("year").unwrap(), "2024");
        assert_eq!(ctx.get("generatedDate").unwrap(), "2024-03-07");
    }

    #[test]
    fn caller_data_bag_wins_on_collision() {
        let mut data = serde_json::Map::new();
        data.insert("month".to_string(), json!("Overridden"));
        data.insert("hoursWorked".to_string(), json!(162));
        let request = GenerateRequest {
            employee_name: "Jane Doe".to_string(),
            month: "March".to_string(),
            year: 2024,
            generated_date: String::new(),
            data,
        };
        let ctx = merge_render_context(&request);
        assert_eq!(ctx.get("month").unwrap(), "Overridden");
        assert_eq!(ctx.get("hoursWorked").unwrap(), "162");
        // Untouched reserved fields keep their defaults.
        assert_eq!(ctx.get("employeeName").unwrap(), "Jane Doe");
    }

    #[test]
    fn array_values_join_with_line_breaks() {
        let mut data = serde_json::Map::new();
        data.insert("tasks".to_string(), json!(["Task one", "Task two"]));
        let request = GenerateRequest {
            employee_name: "J".to_string(),
            data,
            ..Default::default()
        };
        let ctx = merge_render_context(&request);
        assert_eq!(ctx.get("tasks").unwrap(), "Task one\nTask two");
    }
}
