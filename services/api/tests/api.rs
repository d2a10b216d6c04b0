//! Integration tests that drive the full router in-process: real database
//! adapter (throwaway sqlite file), real renderer, real filesystem under a
//! temporary directory.

use api_lib::{
    adapters::{DbAdapter, DocxRenderer},
    config::Config,
    web::{api_router, AppState},
};
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::io::Write;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use tracing::Level;

const BOUNDARY: &str = "test-boundary-7d93";

/// A minimal docx archive with the given document body.
fn make_docx(body: &str) -> Vec<u8> {
    use zip::{write::FileOptions, CompressionMethod, ZipWriter};
    let document = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
         <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
         <w:body>{}</w:body></w:document>",
        body
    );
    let mut writer = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    writer.start_file("[Content_Types].xml", options).unwrap();
    writer.write_all(b"<?xml version=\"1.0\"?><Types/>").unwrap();
    writer.start_file("word/document.xml", options).unwrap();
    writer.write_all(document.as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}

async fn test_app() -> (TempDir, Router) {
    let dir = TempDir::new().unwrap();

    let template_path = dir.path().join("tasks.docx");
    std::fs::write(
        &template_path,
        make_docx("<w:p><w:r><w:t>{{employeeName}} / {{month}} {{year}}: {{tasks}}</w:t></w:r></w:p>"),
    )
    .unwrap();

    let database_url = format!(
        "sqlite://{}?mode=rwc",
        dir.path().join("db.sqlite").to_str().unwrap()
    );
    let adapter = Arc::new(DbAdapter::connect(&database_url).await.unwrap());
    adapter.run_migrations().await.unwrap();

    let config = Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        database_url,
        log_level: Level::INFO,
        template_path,
        upload_dir: dir.path().join("uploads"),
    };
    let app_state = Arc::new(AppState {
        reports: adapter.clone(),
        chats: adapter,
        renderer: Arc::new(DocxRenderer::new()),
        config: Arc::new(config),
    });
    (dir, api_router(app_state))
}

fn multipart_body(fields: &[(&str, &str)]) -> Body {
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
            BOUNDARY, name, value
        ));
    }
    body.push_str(&format!("--{}--\r\n", BOUNDARY));
    Body::from(body)
}

fn multipart_request(uri: &str, fields: &[(&str, &str)]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(multipart_body(fields))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn generate_fields<'a>() -> Vec<(&'a str, &'a str)> {
    vec![
        ("data", r#"{"tasks": ["Reviews", "Planning"], "hoursWorked": 162}"#),
        ("employeeName", "Jane Doe"),
        ("month", "March"),
        ("year", "2024"),
        ("generatedDate", "2024-03-07"),
    ]
}

#[tokio::test]
async fn health_reports_ok() {
    let (_dir, app) = test_app().await;
    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "connected");
    assert!(body["endpoints"].is_object());
}

#[tokio::test]
async fn generation_end_to_end() {
    let (dir, app) = test_app().await;

    let response = app
        .clone()
        .oneshot(multipart_request("/generate-word-from-excel", &generate_fields()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=Jane_Doe_March_2024_report.docx"
    );
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert!(!bytes.is_empty());

    // The file landed on the documented path.
    let today = chrono::Utc::now().date_naive().format("%Y-%m-%d");
    let expected = dir
        .path()
        .join("uploads/Jane_Doe/March_2024")
        .join(format!("Jane_Doe_March_2024_{}.docx", today));
    assert!(expected.exists());

    // The record is listed with matching fields and a positive size.
    let response = app.oneshot(get("/reports")).await.unwrap();
    let body = json_body(response).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["count"], json!(1));
    let report = &body["reports"][0];
    assert_eq!(report["employeeName"], "Jane Doe");
    assert_eq!(report["month"], "March");
    assert_eq!(report["year"], 2024);
    assert!(report["fileSize"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn regeneration_leaves_two_records_for_one_key() {
    let (_dir, app) = test_app().await;

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(multipart_request("/generate-word-from-excel", &generate_fields()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    // The superseded record is not deleted; both remain visible.
    let response = app.oneshot(get("/reports?employeeName=jane")).await.unwrap();
    let body = json_body(response).await;
    assert_eq!(body["total"], json!(2));
}

#[tokio::test]
async fn listing_drops_an_unparsable_year_filter() {
    let (_dir, app) = test_app().await;

    let response = app
        .clone()
        .oneshot(multipart_request("/generate-word-from-excel", &generate_fields()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Garbage in the year parameter is ignored, not matched against.
    let response = app.oneshot(get("/reports?year=abc")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["total"], json!(1));
    assert_eq!(body["reports"][0]["year"], 2024);
}

#[tokio::test]
async fn generation_without_template_is_a_400() {
    let (dir, app) = test_app().await;
    std::fs::remove_file(dir.path().join("tasks.docx")).unwrap();

    let response = app
        .oneshot(multipart_request("/generate-word-from-excel", &generate_fields()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Template file not found");
}

#[tokio::test]
async fn download_and_delete_lifecycle() {
    let (_dir, app) = test_app().await;

    let response = app
        .clone()
        .oneshot(multipart_request("/generate-word-from-excel", &generate_fields()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.clone().oneshot(get("/reports")).await.unwrap();
    let body = json_body(response).await;
    let id = body["reports"][0]["id"].as_str().unwrap().to_string();

    // Download works while the record and file exist.
    let response = app
        .clone()
        .oneshot(get(&format!("/reports/download/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Delete removes file and record.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/reports/{}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], json!(true));

    // Downloading the deleted id is a 404.
    let response = app
        .clone()
        .oneshot(get(&format!("/reports/download/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Deleting again is a 404 as well.
    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/reports/{}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_succeeds_when_the_file_is_already_gone() {
    let (_dir, app) = test_app().await;

    let response = app
        .clone()
        .oneshot(multipart_request("/generate-word-from-excel", &generate_fields()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.clone().oneshot(get("/reports")).await.unwrap();
    let body = json_body(response).await;
    let id = body["reports"][0]["id"].as_str().unwrap().to_string();
    let file = body["reports"][0]["report_file"].as_str().unwrap().to_string();
    std::fs::remove_file(file).unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/reports/{}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn stats_shape_after_generation() {
    let (_dir, app) = test_app().await;

    let response = app
        .clone()
        .oneshot(multipart_request("/generate-word-from-excel", &generate_fields()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/reports/stats")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["statistics"]["totalReports"], json!(1));
    assert_eq!(body["statistics"]["totalEmployees"], json!(1));
    assert_eq!(body["statistics"]["employeeStats"][0]["totalReports"], json!(1));
}

#[tokio::test]
async fn inspect_falls_back_to_the_bundled_template() {
    let (_dir, app) = test_app().await;

    let response = app
        .oneshot(multipart_request("/inspect-template", &[]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], json!(true));
    // Distinct tags only: employeeName, month, year, tasks.
    assert_eq!(body["tagCount"], json!(4));
}

#[tokio::test]
async fn chat_paginate_on_an_empty_collection() {
    let (_dir, app) = test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/chats/paginate")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"], json!([]));
    assert_eq!(body["totalInDB"], json!(0));
    assert_eq!(body["hasMore"], json!(false));
}
