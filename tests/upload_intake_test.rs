use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use geo_importer::config::ImporterConfig;
use geo_importer::infrastructure::database;
use geo_importer::utils::auth::create_jwt;
use geo_importer::{AppState, create_app};
use http_body_util::BodyExt;
use sea_orm::Database;
use serde_json::Value;
use std::io::Write;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "----geoimporterboundary7MA4YWxkTrZu0gW";
const SECRET: &str = "integration-secret";

struct TestApp {
    app: Router,
    _root: TempDir,
}

async fn setup_with(adjust: impl FnOnce(&mut ImporterConfig)) -> TestApp {
    let root = tempfile::tempdir().unwrap();
    let mut config = ImporterConfig::development();
    config.upload_dir = root.path().to_path_buf();
    config.jwt_secret = SECRET.to_string();
    adjust(&mut config);

    let db = Database::connect("sqlite::memory:").await.unwrap();
    database::run_migrations(&db).await.unwrap();

    TestApp {
        app: create_app(AppState::new(db, config)),
        _root: root,
    }
}

async fn setup() -> TestApp {
    setup_with(|_| {}).await
}

fn token(user: &str) -> String {
    create_jwt(user, SECRET).unwrap()
}

fn shp() -> Vec<u8> {
    let mut data = vec![0u8; 100];
    data[..4].copy_from_slice(&[0x00, 0x00, 0x27, 0x0A]);
    data
}

fn dbf() -> Vec<u8> {
    let mut data = vec![0u8; 33];
    data[0] = 0x03;
    data
}

fn prj() -> Vec<u8> {
    b"GEOGCS[\"GCS_WGS_1984\"]".to_vec()
}

fn geojson() -> Vec<u8> {
    br#"{"type":"FeatureCollection","features":[]}"#.to_vec()
}

fn zip_of(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut cursor);
        let options =
            zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, data) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }
    cursor.into_inner()
}

fn multipart(files: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, data) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\n\
                 Content-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(uri: &str, token: Option<&str>, files: &[(&str, Vec<u8>)]) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(multipart(files))).unwrap()
}

fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_json_upload_creates_records() {
    let t = setup().await;
    let token = token("ana");

    let (status, json) = send(
        &t.app,
        upload_request(
            "/uploads/new/json",
            Some(&token),
            &[("parcels.geojson", geojson())],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", json);
    assert_eq!(json["state"], "UPLOADED");
    assert_eq!(json["count"], 1);
    assert_eq!(json["files"][0]["name"], "parcels.geojson");
    assert_eq!(json["size"], geojson().len());

    let (status, listed) = send(&t.app, get_request("/uploads", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["id"], json["id"]);
    assert_eq!(listed[0]["layers"][0]["status"], "UNKNOWN");

    let (status, page) = send(
        &t.app,
        get_request("/importer-api/uploaded-data/", Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["meta"]["total_count"], 1);
    assert_eq!(page["meta"]["limit"], 20);
    assert_eq!(page["objects"][0]["name"], "parcels.geojson");
}

#[tokio::test]
async fn test_form_upload_redirects_to_list() {
    let t = setup().await;
    let response = t
        .app
        .clone()
        .oneshot(upload_request(
            "/uploads/new",
            Some(&token("ana")),
            &[("parcels.geojson", geojson())],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/uploads");
}

#[tokio::test]
async fn test_upload_form_requires_login() {
    let t = setup().await;

    let response = t
        .app
        .clone()
        .oneshot(get_request("/uploads/new", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = t
        .app
        .clone()
        .oneshot(get_request(
            &format!("/uploads/new?token={}", token("ana")),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(String::from_utf8_lossy(&body).contains("multipart/form-data"));
}

#[tokio::test]
async fn test_unauthenticated_upload_is_rejected() {
    let t = setup().await;

    let (status, _) = send(
        &t.app,
        upload_request("/uploads/new/json", None, &[("a.geojson", geojson())]),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &t.app,
        upload_request(
            "/uploads/new/json",
            Some("not-a-token"),
            &[("a.geojson", geojson())],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_incomplete_shapefile_is_a_field_error() {
    let t = setup().await;
    let archive = zip_of(&[("a.shp", shp()), ("a.dbf", dbf())]);

    let (status, json) = send(
        &t.app,
        upload_request(
            "/uploads/new/json",
            Some(&token("ana")),
            &[("a.zip", archive)],
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        json["errors"],
        serde_json::json!(["Shapefiles must include .shp, .dbf, .shx, .prj"])
    );

    let (_, listed) = send(&t.app, get_request("/uploads", Some(&token("ana")))).await;
    assert!(listed.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_complete_shapefile_archive_is_accepted() {
    let t = setup().await;
    let archive = zip_of(&[
        ("roads/roads.shp", shp()),
        ("roads/roads.shx", shp()),
        ("roads/roads.dbf", dbf()),
        ("roads/roads.prj", prj()),
        ("roads/roads.xml", b"<metadata/>".to_vec()),
    ]);

    let (status, json) = send(
        &t.app,
        upload_request(
            "/uploads/new/json",
            Some(&token("ana")),
            &[("roads.zip", archive)],
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{}", json);
    assert_eq!(json["count"], 4);
    let names: Vec<&str> = json["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["name"].as_str().unwrap())
        .collect();
    assert!(!names.contains(&"roads.xml"));
}

#[tokio::test]
async fn test_quota_is_enforced_per_user() {
    let t = setup_with(|c| c.user_upload_quota = Some(100)).await;
    let token = token("ana");
    let csv = |n: usize| {
        let mut data = b"x,y\n".to_vec();
        data.resize(n, b'1');
        data
    };

    let (status, json) = send(
        &t.app,
        upload_request("/uploads/new/json", Some(&token), &[("a.csv", csv(90))]),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", json);

    let (status, json) = send(
        &t.app,
        upload_request("/uploads/new/json", Some(&token), &[("b.csv", csv(20))]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        json["errors"][0],
        "User Quota Exceeded. Quota: 100.0 bytes Used: 90.0 bytes Adding: 20.0 bytes"
    );

    // Another user has their own allowance
    let (status, _) = send(
        &t.app,
        upload_request(
            "/uploads/new/json",
            Some(&create_jwt("ben", SECRET).unwrap()),
            &[("b.csv", csv(20))],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_upload_without_importable_files_is_rejected() {
    let t = setup().await;

    let (status, json) = send(
        &t.app,
        upload_request(
            "/uploads/new/json",
            Some(&token("ana")),
            &[("notes.docx", b"meeting notes".to_vec())],
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let errors = json["errors"].as_array().unwrap();
    assert!(errors.iter().any(|e| e.as_str().unwrap().contains("notes.docx")));
}

#[tokio::test]
async fn test_bulk_import_queues_layers_and_status_is_public() {
    let t = setup().await;

    let (status, json) = send(
        &t.app,
        upload_request(
            "/bulk-import/",
            Some(&token("ana")),
            &[("a.geojson", geojson()), ("b.geojson", geojson())],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", json);
    assert_eq!(json["state"], "QUEUED");
    assert_eq!(json["layers"].as_array().unwrap().len(), 2);

    let id = json["id"].as_i64().unwrap();
    for uri in [
        format!("/upload-data-import-status/{}", id),
        format!("/upload-data-import-status/{}/", id),
    ] {
        let (status, status_json) = send(&t.app, get_request(&uri, None)).await;
        assert_eq!(status, StatusCode::OK);
        for layer in status_json["layers"].as_array().unwrap() {
            assert_eq!(layer["status"], "PENDING");
            assert!(layer["task_id"].is_string());
        }
    }
}

#[tokio::test]
async fn test_status_of_unknown_upload_is_not_found() {
    let t = setup().await;
    let (status, json) = send(&t.app, get_request("/upload-data-import-status/999", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_one_shot_demo_is_public() {
    let t = setup().await;

    let response = t
        .app
        .clone()
        .oneshot(get_request("/one-shot-demo", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (status, json) = send(
        &t.app,
        upload_request(
            "/one-shot-demo_file-upload",
            None,
            &[("demo.geojson", geojson())],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", json);
    assert_eq!(json["state"], "QUEUED");
}

#[tokio::test]
async fn test_one_shot_upload_is_attributed_when_logged_in() {
    let t = setup().await;
    let token = token("ana");

    let (status, _) = send(
        &t.app,
        upload_request(
            "/one-shot-demo_file-upload/",
            Some(&token),
            &[("demo.geojson", geojson())],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, listed) = send(&t.app, get_request("/uploads", Some(&token))).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_rest_collections_are_scoped_and_paginated() {
    let t = setup().await;
    for user in ["ana", "ana", "ben"] {
        let (status, _) = send(
            &t.app,
            upload_request(
                "/uploads/new/json",
                Some(&token(user)),
                &[("a.geojson", geojson())],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
    let ana = token("ana");

    let (status, _) = send(&t.app, get_request("/importer-api/uploaded-layers", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, page) = send(
        &t.app,
        get_request("/importer-api/uploaded-layers?limit=1&offset=1", Some(&ana)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["meta"]["total_count"], 2);
    assert_eq!(page["objects"].as_array().unwrap().len(), 1);

    let (status, _) = send(
        &t.app,
        get_request("/importer-api/uploaded-files?limit=5000", Some(&ana)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, files) = send(
        &t.app,
        get_request("/importer-api/uploaded-files", Some(&ana)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let uri = files["objects"][0]["resource_uri"].as_str().unwrap().to_string();
    let (status, detail) = send(&t.app, get_request(&uri, Some(&ana))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["resource_uri"], uri.as_str());

    // ben's upload is the third one
    let (status, _) = send(
        &t.app,
        get_request("/importer-api/uploaded-data/3", Some(&ana)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_geonode_backend_is_selected_by_flag() {
    let t = setup_with(|c| c.geonode_enabled = true).await;
    let token = token("ana");

    let (status, _) = send(
        &t.app,
        upload_request(
            "/uploads/new/json",
            Some(&token),
            &[("a.geojson", geojson())],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, health) = send(&t.app, get_request("/health", None)).await;
    assert_eq!(health["resources"], "geonode");

    let (status, page) = send(
        &t.app,
        get_request("/importer-api/uploaded-data", Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["objects"][0]["layers"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_health_and_request_id() {
    let t = setup().await;

    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "abc-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-request-id"], "abc-123");

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["database"], "connected");
    assert_eq!(json["resources"], "standard");
}

#[tokio::test]
async fn test_openapi_document_lists_importer_routes() {
    let t = setup().await;
    let (status, doc) = send(&t.app, get_request("/api-docs/openapi.json", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/uploads/new/json"].is_object());
    assert!(doc["paths"]["/upload-data-import-status/{id}"].is_object());
}
