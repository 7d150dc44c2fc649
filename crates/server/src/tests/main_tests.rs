use super::*;
use axum::{
    body::{self, Body},
    http::{header, Method, Request},
    response::Response,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn test_app() -> Router {
    test_app_with_cors(true).await
}

async fn test_app_with_cors(cors_allow_any_origin: bool) -> Router {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    build_router(Arc::new(AppState {
        api: ApiContext { storage },
        cors_allow_any_origin,
    }))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> Response {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request");
    app.clone().oneshot(request).await.expect("response")
}

async fn read_json<T: DeserializeOwned>(response: Response) -> T {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

async fn create(app: &Router, path: &str, body: Value) -> i64 {
    let response = send(app, Method::POST, path, Some(body)).await;
    assert_eq!(response.status(), StatusCode::CREATED, "POST {path}");
    let created: Value = read_json(response).await;
    let key = created
        .as_object()
        .and_then(|fields| fields.keys().find(|key| key.ends_with("_id")).cloned())
        .expect("id field");
    created[key.as_str()].as_i64().expect("numeric id")
}

struct Fixture {
    passport: i64,
    adult: i64,
    kerala: i64,
    delhi: i64,
    doc_a: i64,
    doc_b: i64,
}

async fn fixture(app: &Router) -> Fixture {
    Fixture {
        passport: create(app, "/api/admin/processes", json!({ "name": "Passport" })).await,
        adult: create(
            app,
            "/api/admin/age-categories",
            json!({ "name": "Adult", "min_age": 18, "max_age": 59 }),
        )
        .await,
        kerala: create(app, "/api/admin/regions", json!({ "name": "Kerala" })).await,
        delhi: create(app, "/api/admin/regions", json!({ "name": "Delhi" })).await,
        doc_a: create(app, "/api/admin/documents", json!({ "name": "DocA" })).await,
        doc_b: create(
            app,
            "/api/admin/documents",
            json!({ "name": "DocB", "notes": "Recent bill" }),
        )
        .await,
    }
}

#[tokio::test]
async fn healthz_reports_ok_when_storage_is_ready() {
    let app = test_app().await;
    let response = send(&app, Method::GET, "/healthz", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn search_merges_regional_rows_over_nationwide_rows() {
    let app = test_app().await;
    let f = fixture(&app).await;

    let nationwide = send(
        &app,
        Method::PUT,
        "/api/admin/requirements",
        Some(json!({
            "process_id": f.passport,
            "age_category_id": f.adult,
            "region_id": null,
            "items": [
                { "document_id": f.doc_a, "sort_order": 1, "step_description": "ID proof" },
                { "document_id": f.doc_b, "sort_order": 2, "step_description": "Address proof" }
            ]
        })),
    )
    .await;
    assert_eq!(nationwide.status(), StatusCode::OK);
    let summary: ReconcileSummary = read_json(nationwide).await;
    assert_eq!(summary.inserted, 2);

    let regional = send(
        &app,
        Method::PUT,
        "/api/admin/requirements",
        Some(json!({
            "process_id": f.passport,
            "age_category_id": f.adult,
            "region_id": f.kerala,
            "items": [
                { "document_id": f.doc_a, "sort_order": 1, "step_description": "Kerala-specific ID" }
            ]
        })),
    )
    .await;
    assert_eq!(regional.status(), StatusCode::OK);

    let response = send(
        &app,
        Method::GET,
        &format!(
            "/api/search?process_id={}&age_category_id={}&region_id={}",
            f.passport, f.adult, f.kerala
        ),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let result: SearchResult = read_json(response).await;
    let items: Vec<_> = result
        .documents
        .iter()
        .map(|item| (item.document_name.as_str(), item.step_description.as_deref()))
        .collect();
    assert_eq!(
        items,
        vec![
            ("DocA", Some("Kerala-specific ID")),
            ("DocB", Some("Address proof")),
        ]
    );

    let response = send(
        &app,
        Method::GET,
        &format!(
            "/api/search?process_id={}&age_category_id={}&region_id={}",
            f.passport, f.adult, f.delhi
        ),
        None,
    )
    .await;
    let delhi: SearchResult = read_json(response).await;
    assert_eq!(delhi.documents[0].step_description.as_deref(), Some("ID proof"));

    let response = send(
        &app,
        Method::GET,
        &format!(
            "/api/admin/requirements?process_id={}&age_category_id={}&region_id={}",
            f.passport, f.adult, f.kerala
        ),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let rows: Vec<Requirement> = read_json(response).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].region_id, Some(RegionId(f.kerala)));

    let response = send(
        &app,
        Method::GET,
        &format!(
            "/api/admin/requirements?process_id={}&age_category_id={}",
            f.passport, f.adult
        ),
        None,
    )
    .await;
    let rows: Vec<Requirement> = read_json(response).await;
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| row.region_id.is_none()));
}

#[tokio::test]
async fn reconcile_with_unknown_document_is_bad_request() {
    let app = test_app().await;
    let f = fixture(&app).await;

    let response = send(
        &app,
        Method::PUT,
        "/api/admin/requirements",
        Some(json!({
            "process_id": f.passport,
            "age_category_id": f.adult,
            "region_id": f.kerala,
            "items": [
                { "document_id": f.doc_a, "sort_order": 1, "step_description": null },
                { "document_id": 9999, "sort_order": 2, "step_description": null }
            ]
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: ApiError = read_json(response).await;
    assert_eq!(error.code, ErrorCode::Validation);
    assert_eq!(error.details, vec!["document_id=9999".to_string()]);

    let response = send(
        &app,
        Method::GET,
        &format!(
            "/api/search?process_id={}&age_category_id={}&region_id={}",
            f.passport, f.adult, f.kerala
        ),
        None,
    )
    .await;
    let result: SearchResult = read_json(response).await;
    assert!(result.documents.is_empty());
}

#[tokio::test]
async fn reference_crud_maps_errors_to_statuses() {
    let app = test_app().await;
    let f = fixture(&app).await;

    let duplicate = send(
        &app,
        Method::POST,
        "/api/admin/regions",
        Some(json!({ "name": "Kerala" })),
    )
    .await;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    let blank = send(
        &app,
        Method::POST,
        "/api/admin/documents",
        Some(json!({ "name": "   " })),
    )
    .await;
    assert_eq!(blank.status(), StatusCode::BAD_REQUEST);

    let inverted = send(
        &app,
        Method::POST,
        "/api/admin/age-categories",
        Some(json!({ "name": "Odd", "min_age": 60, "max_age": 18 })),
    )
    .await;
    assert_eq!(inverted.status(), StatusCode::BAD_REQUEST);

    let renamed = send(
        &app,
        Method::PUT,
        &format!("/api/admin/processes/{}", f.passport),
        Some(json!({ "name": "Passport Application", "description": "Fresh passport" })),
    )
    .await;
    assert_eq!(renamed.status(), StatusCode::OK);
    let process: Process = read_json(renamed).await;
    assert_eq!(process.name, "Passport Application");
    assert_eq!(process.description.as_deref(), Some("Fresh passport"));

    let deleted = send(
        &app,
        Method::DELETE,
        &format!("/api/admin/regions/{}", f.delhi),
        None,
    )
    .await;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    let again = send(
        &app,
        Method::DELETE,
        &format!("/api/admin/regions/{}", f.delhi),
        None,
    )
    .await;
    assert_eq!(again.status(), StatusCode::NOT_FOUND);

    let missing = send(
        &app,
        Method::PUT,
        "/api/admin/documents/4242",
        Some(json!({ "name": "Ghost" })),
    )
    .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let response = send(&app, Method::GET, "/api/admin/regions", None).await;
    let regions: Vec<Region> = read_json(response).await;
    let names: Vec<_> = regions.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Kerala"]);
}

#[tokio::test]
async fn sync_feed_reports_deleted_rows_after_watermark() {
    let app = test_app().await;
    let f = fixture(&app).await;

    let response = send(&app, Method::GET, "/api/sync", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let initial: SyncResponse = read_json(response).await;
    assert_eq!(initial.regions.len(), 2);
    assert_eq!(initial.documents.len(), 2);
    assert!(initial.requirements.is_empty());

    let deleted = send(
        &app,
        Method::DELETE,
        &format!("/api/admin/documents/{}", f.doc_b),
        None,
    )
    .await;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    let watermark = initial
        .server_time
        .to_rfc3339_opts(chrono::SecondsFormat::Micros, true);
    let response = send(
        &app,
        Method::GET,
        &format!("/api/sync?last_sync={watermark}"),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let delta: SyncResponse = read_json(response).await;
    assert!(delta.regions.is_empty());
    assert_eq!(delta.documents.len(), 1);
    assert_eq!(delta.documents[0].document_id, DocumentId(f.doc_b));
    assert!(delta.documents[0].is_deleted);
}

#[tokio::test]
async fn sync_user_promotes_first_user_only() {
    let app = test_app().await;

    let blank = send(
        &app,
        Method::POST,
        "/api/auth/sync-user",
        Some(json!({ "external_subject": " " })),
    )
    .await;
    assert_eq!(blank.status(), StatusCode::BAD_REQUEST);

    let first = send(
        &app,
        Method::POST,
        "/api/auth/sync-user",
        Some(json!({ "external_subject": "uid-1", "email": "first@example.com" })),
    )
    .await;
    assert_eq!(first.status(), StatusCode::OK);
    let first: UserSummary = read_json(first).await;
    assert_eq!(first.role, shared::domain::Role::Admin);

    let second = send(
        &app,
        Method::POST,
        "/api/auth/sync-user",
        Some(json!({ "external_subject": "uid-2", "is_anonymous": true })),
    )
    .await;
    let second: UserSummary = read_json(second).await;
    assert_eq!(second.role, shared::domain::Role::User);
}

#[tokio::test]
async fn permissive_cors_is_optional() {
    let preflight = |app: Router| async move {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/search")
            .header(header::ORIGIN, "https://app.example.com")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .body(Body::empty())
            .expect("request");
        app.oneshot(request).await.expect("response")
    };

    let open = preflight(test_app_with_cors(true).await).await;
    assert!(open
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));

    let closed = preflight(test_app_with_cors(false).await).await;
    assert!(!closed
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}

#[test]
fn error_codes_map_to_http_statuses() {
    assert_eq!(status_for(ErrorCode::NotFound), StatusCode::NOT_FOUND);
    assert_eq!(status_for(ErrorCode::Validation), StatusCode::BAD_REQUEST);
    assert_eq!(status_for(ErrorCode::Conflict), StatusCode::CONFLICT);
    assert_eq!(
        status_for(ErrorCode::Unavailable),
        StatusCode::SERVICE_UNAVAILABLE
    );
    assert_eq!(
        status_for(ErrorCode::Internal),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}
