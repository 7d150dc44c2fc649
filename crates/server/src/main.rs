use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use server_api::{reference, seed::seed_reference_data, ApiContext};
use shared::{
    domain::{
        AgeCategory, AgeCategoryId, Document, DocumentId, Process, ProcessId, ReferenceKind,
        Region, RegionId, Requirement, RequirementScope,
    },
    error::{ApiError, ErrorCode},
    protocol::{
        AgeCategoryRequest, DocumentRequest, ProcessRequest, ReconcileSummary, RegionRequest,
        RequirementUpsertRequest, SearchResult, SyncResponse, UserSummary, UserSyncRequest,
    },
};
use storage::Storage;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, prepare_database_url};

struct AppState {
    api: ApiContext,
    cors_allow_any_origin: bool,
}

type HttpError = (StatusCode, Json<ApiError>);
type HttpResult<T> = Result<T, HttpError>;

#[derive(Debug, Deserialize)]
struct SearchQuery {
    process_id: ProcessId,
    age_category_id: AgeCategoryId,
    region_id: RegionId,
}

#[derive(Debug, Deserialize)]
struct ScopeQuery {
    process_id: ProcessId,
    age_category_id: AgeCategoryId,
    region_id: Option<RegionId>,
}

#[derive(Debug, Deserialize)]
struct SyncQuery {
    last_sync: Option<DateTime<Utc>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = load_settings()?;
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    let api = ApiContext { storage };

    if settings.seed_demo_data {
        let report = seed_reference_data(&api)
            .await
            .map_err(shared::error::ApiException::from)?;
        info!(
            seeded = report.seeded,
            requirements = report.requirements,
            "demo data check finished"
        );
    }

    let app = build_router(Arc::new(AppState {
        api,
        cors_allow_any_origin: settings.cors_allow_any_origin,
    }));

    let addr: SocketAddr = settings.bind_addr.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    let cors_allow_any_origin = state.cors_allow_any_origin;
    let admin = Router::new()
        .route(
            "/requirements",
            get(http_list_scope_requirements).put(http_reconcile_requirements),
        )
        .route("/regions", get(http_list_regions).post(http_create_region))
        .route(
            "/regions/:id",
            put(http_update_region).delete(http_delete_region),
        )
        .route(
            "/age-categories",
            get(http_list_age_categories).post(http_create_age_category),
        )
        .route(
            "/age-categories/:id",
            put(http_update_age_category).delete(http_delete_age_category),
        )
        .route(
            "/processes",
            get(http_list_processes).post(http_create_process),
        )
        .route(
            "/processes/:id",
            put(http_update_process).delete(http_delete_process),
        )
        .route(
            "/documents",
            get(http_list_documents).post(http_create_document),
        )
        .route(
            "/documents/:id",
            put(http_update_document).delete(http_delete_document),
        );

    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/search", get(http_search))
        .route("/api/sync", get(http_sync))
        .route("/api/auth/sync-user", post(http_sync_user))
        .nest("/api/admin", admin)
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if cors_allow_any_origin {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject(error: ApiError) -> HttpError {
    (status_for(error.code), Json(error))
}

async fn healthz(State(state): State<Arc<AppState>>) -> HttpResult<&'static str> {
    state.api.storage.health_check().await.map_err(|e| {
        error!(error = %e, "health check failed");
        reject(ApiError::new(ErrorCode::Unavailable, "database unreachable"))
    })?;
    Ok("ok")
}

async fn http_search(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> HttpResult<Json<SearchResult>> {
    server_api::resolve_requirements(
        &state.api,
        query.process_id,
        query.age_category_id,
        query.region_id,
    )
    .await
    .map(Json)
    .map_err(reject)
}

async fn http_list_scope_requirements(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ScopeQuery>,
) -> HttpResult<Json<Vec<Requirement>>> {
    let scope = RequirementScope::new(query.process_id, query.age_category_id, query.region_id);
    server_api::list_scope_requirements(&state.api, scope)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_reconcile_requirements(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RequirementUpsertRequest>,
) -> HttpResult<Json<ReconcileSummary>> {
    server_api::reconcile_requirements(&state.api, &req)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_sync(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SyncQuery>,
) -> HttpResult<Json<SyncResponse>> {
    server_api::sync_changes(&state.api, query.last_sync)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_sync_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UserSyncRequest>,
) -> HttpResult<Json<UserSummary>> {
    server_api::sync_user(&state.api, &req)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_list_regions(State(state): State<Arc<AppState>>) -> HttpResult<Json<Vec<Region>>> {
    reference::list_regions(&state.api)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_create_region(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegionRequest>,
) -> HttpResult<(StatusCode, Json<Region>)> {
    let region = reference::create_region(&state.api, &req)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(region)))
}

async fn http_update_region(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<RegionRequest>,
) -> HttpResult<Json<Region>> {
    reference::update_region(&state.api, RegionId(id), &req)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_delete_region(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> HttpResult<StatusCode> {
    delete(&state, ReferenceKind::Region, id).await
}

async fn http_list_age_categories(
    State(state): State<Arc<AppState>>,
) -> HttpResult<Json<Vec<AgeCategory>>> {
    reference::list_age_categories(&state.api)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_create_age_category(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AgeCategoryRequest>,
) -> HttpResult<(StatusCode, Json<AgeCategory>)> {
    let category = reference::create_age_category(&state.api, &req)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn http_update_age_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<AgeCategoryRequest>,
) -> HttpResult<Json<AgeCategory>> {
    reference::update_age_category(&state.api, AgeCategoryId(id), &req)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_delete_age_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> HttpResult<StatusCode> {
    delete(&state, ReferenceKind::AgeCategory, id).await
}

async fn http_list_processes(
    State(state): State<Arc<AppState>>,
) -> HttpResult<Json<Vec<Process>>> {
    reference::list_processes(&state.api)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_create_process(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ProcessRequest>,
) -> HttpResult<(StatusCode, Json<Process>)> {
    let process = reference::create_process(&state.api, &req)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(process)))
}

async fn http_update_process(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<ProcessRequest>,
) -> HttpResult<Json<Process>> {
    reference::update_process(&state.api, ProcessId(id), &req)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_delete_process(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> HttpResult<StatusCode> {
    delete(&state, ReferenceKind::Process, id).await
}

async fn http_list_documents(
    State(state): State<Arc<AppState>>,
) -> HttpResult<Json<Vec<Document>>> {
    reference::list_documents(&state.api)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_create_document(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DocumentRequest>,
) -> HttpResult<(StatusCode, Json<Document>)> {
    let document = reference::create_document(&state.api, &req)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(document)))
}

async fn http_update_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<DocumentRequest>,
) -> HttpResult<Json<Document>> {
    reference::update_document(&state.api, DocumentId(id), &req)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_delete_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> HttpResult<StatusCode> {
    delete(&state, ReferenceKind::Document, id).await
}

async fn delete(state: &AppState, kind: ReferenceKind, id: i64) -> HttpResult<StatusCode> {
    reference::delete_reference(&state.api, kind, id)
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
