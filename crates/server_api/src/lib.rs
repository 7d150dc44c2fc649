use chrono::{DateTime, Utc};
use shared::{
    domain::{AgeCategoryId, ProcessId, RegionId, Requirement, RequirementScope},
    error::{ApiError, ErrorCode},
    protocol::{
        ReconcileSummary, RequirementUpsertRequest, SearchResult, SyncResponse, UserSummary,
        UserSyncRequest,
    },
    requirements::merge_overrides,
};
use storage::{classify_error, InvalidReference, ReconcileOutcome, Storage, StoreFailure};
use tracing::{debug, error, info, warn};

pub mod reference;
pub mod seed;

const MAX_SUBJECT_LEN: usize = 128;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
}

pub async fn resolve_requirements(
    ctx: &ApiContext,
    process_id: ProcessId,
    age_category_id: AgeCategoryId,
    region_id: RegionId,
) -> Result<SearchResult, ApiError> {
    let regional_scope = RequirementScope::new(process_id, age_category_id, Some(region_id));
    let regional = ctx
        .storage
        .list_scope_documents(regional_scope)
        .await
        .map_err(store_error)?;
    let nationwide = ctx
        .storage
        .list_scope_documents(regional_scope.nationwide())
        .await
        .map_err(store_error)?;

    let overrides = regional.len();
    let documents = merge_overrides(nationwide, regional);
    debug!(
        %process_id,
        %age_category_id,
        %region_id,
        overrides,
        resolved = documents.len(),
        "resolved requirements"
    );

    Ok(SearchResult {
        process_id,
        age_category_id,
        region_id,
        documents,
    })
}

pub async fn list_scope_requirements(
    ctx: &ApiContext,
    scope: RequirementScope,
) -> Result<Vec<Requirement>, ApiError> {
    ctx.storage
        .list_scope_requirements(scope)
        .await
        .map_err(store_error)
}

pub async fn reconcile_requirements(
    ctx: &ApiContext,
    request: &RequirementUpsertRequest,
) -> Result<ReconcileSummary, ApiError> {
    let scope = RequirementScope::new(
        request.process_id,
        request.age_category_id,
        request.region_id,
    );
    let outcome = ctx
        .storage
        .reconcile_requirements(scope, &request.items)
        .await
        .map_err(store_error)?;

    match outcome {
        ReconcileOutcome::Applied(summary) => {
            info!(
                process_id = %scope.process_id,
                age_category_id = %scope.age_category_id,
                region_id = ?scope.region_id.map(|id| id.0),
                inserted = summary.inserted,
                updated = summary.updated,
                soft_deleted = summary.soft_deleted,
                unchanged = summary.unchanged,
                "reconciled requirement scope"
            );
            Ok(summary)
        }
        ReconcileOutcome::Rejected(invalid) => {
            warn!(
                process_id = %scope.process_id,
                invalid = invalid.len(),
                "rejected requirement reconciliation"
            );
            Err(
                ApiError::validation("one or more referenced entities do not exist")
                    .with_details(invalid.iter().map(describe_reference)),
            )
        }
    }
}

pub async fn sync_changes(
    ctx: &ApiContext,
    last_sync: Option<DateTime<Utc>>,
) -> Result<SyncResponse, ApiError> {
    let changes = ctx
        .storage
        .changes_since(last_sync)
        .await
        .map_err(store_error)?;
    debug!(
        ?last_sync,
        requirements = changes.requirements.len(),
        "served sync feed"
    );

    Ok(SyncResponse {
        server_time: changes.server_time,
        regions: changes.regions,
        age_categories: changes.age_categories,
        processes: changes.processes,
        documents: changes.documents,
        requirements: changes.requirements,
    })
}

pub async fn sync_user(
    ctx: &ApiContext,
    request: &UserSyncRequest,
) -> Result<UserSummary, ApiError> {
    let subject = request.external_subject.trim();
    if subject.is_empty() {
        return Err(ApiError::validation("external subject is required"));
    }
    if subject.len() > MAX_SUBJECT_LEN {
        return Err(ApiError::validation(format!(
            "external subject exceeds {MAX_SUBJECT_LEN} bytes"
        )));
    }

    let normalized = UserSyncRequest {
        external_subject: subject.to_string(),
        ..request.clone()
    };
    let user = ctx
        .storage
        .sync_user(&normalized)
        .await
        .map_err(store_error)?;
    info!(user_id = %user.user_id, role = user.role.as_str(), "synced user");

    Ok(UserSummary {
        user_id: user.user_id,
        external_subject: user.external_subject,
        email: user.email,
        role: user.role,
        updated_at: user.updated_at,
    })
}

fn describe_reference(reference: &InvalidReference) -> String {
    format!("{}={}", reference.kind.field_name(), reference.id)
}

pub fn store_error(err: anyhow::Error) -> ApiError {
    match classify_error(&err) {
        StoreFailure::Conflict => ApiError::new(ErrorCode::Conflict, err.to_string()),
        StoreFailure::Unavailable => {
            warn!(%err, "store unavailable");
            ApiError::new(ErrorCode::Unavailable, "store is unavailable, retry later")
        }
        StoreFailure::Other => {
            error!(%err, "store failure");
            ApiError::new(ErrorCode::Internal, err.to_string())
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
