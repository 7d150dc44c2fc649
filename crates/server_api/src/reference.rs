use shared::{
    domain::{
        AgeCategory, AgeCategoryId, Document, DocumentId, Process, ProcessId, ReferenceKind,
        Region, RegionId,
    },
    error::ApiError,
    protocol::{AgeCategoryRequest, DocumentRequest, ProcessRequest, RegionRequest},
};
use tracing::info;

use crate::{store_error, ApiContext};

const MAX_NAME_LEN: usize = 200;

pub async fn list_regions(ctx: &ApiContext) -> Result<Vec<Region>, ApiError> {
    ctx.storage.list_regions().await.map_err(store_error)
}

pub async fn create_region(ctx: &ApiContext, req: &RegionRequest) -> Result<Region, ApiError> {
    let name = required_name(&req.name)?;
    let region = ctx.storage.create_region(&name).await.map_err(store_error)?;
    info!(region_id = %region.region_id, "created region");
    Ok(region)
}

pub async fn update_region(
    ctx: &ApiContext,
    region_id: RegionId,
    req: &RegionRequest,
) -> Result<Region, ApiError> {
    let name = required_name(&req.name)?;
    ctx.storage
        .update_region(region_id, &name)
        .await
        .map_err(store_error)?
        .ok_or_else(|| ApiError::not_found("region not found"))
}

pub async fn list_age_categories(ctx: &ApiContext) -> Result<Vec<AgeCategory>, ApiError> {
    ctx.storage.list_age_categories().await.map_err(store_error)
}

pub async fn create_age_category(
    ctx: &ApiContext,
    req: &AgeCategoryRequest,
) -> Result<AgeCategory, ApiError> {
    let name = required_name(&req.name)?;
    check_age_range(req.min_age, req.max_age)?;
    let category = ctx
        .storage
        .create_age_category(&name, req.min_age, req.max_age)
        .await
        .map_err(store_error)?;
    info!(age_category_id = %category.age_category_id, "created age category");
    Ok(category)
}

pub async fn update_age_category(
    ctx: &ApiContext,
    age_category_id: AgeCategoryId,
    req: &AgeCategoryRequest,
) -> Result<AgeCategory, ApiError> {
    let name = required_name(&req.name)?;
    check_age_range(req.min_age, req.max_age)?;
    ctx.storage
        .update_age_category(age_category_id, &name, req.min_age, req.max_age)
        .await
        .map_err(store_error)?
        .ok_or_else(|| ApiError::not_found("age category not found"))
}

pub async fn list_processes(ctx: &ApiContext) -> Result<Vec<Process>, ApiError> {
    ctx.storage.list_processes().await.map_err(store_error)
}

pub async fn create_process(ctx: &ApiContext, req: &ProcessRequest) -> Result<Process, ApiError> {
    let name = required_name(&req.name)?;
    let process = ctx
        .storage
        .create_process(&name, optional_text(req.description.as_deref()))
        .await
        .map_err(store_error)?;
    info!(process_id = %process.process_id, "created process");
    Ok(process)
}

pub async fn update_process(
    ctx: &ApiContext,
    process_id: ProcessId,
    req: &ProcessRequest,
) -> Result<Process, ApiError> {
    let name = required_name(&req.name)?;
    ctx.storage
        .update_process(process_id, &name, optional_text(req.description.as_deref()))
        .await
        .map_err(store_error)?
        .ok_or_else(|| ApiError::not_found("process not found"))
}

pub async fn list_documents(ctx: &ApiContext) -> Result<Vec<Document>, ApiError> {
    ctx.storage.list_documents().await.map_err(store_error)
}

pub async fn create_document(
    ctx: &ApiContext,
    req: &DocumentRequest,
) -> Result<Document, ApiError> {
    let name = required_name(&req.name)?;
    let document = ctx
        .storage
        .create_document(&name, optional_text(req.notes.as_deref()))
        .await
        .map_err(store_error)?;
    info!(document_id = %document.document_id, "created document");
    Ok(document)
}

pub async fn update_document(
    ctx: &ApiContext,
    document_id: DocumentId,
    req: &DocumentRequest,
) -> Result<Document, ApiError> {
    let name = required_name(&req.name)?;
    ctx.storage
        .update_document(document_id, &name, optional_text(req.notes.as_deref()))
        .await
        .map_err(store_error)?
        .ok_or_else(|| ApiError::not_found("document not found"))
}

pub async fn delete_reference(
    ctx: &ApiContext,
    kind: ReferenceKind,
    id: i64,
) -> Result<(), ApiError> {
    let deleted = ctx
        .storage
        .soft_delete_reference(kind, id)
        .await
        .map_err(store_error)?;
    if !deleted {
        return Err(ApiError::not_found(format!("{kind:?} {id} not found")));
    }
    info!(?kind, id, "soft-deleted reference entity");
    Ok(())
}

fn required_name(raw: &str) -> Result<String, ApiError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ApiError::validation("name is required").with_details(["name".to_string()]));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(ApiError::validation(format!(
            "name exceeds {MAX_NAME_LEN} bytes"
        ))
        .with_details(["name".to_string()]));
    }
    Ok(name.to_string())
}

fn optional_text(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|text| !text.is_empty())
}

fn check_age_range(min_age: i32, max_age: i32) -> Result<(), ApiError> {
    if min_age < 0 || max_age < 0 {
        return Err(ApiError::validation("ages must not be negative"));
    }
    if min_age > max_age {
        return Err(ApiError::validation("min_age must not exceed max_age")
            .with_details(["min_age".to_string(), "max_age".to_string()]));
    }
    Ok(())
}
