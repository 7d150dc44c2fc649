use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    AgeCategory, AgeCategoryId, Document, DocumentId, Process, ProcessId, Region, RegionId,
    Requirement, Role, UserId,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResultItem {
    pub document_id: DocumentId,
    pub document_name: String,
    pub sort_order: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub process_id: ProcessId,
    pub age_category_id: AgeCategoryId,
    pub region_id: RegionId,
    pub documents: Vec<SearchResultItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementItem {
    pub document_id: DocumentId,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub step_description: Option<String>,
}

impl RequirementItem {
    pub fn new(document_id: DocumentId, sort_order: i32, step_description: Option<&str>) -> Self {
        Self {
            document_id,
            sort_order,
            step_description: step_description.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequirementUpsertRequest {
    pub process_id: ProcessId,
    pub age_category_id: AgeCategoryId,
    #[serde(default)]
    pub region_id: Option<RegionId>,
    #[serde(default)]
    pub items: Vec<RequirementItem>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileSummary {
    pub inserted: usize,
    pub updated: usize,
    pub soft_deleted: usize,
    pub unchanged: usize,
}

impl ReconcileSummary {
    pub fn is_noop(&self) -> bool {
        self.inserted == 0 && self.updated == 0 && self.soft_deleted == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgeCategoryRequest {
    pub name: String,
    pub min_age: i32,
    pub max_age: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRequest {
    pub name: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResponse {
    pub server_time: DateTime<Utc>,
    pub regions: Vec<Region>,
    pub age_categories: Vec<AgeCategory>,
    pub processes: Vec<Process>,
    pub documents: Vec<Document>,
    pub requirements: Vec<Requirement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSyncRequest {
    pub external_subject: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub is_anonymous: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub user_id: UserId,
    pub external_subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: Role,
    pub updated_at: DateTime<Utc>,
}
