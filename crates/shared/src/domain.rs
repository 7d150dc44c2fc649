use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(RegionId);
id_newtype!(AgeCategoryId);
id_newtype!(ProcessId);
id_newtype!(DocumentId);
id_newtype!(RequirementId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw {
            "admin" => Role::Admin,
            _ => Role::User,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Region,
    AgeCategory,
    Process,
    Document,
}

impl ReferenceKind {
    pub fn field_name(self) -> &'static str {
        match self {
            ReferenceKind::Region => "region_id",
            ReferenceKind::AgeCategory => "age_category_id",
            ReferenceKind::Process => "process_id",
            ReferenceKind::Document => "document_id",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub region_id: RegionId,
    pub name: String,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeCategory {
    pub age_category_id: AgeCategoryId,
    pub name: String,
    pub min_age: i32,
    pub max_age: i32,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Process {
    pub process_id: ProcessId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub document_id: DocumentId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequirementScope {
    pub process_id: ProcessId,
    pub age_category_id: AgeCategoryId,
    #[serde(default)]
    pub region_id: Option<RegionId>,
}

impl RequirementScope {
    pub fn new(
        process_id: ProcessId,
        age_category_id: AgeCategoryId,
        region_id: Option<RegionId>,
    ) -> Self {
        Self {
            process_id,
            age_category_id,
            region_id,
        }
    }

    pub fn nationwide(self) -> Self {
        Self {
            region_id: None,
            ..self
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub requirement_id: RequirementId,
    pub process_id: ProcessId,
    pub age_category_id: AgeCategoryId,
    #[serde(default)]
    pub region_id: Option<RegionId>,
    pub document_id: DocumentId,
    pub sort_order: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_description: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: UserId,
    pub external_subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub is_anonymous: bool,
    pub role: Role,
    pub last_login_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
