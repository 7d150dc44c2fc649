use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite, SqliteConnection, Transaction,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
};

use shared::{
    domain::{
        AgeCategory, AgeCategoryId, Document, DocumentId, Process, ProcessId, ReferenceKind,
        Region, RegionId, Requirement, RequirementId, RequirementScope, Role, User, UserId,
    },
    protocol::{ReconcileSummary, RequirementItem, SearchResultItem, UserSyncRequest},
    requirements::{plan_reconciliation, referenced_documents, RowChange},
};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
    last_stamp: Arc<AtomicI64>,
}

/// Every entity of the five synced kinds whose `updated_at` passed a
/// watermark, deleted rows included. `server_time` is the next watermark.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub server_time: DateTime<Utc>,
    pub regions: Vec<Region>,
    pub age_categories: Vec<AgeCategory>,
    pub processes: Vec<Process>,
    pub documents: Vec<Document>,
    pub requirements: Vec<Requirement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidReference {
    pub kind: ReferenceKind,
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Applied(ReconcileSummary),
    /// Nothing was written.
    Rejected(Vec<InvalidReference>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreFailure {
    Conflict,
    Unavailable,
    Other,
}

/// Sorts a storage error into the failure classes callers report on.
pub fn classify_error(error: &anyhow::Error) -> StoreFailure {
    for cause in error.chain() {
        let Some(sqlx_error) = cause.downcast_ref::<sqlx::Error>() else {
            continue;
        };
        return match sqlx_error {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreFailure::Conflict,
            sqlx::Error::Database(db) if is_busy_code(db.code().as_deref()) => {
                StoreFailure::Unavailable
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreFailure::Unavailable
            }
            _ => StoreFailure::Other,
        };
    }
    StoreFailure::Other
}

// SQLITE_BUSY and SQLITE_LOCKED, extended codes included.
fn is_busy_code(code: Option<&str>) -> bool {
    code.and_then(|code| code.parse::<i32>().ok())
        .map(|code| matches!(code & 0xff, 5 | 6))
        .unwrap_or(false)
}

#[derive(Debug, Clone, Copy)]
enum RowFilter {
    Live,
    ChangedSince(i64),
}

impl RowFilter {
    fn clause(self) -> &'static str {
        match self {
            RowFilter::Live => "WHERE is_deleted = 0 ORDER BY name ASC",
            RowFilter::ChangedSince(_) => "WHERE updated_at > ? ORDER BY updated_at ASC, id ASC",
        }
    }
}

fn table_for(kind: ReferenceKind) -> &'static str {
    match kind {
        ReferenceKind::Region => "regions",
        ReferenceKind::AgeCategory => "age_categories",
        ReferenceKind::Process => "processes",
        ReferenceKind::Document => "documents",
    }
}

const REGION_COLUMNS: &str = "id, name, updated_at, is_deleted";
const AGE_CATEGORY_COLUMNS: &str = "id, name, min_age, max_age, updated_at, is_deleted";
const PROCESS_COLUMNS: &str = "id, name, description, updated_at, is_deleted";
const DOCUMENT_COLUMNS: &str = "id, name, notes, updated_at, is_deleted";
const REQUIREMENT_COLUMNS: &str = "id, process_id, age_category_id, region_id, document_id, sort_order, step_description, updated_at, is_deleted";
const USER_COLUMNS: &str =
    "id, external_subject, email, display_name, is_anonymous, role, last_login_at, updated_at";

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self {
            pool,
            last_stamp: Arc::new(AtomicI64::new(0)),
        })
    }

    // Every write and every sync snapshot runs under the SQLite write lock and
    // stamps after taking it, so stamp order follows commit order.
    async fn begin_write(&self) -> Result<(Transaction<'static, Sqlite>, i64)> {
        let tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;
        Ok((tx, self.next_stamp()))
    }

    // Strictly increasing within the process, even when the wall clock
    // repeats or steps back.
    fn next_stamp(&self) -> i64 {
        let now = to_micros(Utc::now());
        let previous = self
            .last_stamp
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        now.max(previous + 1)
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// Flags a live reference entity as deleted. Returns false when there was
    /// no live row to delete.
    pub async fn soft_delete_reference(&self, kind: ReferenceKind, id: i64) -> Result<bool> {
        let sql = format!(
            "UPDATE {} SET is_deleted = 1, updated_at = ? WHERE id = ? AND is_deleted = 0",
            table_for(kind)
        );
        let (mut tx, stamp) = self.begin_write().await?;
        let updated = sqlx::query(&sql)
            .bind(stamp)
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(updated > 0)
    }

    pub async fn list_regions(&self) -> Result<Vec<Region>> {
        let mut conn = self.pool.acquire().await?;
        select_regions(&mut conn, RowFilter::Live).await
    }

    pub async fn create_region(&self, name: &str) -> Result<Region> {
        let sql = format!(
            "INSERT INTO regions (name, updated_at) VALUES (?, ?) RETURNING {REGION_COLUMNS}"
        );
        let (mut tx, stamp) = self.begin_write().await?;
        let row = sqlx::query(&sql)
            .bind(name)
            .bind(stamp)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(region_from_row(&row))
    }

    pub async fn update_region(
        &self,
        region_id: RegionId,
        name: &str,
    ) -> Result<Option<Region>> {
        let sql = format!(
            "UPDATE regions SET name = ?, updated_at = ?
             WHERE id = ? AND is_deleted = 0
             RETURNING {REGION_COLUMNS}"
        );
        let (mut tx, stamp) = self.begin_write().await?;
        let row = sqlx::query(&sql)
            .bind(name)
            .bind(stamp)
            .bind(region_id.0)
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(row.as_ref().map(region_from_row))
    }

    pub async fn list_age_categories(&self) -> Result<Vec<AgeCategory>> {
        let mut conn = self.pool.acquire().await?;
        select_age_categories(&mut conn, RowFilter::Live).await
    }

    pub async fn create_age_category(
        &self,
        name: &str,
        min_age: i32,
        max_age: i32,
    ) -> Result<AgeCategory> {
        let sql = format!(
            "INSERT INTO age_categories (name, min_age, max_age, updated_at)
             VALUES (?, ?, ?, ?)
             RETURNING {AGE_CATEGORY_COLUMNS}"
        );
        let (mut tx, stamp) = self.begin_write().await?;
        let row = sqlx::query(&sql)
            .bind(name)
            .bind(min_age)
            .bind(max_age)
            .bind(stamp)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(age_category_from_row(&row))
    }

    pub async fn update_age_category(
        &self,
        age_category_id: AgeCategoryId,
        name: &str,
        min_age: i32,
        max_age: i32,
    ) -> Result<Option<AgeCategory>> {
        let sql = format!(
            "UPDATE age_categories SET name = ?, min_age = ?, max_age = ?, updated_at = ?
             WHERE id = ? AND is_deleted = 0
             RETURNING {AGE_CATEGORY_COLUMNS}"
        );
        let (mut tx, stamp) = self.begin_write().await?;
        let row = sqlx::query(&sql)
            .bind(name)
            .bind(min_age)
            .bind(max_age)
            .bind(stamp)
            .bind(age_category_id.0)
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(row.as_ref().map(age_category_from_row))
    }

    pub async fn list_processes(&self) -> Result<Vec<Process>> {
        let mut conn = self.pool.acquire().await?;
        select_processes(&mut conn, RowFilter::Live).await
    }

    pub async fn create_process(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Process> {
        let sql = format!(
            "INSERT INTO processes (name, description, updated_at)
             VALUES (?, ?, ?)
             RETURNING {PROCESS_COLUMNS}"
        );
        let (mut tx, stamp) = self.begin_write().await?;
        let row = sqlx::query(&sql)
            .bind(name)
            .bind(description)
            .bind(stamp)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(process_from_row(&row))
    }

    pub async fn update_process(
        &self,
        process_id: ProcessId,
        name: &str,
        description: Option<&str>,
    ) -> Result<Option<Process>> {
        let sql = format!(
            "UPDATE processes SET name = ?, description = ?, updated_at = ?
             WHERE id = ? AND is_deleted = 0
             RETURNING {PROCESS_COLUMNS}"
        );
        let (mut tx, stamp) = self.begin_write().await?;
        let row = sqlx::query(&sql)
            .bind(name)
            .bind(description)
            .bind(stamp)
            .bind(process_id.0)
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(row.as_ref().map(process_from_row))
    }

    pub async fn count_processes(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM processes")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn list_documents(&self) -> Result<Vec<Document>> {
        let mut conn = self.pool.acquire().await?;
        select_documents(&mut conn, RowFilter::Live).await
    }

    pub async fn create_document(
        &self,
        name: &str,
        notes: Option<&str>,
    ) -> Result<Document> {
        let sql = format!(
            "INSERT INTO documents (name, notes, updated_at)
             VALUES (?, ?, ?)
             RETURNING {DOCUMENT_COLUMNS}"
        );
        let (mut tx, stamp) = self.begin_write().await?;
        let row = sqlx::query(&sql)
            .bind(name)
            .bind(notes)
            .bind(stamp)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(document_from_row(&row))
    }

    pub async fn update_document(
        &self,
        document_id: DocumentId,
        name: &str,
        notes: Option<&str>,
    ) -> Result<Option<Document>> {
        let sql = format!(
            "UPDATE documents SET name = ?, notes = ?, updated_at = ?
             WHERE id = ? AND is_deleted = 0
             RETURNING {DOCUMENT_COLUMNS}"
        );
        let (mut tx, stamp) = self.begin_write().await?;
        let row = sqlx::query(&sql)
            .bind(name)
            .bind(notes)
            .bind(stamp)
            .bind(document_id.0)
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(row.as_ref().map(document_from_row))
    }

    /// Live rows of exactly one scope, ordered by sort order.
    pub async fn list_scope_requirements(
        &self,
        scope: RequirementScope,
    ) -> Result<Vec<Requirement>> {
        let mut conn = self.pool.acquire().await?;
        select_scope_requirements(&mut conn, scope, false).await
    }

    /// Live rows of one scope joined with their (live) documents.
    pub async fn list_scope_documents(
        &self,
        scope: RequirementScope,
    ) -> Result<Vec<SearchResultItem>> {
        let rows = sqlx::query(
            "SELECT r.document_id, d.name, r.sort_order, r.step_description
             FROM requirements r
             INNER JOIN documents d ON d.id = r.document_id
             WHERE r.process_id = ? AND r.age_category_id = ? AND r.region_id IS ?
               AND r.is_deleted = 0 AND d.is_deleted = 0
             ORDER BY r.sort_order ASC, r.id ASC",
        )
        .bind(scope.process_id.0)
        .bind(scope.age_category_id.0)
        .bind(scope.region_id.map(|id| id.0))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| SearchResultItem {
                document_id: DocumentId(r.get::<i64, _>(0)),
                document_name: r.get::<String, _>(1),
                sort_order: r.get::<i32, _>(2),
                step_description: r.get::<Option<String>, _>(3),
            })
            .collect())
    }

    /// Makes the stored rows of `scope` match `items` in one transaction.
    ///
    /// Every referenced entity must exist and be live; otherwise nothing is
    /// written and all offending references are returned. Changed rows share
    /// one stamp; rows already in the desired state keep their timestamp.
    pub async fn reconcile_requirements(
        &self,
        scope: RequirementScope,
        items: &[RequirementItem],
    ) -> Result<ReconcileOutcome> {
        let (mut tx, stamp) = self.begin_write().await?;

        let mut invalid = Vec::new();
        let mut check = |kind: ReferenceKind, id: i64, exists: bool| {
            if !exists {
                invalid.push(InvalidReference { kind, id });
            }
        };
        let process_ok =
            live_reference_exists(&mut *tx, ReferenceKind::Process, scope.process_id.0).await?;
        check(ReferenceKind::Process, scope.process_id.0, process_ok);
        let age_ok = live_reference_exists(
            &mut *tx,
            ReferenceKind::AgeCategory,
            scope.age_category_id.0,
        )
        .await?;
        check(ReferenceKind::AgeCategory, scope.age_category_id.0, age_ok);
        if let Some(region_id) = scope.region_id {
            let region_ok =
                live_reference_exists(&mut *tx, ReferenceKind::Region, region_id.0).await?;
            check(ReferenceKind::Region, region_id.0, region_ok);
        }
        for document_id in referenced_documents(items) {
            let document_ok =
                live_reference_exists(&mut *tx, ReferenceKind::Document, document_id.0).await?;
            check(ReferenceKind::Document, document_id.0, document_ok);
        }

        if !invalid.is_empty() {
            tx.rollback().await?;
            return Ok(ReconcileOutcome::Rejected(invalid));
        }

        let existing = select_scope_requirements(&mut *tx, scope, true).await?;
        let plan = plan_reconciliation(&existing, items);

        for change in &plan.changes {
            match change {
                RowChange::Insert(item) => {
                    sqlx::query(
                        "INSERT INTO requirements
                            (process_id, age_category_id, region_id, document_id, sort_order, step_description, updated_at, is_deleted)
                         VALUES (?, ?, ?, ?, ?, ?, ?, 0)",
                    )
                    .bind(scope.process_id.0)
                    .bind(scope.age_category_id.0)
                    .bind(scope.region_id.map(|id| id.0))
                    .bind(item.document_id.0)
                    .bind(item.sort_order)
                    .bind(item.step_description.as_deref())
                    .bind(stamp)
                    .execute(&mut *tx)
                    .await?;
                }
                RowChange::Update {
                    requirement_id,
                    item,
                } => {
                    sqlx::query(
                        "UPDATE requirements
                         SET sort_order = ?, step_description = ?, is_deleted = 0, updated_at = ?
                         WHERE id = ?",
                    )
                    .bind(item.sort_order)
                    .bind(item.step_description.as_deref())
                    .bind(stamp)
                    .bind(requirement_id.0)
                    .execute(&mut *tx)
                    .await?;
                }
                RowChange::SoftDelete(requirement_id) => {
                    sqlx::query(
                        "UPDATE requirements SET is_deleted = 1, updated_at = ? WHERE id = ?",
                    )
                    .bind(stamp)
                    .bind(requirement_id.0)
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        tx.commit().await?;
        Ok(ReconcileOutcome::Applied(plan.summary()))
    }

    /// Reads all five entity kinds changed after `since` (everything when
    /// `None`) from a single snapshot. Writes committed before the snapshot
    /// are stamped below `server_time`; later ones above it.
    pub async fn changes_since(&self, since: Option<DateTime<Utc>>) -> Result<ChangeSet> {
        let since = since.map(to_micros).unwrap_or(i64::MIN);
        let filter = RowFilter::ChangedSince(since);
        let (mut tx, server_time) = self.begin_write().await?;
        let changes = ChangeSet {
            server_time: from_micros(server_time),
            regions: select_regions(&mut *tx, filter).await?,
            age_categories: select_age_categories(&mut *tx, filter).await?,
            processes: select_processes(&mut *tx, filter).await?,
            documents: select_documents(&mut *tx, filter).await?,
            requirements: select_changed_requirements(&mut *tx, since).await?,
        };
        tx.commit().await?;
        Ok(changes)
    }

    /// Registers or refreshes the local record for an external identity.
    ///
    /// The first user ever stored becomes `admin`. The count and the insert
    /// run under the write lock, so only one first-time sync can see an empty
    /// table within a database.
    pub async fn sync_user(&self, request: &UserSyncRequest) -> Result<User> {
        let email = non_blank(request.email.as_deref());
        let display_name = non_blank(request.display_name.as_deref());

        let (mut tx, stamp) = self.begin_write().await?;
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE external_subject = ?");
        let existing = sqlx::query(&sql)
            .bind(request.external_subject.as_str())
            .fetch_optional(&mut *tx)
            .await?;

        let row = match existing {
            None => {
                let user_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
                    .fetch_one(&mut *tx)
                    .await?;
                let role = if user_count == 0 {
                    Role::Admin
                } else {
                    Role::User
                };
                let sql = format!(
                    "INSERT INTO users (external_subject, email, display_name, is_anonymous, role, last_login_at, updated_at)
                     VALUES (?, ?, ?, ?, ?, ?, ?)
                     RETURNING {USER_COLUMNS}"
                );
                sqlx::query(&sql)
                    .bind(request.external_subject.as_str())
                    .bind(email)
                    .bind(display_name)
                    .bind(request.is_anonymous)
                    .bind(role.as_str())
                    .bind(stamp)
                    .bind(stamp)
                    .fetch_one(&mut *tx)
                    .await?
            }
            Some(found) => {
                let user_id = found.get::<i64, _>("id");
                let sql = format!(
                    "UPDATE users
                     SET last_login_at = ?,
                         email = COALESCE(?, email),
                         display_name = COALESCE(?, display_name),
                         is_anonymous = ?,
                         updated_at = ?
                     WHERE id = ?
                     RETURNING {USER_COLUMNS}"
                );
                sqlx::query(&sql)
                    .bind(stamp)
                    .bind(email)
                    .bind(display_name)
                    .bind(request.is_anonymous)
                    .bind(stamp)
                    .bind(user_id)
                    .fetch_one(&mut *tx)
                    .await?
            }
        };

        tx.commit().await?;
        Ok(user_from_row(&row))
    }
}

async fn live_reference_exists(
    conn: &mut SqliteConnection,
    kind: ReferenceKind,
    id: i64,
) -> Result<bool> {
    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE id = ? AND is_deleted = 0)",
        table_for(kind)
    );
    let exists: bool = sqlx::query_scalar(&sql)
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(exists)
}

async fn select_rows(
    conn: &mut SqliteConnection,
    columns: &str,
    table: &str,
    filter: RowFilter,
) -> Result<Vec<SqliteRow>> {
    let sql = format!("SELECT {columns} FROM {table} {}", filter.clause());
    let mut query = sqlx::query(&sql);
    if let RowFilter::ChangedSince(micros) = filter {
        query = query.bind(micros);
    }
    Ok(query.fetch_all(&mut *conn).await?)
}

async fn select_regions(conn: &mut SqliteConnection, filter: RowFilter) -> Result<Vec<Region>> {
    let rows = select_rows(conn, REGION_COLUMNS, "regions", filter).await?;
    Ok(rows.iter().map(region_from_row).collect())
}

async fn select_age_categories(
    conn: &mut SqliteConnection,
    filter: RowFilter,
) -> Result<Vec<AgeCategory>> {
    let rows = select_rows(conn, AGE_CATEGORY_COLUMNS, "age_categories", filter).await?;
    Ok(rows.iter().map(age_category_from_row).collect())
}

async fn select_processes(conn: &mut SqliteConnection, filter: RowFilter) -> Result<Vec<Process>> {
    let rows = select_rows(conn, PROCESS_COLUMNS, "processes", filter).await?;
    Ok(rows.iter().map(process_from_row).collect())
}

async fn select_documents(conn: &mut SqliteConnection, filter: RowFilter) -> Result<Vec<Document>> {
    let rows = select_rows(conn, DOCUMENT_COLUMNS, "documents", filter).await?;
    Ok(rows.iter().map(document_from_row).collect())
}

async fn select_changed_requirements(
    conn: &mut SqliteConnection,
    since: i64,
) -> Result<Vec<Requirement>> {
    let sql = format!(
        "SELECT {REQUIREMENT_COLUMNS} FROM requirements
         WHERE updated_at > ?
         ORDER BY updated_at ASC, id ASC"
    );
    let rows = sqlx::query(&sql).bind(since).fetch_all(&mut *conn).await?;
    Ok(rows.iter().map(requirement_from_row).collect())
}

async fn select_scope_requirements(
    conn: &mut SqliteConnection,
    scope: RequirementScope,
    include_deleted: bool,
) -> Result<Vec<Requirement>> {
    let sql = format!(
        "SELECT {REQUIREMENT_COLUMNS} FROM requirements
         WHERE process_id = ? AND age_category_id = ? AND region_id IS ?
           AND (? OR is_deleted = 0)
         ORDER BY sort_order ASC, id ASC"
    );
    let rows = sqlx::query(&sql)
        .bind(scope.process_id.0)
        .bind(scope.age_category_id.0)
        .bind(scope.region_id.map(|id| id.0))
        .bind(include_deleted)
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows.iter().map(requirement_from_row).collect())
}

fn region_from_row(r: &SqliteRow) -> Region {
    Region {
        region_id: RegionId(r.get::<i64, _>("id")),
        name: r.get::<String, _>("name"),
        updated_at: from_micros(r.get::<i64, _>("updated_at")),
        is_deleted: r.get::<bool, _>("is_deleted"),
    }
}

fn age_category_from_row(r: &SqliteRow) -> AgeCategory {
    AgeCategory {
        age_category_id: AgeCategoryId(r.get::<i64, _>("id")),
        name: r.get::<String, _>("name"),
        min_age: r.get::<i32, _>("min_age"),
        max_age: r.get::<i32, _>("max_age"),
        updated_at: from_micros(r.get::<i64, _>("updated_at")),
        is_deleted: r.get::<bool, _>("is_deleted"),
    }
}

fn process_from_row(r: &SqliteRow) -> Process {
    Process {
        process_id: ProcessId(r.get::<i64, _>("id")),
        name: r.get::<String, _>("name"),
        description: r.get::<Option<String>, _>("description"),
        updated_at: from_micros(r.get::<i64, _>("updated_at")),
        is_deleted: r.get::<bool, _>("is_deleted"),
    }
}

fn document_from_row(r: &SqliteRow) -> Document {
    Document {
        document_id: DocumentId(r.get::<i64, _>("id")),
        name: r.get::<String, _>("name"),
        notes: r.get::<Option<String>, _>("notes"),
        updated_at: from_micros(r.get::<i64, _>("updated_at")),
        is_deleted: r.get::<bool, _>("is_deleted"),
    }
}

fn requirement_from_row(r: &SqliteRow) -> Requirement {
    Requirement {
        requirement_id: RequirementId(r.get::<i64, _>("id")),
        process_id: ProcessId(r.get::<i64, _>("process_id")),
        age_category_id: AgeCategoryId(r.get::<i64, _>("age_category_id")),
        region_id: r.get::<Option<i64>, _>("region_id").map(RegionId),
        document_id: DocumentId(r.get::<i64, _>("document_id")),
        sort_order: r.get::<i32, _>("sort_order"),
        step_description: r.get::<Option<String>, _>("step_description"),
        updated_at: from_micros(r.get::<i64, _>("updated_at")),
        is_deleted: r.get::<bool, _>("is_deleted"),
    }
}

fn user_from_row(r: &SqliteRow) -> User {
    User {
        user_id: UserId(r.get::<i64, _>("id")),
        external_subject: r.get::<String, _>("external_subject"),
        email: r.get::<Option<String>, _>("email"),
        display_name: r.get::<Option<String>, _>("display_name"),
        is_anonymous: r.get::<bool, _>("is_anonymous"),
        role: Role::parse(&r.get::<String, _>("role")),
        last_login_at: from_micros(r.get::<i64, _>("last_login_at")),
        updated_at: from_micros(r.get::<i64, _>("updated_at")),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn to_micros(at: DateTime<Utc>) -> i64 {
    at.timestamp_micros()
}

fn from_micros(micros: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_micros(micros).unwrap_or_default()
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    if parent.as_os_str().is_empty() {
        return Ok(());
    }

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
