// Persistence boundary. Everything the service reads or writes goes through `Store`.

pub mod manager;
pub mod memory;
pub mod postgres;

pub use manager::DatabaseManager;
pub use memory::{MemorySeed, MemoryStore};
pub use postgres::PgStore;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::config::{config, StoreBackend};
use crate::models::{
    Category, Column, DeliveryChannel, DeliveryJob, EntityPath, FormData, FormEntryVersion, Notification, Region, School,
    Sector, UserProfile, ValidationRule,
};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    /// The row changed since it was read
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Foreign key violation: {0}")]
    ForeignKey(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Seed error: {0}")]
    Seed(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Message safe to show to a user
    pub fn user_message(&self) -> String {
        match self {
            StoreError::NotFound(what) => format!("{} not found", what),
            StoreError::Duplicate(_) => "record already exists".to_string(),
            StoreError::Conflict(_) => "record was changed by someone else, reload and try again".to_string(),
            StoreError::ForeignKey(_) => "referenced record does not exist".to_string(),
            StoreError::Configuration(_) => "storage is misconfigured, contact an administrator".to_string(),
            StoreError::Seed(msg) | StoreError::Backend(msg) => msg.clone(),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound("row".to_string()),
            sqlx::Error::Database(db) => {
                let message = db.message().to_string();
                match db.code().as_deref() {
                    Some("23505") => StoreError::Duplicate(message),
                    Some("23503") => StoreError::ForeignKey(message),
                    Some("42P01") | Some("42703") => StoreError::Configuration(message),
                    _ => StoreError::Backend(message),
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => StoreError::Backend("database unavailable".to_string()),
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence operations used by the service layer
#[async_trait]
pub trait Store: Send + Sync {
    async fn health_check(&self) -> StoreResult<()>;

    // Hierarchy
    async fn list_regions(&self) -> StoreResult<Vec<Region>>;
    async fn get_region(&self, id: Uuid) -> StoreResult<Option<Region>>;
    async fn create_region(&self, region: Region) -> StoreResult<Region>;
    async fn delete_region(&self, id: Uuid) -> StoreResult<()>;

    async fn list_sectors(&self, region_id: Option<Uuid>) -> StoreResult<Vec<Sector>>;
    async fn get_sector(&self, id: Uuid) -> StoreResult<Option<Sector>>;
    async fn create_sector(&self, sector: Sector) -> StoreResult<Sector>;
    async fn delete_sector(&self, id: Uuid) -> StoreResult<()>;

    async fn list_schools(&self, sector_id: Option<Uuid>) -> StoreResult<Vec<School>>;
    async fn get_school(&self, id: Uuid) -> StoreResult<Option<School>>;
    async fn create_school(&self, school: School) -> StoreResult<School>;
    async fn delete_school(&self, id: Uuid) -> StoreResult<()>;

    // Categories, columns and rules
    async fn list_categories(&self) -> StoreResult<Vec<Category>>;
    async fn get_category(&self, id: Uuid) -> StoreResult<Option<Category>>;
    async fn create_category(&self, category: Category) -> StoreResult<Category>;
    async fn delete_category(&self, id: Uuid) -> StoreResult<()>;
    async fn add_column(&self, column: Column) -> StoreResult<Column>;
    async fn list_rules(&self, category_id: Uuid) -> StoreResult<Vec<ValidationRule>>;
    async fn add_rule(&self, rule: ValidationRule) -> StoreResult<ValidationRule>;

    // Form entries
    async fn get_form(&self, id: Uuid) -> StoreResult<Option<FormData>>;
    async fn find_form(&self, category_id: Uuid, school_id: Uuid) -> StoreResult<Option<FormData>>;
    async fn list_forms(&self, category_id: Option<Uuid>, school_ids: Option<&[Uuid]>) -> StoreResult<Vec<FormData>>;
    /// Writes the entry and its version row as one unit. `expected_version` is the version
    /// the caller read (`None` inserts a new entry); a stale expectation is a `Conflict`.
    async fn save_form(
        &self,
        form: FormData,
        version: FormEntryVersion,
        expected_version: Option<i32>,
    ) -> StoreResult<FormData>;
    async fn list_versions(&self, form_id: Uuid) -> StoreResult<Vec<FormEntryVersion>>;

    // Profiles
    async fn list_profiles(&self) -> StoreResult<Vec<UserProfile>>;
    async fn get_profile_by_user(&self, user_id: Uuid) -> StoreResult<Option<UserProfile>>;
    async fn create_profile(&self, profile: UserProfile) -> StoreResult<UserProfile>;
    /// Profiles assigned to `path` or anywhere below it
    async fn profiles_within(&self, path: &EntityPath) -> StoreResult<Vec<UserProfile>>;

    // Notifications
    async fn insert_notification(&self, notification: Notification) -> StoreResult<Notification>;
    async fn list_notifications(&self, user_id: Uuid) -> StoreResult<Vec<Notification>>;
    async fn unread_count(&self, user_id: Uuid) -> StoreResult<i64>;
    /// Marks one of the user's own notifications read; other users' ids are not found
    async fn mark_read(&self, user_id: Uuid, id: Uuid) -> StoreResult<Notification>;
    async fn mark_all_read(&self, user_id: Uuid) -> StoreResult<u64>;

    // Delivery queue
    async fn enqueue_delivery(&self, job: DeliveryJob) -> StoreResult<DeliveryJob>;
    async fn pending_deliveries(&self, channel: DeliveryChannel, limit: i64) -> StoreResult<Vec<DeliveryJob>>;
    async fn update_delivery(&self, job: DeliveryJob) -> StoreResult<()>;

    /// Ancestor path of a sector
    async fn sector_path(&self, sector_id: Uuid) -> StoreResult<Option<EntityPath>> {
        Ok(self
            .get_sector(sector_id)
            .await?
            .map(|sector| EntityPath::sector(sector.region_id, sector.id)))
    }

    /// Ancestor path of a school
    async fn school_path(&self, school_id: Uuid) -> StoreResult<Option<EntityPath>> {
        let Some(school) = self.get_school(school_id).await? else {
            return Ok(None);
        };
        Ok(self
            .get_sector(school.sector_id)
            .await?
            .map(|sector| EntityPath::school(sector.region_id, sector.id, school.id)))
    }

    /// Path of the node a profile is assigned to; `None` for superadmins
    async fn profile_path(&self, profile: &UserProfile) -> StoreResult<Option<EntityPath>> {
        if let Some(school_id) = profile.school_id {
            return self.school_path(school_id).await;
        }
        if let Some(sector_id) = profile.sector_id {
            return self.sector_path(sector_id).await;
        }
        Ok(profile.region_id.map(EntityPath::region))
    }
}

pub type SharedStore = Arc<dyn Store>;

/// Open the configured backend
pub async fn connect() -> anyhow::Result<SharedStore> {
    let settings = &config().store;
    match settings.backend {
        StoreBackend::Memory => {
            let store = match &settings.seed_path {
                Some(path) => MemoryStore::from_seed_file(path).await?,
                None => MemoryStore::new(),
            };
            tracing::info!("Using in-memory store");
            Ok(Arc::new(store))
        }
        StoreBackend::Postgres => {
            let pool = DatabaseManager::pool().await?;
            if config().database.run_migrations {
                DatabaseManager::migrate(&pool).await?;
            }
            Ok(Arc::new(PgStore::new(pool)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_messages_hide_backend_detail() {
        let dup = StoreError::Duplicate("duplicate key value violates unique constraint \"form_entries_pkey\"".into());
        assert_eq!(dup.user_message(), "record already exists");
        assert_eq!(
            StoreError::ForeignKey("x".into()).user_message(),
            "referenced record does not exist"
        );
        assert_eq!(StoreError::Backend("boom".into()).user_message(), "boom");
    }
}
