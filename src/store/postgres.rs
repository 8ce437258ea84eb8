use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

use super::{Store, StoreError, StoreResult};
use crate::models::{
    Category, Column, DeliveryChannel, DeliveryJob, EntityPath, FormData, FormEntryVersion, Notification, Region, School,
    Sector, UserProfile, ValidationRule,
};

const COLUMN_FIELDS: &str = "id, category_id, name, column_type, required, options, description, order_index, \
     min_length, max_length, min_value, max_value, pattern, rich_text";
const RULE_FIELDS: &str = "id, category_id, name, rule_type, target_field, source_field, condition, value, message";
const FORM_FIELDS: &str = "id, category_id, school_id, data, status, version, submitted_at, approved_at, approved_by, \
     rejection_reason, created_at, updated_at";
const PROFILE_FIELDS: &str =
    "id, user_id, first_name, last_name, email, role, region_id, sector_id, school_id, created_at";
const NOTIFICATION_FIELDS: &str =
    "id, user_id, title, body, notification_type, is_read, action_url, data, created_at, read_at";

#[derive(FromRow)]
struct CategoryRow {
    id: Uuid,
    name: String,
    region_id: Option<Uuid>,
    sector_id: Option<Uuid>,
    school_id: Option<Uuid>,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

impl CategoryRow {
    fn into_category(self, columns: Vec<Column>) -> Category {
        Category {
            id: self.id,
            name: self.name,
            region_id: self.region_id,
            sector_id: self.sector_id,
            school_id: self.school_id,
            description: self.description,
            created_at: self.created_at,
            columns,
        }
    }
}

/// Postgres-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn columns_for(&self, category_ids: &[Uuid]) -> StoreResult<HashMap<Uuid, Vec<Column>>> {
        let sql = format!(
            "SELECT {} FROM columns WHERE category_id = ANY($1) ORDER BY order_index, name",
            COLUMN_FIELDS
        );
        let columns: Vec<Column> = sqlx::query_as(&sql).bind(category_ids).fetch_all(&self.pool).await?;

        let mut grouped: HashMap<Uuid, Vec<Column>> = HashMap::new();
        for column in columns {
            grouped.entry(column.category_id).or_default().push(column);
        }
        Ok(grouped)
    }

    async fn delete_by_id(&self, table: &'static str, label: &str, id: Uuid) -> StoreResult<()> {
        let sql = format!("DELETE FROM {} WHERE id = $1", table);
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(label.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn list_regions(&self) -> StoreResult<Vec<Region>> {
        Ok(sqlx::query_as("SELECT id, name, created_at FROM regions ORDER BY name")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_region(&self, id: Uuid) -> StoreResult<Option<Region>> {
        Ok(sqlx::query_as("SELECT id, name, created_at FROM regions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_region(&self, region: Region) -> StoreResult<Region> {
        Ok(sqlx::query_as(
            "INSERT INTO regions (id, name, created_at) VALUES ($1, $2, $3) RETURNING id, name, created_at",
        )
        .bind(region.id)
        .bind(&region.name)
        .bind(region.created_at)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn delete_region(&self, id: Uuid) -> StoreResult<()> {
        self.delete_by_id("regions", "Region", id).await
    }

    async fn list_sectors(&self, region_id: Option<Uuid>) -> StoreResult<Vec<Sector>> {
        Ok(sqlx::query_as(
            "SELECT id, name, region_id, created_at FROM sectors \
             WHERE ($1::uuid IS NULL OR region_id = $1) ORDER BY name",
        )
        .bind(region_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_sector(&self, id: Uuid) -> StoreResult<Option<Sector>> {
        Ok(sqlx::query_as("SELECT id, name, region_id, created_at FROM sectors WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_sector(&self, sector: Sector) -> StoreResult<Sector> {
        Ok(sqlx::query_as(
            "INSERT INTO sectors (id, name, region_id, created_at) VALUES ($1, $2, $3, $4) \
             RETURNING id, name, region_id, created_at",
        )
        .bind(sector.id)
        .bind(&sector.name)
        .bind(sector.region_id)
        .bind(sector.created_at)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn delete_sector(&self, id: Uuid) -> StoreResult<()> {
        self.delete_by_id("sectors", "Sector", id).await
    }

    async fn list_schools(&self, sector_id: Option<Uuid>) -> StoreResult<Vec<School>> {
        Ok(sqlx::query_as(
            "SELECT id, name, sector_id, address, email, phone, created_at FROM schools \
             WHERE ($1::uuid IS NULL OR sector_id = $1) ORDER BY name",
        )
        .bind(sector_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_school(&self, id: Uuid) -> StoreResult<Option<School>> {
        Ok(sqlx::query_as("SELECT id, name, sector_id, address, email, phone, created_at FROM schools WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_school(&self, school: School) -> StoreResult<School> {
        Ok(sqlx::query_as(
            "INSERT INTO schools (id, name, sector_id, address, email, phone, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING id, name, sector_id, address, email, phone, created_at",
        )
        .bind(school.id)
        .bind(&school.name)
        .bind(school.sector_id)
        .bind(&school.address)
        .bind(&school.email)
        .bind(&school.phone)
        .bind(school.created_at)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn delete_school(&self, id: Uuid) -> StoreResult<()> {
        self.delete_by_id("schools", "School", id).await
    }

    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        let rows: Vec<CategoryRow> = sqlx::query_as(
            "SELECT id, name, region_id, sector_id, school_id, description, created_at FROM categories ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut columns = self.columns_for(&ids).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let cols = columns.remove(&row.id).unwrap_or_default();
                row.into_category(cols)
            })
            .collect())
    }

    async fn get_category(&self, id: Uuid) -> StoreResult<Option<Category>> {
        let row: Option<CategoryRow> = sqlx::query_as(
            "SELECT id, name, region_id, sector_id, school_id, description, created_at FROM categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let columns = self.columns_for(&[row.id]).await?.remove(&row.id).unwrap_or_default();
                Ok(Some(row.into_category(columns)))
            }
            None => Ok(None),
        }
    }

    async fn create_category(&self, category: Category) -> StoreResult<Category> {
        sqlx::query(
            "INSERT INTO categories (id, name, region_id, sector_id, school_id, description, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(category.id)
        .bind(&category.name)
        .bind(category.region_id)
        .bind(category.sector_id)
        .bind(category.school_id)
        .bind(&category.description)
        .bind(category.created_at)
        .execute(&self.pool)
        .await?;
        Ok(category)
    }

    async fn delete_category(&self, id: Uuid) -> StoreResult<()> {
        self.delete_by_id("categories", "Category", id).await
    }

    async fn add_column(&self, column: Column) -> StoreResult<Column> {
        let sql = format!(
            "INSERT INTO columns ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) RETURNING {}",
            COLUMN_FIELDS, COLUMN_FIELDS
        );
        Ok(sqlx::query_as(&sql)
            .bind(column.id)
            .bind(column.category_id)
            .bind(&column.name)
            .bind(column.column_type)
            .bind(column.required)
            .bind(&column.options)
            .bind(&column.description)
            .bind(column.order_index)
            .bind(column.min_length)
            .bind(column.max_length)
            .bind(column.min_value)
            .bind(column.max_value)
            .bind(&column.pattern)
            .bind(column.rich_text)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn list_rules(&self, category_id: Uuid) -> StoreResult<Vec<ValidationRule>> {
        let sql = format!("SELECT {} FROM validation_rules WHERE category_id = $1 ORDER BY name", RULE_FIELDS);
        Ok(sqlx::query_as(&sql).bind(category_id).fetch_all(&self.pool).await?)
    }

    async fn add_rule(&self, rule: ValidationRule) -> StoreResult<ValidationRule> {
        let sql = format!(
            "INSERT INTO validation_rules ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {}",
            RULE_FIELDS, RULE_FIELDS
        );
        Ok(sqlx::query_as(&sql)
            .bind(rule.id)
            .bind(rule.category_id)
            .bind(&rule.name)
            .bind(rule.rule_type)
            .bind(&rule.target_field)
            .bind(&rule.source_field)
            .bind(rule.condition)
            .bind(&rule.value)
            .bind(&rule.message)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn get_form(&self, id: Uuid) -> StoreResult<Option<FormData>> {
        let sql = format!("SELECT {} FROM form_entries WHERE id = $1", FORM_FIELDS);
        Ok(sqlx::query_as(&sql).bind(id).fetch_optional(&self.pool).await?)
    }

    async fn find_form(&self, category_id: Uuid, school_id: Uuid) -> StoreResult<Option<FormData>> {
        let sql = format!(
            "SELECT {} FROM form_entries WHERE category_id = $1 AND school_id = $2",
            FORM_FIELDS
        );
        Ok(sqlx::query_as(&sql)
            .bind(category_id)
            .bind(school_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_forms(&self, category_id: Option<Uuid>, school_ids: Option<&[Uuid]>) -> StoreResult<Vec<FormData>> {
        let sql = format!(
            "SELECT {} FROM form_entries \
             WHERE ($1::uuid IS NULL OR category_id = $1) AND ($2::uuid[] IS NULL OR school_id = ANY($2)) \
             ORDER BY updated_at DESC",
            FORM_FIELDS
        );
        Ok(sqlx::query_as(&sql)
            .bind(category_id)
            .bind(school_ids.map(|ids| ids.to_vec()))
            .fetch_all(&self.pool)
            .await?)
    }

    async fn save_form(
        &self,
        form: FormData,
        version: FormEntryVersion,
        expected_version: Option<i32>,
    ) -> StoreResult<FormData> {
        let mut tx = self.pool.begin().await?;

        let saved: FormData = match expected_version {
            None => {
                let sql = format!(
                    "INSERT INTO form_entries ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
                     RETURNING {}",
                    FORM_FIELDS, FORM_FIELDS
                );
                sqlx::query_as(&sql)
                    .bind(form.id)
                    .bind(form.category_id)
                    .bind(form.school_id)
                    .bind(&form.data)
                    .bind(form.status)
                    .bind(form.version)
                    .bind(form.submitted_at)
                    .bind(form.approved_at)
                    .bind(form.approved_by)
                    .bind(&form.rejection_reason)
                    .bind(form.created_at)
                    .bind(form.updated_at)
                    .fetch_one(&mut *tx)
                    .await?
            }
            Some(expected) => {
                let sql = format!(
                    "UPDATE form_entries SET data = $2, status = $3, version = $4, submitted_at = $5, approved_at = $6, \
                     approved_by = $7, rejection_reason = $8, updated_at = $9 WHERE id = $1 AND version = $10 \
                     RETURNING {}",
                    FORM_FIELDS
                );
                let updated: Option<FormData> = sqlx::query_as(&sql)
                    .bind(form.id)
                    .bind(&form.data)
                    .bind(form.status)
                    .bind(form.version)
                    .bind(form.submitted_at)
                    .bind(form.approved_at)
                    .bind(form.approved_by)
                    .bind(&form.rejection_reason)
                    .bind(form.updated_at)
                    .bind(expected)
                    .fetch_optional(&mut *tx)
                    .await?;
                // Dropping the transaction rolls it back
                updated.ok_or_else(|| {
                    StoreError::Conflict(format!("form entry {} is no longer at version {}", form.id, expected))
                })?
            }
        };

        sqlx::query(
            "INSERT INTO form_entry_versions (id, form_entry_id, version, data, status, checksum, created_by, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(version.id)
        .bind(version.form_entry_id)
        .bind(version.version)
        .bind(&version.data)
        .bind(version.status)
        .bind(&version.checksum)
        .bind(version.created_by)
        .bind(version.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(saved)
    }

    async fn list_versions(&self, form_id: Uuid) -> StoreResult<Vec<FormEntryVersion>> {
        Ok(sqlx::query_as(
            "SELECT id, form_entry_id, version, data, status, checksum, created_by, created_at \
             FROM form_entry_versions WHERE form_entry_id = $1 ORDER BY version",
        )
        .bind(form_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_profiles(&self) -> StoreResult<Vec<UserProfile>> {
        let sql = format!("SELECT {} FROM user_profiles ORDER BY last_name, first_name", PROFILE_FIELDS);
        Ok(sqlx::query_as(&sql).fetch_all(&self.pool).await?)
    }

    async fn get_profile_by_user(&self, user_id: Uuid) -> StoreResult<Option<UserProfile>> {
        let sql = format!("SELECT {} FROM user_profiles WHERE user_id = $1", PROFILE_FIELDS);
        Ok(sqlx::query_as(&sql).bind(user_id).fetch_optional(&self.pool).await?)
    }

    async fn create_profile(&self, profile: UserProfile) -> StoreResult<UserProfile> {
        let sql = format!(
            "INSERT INTO user_profiles ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {}",
            PROFILE_FIELDS, PROFILE_FIELDS
        );
        Ok(sqlx::query_as(&sql)
            .bind(profile.id)
            .bind(profile.user_id)
            .bind(&profile.first_name)
            .bind(&profile.last_name)
            .bind(&profile.email)
            .bind(profile.role)
            .bind(profile.region_id)
            .bind(profile.sector_id)
            .bind(profile.school_id)
            .bind(profile.created_at)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn profiles_within(&self, path: &EntityPath) -> StoreResult<Vec<UserProfile>> {
        // Resolve every profile's assigned node to a full path, then filter by prefix
        let sql = format!(
            "SELECT p.{} FROM user_profiles p \
             LEFT JOIN schools sc ON sc.id = p.school_id \
             LEFT JOIN sectors se ON se.id = COALESCE(p.sector_id, sc.sector_id) \
             WHERE COALESCE(p.region_id, se.region_id) = $1 \
               AND ($2::uuid IS NULL OR se.id = $2) \
               AND ($3::uuid IS NULL OR p.school_id = $3)",
            PROFILE_FIELDS.replace(", ", ", p.")
        );
        Ok(sqlx::query_as(&sql)
            .bind(path.region_id)
            .bind(path.sector_id)
            .bind(path.school_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn insert_notification(&self, notification: Notification) -> StoreResult<Notification> {
        let sql = format!(
            "INSERT INTO notifications ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {}",
            NOTIFICATION_FIELDS, NOTIFICATION_FIELDS
        );
        Ok(sqlx::query_as(&sql)
            .bind(notification.id)
            .bind(notification.user_id)
            .bind(&notification.title)
            .bind(&notification.body)
            .bind(&notification.notification_type)
            .bind(notification.is_read)
            .bind(&notification.action_url)
            .bind(&notification.data)
            .bind(notification.created_at)
            .bind(notification.read_at)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn list_notifications(&self, user_id: Uuid) -> StoreResult<Vec<Notification>> {
        let sql = format!(
            "SELECT {} FROM notifications WHERE user_id = $1 ORDER BY created_at DESC",
            NOTIFICATION_FIELDS
        );
        Ok(sqlx::query_as(&sql).bind(user_id).fetch_all(&self.pool).await?)
    }

    async fn unread_count(&self, user_id: Uuid) -> StoreResult<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND NOT is_read")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn mark_read(&self, user_id: Uuid, id: Uuid) -> StoreResult<Notification> {
        let sql = format!(
            "UPDATE notifications SET is_read = true, read_at = COALESCE(read_at, now()) \
             WHERE id = $1 AND user_id = $2 RETURNING {}",
            NOTIFICATION_FIELDS
        );
        let updated: Option<Notification> = sqlx::query_as(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        updated.ok_or_else(|| StoreError::NotFound("Notification".to_string()))
    }

    async fn mark_all_read(&self, user_id: Uuid) -> StoreResult<u64> {
        let result = sqlx::query("UPDATE notifications SET is_read = true, read_at = now() WHERE user_id = $1 AND NOT is_read")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn enqueue_delivery(&self, job: DeliveryJob) -> StoreResult<DeliveryJob> {
        sqlx::query(
            "INSERT INTO delivery_jobs (id, channel, recipient, payload, status, attempts, last_error, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(job.id)
        .bind(job.channel)
        .bind(&job.recipient)
        .bind(&job.payload)
        .bind(job.status)
        .bind(job.attempts)
        .bind(&job.last_error)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(job)
    }

    async fn pending_deliveries(&self, channel: DeliveryChannel, limit: i64) -> StoreResult<Vec<DeliveryJob>> {
        Ok(sqlx::query_as(
            "SELECT id, channel, recipient, payload, status, attempts, last_error, created_at, updated_at \
             FROM delivery_jobs WHERE channel = $1 AND status = 'pending' ORDER BY created_at LIMIT $2",
        )
        .bind(channel)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn update_delivery(&self, job: DeliveryJob) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE delivery_jobs SET status = $2, attempts = $3, last_error = $4, updated_at = $5 WHERE id = $1",
        )
        .bind(job.id)
        .bind(job.status)
        .bind(job.attempts)
        .bind(&job.last_error)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("Delivery job".to_string()));
        }
        Ok(())
    }
}
