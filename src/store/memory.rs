use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Store, StoreError, StoreResult};
use crate::models::{
    Category, Column, DeliveryChannel, DeliveryJob, DeliveryStatus, EntityPath, FormData, FormEntryVersion,
    Notification, Region, School, Sector, UserProfile, ValidationRule,
};

/// Fixture loaded into a memory store. JSON or YAML.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MemorySeed {
    pub regions: Vec<Region>,
    pub sectors: Vec<Sector>,
    pub schools: Vec<School>,
    pub categories: Vec<Category>,
    pub rules: Vec<ValidationRule>,
    pub profiles: Vec<UserProfile>,
    pub forms: Vec<FormData>,
    pub notifications: Vec<Notification>,
}

#[derive(Default)]
struct State {
    regions: HashMap<Uuid, Region>,
    sectors: HashMap<Uuid, Sector>,
    schools: HashMap<Uuid, School>,
    categories: HashMap<Uuid, Category>,
    rules: Vec<ValidationRule>,
    forms: HashMap<Uuid, FormData>,
    versions: Vec<FormEntryVersion>,
    profiles: Vec<UserProfile>,
    notifications: Vec<Notification>,
    deliveries: Vec<DeliveryJob>,
}

impl State {
    fn path_of(&self, profile: &UserProfile) -> Option<EntityPath> {
        if let Some(school_id) = profile.school_id {
            let school = self.schools.get(&school_id)?;
            let sector = self.sectors.get(&school.sector_id)?;
            return Some(EntityPath::school(sector.region_id, sector.id, school.id));
        }
        if let Some(sector_id) = profile.sector_id {
            let sector = self.sectors.get(&sector_id)?;
            return Some(EntityPath::sector(sector.region_id, sector.id));
        }
        profile.region_id.map(EntityPath::region)
    }
}

/// In-process store used by tests and local runs
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: MemorySeed) -> Self {
        let state = State {
            regions: seed.regions.into_iter().map(|r| (r.id, r)).collect(),
            sectors: seed.sectors.into_iter().map(|s| (s.id, s)).collect(),
            schools: seed.schools.into_iter().map(|s| (s.id, s)).collect(),
            categories: seed.categories.into_iter().map(|c| (c.id, c)).collect(),
            rules: seed.rules,
            forms: seed.forms.into_iter().map(|f| (f.id, f)).collect(),
            profiles: seed.profiles,
            notifications: seed.notifications,
            ..State::default()
        };
        Self {
            state: RwLock::new(state),
        }
    }

    pub async fn from_seed_file(path: &str) -> Result<Self, StoreError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| StoreError::Seed(format!("cannot read {}: {}", path, e)))?;
        // YAML is a superset of JSON, so one parser covers both
        let seed: MemorySeed =
            serde_yaml::from_str(&raw).map_err(|e| StoreError::Seed(format!("cannot parse {}: {}", path, e)))?;
        tracing::info!(
            "Seeded memory store from {}: {} regions, {} sectors, {} schools, {} categories, {} profiles",
            path,
            seed.regions.len(),
            seed.sectors.len(),
            seed.schools.len(),
            seed.categories.len(),
            seed.profiles.len()
        );
        Ok(Self::from_seed(seed))
    }
}

fn sorted_by_name<T, F>(mut items: Vec<T>, name: F) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    items.sort_by(|a, b| name(a).cmp(name(b)));
    items
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn list_regions(&self) -> StoreResult<Vec<Region>> {
        let state = self.state.read().await;
        Ok(sorted_by_name(state.regions.values().cloned().collect(), |r| &r.name))
    }

    async fn get_region(&self, id: Uuid) -> StoreResult<Option<Region>> {
        Ok(self.state.read().await.regions.get(&id).cloned())
    }

    async fn create_region(&self, region: Region) -> StoreResult<Region> {
        let mut state = self.state.write().await;
        if state.regions.values().any(|r| r.name == region.name) {
            return Err(StoreError::Duplicate(format!("region '{}'", region.name)));
        }
        state.regions.insert(region.id, region.clone());
        Ok(region)
    }

    async fn delete_region(&self, id: Uuid) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.sectors.values().any(|s| s.region_id == id) {
            return Err(StoreError::ForeignKey(format!("region {} still has sectors", id)));
        }
        state
            .regions
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound("Region".to_string()))
    }

    async fn list_sectors(&self, region_id: Option<Uuid>) -> StoreResult<Vec<Sector>> {
        let state = self.state.read().await;
        let sectors = state
            .sectors
            .values()
            .filter(|s| region_id.map_or(true, |id| s.region_id == id))
            .cloned()
            .collect();
        Ok(sorted_by_name(sectors, |s| &s.name))
    }

    async fn get_sector(&self, id: Uuid) -> StoreResult<Option<Sector>> {
        Ok(self.state.read().await.sectors.get(&id).cloned())
    }

    async fn create_sector(&self, sector: Sector) -> StoreResult<Sector> {
        let mut state = self.state.write().await;
        if !state.regions.contains_key(&sector.region_id) {
            return Err(StoreError::ForeignKey(format!("region {}", sector.region_id)));
        }
        state.sectors.insert(sector.id, sector.clone());
        Ok(sector)
    }

    async fn delete_sector(&self, id: Uuid) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.schools.values().any(|s| s.sector_id == id) {
            return Err(StoreError::ForeignKey(format!("sector {} still has schools", id)));
        }
        state
            .sectors
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound("Sector".to_string()))
    }

    async fn list_schools(&self, sector_id: Option<Uuid>) -> StoreResult<Vec<School>> {
        let state = self.state.read().await;
        let schools = state
            .schools
            .values()
            .filter(|s| sector_id.map_or(true, |id| s.sector_id == id))
            .cloned()
            .collect();
        Ok(sorted_by_name(schools, |s| &s.name))
    }

    async fn get_school(&self, id: Uuid) -> StoreResult<Option<School>> {
        Ok(self.state.read().await.schools.get(&id).cloned())
    }

    async fn create_school(&self, school: School) -> StoreResult<School> {
        let mut state = self.state.write().await;
        if !state.sectors.contains_key(&school.sector_id) {
            return Err(StoreError::ForeignKey(format!("sector {}", school.sector_id)));
        }
        state.schools.insert(school.id, school.clone());
        Ok(school)
    }

    async fn delete_school(&self, id: Uuid) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.forms.values().any(|f| f.school_id == id) {
            return Err(StoreError::ForeignKey(format!("school {} has form entries", id)));
        }
        state
            .schools
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound("School".to_string()))
    }

    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        let state = self.state.read().await;
        Ok(sorted_by_name(state.categories.values().cloned().collect(), |c| &c.name))
    }

    async fn get_category(&self, id: Uuid) -> StoreResult<Option<Category>> {
        Ok(self.state.read().await.categories.get(&id).cloned())
    }

    async fn create_category(&self, category: Category) -> StoreResult<Category> {
        let mut state = self.state.write().await;
        state.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn delete_category(&self, id: Uuid) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.forms.values().any(|f| f.category_id == id) {
            return Err(StoreError::ForeignKey(format!("category {} has form entries", id)));
        }
        state.rules.retain(|r| r.category_id != id);
        state
            .categories
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound("Category".to_string()))
    }

    async fn add_column(&self, column: Column) -> StoreResult<Column> {
        let mut state = self.state.write().await;
        let category = state
            .categories
            .get_mut(&column.category_id)
            .ok_or_else(|| StoreError::ForeignKey(format!("category {}", column.category_id)))?;
        if category.columns.iter().any(|c| c.name == column.name) {
            return Err(StoreError::Duplicate(format!("column '{}'", column.name)));
        }
        category.columns.push(column.clone());
        category.columns.sort_by_key(|c| c.order_index);
        Ok(column)
    }

    async fn list_rules(&self, category_id: Uuid) -> StoreResult<Vec<ValidationRule>> {
        let state = self.state.read().await;
        Ok(state.rules.iter().filter(|r| r.category_id == category_id).cloned().collect())
    }

    async fn add_rule(&self, rule: ValidationRule) -> StoreResult<ValidationRule> {
        let mut state = self.state.write().await;
        if !state.categories.contains_key(&rule.category_id) {
            return Err(StoreError::ForeignKey(format!("category {}", rule.category_id)));
        }
        state.rules.push(rule.clone());
        Ok(rule)
    }

    async fn get_form(&self, id: Uuid) -> StoreResult<Option<FormData>> {
        Ok(self.state.read().await.forms.get(&id).cloned())
    }

    async fn find_form(&self, category_id: Uuid, school_id: Uuid) -> StoreResult<Option<FormData>> {
        let state = self.state.read().await;
        Ok(state
            .forms
            .values()
            .find(|f| f.category_id == category_id && f.school_id == school_id)
            .cloned())
    }

    async fn list_forms(&self, category_id: Option<Uuid>, school_ids: Option<&[Uuid]>) -> StoreResult<Vec<FormData>> {
        let state = self.state.read().await;
        let mut forms: Vec<FormData> = state
            .forms
            .values()
            .filter(|f| category_id.map_or(true, |id| f.category_id == id))
            .filter(|f| school_ids.map_or(true, |ids| ids.contains(&f.school_id)))
            .cloned()
            .collect();
        forms.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(forms)
    }

    async fn save_form(
        &self,
        form: FormData,
        version: FormEntryVersion,
        expected_version: Option<i32>,
    ) -> StoreResult<FormData> {
        // One lock acquisition: every check runs before either write
        let mut state = self.state.write().await;
        match expected_version {
            None => {
                if state
                    .forms
                    .values()
                    .any(|f| f.category_id == form.category_id && f.school_id == form.school_id)
                {
                    return Err(StoreError::Duplicate(format!(
                        "form entry for category {} and school {}",
                        form.category_id, form.school_id
                    )));
                }
                if !state.categories.contains_key(&form.category_id) || !state.schools.contains_key(&form.school_id) {
                    return Err(StoreError::ForeignKey("form entry category or school".to_string()));
                }
            }
            Some(expected) => match state.forms.get(&form.id) {
                None => return Err(StoreError::NotFound("Form entry".to_string())),
                Some(current) if current.version != expected => {
                    return Err(StoreError::Conflict(format!(
                        "form entry {} is at version {}, expected {}",
                        form.id, current.version, expected
                    )));
                }
                Some(_) => {}
            },
        }
        if state
            .versions
            .iter()
            .any(|v| v.form_entry_id == version.form_entry_id && v.version == version.version)
        {
            return Err(StoreError::Duplicate(format!(
                "version {} of form entry {}",
                version.version, version.form_entry_id
            )));
        }

        state.forms.insert(form.id, form.clone());
        state.versions.push(version);
        Ok(form)
    }

    async fn list_versions(&self, form_id: Uuid) -> StoreResult<Vec<FormEntryVersion>> {
        let state = self.state.read().await;
        let mut versions: Vec<FormEntryVersion> =
            state.versions.iter().filter(|v| v.form_entry_id == form_id).cloned().collect();
        versions.sort_by_key(|v| v.version);
        Ok(versions)
    }

    async fn list_profiles(&self) -> StoreResult<Vec<UserProfile>> {
        Ok(self.state.read().await.profiles.clone())
    }

    async fn get_profile_by_user(&self, user_id: Uuid) -> StoreResult<Option<UserProfile>> {
        let state = self.state.read().await;
        Ok(state.profiles.iter().find(|p| p.user_id == user_id).cloned())
    }

    async fn create_profile(&self, profile: UserProfile) -> StoreResult<UserProfile> {
        let mut state = self.state.write().await;
        let email_taken = profile
            .email
            .as_deref()
            .is_some_and(|email| state.profiles.iter().any(|p| p.email.as_deref() == Some(email)));
        if email_taken || state.profiles.iter().any(|p| p.user_id == profile.user_id) {
            return Err(StoreError::Duplicate("user profile".to_string()));
        }
        state.profiles.push(profile.clone());
        Ok(profile)
    }

    async fn profiles_within(&self, path: &EntityPath) -> StoreResult<Vec<UserProfile>> {
        let state = self.state.read().await;
        let within = |own: &EntityPath| {
            own.region_id == path.region_id
                && path.sector_id.map_or(true, |id| own.sector_id == Some(id))
                && path.school_id.map_or(true, |id| own.school_id == Some(id))
        };
        Ok(state
            .profiles
            .iter()
            .filter(|p| state.path_of(p).is_some_and(|own| within(&own)))
            .cloned()
            .collect())
    }

    async fn insert_notification(&self, notification: Notification) -> StoreResult<Notification> {
        let mut state = self.state.write().await;
        state.notifications.push(notification.clone());
        Ok(notification)
    }

    async fn list_notifications(&self, user_id: Uuid) -> StoreResult<Vec<Notification>> {
        let state = self.state.read().await;
        let mut list: Vec<Notification> =
            state.notifications.iter().filter(|n| n.user_id == user_id).cloned().collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }

    async fn unread_count(&self, user_id: Uuid) -> StoreResult<i64> {
        let state = self.state.read().await;
        Ok(state
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id && !n.is_read)
            .count() as i64)
    }

    async fn mark_read(&self, user_id: Uuid, id: Uuid) -> StoreResult<Notification> {
        let mut state = self.state.write().await;
        let notification = state
            .notifications
            .iter_mut()
            .find(|n| n.id == id && n.user_id == user_id)
            .ok_or_else(|| StoreError::NotFound("Notification".to_string()))?;
        if !notification.is_read {
            notification.is_read = true;
            notification.read_at = Some(Utc::now());
        }
        Ok(notification.clone())
    }

    async fn mark_all_read(&self, user_id: Uuid) -> StoreResult<u64> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let mut changed = 0;
        for n in state.notifications.iter_mut().filter(|n| n.user_id == user_id && !n.is_read) {
            n.is_read = true;
            n.read_at = Some(now);
            changed += 1;
        }
        Ok(changed)
    }

    async fn enqueue_delivery(&self, job: DeliveryJob) -> StoreResult<DeliveryJob> {
        self.state.write().await.deliveries.push(job.clone());
        Ok(job)
    }

    async fn pending_deliveries(&self, channel: DeliveryChannel, limit: i64) -> StoreResult<Vec<DeliveryJob>> {
        let state = self.state.read().await;
        let mut jobs: Vec<DeliveryJob> = state
            .deliveries
            .iter()
            .filter(|j| j.channel == channel && j.status == DeliveryStatus::Pending)
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.created_at);
        jobs.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(jobs)
    }

    async fn update_delivery(&self, job: DeliveryJob) -> StoreResult<()> {
        let mut state = self.state.write().await;
        match state.deliveries.iter_mut().find(|j| j.id == job.id) {
            Some(existing) => {
                *existing = job;
                Ok(())
            }
            None => Err(StoreError::NotFound("Delivery job".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CategoryScope, ProfileInput, SchoolInput};
    use crate::types::{FormStatus, Role};
    use serde_json::{json, Map};

    async fn hierarchy(store: &MemoryStore) -> (Region, Sector, School) {
        let region = store.create_region(Region::new("Baku")).await.unwrap();
        let sector = store.create_sector(Sector::new("Yasamal", region.id)).await.unwrap();
        let school = store
            .create_school(School::from_input(SchoolInput {
                name: "School 1".into(),
                sector_id: sector.id,
                ..Default::default()
            }))
            .await
            .unwrap();
        (region, sector, school)
    }

    #[tokio::test]
    async fn form_entries_are_unique_per_category_and_school() {
        let store = MemoryStore::new();
        let (_, _, school) = hierarchy(&store).await;
        let category = store
            .create_category(Category::new("Staff", CategoryScope::Global, None))
            .await
            .unwrap();

        let first = FormData::new(category.id, school.id, Map::new(), FormStatus::Draft);
        let snapshot = FormEntryVersion::snapshot(&first, None);
        store.save_form(first, snapshot, None).await.unwrap();
        let second = FormData::new(category.id, school.id, Map::new(), FormStatus::Draft);
        let snapshot = FormEntryVersion::snapshot(&second, None);
        assert!(matches!(store.save_form(second, snapshot, None).await, Err(StoreError::Duplicate(_))));
    }

    #[tokio::test]
    async fn failed_saves_leave_entry_and_history_untouched() {
        let store = MemoryStore::new();
        let (_, _, school) = hierarchy(&store).await;
        let category = store
            .create_category(Category::new("Staff", CategoryScope::Global, None))
            .await
            .unwrap();

        let mut data = Map::new();
        data.insert("N".into(), json!(1));
        let first = FormData::new(category.id, school.id, data, FormStatus::Draft);
        let snapshot = FormEntryVersion::snapshot(&first, None);
        let saved = store.save_form(first, snapshot, None).await.unwrap();

        // A racing writer already recorded version 2
        let mut racer = saved.clone();
        racer.version = 2;
        store
            .save_form(racer.clone(), FormEntryVersion::snapshot(&racer, None), Some(1))
            .await
            .unwrap();

        // A stale writer still holding version 1 is refused outright
        let mut stale = saved.clone();
        stale.version = 2;
        stale.data = json!({ "N": 99 });
        let err = store
            .save_form(stale.clone(), FormEntryVersion::snapshot(&stale, None), Some(1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        // Version clash with a fresh expectation fails before anything is written
        let mut clash = racer.clone();
        clash.data = json!({ "N": 99 });
        let mut clash_version = FormEntryVersion::snapshot(&clash, None);
        clash_version.version = 2;
        clash.version = 3;
        let err = store.save_form(clash, clash_version, Some(2)).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));

        let row = store.get_form(saved.id).await.unwrap().unwrap();
        assert_eq!(row.version, 2);
        assert_eq!(row.data, json!({ "N": 1 }));
        let history = store.list_versions(saved.id).await.unwrap();
        assert_eq!(history.iter().map(|v| v.version).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[tokio::test]
    async fn dangling_references_are_rejected() {
        let store = MemoryStore::new();
        let err = store.create_sector(Sector::new("Orphan", Uuid::new_v4())).await.unwrap_err();
        assert_eq!(err.user_message(), "referenced record does not exist");

        let (region, _, _) = hierarchy(&store).await;
        assert!(matches!(store.delete_region(region.id).await, Err(StoreError::ForeignKey(_))));
    }

    #[tokio::test]
    async fn profiles_within_walks_the_subtree() {
        let store = MemoryStore::new();
        let (region, sector, school) = hierarchy(&store).await;
        let make = |role, region_id, sector_id, school_id| {
            UserProfile::from_input(ProfileInput {
                user_id: None,
                first_name: "A".into(),
                last_name: "B".into(),
                email: None,
                role,
                region_id,
                sector_id,
                school_id,
            })
            .unwrap()
        };
        store.create_profile(make(Role::Regionadmin, Some(region.id), None, None)).await.unwrap();
        store.create_profile(make(Role::Sectoradmin, None, Some(sector.id), None)).await.unwrap();
        store.create_profile(make(Role::Schooladmin, None, None, Some(school.id))).await.unwrap();
        store.create_profile(make(Role::Superadmin, None, None, None)).await.unwrap();

        let in_region = store.profiles_within(&EntityPath::region(region.id)).await.unwrap();
        assert_eq!(in_region.len(), 3);
        let in_sector = store.profiles_within(&EntityPath::sector(region.id, sector.id)).await.unwrap();
        assert_eq!(in_sector.len(), 2);
    }

    #[tokio::test]
    async fn mark_read_is_scoped_to_owner() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let note = crate::models::NewNotification {
            title: "Hi".into(),
            body: "There".into(),
            notification_type: "info".into(),
            action_url: None,
            data: None,
        };
        let saved = store.insert_notification(note.addressed_to(owner)).await.unwrap();

        assert!(store.mark_read(Uuid::new_v4(), saved.id).await.is_err());
        assert_eq!(store.unread_count(owner).await.unwrap(), 1);
        let read = store.mark_read(owner, saved.id).await.unwrap();
        assert!(read.is_read && read.read_at.is_some());
        assert_eq!(store.unread_count(owner).await.unwrap(), 0);
    }

    #[test]
    fn seed_parses_from_yaml() {
        let yaml = r#"
regions:
  - id: 7b0a3d4c-0000-4000-8000-000000000001
    name: Baku
    createdAt: 2024-01-01T00:00:00Z
"#;
        let seed: MemorySeed = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(seed.regions.len(), 1);
        assert!(seed.schools.is_empty());
    }
}
