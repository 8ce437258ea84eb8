// Dashboard statistics over the form entries of one node of the hierarchy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{EntityPath, FormData, School, Sector, UserProfile};
use crate::permission::has_permission_on;
use crate::store::{Store, StoreError};
use crate::types::{FormStatus, PermissionAction};

const RECENT_ACTIVITY_LIMIT: usize = 5;

#[derive(Debug, Error)]
pub enum StatisticsError {
    #[error("exactly one of schoolId, sectorId or regionId is required")]
    InvalidTarget,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("not allowed to view this dashboard")]
    AccessDenied,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsQuery {
    pub school_id: Option<Uuid>,
    pub sector_id: Option<Uuid>,
    pub region_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatisticsTarget {
    School(Uuid),
    Sector(Uuid),
    Region(Uuid),
}

impl StatisticsQuery {
    pub fn target(&self) -> Result<StatisticsTarget, StatisticsError> {
        match (self.school_id, self.sector_id, self.region_id) {
            (Some(id), None, None) => Ok(StatisticsTarget::School(id)),
            (None, Some(id), None) => Ok(StatisticsTarget::Sector(id)),
            (None, None, Some(id)) => Ok(StatisticsTarget::Region(id)),
            _ => Err(StatisticsError::InvalidTarget),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct StatusCounts {
    pub draft: usize,
    pub submitted: usize,
    pub approved: usize,
    pub rejected: usize,
}

impl StatusCounts {
    fn add(&mut self, status: FormStatus) {
        match status {
            FormStatus::Draft => self.draft += 1,
            FormStatus::Submitted => self.submitted += 1,
            FormStatus::Approved => self.approved += 1,
            FormStatus::Rejected => self.rejected += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityItem {
    pub id: Uuid,
    pub status: FormStatus,
    pub category_name: String,
    pub school_name: String,
    pub sector_name: String,
    pub date: DateTime<Utc>,
    /// "submitted" or "approved"
    pub action: &'static str,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormStatistics {
    pub total: usize,
    pub by_status: StatusCounts,
    pub by_category: BTreeMap<String, usize>,
    pub recent_activity: Vec<ActivityItem>,
}

/// Lookup tables used to label entries
#[derive(Debug, Default)]
pub struct Labels {
    pub categories: HashMap<Uuid, String>,
    pub schools: HashMap<Uuid, School>,
    pub sectors: HashMap<Uuid, Sector>,
}

impl Labels {
    fn category(&self, id: Uuid) -> String {
        self.categories.get(&id).cloned().unwrap_or_else(|| "Unknown".to_string())
    }

    fn school_and_sector(&self, school_id: Uuid) -> (String, String) {
        let school = self.schools.get(&school_id);
        let sector = school.and_then(|s| self.sectors.get(&s.sector_id));
        (
            school.map(|s| s.name.clone()).unwrap_or_else(|| "Unknown".to_string()),
            sector.map(|s| s.name.clone()).unwrap_or_else(|| "Unknown".to_string()),
        )
    }
}

/// Pure aggregation over already-scoped entries
pub fn aggregate(forms: &[FormData], labels: &Labels) -> FormStatistics {
    let mut stats = FormStatistics {
        total: forms.len(),
        ..Default::default()
    };

    let mut events = Vec::new();
    for form in forms {
        stats.by_status.add(form.status);
        *stats.by_category.entry(labels.category(form.category_id)).or_insert(0) += 1;

        if let Some(at) = form.submitted_at {
            events.push((at, "submitted", form));
        }
        if let (FormStatus::Approved, Some(at)) = (form.status, form.approved_at) {
            events.push((at, "approved", form));
        }
    }

    events.sort_by(|a, b| b.0.cmp(&a.0));
    stats.recent_activity = events
        .into_iter()
        .take(RECENT_ACTIVITY_LIMIT)
        .map(|(date, action, form)| {
            let (school_name, sector_name) = labels.school_and_sector(form.school_id);
            ActivityItem {
                id: form.id,
                status: form.status,
                category_name: labels.category(form.category_id),
                school_name,
                sector_name,
                date,
                action,
            }
        })
        .collect();
    stats
}

/// Statistics for the requested node, gated by `view_dashboard` on its path
pub async fn form_statistics(
    store: &dyn Store,
    actor: Option<&UserProfile>,
    query: &StatisticsQuery,
) -> Result<FormStatistics, StatisticsError> {
    let target = query.target()?;

    let (path, sectors) = match target {
        StatisticsTarget::School(id) => {
            let path = store.school_path(id).await?.ok_or(StatisticsError::NotFound("School"))?;
            let sector_id = path.sector_id.ok_or(StatisticsError::NotFound("Sector"))?;
            let sector = store.get_sector(sector_id).await?.ok_or(StatisticsError::NotFound("Sector"))?;
            (path, vec![sector])
        }
        StatisticsTarget::Sector(id) => {
            let sector = store.get_sector(id).await?.ok_or(StatisticsError::NotFound("Sector"))?;
            (EntityPath::sector(sector.region_id, sector.id), vec![sector])
        }
        StatisticsTarget::Region(id) => {
            let region = store.get_region(id).await?.ok_or(StatisticsError::NotFound("Region"))?;
            (EntityPath::region(region.id), store.list_sectors(Some(region.id)).await?)
        }
    };

    if !has_permission_on(actor, PermissionAction::ViewDashboard, &path) {
        return Err(StatisticsError::AccessDenied);
    }

    let mut schools = Vec::new();
    for sector in &sectors {
        schools.extend(store.list_schools(Some(sector.id)).await?);
    }
    if let Some(school_id) = path.school_id {
        schools.retain(|s| s.id == school_id);
    }

    let school_ids: Vec<Uuid> = schools.iter().map(|s| s.id).collect();
    let forms = store.list_forms(None, Some(&school_ids)).await?;
    let labels = Labels {
        categories: store.list_categories().await?.into_iter().map(|c| (c.id, c.name)).collect(),
        schools: schools.into_iter().map(|s| (s.id, s)).collect(),
        sectors: sectors.into_iter().map(|s| (s.id, s)).collect(),
    };

    Ok(aggregate(&forms, &labels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::Map;

    fn form(category: Uuid, school: Uuid, status: FormStatus, minutes_ago: i64) -> FormData {
        let mut f = FormData::new(category, school, Map::new(), status);
        let at = Utc::now() - Duration::minutes(minutes_ago);
        if status != FormStatus::Draft {
            f.submitted_at = Some(at);
        }
        if status == FormStatus::Approved {
            f.approved_at = Some(at + Duration::seconds(30));
        }
        f
    }

    #[test]
    fn target_requires_exactly_one_id() {
        assert!(StatisticsQuery::default().target().is_err());
        let both = StatisticsQuery {
            school_id: Some(Uuid::new_v4()),
            sector_id: Some(Uuid::new_v4()),
            region_id: None,
        };
        assert!(both.target().is_err());
        let one = StatisticsQuery {
            region_id: Some(Uuid::new_v4()),
            ..Default::default()
        };
        assert!(matches!(one.target(), Ok(StatisticsTarget::Region(_))));
    }

    #[test]
    fn aggregates_counts_and_recent_activity() {
        let staff = Uuid::new_v4();
        let students = Uuid::new_v4();
        let school = Uuid::new_v4();
        let forms: Vec<FormData> = vec![
            form(staff, school, FormStatus::Draft, 1),
            form(staff, school, FormStatus::Submitted, 2),
            form(students, school, FormStatus::Approved, 3),
            form(students, school, FormStatus::Approved, 4),
            form(students, school, FormStatus::Rejected, 5),
            form(students, school, FormStatus::Submitted, 6),
        ];
        let labels = Labels {
            categories: HashMap::from([(staff, "Staff".to_string()), (students, "Students".to_string())]),
            ..Default::default()
        };

        let stats = aggregate(&forms, &labels);
        assert_eq!(stats.total, 6);
        assert_eq!(
            stats.by_status,
            StatusCounts {
                draft: 1,
                submitted: 2,
                approved: 2,
                rejected: 1
            }
        );
        assert_eq!(stats.by_category["Students"], 4);
        assert_eq!(stats.recent_activity.len(), 5);
        assert_eq!(stats.recent_activity[0].action, "submitted");
        assert!(stats
            .recent_activity
            .windows(2)
            .all(|w| w[0].date >= w[1].date));
        assert!(stats.recent_activity.iter().all(|a| a.school_name == "Unknown"));
    }
}
