use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Column, EntityPath, ModelError};

/// Visibility scope of a category. Exactly one level, or none for global.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "level", content = "id", rename_all = "lowercase")]
pub enum CategoryScope {
    Global,
    Region(Uuid),
    Sector(Uuid),
    School(Uuid),
}

impl CategoryScope {
    /// Build a scope from the three nullable scope columns, rejecting multi-scope input
    pub fn from_fields(
        region_id: Option<Uuid>,
        sector_id: Option<Uuid>,
        school_id: Option<Uuid>,
    ) -> Result<Self, ModelError> {
        match (region_id, sector_id, school_id) {
            (None, None, None) => Ok(CategoryScope::Global),
            (Some(id), None, None) => Ok(CategoryScope::Region(id)),
            (None, Some(id), None) => Ok(CategoryScope::Sector(id)),
            (None, None, Some(id)) => Ok(CategoryScope::School(id)),
            _ => Err(ModelError::ScopeConflict),
        }
    }

    /// True when a node at `path` falls under this scope
    pub fn covers(&self, path: &EntityPath) -> bool {
        match self {
            CategoryScope::Global => true,
            CategoryScope::Region(id) => path.region_id == *id,
            CategoryScope::Sector(id) => path.sector_id == Some(*id),
            CategoryScope::School(id) => path.school_id == Some(*id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub region_id: Option<Uuid>,
    pub sector_id: Option<Uuid>,
    pub school_id: Option<Uuid>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub columns: Vec<Column>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryInput {
    pub name: String,
    #[serde(default)]
    pub region_id: Option<Uuid>,
    #[serde(default)]
    pub sector_id: Option<Uuid>,
    #[serde(default)]
    pub school_id: Option<Uuid>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Category {
    pub fn new(name: impl Into<String>, scope: CategoryScope, description: Option<String>) -> Self {
        let (region_id, sector_id, school_id) = match scope {
            CategoryScope::Global => (None, None, None),
            CategoryScope::Region(id) => (Some(id), None, None),
            CategoryScope::Sector(id) => (None, Some(id), None),
            CategoryScope::School(id) => (None, None, Some(id)),
        };
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            region_id,
            sector_id,
            school_id,
            description,
            created_at: Utc::now(),
            columns: Vec::new(),
        }
    }

    pub fn from_input(input: CategoryInput) -> Result<Self, ModelError> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(ModelError::MissingField("name"));
        }
        let scope = CategoryScope::from_fields(input.region_id, input.sector_id, input.school_id)?;
        Ok(Self::new(name, scope, input.description))
    }

    pub fn scope(&self) -> Result<CategoryScope, ModelError> {
        CategoryScope::from_fields(self.region_id, self.sector_id, self.school_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_multi_scope_categories() {
        let region = Uuid::new_v4();
        let sector = Uuid::new_v4();
        let input = CategoryInput {
            name: "Teachers".into(),
            region_id: Some(region),
            sector_id: Some(sector),
            ..Default::default()
        };
        assert_eq!(Category::from_input(input).unwrap_err(), ModelError::ScopeConflict);
    }

    #[test]
    fn scope_covers_matching_paths_only() {
        let (region, sector, school) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let path = EntityPath::school(region, sector, school);

        assert!(CategoryScope::Global.covers(&path));
        assert!(CategoryScope::Region(region).covers(&path));
        assert!(CategoryScope::Sector(sector).covers(&path));
        assert!(!CategoryScope::Sector(Uuid::new_v4()).covers(&path));
        assert!(!CategoryScope::School(school).covers(&EntityPath::sector(region, sector)));
    }
}
