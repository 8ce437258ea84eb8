// Spreadsheet import of users and schools.

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use serde::Serialize;
use serde_json::{Map, Value};
use std::io::Cursor;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{EntityPath, ProfileInput, Region, School, SchoolInput, Sector, UserProfile};
use crate::permission::{has_permission, has_permission_on};
use crate::store::{Store, StoreError};
use crate::types::{PermissionAction, Role};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("could not read workbook: {0}")]
    Workbook(String),

    #[error("workbook has no sheets")]
    EmptyWorkbook,

    #[error("sheet has no header row")]
    NoHeader,

    #[error("none of the columns could be matched, expected one of: {0}")]
    NoRecognizedColumns(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A domain field and the header spellings accepted for it, already normalized
pub struct FieldSpec {
    pub field: &'static str,
    pub aliases: &'static [&'static str],
}

pub const USER_FIELDS: &[FieldSpec] = &[
    FieldSpec { field: "firstName", aliases: &["firstname", "givenname", "ad"] },
    FieldSpec { field: "lastName", aliases: &["lastname", "surname", "familyname", "soyad"] },
    FieldSpec { field: "email", aliases: &["email", "emailaddress", "mail", "epoct"] },
    FieldSpec { field: "role", aliases: &["role", "rol"] },
    FieldSpec { field: "phone", aliases: &["phone", "phonenumber", "telefon"] },
    FieldSpec { field: "region", aliases: &["region", "regionname", "regionid"] },
    FieldSpec { field: "sector", aliases: &["sector", "sectorname", "sectorid", "sektor"] },
    FieldSpec { field: "school", aliases: &["school", "schoolname", "schoolid", "mekteb"] },
];

pub const SCHOOL_FIELDS: &[FieldSpec] = &[
    FieldSpec { field: "name", aliases: &["name", "schoolname", "school", "ad"] },
    FieldSpec { field: "sector", aliases: &["sector", "sectorname", "sectorid", "sektor"] },
    FieldSpec { field: "address", aliases: &["address", "unvan"] },
    FieldSpec { field: "email", aliases: &["email", "emailaddress", "mail"] },
    FieldSpec { field: "phone", aliases: &["phone", "phonenumber", "telefon"] },
];

/// Lowercase with whitespace, underscores and dashes removed
pub fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

pub fn match_header(header: &str, fields: &[FieldSpec]) -> Option<&'static str> {
    let normalized = normalize_header(header);
    fields
        .iter()
        .find(|spec| spec.aliases.contains(&normalized.as_str()))
        .map(|spec| spec.field)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string().trim().to_string(),
    }
}

/// First sheet of an xlsx workbook as rows of trimmed cell text
pub fn read_table(bytes: &[u8]) -> Result<Vec<Vec<String>>, ImportError> {
    let mut workbook = open_workbook_from_rs::<Xlsx<_>, _>(Cursor::new(bytes.to_vec()))
        .map_err(|e| ImportError::Workbook(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ImportError::EmptyWorkbook)?
        .map_err(|e| ImportError::Workbook(e.to_string()))?;
    Ok(range.rows().map(|row| row.iter().map(cell_text).collect()).collect())
}

/// A mapped data row with its 1-based sheet row number
#[derive(Debug, Clone, PartialEq)]
pub struct MappedRow {
    pub row: usize,
    pub fields: Map<String, Value>,
}

impl MappedRow {
    pub fn text(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str).filter(|s| !s.is_empty())
    }
}

/// Map data rows onto domain fields using the header row; blank rows are dropped
pub fn map_rows(table: &[Vec<String>], fields: &[FieldSpec]) -> Result<Vec<MappedRow>, ImportError> {
    let (header, data) = table.split_first().ok_or(ImportError::NoHeader)?;
    let targets: Vec<Option<&'static str>> = header.iter().map(|h| match_header(h, fields)).collect();
    if targets.iter().all(Option::is_none) {
        let expected: Vec<&str> = fields.iter().map(|f| f.field).collect();
        return Err(ImportError::NoRecognizedColumns(expected.join(", ")));
    }

    let mut out = Vec::new();
    for (index, cells) in data.iter().enumerate() {
        if cells.iter().all(|c| c.is_empty()) {
            continue;
        }
        let mut mapped = Map::new();
        for (target, cell) in targets.iter().zip(cells) {
            if let (Some(field), false) = (target, cell.is_empty()) {
                mapped.entry(field.to_string()).or_insert_with(|| Value::from(cell.clone()));
            }
        }
        out.push(MappedRow { row: index + 2, fields: mapped });
    }
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRow {
    pub row: usize,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportReport<T> {
    pub imported: Vec<T>,
    pub skipped: Vec<SkippedRow>,
}

impl<T> Default for ImportReport<T> {
    fn default() -> Self {
        Self {
            imported: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

impl<T> ImportReport<T> {
    fn skip(&mut self, row: usize, reason: impl Into<String>) {
        self.skipped.push(SkippedRow { row, reason: reason.into() });
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRow {
    pub row: usize,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Option<String>,
    pub phone: Option<String>,
    pub region: Option<String>,
    pub sector: Option<String>,
    pub school: Option<String>,
}

/// User rows keyed by domain field; rows without an email are reported as skipped
pub fn parse_users(table: &[Vec<String>]) -> Result<ImportReport<UserRow>, ImportError> {
    let mut report = ImportReport::default();
    for mapped in map_rows(table, USER_FIELDS)? {
        let Some(email) = mapped.text("email") else {
            report.skip(mapped.row, "email is required");
            continue;
        };
        let owned = |field: &str| mapped.text(field).map(str::to_string);
        report.imported.push(UserRow {
            row: mapped.row,
            first_name: owned("firstName").unwrap_or_default(),
            last_name: owned("lastName").unwrap_or_default(),
            email: email.to_string(),
            role: owned("role"),
            phone: owned("phone"),
            region: owned("region"),
            sector: owned("sector"),
            school: owned("school"),
        });
    }
    Ok(report)
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchoolRow {
    pub row: usize,
    pub name: String,
    pub sector: String,
    pub address: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// School rows; rows missing a name or a sector are reported as skipped
pub fn parse_schools(table: &[Vec<String>]) -> Result<ImportReport<SchoolRow>, ImportError> {
    let mut report = ImportReport::default();
    for mapped in map_rows(table, SCHOOL_FIELDS)? {
        let (Some(name), Some(sector)) = (mapped.text("name"), mapped.text("sector")) else {
            let missing = if mapped.text("name").is_none() { "name" } else { "sector" };
            report.skip(mapped.row, format!("{} is required", missing));
            continue;
        };
        let owned = |field: &str| mapped.text(field).map(str::to_string);
        report.imported.push(SchoolRow {
            row: mapped.row,
            name: name.to_string(),
            sector: sector.to_string(),
            address: owned("address"),
            email: owned("email"),
            phone: owned("phone"),
        });
    }
    Ok(report)
}

/// Hierarchy snapshot for resolving names or ids found in a sheet
struct Directory {
    regions: Vec<Region>,
    sectors: Vec<Sector>,
    schools: Vec<School>,
}

fn same_name(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

fn matches_ref(id: Uuid, name: &str, reference: &str) -> bool {
    Uuid::parse_str(reference.trim()).map(|r| r == id).unwrap_or(false) || same_name(name, reference)
}

impl Directory {
    async fn load(store: &dyn Store) -> Result<Self, StoreError> {
        Ok(Self {
            regions: store.list_regions().await?,
            sectors: store.list_sectors(None).await?,
            schools: store.list_schools(None).await?,
        })
    }

    fn region(&self, reference: &str) -> Option<&Region> {
        self.regions.iter().find(|r| matches_ref(r.id, &r.name, reference))
    }

    fn sector(&self, reference: &str, region_id: Option<Uuid>) -> Option<&Sector> {
        self.sectors
            .iter()
            .filter(|s| region_id.map_or(true, |id| s.region_id == id))
            .find(|s| matches_ref(s.id, &s.name, reference))
    }

    fn school(&self, reference: &str, sector_id: Option<Uuid>) -> Option<&School> {
        self.schools
            .iter()
            .filter(|s| sector_id.map_or(true, |id| s.sector_id == id))
            .find(|s| matches_ref(s.id, &s.name, reference))
    }

    fn sector_of(&self, id: Uuid) -> Option<&Sector> {
        self.sectors.iter().find(|s| s.id == id)
    }

    /// Resolve region, sector and school references of a user row into a path
    fn resolve(&self, row: &UserRow) -> Result<Option<EntityPath>, String> {
        let region = match &row.region {
            Some(r) => Some(self.region(r).ok_or_else(|| format!("unknown region '{}'", r))?),
            None => None,
        };
        let sector = match &row.sector {
            Some(s) => Some(self.sector(s, region.map(|r| r.id)).ok_or_else(|| format!("unknown sector '{}'", s))?),
            None => None,
        };
        if let Some(reference) = &row.school {
            let school = self
                .school(reference, sector.map(|s| s.id))
                .ok_or_else(|| format!("unknown school '{}'", reference))?;
            let sector = self
                .sector_of(school.sector_id)
                .ok_or_else(|| format!("school '{}' has no sector", reference))?;
            return Ok(Some(EntityPath::school(sector.region_id, sector.id, school.id)));
        }
        if let Some(sector) = sector {
            return Ok(Some(EntityPath::sector(sector.region_id, sector.id)));
        }
        Ok(region.map(|r| EntityPath::region(r.id)))
    }
}

/// Create profiles for the user rows of a sheet.
///
/// The caller needs `manage_users` on every row's target; rows that fail
/// resolution, permission or uniqueness are reported as skipped.
pub async fn import_users(
    store: &dyn Store,
    actor: Option<&UserProfile>,
    bytes: &[u8],
) -> Result<ImportReport<UserProfile>, ImportError> {
    let parsed = parse_users(&read_table(bytes)?)?;
    let directory = Directory::load(store).await?;
    let mut known_emails: Vec<String> = store
        .list_profiles()
        .await?
        .into_iter()
        .filter_map(|p| p.email.map(|e| e.to_lowercase()))
        .collect();

    let mut report = ImportReport {
        imported: Vec::new(),
        skipped: parsed.skipped,
    };

    for row in parsed.imported {
        if known_emails.contains(&row.email.to_lowercase()) {
            report.skip(row.row, format!("{} is already registered", row.email));
            continue;
        }
        let role = match row.role.as_deref().map(str::parse::<Role>) {
            None => Role::Schooladmin,
            Some(Ok(role)) => role,
            Some(Err(e)) => {
                report.skip(row.row, e);
                continue;
            }
        };
        let path = match directory.resolve(&row) {
            Ok(path) => path,
            Err(reason) => {
                report.skip(row.row, reason);
                continue;
            }
        };
        let allowed = match &path {
            Some(path) if role != Role::Superadmin => has_permission_on(actor, PermissionAction::ManageUsers, path),
            _ => has_permission(actor, PermissionAction::ManageUsers, None),
        };
        if !allowed {
            report.skip(row.row, "not allowed to manage users here");
            continue;
        }

        let input = ProfileInput {
            user_id: None,
            first_name: row.first_name.clone(),
            last_name: row.last_name.clone(),
            email: Some(row.email.clone()),
            role,
            region_id: path.map(|p| p.region_id),
            sector_id: path.and_then(|p| p.sector_id),
            school_id: path.and_then(|p| p.school_id),
        };
        let profile = match UserProfile::from_input(input) {
            Ok(profile) => profile,
            Err(e) => {
                report.skip(row.row, e.to_string());
                continue;
            }
        };
        match store.create_profile(profile).await {
            Ok(created) => {
                known_emails.push(row.email.to_lowercase());
                report.imported.push(created);
            }
            Err(StoreError::Duplicate(_)) => report.skip(row.row, "record already exists"),
            Err(e) => return Err(e.into()),
        }
    }

    tracing::info!(
        "User import: {} created, {} skipped",
        report.imported.len(),
        report.skipped.len()
    );
    Ok(report)
}

/// Create schools from a sheet; the caller needs `import_data` on each target sector
pub async fn import_schools(
    store: &dyn Store,
    actor: Option<&UserProfile>,
    bytes: &[u8],
) -> Result<ImportReport<School>, ImportError> {
    let parsed = parse_schools(&read_table(bytes)?)?;
    let directory = Directory::load(store).await?;
    let mut report = ImportReport {
        imported: Vec::new(),
        skipped: parsed.skipped,
    };

    for row in parsed.imported {
        let Some(sector) = directory.sector(&row.sector, None) else {
            report.skip(row.row, format!("unknown sector '{}'", row.sector));
            continue;
        };
        let path = EntityPath::sector(sector.region_id, sector.id);
        if !has_permission_on(actor, PermissionAction::ImportData, &path) {
            report.skip(row.row, "not allowed to import into this sector");
            continue;
        }
        let school = School::from_input(SchoolInput {
            name: row.name,
            sector_id: sector.id,
            address: row.address,
            email: row.email,
            phone: row.phone,
        });
        match store.create_school(school).await {
            Ok(created) => report.imported.push(created),
            Err(StoreError::Duplicate(_)) => report.skip(row.row, "record already exists"),
            Err(e) => return Err(e.into()),
        }
    }

    tracing::info!(
        "School import: {} created, {} skipped",
        report.imported.len(),
        report.skipped.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporting::export::{to_xlsx, Sheet};
    use crate::store::MemoryStore;

    fn table(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter().map(|r| r.iter().map(|c| c.to_string()).collect()).collect()
    }

    fn xlsx(rows: &[&[&str]]) -> Vec<u8> {
        let headers = rows[0].iter().map(|h| h.to_string()).collect();
        let mut sheet = Sheet::new("Import", headers);
        sheet.rows = rows[1..]
            .iter()
            .map(|r| r.iter().map(|c| Value::from(*c)).collect())
            .collect();
        to_xlsx(&sheet).unwrap()
    }

    #[test]
    fn headers_match_loosely() {
        assert_eq!(match_header("First Name", USER_FIELDS), Some("firstName"));
        assert_eq!(match_header(" first_name ", USER_FIELDS), Some("firstName"));
        assert_eq!(match_header("E-mail", USER_FIELDS), Some("email"));
        assert_eq!(match_header("Surname", USER_FIELDS), Some("lastName"));
        assert_eq!(match_header("Favourite Colour", USER_FIELDS), None);
    }

    #[test]
    fn users_without_email_are_skipped() {
        let report = parse_users(&table(&[
            &["First Name", "Last Name", "Email"],
            &["Aysel", "Mammadova", "aysel@example.com"],
            &["Orxan", "Aliyev", ""],
            &["", "", ""],
        ]))
        .unwrap();

        assert_eq!(report.imported.len(), 1);
        assert_eq!(report.imported[0].first_name, "Aysel");
        assert_eq!(report.skipped, vec![SkippedRow { row: 3, reason: "email is required".into() }]);
    }

    #[test]
    fn mapped_rows_use_field_names() {
        let rows = map_rows(&table(&[&["First Name", "EMAIL"], &["Aysel", "a@example.com"]]), USER_FIELDS).unwrap();
        assert_eq!(rows[0].text("firstName"), Some("Aysel"));
        assert_eq!(rows[0].text("email"), Some("a@example.com"));
    }

    #[test]
    fn unrecognized_sheet_is_rejected() {
        assert!(matches!(
            map_rows(&table(&[&["foo", "bar"], &["1", "2"]]), SCHOOL_FIELDS),
            Err(ImportError::NoRecognizedColumns(_))
        ));
        assert!(matches!(map_rows(&[], SCHOOL_FIELDS), Err(ImportError::NoHeader)));
    }

    #[test]
    fn schools_need_name_and_sector() {
        let report = parse_schools(&table(&[
            &["School Name", "Sector"],
            &["School 12", "Sector A"],
            &["", "Sector A"],
            &["School 9", ""],
        ]))
        .unwrap();
        assert_eq!(report.imported.len(), 1);
        assert_eq!(report.skipped[0].reason, "name is required");
        assert_eq!(report.skipped[1].reason, "sector is required");
    }

    #[test]
    fn reads_numbers_as_plain_text() {
        let bytes = xlsx(&[&["Name", "Sector"], &["School 12", "Sector A"]]);
        let rows = read_table(&bytes).unwrap();
        assert_eq!(rows[1], vec!["School 12".to_string(), "Sector A".to_string()]);
        assert_eq!(cell_text(&Data::Float(120.0)), "120");
        assert!(read_table(b"not a workbook").is_err());
    }

    #[tokio::test]
    async fn imports_schools_into_permitted_sectors() {
        let store = MemoryStore::new();
        let region = store.create_region(Region::new("Baku")).await.unwrap();
        let mine = store.create_sector(Sector::new("Sector A", region.id)).await.unwrap();
        store.create_sector(Sector::new("Sector B", region.id)).await.unwrap();
        let actor = UserProfile::from_input(ProfileInput {
            user_id: None,
            first_name: "Sector".into(),
            last_name: "Admin".into(),
            email: None,
            role: Role::Sectoradmin,
            region_id: Some(region.id),
            sector_id: Some(mine.id),
            school_id: None,
        })
        .unwrap();

        let bytes = xlsx(&[
            &["Name", "Sector", "Address"],
            &["School 12", "sector a", "Nizami 5"],
            &["School 40", "Sector B", ""],
            &["School 41", "Sector Z", ""],
        ]);
        let report = import_schools(&store, Some(&actor), &bytes).await.unwrap();

        assert_eq!(report.imported.len(), 1);
        assert_eq!(report.imported[0].sector_id, mine.id);
        assert_eq!(report.imported[0].address.as_deref(), Some("Nizami 5"));
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(store.list_schools(Some(mine.id)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn imports_users_under_resolved_schools() {
        let store = MemoryStore::new();
        let region = store.create_region(Region::new("Baku")).await.unwrap();
        let sector = store.create_sector(Sector::new("Sector A", region.id)).await.unwrap();
        let school = store
            .create_school(School::from_input(SchoolInput {
                name: "School 12".into(),
                sector_id: sector.id,
                ..Default::default()
            }))
            .await
            .unwrap();
        let admin = UserProfile::from_input(ProfileInput {
            user_id: None,
            first_name: "Root".into(),
            last_name: "".into(),
            email: None,
            role: Role::Superadmin,
            region_id: None,
            sector_id: None,
            school_id: None,
        })
        .unwrap();

        let bytes = xlsx(&[
            &["First Name", "Last Name", "Email", "School"],
            &["Aysel", "Mammadova", "aysel@example.com", "School 12"],
            &["Orxan", "Aliyev", "", "School 12"],
            &["Nigar", "Huseynova", "nigar@example.com", "School 99"],
            &["Aysel", "Again", "AYSEL@example.com", "School 12"],
        ]);
        let report = import_users(&store, Some(&admin), &bytes).await.unwrap();

        assert_eq!(report.imported.len(), 1);
        let created = &report.imported[0];
        assert_eq!(created.role, Role::Schooladmin);
        assert_eq!(created.school_id, Some(school.id));
        assert_eq!(created.region_id, Some(region.id));
        let rows: Vec<usize> = report.skipped.iter().map(|s| s.row).collect();
        assert_eq!(rows, vec![3, 4, 5]);
    }
}
