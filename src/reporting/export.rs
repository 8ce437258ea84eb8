// Spreadsheet export of report rows.

use rust_xlsxwriter::{Format, Workbook, XlsxError};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Category, FormData, School, Sector};
use crate::sanitize::unescape_text;

/// Excel caps a sheet at this many columns
const MAX_COLUMNS: usize = 16_384;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("spreadsheet has {0} columns, more than a sheet can hold")]
    TooManyColumns(usize),

    #[error("xlsx error: {0}")]
    Xlsx(#[from] XlsxError),
}

/// One worksheet worth of tabular data
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows: Vec::new(),
        }
    }

    /// Project JSON objects onto the header list; missing keys stay blank
    pub fn from_objects(name: impl Into<String>, headers: Vec<String>, objects: &[Value]) -> Self {
        let rows = objects
            .iter()
            .map(|obj| headers.iter().map(|h| obj.get(h).cloned().unwrap_or(Value::Null)).collect())
            .collect();
        Self {
            name: name.into(),
            headers,
            rows,
        }
    }
}

/// Form entries of one category: school and status, then one column per field
pub fn form_entries_sheet(
    category: &Category,
    forms: &[FormData],
    schools: &HashMap<Uuid, School>,
    sectors: &HashMap<Uuid, Sector>,
) -> Sheet {
    let mut columns: Vec<_> = category.columns.iter().collect();
    columns.sort_by_key(|c| c.order_index);

    let mut headers = vec!["School".to_string(), "Sector".to_string(), "Status".to_string()];
    headers.extend(columns.iter().map(|c| c.name.clone()));
    headers.push("Submitted At".to_string());

    let mut sheet = Sheet::new(category.name.clone(), headers);
    for form in forms {
        let school = schools.get(&form.school_id);
        let sector = school.and_then(|s| sectors.get(&s.sector_id));
        let mut row = vec![
            school.map(|s| Value::from(s.name.clone())).unwrap_or(Value::Null),
            sector.map(|s| Value::from(s.name.clone())).unwrap_or(Value::Null),
            Value::from(form.status.as_str()),
        ];
        row.extend(columns.iter().map(|c| match form.data.get(&c.name) {
            Some(Value::String(s)) if !c.rich_text => Value::from(unescape_text(s)),
            Some(value) => value.clone(),
            None => Value::Null,
        }));
        row.push(form.submitted_at.map(|t| Value::from(t.to_rfc3339())).unwrap_or(Value::Null));
        sheet.rows.push(row);
    }
    sheet
}

pub fn schools_sheet(schools: &[School], sectors: &HashMap<Uuid, Sector>) -> Sheet {
    let headers = ["Name", "Sector", "Address", "Email", "Phone"].map(String::from).to_vec();
    let mut sheet = Sheet::new("Schools", headers);
    for school in schools {
        let text = |v: &Option<String>| v.clone().map(Value::from).unwrap_or(Value::Null);
        sheet.rows.push(vec![
            Value::from(school.name.clone()),
            sectors
                .get(&school.sector_id)
                .map(|s| Value::from(s.name.clone()))
                .unwrap_or(Value::Null),
            text(&school.address),
            text(&school.email),
            text(&school.phone),
        ]);
    }
    sheet
}

/// Worksheet names are limited to 31 characters and cannot contain `[]:*?/\`
fn sheet_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if "[]:*?/\\".contains(c) { '_' } else { c })
        .take(31)
        .collect();
    if cleaned.trim().is_empty() {
        "Sheet1".to_string()
    } else {
        cleaned
    }
}

pub fn to_xlsx(sheet: &Sheet) -> Result<Vec<u8>, ExportError> {
    if sheet.headers.len() > MAX_COLUMNS {
        return Err(ExportError::TooManyColumns(sheet.headers.len()));
    }

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name(&sheet.name))?;

    let bold = Format::new().set_bold();
    for (col, header) in sheet.headers.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, header, &bold)?;
    }

    for (r, row) in sheet.rows.iter().enumerate() {
        let row_num = (r + 1) as u32;
        for (col, value) in row.iter().enumerate().take(sheet.headers.len()) {
            let col = col as u16;
            match value {
                Value::Null => {}
                Value::Bool(b) => {
                    worksheet.write_boolean(row_num, col, *b)?;
                }
                Value::Number(n) => match n.as_f64() {
                    Some(f) => {
                        worksheet.write_number(row_num, col, f)?;
                    }
                    None => {
                        worksheet.write_string(row_num, col, n.to_string())?;
                    }
                },
                Value::String(s) => {
                    worksheet.write_string(row_num, col, s)?;
                }
                other => {
                    worksheet.write_string(row_num, col, other.to_string())?;
                }
            }
        }
    }

    tracing::debug!("Exported sheet '{}' with {} rows", sheet.name, sheet.rows.len());
    Ok(workbook.save_to_buffer()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CategoryScope, Column, ColumnType, SchoolInput};
    use crate::types::FormStatus;
    use serde_json::{json, Map};

    #[test]
    fn sheet_names_are_cleaned() {
        assert_eq!(sheet_name("Q1/Q2 [draft]"), "Q1_Q2 _draft_");
        assert_eq!(sheet_name("   "), "Sheet1");
        assert_eq!(sheet_name(&"x".repeat(40)).len(), 31);
    }

    #[test]
    fn form_entries_follow_column_order() {
        let mut category = Category::new("Students", CategoryScope::Global, None);
        let mut second = Column::new(category.id, "Teachers", ColumnType::Number);
        second.order_index = 2;
        let mut first = Column::new(category.id, "Student Count", ColumnType::Number);
        first.order_index = 1;
        category.columns = vec![second, first];

        let sector = Sector::new("Sector A", Uuid::new_v4());
        let school = School::from_input(SchoolInput {
            name: "School 12".into(),
            sector_id: sector.id,
            ..Default::default()
        });
        let mut data = Map::new();
        data.insert("Student Count".into(), json!(120));
        let form = FormData::new(category.id, school.id, data, FormStatus::Draft);

        let sheet = form_entries_sheet(
            &category,
            &[form],
            &HashMap::from([(school.id, school)]),
            &HashMap::from([(sector.id, sector)]),
        );
        assert_eq!(sheet.headers, ["School", "Sector", "Status", "Student Count", "Teachers", "Submitted At"]);
        assert_eq!(sheet.rows[0][0], json!("School 12"));
        assert_eq!(sheet.rows[0][2], json!("draft"));
        assert_eq!(sheet.rows[0][3], json!(120));
        assert_eq!(sheet.rows[0][4], Value::Null);
    }

    #[test]
    fn plain_text_cells_are_unescaped() {
        let mut category = Category::new("Clubs", CategoryScope::Global, None);
        let mut club = Column::new(category.id, "Club", ColumnType::Text);
        club.order_index = 1;
        let mut notes = Column::new(category.id, "Notes", ColumnType::Textarea).rich_text();
        notes.order_index = 2;
        category.columns = vec![club, notes];

        let mut data = Map::new();
        data.insert("Club".into(), json!("Tom &amp; Jerry &lt;3"));
        data.insert("Notes".into(), json!("<b>Tom &amp; Jerry</b>"));
        let form = FormData::new(category.id, Uuid::new_v4(), data, FormStatus::Draft);

        let sheet = form_entries_sheet(&category, &[form], &HashMap::new(), &HashMap::new());
        assert_eq!(sheet.rows[0][3], json!("Tom & Jerry <3"));
        assert_eq!(sheet.rows[0][4], json!("<b>Tom &amp; Jerry</b>"));
    }

    #[test]
    fn writes_an_xlsx_archive() {
        let sheet = Sheet::from_objects(
            "Report",
            vec!["name".into(), "count".into()],
            &[json!({"name": "a", "count": 1}), json!({"name": "b"})],
        );
        let bytes = to_xlsx(&sheet).unwrap();
        // xlsx files are zip archives
        assert_eq!(&bytes[..2], b"PK");
    }
}
