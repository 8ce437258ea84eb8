use regex::{Regex, RegexBuilder};
use serde_json::Value;
use std::cmp::Ordering;

use super::error::FilterError;
use super::types::FilterOp;

/// Compiled `where` tree
#[derive(Debug, Clone)]
pub enum Condition {
    Field { column: String, test: FieldTest },
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
}

#[derive(Debug, Clone)]
pub enum FieldTest {
    Compare(FilterOp, Value),
    Pattern { regex: Regex, negate: bool },
    Exists(bool),
}

pub struct FilterWhere;

impl FilterWhere {
    pub fn validate(where_data: &Value) -> Result<(), FilterError> {
        match where_data {
            Value::Null | Value::Object(_) => Ok(()),
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    pub fn compile(where_data: &Value) -> Result<Condition, FilterError> {
        match where_data {
            Value::Null => Ok(Condition::And(vec![])),
            Value::Object(obj) => {
                let mut parts = Vec::new();
                for (key, value) in obj {
                    if key.starts_with('$') {
                        parts.push(Self::compile_logical(key, value)?);
                    } else {
                        parts.extend(Self::compile_field(key, value)?);
                    }
                }
                Ok(if parts.len() == 1 { parts.remove(0) } else { Condition::And(parts) })
            }
            _ => Err(FilterError::InvalidWhereClause("Unsupported WHERE format".to_string())),
        }
    }

    fn compile_logical(op: &str, value: &Value) -> Result<Condition, FilterError> {
        match op {
            "$and" | "$or" => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", op)))?;
                let parts = arr.iter().map(Self::compile).collect::<Result<Vec<_>, _>>()?;
                Ok(if op == "$and" { Condition::And(parts) } else { Condition::Or(parts) })
            }
            "$not" => Ok(Condition::Not(Box::new(Self::compile(value)?))),
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    fn compile_field(field: &str, value: &Value) -> Result<Vec<Condition>, FilterError> {
        let ops = match value {
            Value::Object(obj) if !obj.is_empty() && obj.keys().all(|k| k.starts_with('$')) => obj,
            // Implicit equality: { field: value }
            _ => {
                return Ok(vec![Condition::Field {
                    column: field.to_string(),
                    test: FieldTest::Compare(FilterOp::Eq, value.clone()),
                }])
            }
        };

        let mut out = Vec::new();
        for (op_key, op_val) in ops {
            let operator = FilterOp::parse(op_key).ok_or_else(|| FilterError::UnsupportedOperator(op_key.clone()))?;
            let test = match operator {
                FilterOp::Like | FilterOp::ILike => FieldTest::Pattern {
                    regex: like_regex(op_val, operator == FilterOp::ILike)?,
                    negate: false,
                },
                FilterOp::Exists => FieldTest::Exists(op_val.as_bool().ok_or_else(|| {
                    FilterError::InvalidOperatorData("$exists requires true or false".to_string())
                })?),
                FilterOp::In | FilterOp::NIn if !op_val.is_array() => {
                    return Err(FilterError::InvalidOperatorData(format!("{} requires array", op_key)))
                }
                FilterOp::Between if op_val.as_array().map(Vec::len) != Some(2) => {
                    return Err(FilterError::InvalidOperatorData(
                        "$between requires array with 2 values".to_string(),
                    ))
                }
                _ => FieldTest::Compare(operator, op_val.clone()),
            };
            out.push(Condition::Field { column: field.to_string(), test });
        }
        Ok(out)
    }
}

impl Condition {
    pub fn matches(&self, row: &Value) -> bool {
        match self {
            Condition::And(parts) => parts.iter().all(|c| c.matches(row)),
            Condition::Or(parts) => parts.iter().any(|c| c.matches(row)),
            Condition::Not(inner) => !inner.matches(row),
            Condition::Field { column, test } => {
                let value = lookup(row, column).filter(|v| !v.is_null());
                test.matches(value)
            }
        }
    }
}

impl FieldTest {
    fn matches(&self, value: Option<&Value>) -> bool {
        match self {
            FieldTest::Exists(wanted) => value.is_some() == *wanted,
            FieldTest::Pattern { regex, negate } => {
                let hit = value.map(|v| regex.is_match(&display(v))).unwrap_or(false);
                hit != *negate
            }
            FieldTest::Compare(op, data) => match (op, value) {
                (FilterOp::Eq, None) => data.is_null(),
                (FilterOp::Eq, Some(v)) => equals(v, data),
                (FilterOp::Ne, None) => !data.is_null(),
                (FilterOp::Ne, Some(v)) => !equals(v, data),
                (FilterOp::In, Some(v)) => as_list(data).iter().any(|d| equals(v, d)),
                (FilterOp::NIn, None) => true,
                (FilterOp::NIn, Some(v)) => !as_list(data).iter().any(|d| equals(v, d)),
                (FilterOp::Between, Some(v)) => {
                    let bounds = as_list(data);
                    bounds.len() == 2
                        && matches!(compare_values(v, &bounds[0]), Some(Ordering::Greater | Ordering::Equal))
                        && matches!(compare_values(v, &bounds[1]), Some(Ordering::Less | Ordering::Equal))
                }
                (FilterOp::Gt, Some(v)) => compare_values(v, data) == Some(Ordering::Greater),
                (FilterOp::Gte, Some(v)) => matches!(compare_values(v, data), Some(Ordering::Greater | Ordering::Equal)),
                (FilterOp::Lt, Some(v)) => compare_values(v, data) == Some(Ordering::Less),
                (FilterOp::Lte, Some(v)) => matches!(compare_values(v, data), Some(Ordering::Less | Ordering::Equal)),
                _ => false,
            },
        }
    }
}

fn as_list(data: &Value) -> &[Value] {
    data.as_array().map(Vec::as_slice).unwrap_or(&[])
}

fn display(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// SQL LIKE pattern (`%`, `_`) as an anchored regex
fn like_regex(pattern: &Value, case_insensitive: bool) -> Result<Regex, FilterError> {
    let pattern = pattern
        .as_str()
        .ok_or_else(|| FilterError::InvalidOperatorData("LIKE pattern must be a string".to_string()))?;
    let mut expr = String::from("^");
    for ch in pattern.chars() {
        match ch {
            '%' => expr.push_str(".*"),
            '_' => expr.push('.'),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');
    RegexBuilder::new(&expr)
        .case_insensitive(case_insensitive)
        .dot_matches_new_line(true)
        .build()
        .map_err(|e| FilterError::InvalidPattern(e.to_string()))
}

/// Resolve `a.b.c` through nested objects; an exact top-level key wins
pub fn lookup<'a>(row: &'a Value, path: &str) -> Option<&'a Value> {
    if let Some(v) = row.get(path) {
        return Some(v);
    }
    path.split('.').try_fold(row, |current, key| current.get(key))
}

fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Ordering between two JSON scalars; numeric strings compare as numbers against numbers
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Number(_), _) | (_, Value::Number(_)) => as_number(a)?.partial_cmp(&as_number(b)?),
        _ => None,
    }
}

fn equals(a: &Value, b: &Value) -> bool {
    a == b || compare_values(a, b) == Some(Ordering::Equal)
}
