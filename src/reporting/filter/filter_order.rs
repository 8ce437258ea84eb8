use serde_json::Value;
use std::cmp::Ordering;

use super::error::FilterError;
use super::filter_where::{compare_values, lookup};
use super::types::{FilterOrderInfo, SortDirection};

pub struct FilterOrder;

impl FilterOrder {
    pub fn validate_and_parse(order: &Value) -> Result<Vec<FilterOrderInfo>, FilterError> {
        match order {
            Value::Null => Ok(vec![]),
            Value::String(s) => Ok(Self::parse_order_string(s)),
            Value::Array(arr) => {
                // ["createdAt desc", "name"]
                let mut out = Vec::new();
                for v in arr {
                    match v {
                        Value::String(s) => out.extend(Self::parse_order_string(s)),
                        other => return Err(FilterError::InvalidOrder(format!("expected string, got {}", other))),
                    }
                }
                Ok(out)
            }
            Value::Object(obj) => {
                // { "createdAt": "desc", "name": "asc" }
                let mut out = Vec::new();
                for (k, v) in obj {
                    let sort = match v.as_str().map(str::to_ascii_lowercase).as_deref() {
                        Some("desc") => SortDirection::Desc,
                        Some("asc") | None => SortDirection::Asc,
                        Some(other) => return Err(FilterError::InvalidOrder(format!("unknown direction '{}'", other))),
                    };
                    out.push(FilterOrderInfo { column: k.clone(), sort });
                }
                Ok(out)
            }
            other => Err(FilterError::InvalidOrder(format!("unsupported order value {}", other))),
        }
    }

    fn parse_order_string(s: &str) -> Vec<FilterOrderInfo> {
        let mut out = Vec::new();
        for part in s.split(',') {
            let mut it = part.split_whitespace();
            if let Some(col) = it.next() {
                let dir = it.next().unwrap_or("asc");
                let sort = if dir.eq_ignore_ascii_case("desc") { SortDirection::Desc } else { SortDirection::Asc };
                out.push(FilterOrderInfo { column: col.to_string(), sort });
            }
        }
        out
    }

    /// Stable sort; missing and null values go last in either direction
    pub fn apply(rows: &mut [Value], infos: &[FilterOrderInfo]) {
        if infos.is_empty() {
            return;
        }
        rows.sort_by(|a, b| {
            for info in infos {
                let left = lookup(a, &info.column).filter(|v| !v.is_null());
                let right = lookup(b, &info.column).filter(|v| !v.is_null());
                let ord = match (left, right) {
                    (None, None) => Ordering::Equal,
                    (None, Some(_)) => Ordering::Greater,
                    (Some(_), None) => Ordering::Less,
                    (Some(l), Some(r)) => {
                        let ord = compare_values(l, r).unwrap_or(Ordering::Equal);
                        match info.sort {
                            SortDirection::Asc => ord,
                            SortDirection::Desc => ord.reverse(),
                        }
                    }
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_all_order_shapes() {
        let from_string = FilterOrder::validate_and_parse(&json!("name desc, createdAt")).unwrap();
        assert_eq!(from_string.len(), 2);
        assert_eq!(from_string[0].sort, SortDirection::Desc);
        assert_eq!(from_string[1].sort, SortDirection::Asc);

        let from_array = FilterOrder::validate_and_parse(&json!(["name desc"])).unwrap();
        assert_eq!(from_array, from_string[..1].to_vec());

        let from_object = FilterOrder::validate_and_parse(&json!({"name": "desc"})).unwrap();
        assert_eq!(from_object, from_array);

        assert!(FilterOrder::validate_and_parse(&json!({"name": "sideways"})).is_err());
    }

    #[test]
    fn nulls_sort_last() {
        let mut rows = vec![json!({"n": null}), json!({"n": 1}), json!({}), json!({"n": 3})];
        FilterOrder::apply(&mut rows, &FilterOrder::validate_and_parse(&json!("n desc")).unwrap());
        assert_eq!(rows[0]["n"], json!(3));
        assert_eq!(rows[1]["n"], json!(1));
    }
}
