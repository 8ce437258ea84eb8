use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    ILike,
    In,
    NIn,
    Between,
    Exists,
}

impl FilterOp {
    pub fn parse(key: &str) -> Option<Self> {
        Some(match key {
            "$eq" => FilterOp::Eq,
            "$ne" | "$neq" => FilterOp::Ne,
            "$gt" => FilterOp::Gt,
            "$gte" => FilterOp::Gte,
            "$lt" => FilterOp::Lt,
            "$lte" => FilterOp::Lte,
            "$like" => FilterOp::Like,
            "$ilike" => FilterOp::ILike,
            "$in" => FilterOp::In,
            "$nin" => FilterOp::NIn,
            "$between" => FilterOp::Between,
            "$exists" => FilterOp::Exists,
            _ => return None,
        })
    }
}

/// Filter request body: `{ "where": {...}, "order": ..., "limit": n, "offset": n }`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterData {
    #[serde(rename = "where", default)]
    pub where_clause: Option<Value>,
    #[serde(default)]
    pub order: Option<Value>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterOrderInfo {
    pub column: String,
    pub sort: SortDirection,
}
