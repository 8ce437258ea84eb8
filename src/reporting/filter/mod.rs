// In-memory filtering and sorting of JSON rows for reports.

pub mod error;
pub mod filter_order;
pub mod filter_where;
pub mod types;

pub use error::FilterError;
pub use types::*;

use serde_json::Value;

use filter_order::FilterOrder;
use filter_where::{Condition, FilterWhere};

pub struct Filter {
    condition: Condition,
    order_data: Vec<FilterOrderInfo>,
    limit: Option<usize>,
    offset: usize,
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            condition: Condition::And(vec![]),
            order_data: vec![],
            limit: None,
            offset: 0,
        }
    }
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&mut self, data: FilterData) -> Result<&mut Self, FilterError> {
        if let Some(where_clause) = data.where_clause {
            self.where_clause(where_clause)?;
        }
        if let Some(order) = data.order {
            self.order(order)?;
        }
        self.limit(data.limit, data.offset);
        Ok(self)
    }

    pub fn where_clause(&mut self, conditions: Value) -> Result<&mut Self, FilterError> {
        FilterWhere::validate(&conditions)?;
        self.condition = FilterWhere::compile(&conditions)?;
        Ok(self)
    }

    pub fn order(&mut self, order_spec: Value) -> Result<&mut Self, FilterError> {
        self.order_data = FilterOrder::validate_and_parse(&order_spec)?;
        Ok(self)
    }

    pub fn limit(&mut self, limit: Option<usize>, offset: Option<usize>) -> &mut Self {
        self.limit = limit;
        self.offset = offset.unwrap_or(0);
        self
    }

    /// Filter, then sort, then page
    pub fn apply(&self, rows: Vec<Value>) -> Vec<Value> {
        let mut kept: Vec<Value> = rows.into_iter().filter(|row| self.condition.matches(row)).collect();
        FilterOrder::apply(&mut kept, &self.order_data);
        let paged = kept.into_iter().skip(self.offset);
        match self.limit {
            Some(limit) => paged.take(limit).collect(),
            None => paged.collect(),
        }
    }
}
