use serde_json::Value;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{FilterData, FilterOrderInfo, SqlResult};

pub struct Filter {
    table_name: String,
    where_data: Option<Value>,
    order_data: Vec<FilterOrderInfo>,
}

impl Filter {
    pub fn new(table_name: impl Into<String>) -> Result<Self, FilterError> {
        let table_name = table_name.into();
        if !is_identifier(&table_name) {
            return Err(FilterError::InvalidTableName(format!("Invalid table name format: '{}'", table_name)));
        }
        Ok(Self {
            table_name,
            where_data: None,
            order_data: vec![],
        })
    }

    pub fn assign(&mut self, data: FilterData) -> Result<&mut Self, FilterError> {
        if let Some(where_clause) = data.where_clause { self.where_clause(where_clause)?; }
        if let Some(order) = data.order { self.order(order)?; }
        Ok(self)
    }

    pub fn where_clause(&mut self, conditions: Value) -> Result<&mut Self, FilterError> {
        FilterWhere::validate(&conditions)?;
        self.where_data = Some(conditions);
        Ok(self)
    }

    pub fn order(&mut self, order_spec: Value) -> Result<&mut Self, FilterError> {
        self.order_data = FilterOrder::validate_and_parse(&order_spec)?;
        Ok(self)
    }

    pub fn to_sql(&self) -> Result<SqlResult, FilterError> {
        let (where_clause, params) = match self.where_data {
            Some(ref where_data) => FilterWhere::generate(where_data)?,
            None => (String::new(), vec![]),
        };
        let order_clause = FilterOrder::generate(&self.order_data);

        let query = [
            format!("SELECT * FROM \"{}\"", self.table_name),
            if where_clause.is_empty() { String::new() } else { format!("WHERE {}", where_clause) },
            order_clause,
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        Ok(SqlResult { query, params })
    }
}

/// Plain SQL identifier: starts with a letter or underscore, then [A-Za-z0-9_]
pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_bad_table_names() {
        assert!(Filter::new("subscriptions").is_ok());
        assert!(Filter::new("").is_err());
        assert!(Filter::new("1loans").is_err());
        assert!(Filter::new("loans; DROP TABLE x").is_err());
    }

    #[test]
    fn builds_active_loan_query() {
        let mut filter = Filter::new("subscriptions").unwrap();
        filter
            .assign(FilterData {
                where_clause: Some(json!({ "type": "loan", "status": "active" })),
                order: Some(json!("created_at asc")),
            })
            .unwrap();

        let sql = filter.to_sql().unwrap();
        assert_eq!(
            sql.query,
            "SELECT * FROM \"subscriptions\" WHERE \"status\" = $1 AND \"type\" = $2 ORDER BY \"created_at\" ASC"
        );
        // serde_json maps iterate in key order
        assert_eq!(sql.params, vec![json!("active"), json!("loan")]);
    }

    #[test]
    fn without_conditions_selects_everything() {
        let filter = Filter::new("subscriptions").unwrap();
        let sql = filter.to_sql().unwrap();
        assert_eq!(sql.query, "SELECT * FROM \"subscriptions\"");
        assert!(sql.params.is_empty());
    }
}
