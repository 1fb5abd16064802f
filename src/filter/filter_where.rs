use serde_json::{Map, Value};

use super::error::FilterError;
use super::filter::is_identifier;

/// Compiles a `{ column: value }` object into ANDed equality tests, numbering
/// `$n` placeholders in the order values are pushed.
pub struct FilterWhere {
    param_values: Vec<Value>,
}

impl FilterWhere {
    fn new() -> Self {
        Self { param_values: vec![] }
    }

    pub fn generate(where_data: &Value) -> Result<(String, Vec<Value>), FilterError> {
        let mut filter_where = Self::new();
        let sql = match where_data {
            Value::Null => String::new(),
            Value::Object(obj) => filter_where.build(obj)?,
            _ => return Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        };
        Ok((sql, filter_where.param_values))
    }

    pub fn validate(where_data: &Value) -> Result<(), FilterError> {
        match where_data {
            Value::Null | Value::Object(_) => Ok(()),
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    fn build(&mut self, obj: &Map<String, Value>) -> Result<String, FilterError> {
        let mut parts = vec![];
        for (column, value) in obj {
            parts.push(self.build_condition(column, value)?);
        }
        Ok(parts.join(" AND "))
    }

    fn build_condition(&mut self, column: &str, value: &Value) -> Result<String, FilterError> {
        if !is_identifier(column) {
            return Err(FilterError::InvalidColumn(format!("Invalid column name format: '{}'", column)));
        }

        match value {
            Value::Null => Ok(format!("\"{}\" IS NULL", column)),
            Value::Array(_) | Value::Object(_) => Err(FilterError::InvalidWhereClause(format!(
                "'{}' must compare against a scalar value",
                column
            ))),
            _ => Ok(format!("\"{}\" = {}", column, self.param(value.clone()))),
        }
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        format!("${}", self.param_values.len())
    }
}
