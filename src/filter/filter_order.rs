use serde_json::Value;

use super::error::FilterError;
use super::filter::is_identifier;
use super::types::{FilterOrderInfo, SortDirection};

pub struct FilterOrder;

impl FilterOrder {
    /// Accepts `"created_at desc, id"` or `["created_at desc", "id"]`
    pub fn validate_and_parse(order: &Value) -> Result<Vec<FilterOrderInfo>, FilterError> {
        let infos = match order {
            Value::String(s) => Self::parse_order_string(s),
            Value::Array(arr) => arr
                .iter()
                .filter_map(Value::as_str)
                .flat_map(Self::parse_order_string)
                .collect(),
            _ => vec![],
        };

        if let Some(bad) = infos.iter().find(|i| !is_identifier(&i.column)) {
            return Err(FilterError::InvalidColumn(format!("Invalid order column: '{}'", bad.column)));
        }
        Ok(infos)
    }

    fn parse_order_string(s: &str) -> Vec<FilterOrderInfo> {
        s.split(',')
            .filter_map(|part| {
                let mut it = part.split_whitespace();
                let column = it.next()?;
                Some(FilterOrderInfo {
                    column: column.to_string(),
                    sort: Self::direction(it.next().unwrap_or("asc")),
                })
            })
            .collect()
    }

    fn direction(s: &str) -> SortDirection {
        if s.eq_ignore_ascii_case("desc") { SortDirection::Desc } else { SortDirection::Asc }
    }

    pub fn generate(infos: &[FilterOrderInfo]) -> String {
        if infos.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = infos
            .iter()
            .map(|i| format!("\"{}\" {}", i.column, i.sort.to_sql()))
            .collect();
        format!("ORDER BY {}", parts.join(", "))
    }
}
