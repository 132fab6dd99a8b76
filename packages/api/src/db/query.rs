//! Query-string encoding of [`Filter`] and [`Order`].

use serde_json::Value;
use store::{Filter, Order};

/// Return the written rows.
pub const PREFER_REPRESENTATION: &str = "return=representation";
/// Upsert on primary key, returning the written rows.
pub const PREFER_MERGE: &str = "resolution=merge-duplicates,return=representation";

/// `(column, operator.value)` pairs for every predicate.
pub fn query_params(filter: &Filter) -> Vec<(String, String)> {
    filter
        .conditions()
        .iter()
        .map(|(column, value)| {
            let predicate = match value {
                Value::Null => "is.null".to_string(),
                Value::String(s) => format!("eq.{s}"),
                other => format!("eq.{other}"),
            };
            (column.clone(), predicate)
        })
        .collect()
}

pub fn order_param(order: &Order) -> (String, String) {
    let direction = if order.ascending { "asc" } else { "desc" };
    ("order".to_string(), format!("{}.{}", order.column, direction))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_encoding() {
        let filter = Filter::new()
            .eq("id", "e1")
            .eq("user_id", "u1")
            .eq("archived", false)
            .eq("image_url", Value::Null);
        assert_eq!(
            query_params(&filter),
            vec![
                ("id".to_string(), "eq.e1".to_string()),
                ("user_id".to_string(), "eq.u1".to_string()),
                ("archived".to_string(), "eq.false".to_string()),
                ("image_url".to_string(), "is.null".to_string()),
            ]
        );
    }

    #[test]
    fn test_order_encoding() {
        assert_eq!(
            order_param(&Order::desc("created_at")),
            ("order".to_string(), "created_at.desc".to_string())
        );
    }
}
