//! Catalog and inventory records written by the catalog writer.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AppError, Result};

/// Keys every queued row message must carry.
pub const REQUIRED_FIELDS: [&str; 5] = ["id", "title", "description", "price", "count"];

/// A product in the catalog table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub price: u64,
}

/// Stock level for a product, keyed by the product id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InventoryRecord {
    pub product_id: String,
    pub count: u64,
}

/// A validated queued row: the catalog item and its stock record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRow {
    pub item: CatalogItem,
    pub stock: InventoryRecord,
}

impl ProductRow {
    /// Parse and validate a queued message body.
    ///
    /// Numbers may be JSON numbers or numeric strings, since rows decoded
    /// from CSV carry every cell as a string.
    pub fn from_body(body: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| AppError::invalid_input(format!("Message body is not valid JSON: {e}")))?;
        let Value::Object(fields) = value else {
            return Err(AppError::invalid_input("Message body must be a JSON object"));
        };
        Self::from_fields(&fields)
    }

    fn from_fields(fields: &Map<String, Value>) -> Result<Self> {
        let missing: Vec<&str> = REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|key| fields.get(*key).is_none_or(Value::is_null))
            .collect();
        if !missing.is_empty() {
            return Err(AppError::invalid_input(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }

        let id = text_field(fields, "id")?;
        let title = text_field(fields, "title")?;
        let description = text_field(fields, "description")?;
        let price = integer_field(fields, "price")?;
        let count = integer_field(fields, "count")?;

        if price == 0 {
            return Err(AppError::invalid_input("price must be a positive integer"));
        }

        Ok(Self {
            stock: InventoryRecord {
                product_id: id.clone(),
                count,
            },
            item: CatalogItem {
                id,
                title,
                description,
                price,
            },
        })
    }
}

fn text_field(fields: &Map<String, Value>, key: &str) -> Result<String> {
    let text = match &fields[key] {
        Value::String(s) => s.clone(),
        // ids exported from spreadsheets often come through as numbers
        Value::Number(n) if key == "id" => n.to_string(),
        other => {
            return Err(AppError::invalid_input(format!(
                "{key} must be a string, got {other}"
            )));
        }
    };
    // Blank is checked on the trimmed text; the stored value is left as sent
    if text.trim().is_empty() {
        return Err(AppError::invalid_input(format!("{key} must not be empty")));
    }
    Ok(text)
}

fn integer_field(fields: &Map<String, Value>, key: &str) -> Result<u64> {
    let parsed = match &fields[key] {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        AppError::invalid_input(format!(
            "{key} must be a non-negative integer, got {}",
            fields[key]
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_numeric_body() {
        let row = ProductRow::from_body(
            r#"{"id":"1","title":"T","description":"D","price":100,"count":5}"#,
        )
        .unwrap();

        assert_eq!(
            row.item,
            CatalogItem {
                id: "1".into(),
                title: "T".into(),
                description: "D".into(),
                price: 100,
            }
        );
        assert_eq!(
            row.stock,
            InventoryRecord {
                product_id: "1".into(),
                count: 5,
            }
        );
    }

    #[test]
    fn test_parse_string_cells_from_csv() {
        let row = ProductRow::from_body(
            r#"{"id":"abc","title":"Lamp","description":"Desk lamp","price":"42","count":"0"}"#,
        )
        .unwrap();
        assert_eq!(row.item.price, 42);
        assert_eq!(row.stock.count, 0);
    }

    #[test]
    fn test_missing_fields_reported_together() {
        let err = ProductRow::from_body(r#"{"id":"1","title":"T","description":"D"}"#).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert_eq!(
            err.to_string(),
            "Invalid input: Missing required fields: price, count"
        );
    }

    #[test]
    fn test_rejects_fractional_and_zero_price() {
        let fractional = ProductRow::from_body(
            r#"{"id":"1","title":"T","description":"D","price":"10.99","count":5}"#,
        );
        assert!(fractional.is_err());

        let zero =
            ProductRow::from_body(r#"{"id":"1","title":"T","description":"D","price":0,"count":5}"#);
        assert!(zero.is_err());
    }

    #[test]
    fn test_rejects_negative_count_and_blank_title() {
        let negative = ProductRow::from_body(
            r#"{"id":"1","title":"T","description":"D","price":3,"count":-1}"#,
        );
        assert!(negative.is_err());

        let blank =
            ProductRow::from_body(r#"{"id":"1","title":"  ","description":"D","price":3,"count":1}"#);
        assert!(blank.is_err());
    }

    #[test]
    fn test_text_is_stored_as_received() {
        let row = ProductRow::from_body(
            r#"{"id":"7","title":"  Padded Title ","description":"Line one\n","price":3,"count":1}"#,
        )
        .unwrap();

        assert_eq!(row.item.title, "  Padded Title ");
        assert_eq!(row.item.description, "Line one\n");
    }

    #[test]
    fn test_rejects_non_object_body() {
        assert!(ProductRow::from_body("[1,2,3]").is_err());
        assert!(ProductRow::from_body("not json").is_err());
    }
}
