//! DynamoDB catalog store.
//!
//! Products and stock live in two tables. A row is written with a single
//! `TransactWriteItems` call holding two conditional puts, so both records
//! appear together or not at all, and an existing id is never overwritten.
//! The product item also carries a `notified` flag, set once its creation
//! notification has been published.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::error::{DisplayErrorContext, SdkError};
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
use aws_sdk_dynamodb::types::{AttributeValue, Put, TransactWriteItem};

use crate::error::{AppError, Result};
use crate::models::{CatalogConfig, CatalogItem, InventoryRecord};
use crate::storage::{CatalogStore, WriteOutcome};

const ATTR_ID: &str = "id";
const ATTR_TITLE: &str = "title";
const ATTR_DESCRIPTION: &str = "description";
const ATTR_PRICE: &str = "price";
const ATTR_PRODUCT_ID: &str = "product_id";
const ATTR_COUNT: &str = "count";
const ATTR_NOTIFIED: &str = "notified";

const CONDITION_FAILED: &str = "ConditionalCheckFailed";

/// Catalog store over the products and stocks tables.
#[derive(Debug, Clone)]
pub struct DynamoCatalog {
    client: Client,
    products_table: String,
    stocks_table: String,
}

impl DynamoCatalog {
    pub fn new(
        client: Client,
        products_table: impl Into<String>,
        stocks_table: impl Into<String>,
    ) -> Self {
        Self {
            client,
            products_table: products_table.into(),
            stocks_table: stocks_table.into(),
        }
    }

    pub fn from_conf(config: &aws_config::SdkConfig, catalog: &CatalogConfig) -> Self {
        Self::new(
            Client::new(config),
            &catalog.products_table,
            &catalog.stocks_table,
        )
    }

    fn product_put(&self, item: &CatalogItem) -> Result<Put> {
        Put::builder()
            .table_name(&self.products_table)
            .item(ATTR_ID, AttributeValue::S(item.id.clone()))
            .item(ATTR_TITLE, AttributeValue::S(item.title.clone()))
            .item(ATTR_DESCRIPTION, AttributeValue::S(item.description.clone()))
            .item(ATTR_PRICE, AttributeValue::N(item.price.to_string()))
            .condition_expression("attribute_not_exists(#pk)")
            .expression_attribute_names("#pk", ATTR_ID)
            .build()
            .map_err(|e| AppError::datastore(format!("Invalid product put: {e}")))
    }

    fn stock_put(&self, stock: &InventoryRecord) -> Result<Put> {
        Put::builder()
            .table_name(&self.stocks_table)
            .item(ATTR_PRODUCT_ID, AttributeValue::S(stock.product_id.clone()))
            .item(ATTR_COUNT, AttributeValue::N(stock.count.to_string()))
            .condition_expression("attribute_not_exists(#pk)")
            .expression_attribute_names("#pk", ATTR_PRODUCT_ID)
            .build()
            .map_err(|e| AppError::datastore(format!("Invalid stock put: {e}")))
    }

    /// Check if a transaction was cancelled by one of its conditions.
    fn is_condition_cancellation(err: &SdkError<TransactWriteItemsError>) -> bool {
        match err {
            SdkError::ServiceError(service_err) => match service_err.err() {
                TransactWriteItemsError::TransactionCanceledException(cancelled) => {
                    has_condition_failure(
                        cancelled
                            .cancellation_reasons()
                            .iter()
                            .map(|reason| reason.code()),
                    )
                }
                _ => false,
            },
            _ => false,
        }
    }
}

/// Whether a product item carries a set notified flag.
fn notified_flag(item: Option<&HashMap<String, AttributeValue>>) -> bool {
    item.and_then(|item| item.get(ATTR_NOTIFIED))
        .and_then(|value| value.as_bool().ok())
        .copied()
        .unwrap_or(false)
}

/// Whether any cancellation reason code is a failed condition check.
fn has_condition_failure<'a>(codes: impl IntoIterator<Item = Option<&'a str>>) -> bool {
    codes.into_iter().any(|code| code == Some(CONDITION_FAILED))
}

#[async_trait]
impl CatalogStore for DynamoCatalog {
    async fn create_product(
        &self,
        item: &CatalogItem,
        stock: &InventoryRecord,
    ) -> Result<WriteOutcome> {
        let result = self
            .client
            .transact_write_items()
            .transact_items(TransactWriteItem::builder().put(self.product_put(item)?).build())
            .transact_items(TransactWriteItem::builder().put(self.stock_put(stock)?).build())
            .send()
            .await;

        match result {
            Ok(_) => Ok(WriteOutcome::Created),
            Err(e) if Self::is_condition_cancellation(&e) => Ok(WriteOutcome::AlreadyExists),
            Err(e) => Err(AppError::datastore(format!(
                "TransactWriteItems for product {} failed: {}",
                item.id,
                DisplayErrorContext(&e)
            ))),
        }
    }

    async fn is_notified(&self, product_id: &str) -> Result<bool> {
        let output = self
            .client
            .get_item()
            .table_name(&self.products_table)
            .key(ATTR_ID, AttributeValue::S(product_id.to_string()))
            .consistent_read(true)
            .projection_expression("#n")
            .expression_attribute_names("#n", ATTR_NOTIFIED)
            .send()
            .await
            .map_err(|e| {
                AppError::datastore(format!(
                    "GetItem for product {} failed: {}",
                    product_id,
                    DisplayErrorContext(&e)
                ))
            })?;

        Ok(notified_flag(output.item()))
    }

    async fn mark_notified(&self, product_id: &str) -> Result<()> {
        self.client
            .update_item()
            .table_name(&self.products_table)
            .key(ATTR_ID, AttributeValue::S(product_id.to_string()))
            .update_expression("SET #n = :t")
            .condition_expression("attribute_exists(#pk)")
            .expression_attribute_names("#n", ATTR_NOTIFIED)
            .expression_attribute_names("#pk", ATTR_ID)
            .expression_attribute_values(":t", AttributeValue::Bool(true))
            .send()
            .await
            .map_err(|e| {
                AppError::datastore(format!(
                    "UpdateItem for product {} failed: {}",
                    product_id,
                    DisplayErrorContext(&e)
                ))
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_failure_detected_in_any_position() {
        assert!(has_condition_failure([Some("None"), Some(CONDITION_FAILED)]));
        assert!(has_condition_failure([Some(CONDITION_FAILED), Some("None")]));
    }

    #[test]
    fn test_other_cancellations_are_faults() {
        assert!(!has_condition_failure([Some("None"), Some("ThrottlingError")]));
        assert!(!has_condition_failure([None, None]));
        assert!(!has_condition_failure(Vec::<Option<&str>>::new()));
    }

    #[test]
    fn test_notified_flag() {
        let mut item = HashMap::new();
        item.insert(ATTR_ID.to_string(), AttributeValue::S("1".into()));
        assert!(!notified_flag(None));
        assert!(!notified_flag(Some(&item)));

        item.insert(ATTR_NOTIFIED.to_string(), AttributeValue::Bool(true));
        assert!(notified_flag(Some(&item)));
    }
}
