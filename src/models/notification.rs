//! Product notifications and price-based subscriber routing.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::models::CatalogItem;

/// Name of the numeric message attribute subscribers filter on.
pub const PRICE_ATTRIBUTE: &str = "price";

/// A notification published for every newly created product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub subject: String,
    pub message: String,
    /// Routing attribute
    pub price: u64,
}

impl Notification {
    pub fn product_created(subject: &str, item: &CatalogItem) -> Self {
        Self {
            subject: subject.to_string(),
            message: format!(
                "New product \"{}\" created with price {}",
                item.title, item.price
            ),
            price: item.price,
        }
    }
}

/// Subscriber classes of the notification topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceClass {
    All,
    Expensive,
    Cheap,
}

impl PriceClass {
    pub const ALL_CLASSES: [PriceClass; 3] =
        [PriceClass::All, PriceClass::Expensive, PriceClass::Cheap];

    /// Whether a subscriber of this class receives a notification with the
    /// given price. `Expensive` is inclusive of the threshold.
    pub fn accepts(self, price: u64, threshold: u64) -> bool {
        match self {
            PriceClass::All => true,
            PriceClass::Expensive => price >= threshold,
            PriceClass::Cheap => price < threshold,
        }
    }

    /// Subscription filter policy for the topic; `None` for unfiltered.
    pub fn filter_policy(self, threshold: u64) -> Option<Value> {
        let op = match self {
            PriceClass::All => return None,
            PriceClass::Expensive => ">=",
            PriceClass::Cheap => "<",
        };
        Some(json!({ PRICE_ATTRIBUTE: [{ "numeric": [op, threshold] }] }))
    }
}

impl fmt::Display for PriceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PriceClass::All => "all",
            PriceClass::Expensive => "expensive",
            PriceClass::Cheap => "cheap",
        };
        f.write_str(name)
    }
}
