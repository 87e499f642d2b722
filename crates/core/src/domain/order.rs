use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::checkout::{CheckoutId, LineItem};
use crate::totals::Total;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Confirmed,
}

/// Append-only record created when a checkout completes. Never mutated after
/// creation; the line items and totals are frozen copies of the checkout at
/// completion time.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub checkout_id: CheckoutId,
    pub status: OrderStatus,
    pub currency: String,
    pub line_items: Vec<LineItem>,
    pub totals: Vec<Total>,
    pub permalink: String,
    pub created_at: DateTime<Utc>,
}
