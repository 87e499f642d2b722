use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::capability::NegotiatedProfile;
use crate::domain::buyer::BuyerInfo;
use crate::domain::discount::AppliedDiscount;
use crate::domain::fulfillment::FulfillmentSelection;
use crate::domain::order::OrderId;
use crate::domain::payment::PaymentSelection;
use crate::domain::product::ProductId;
use crate::errors::CheckoutError;
use crate::totals::Total;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CheckoutId(pub String);

impl fmt::Display for CheckoutId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineItemId(pub String);

impl fmt::Display for LineItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStatus {
    Incomplete,
    ReadyForComplete,
    Completed,
    Canceled,
}

impl CheckoutStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Canceled)
    }
}

/// One cart line. `unit_price_snapshot` is copied from the product at add
/// time so later catalog price changes do not retroactively alter an open
/// cart.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: LineItemId,
    pub product_id: ProductId,
    pub title: String,
    pub quantity: u32,
    pub unit_price_snapshot: i64,
}

/// Pointer from a completed checkout to its order record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRef {
    pub id: OrderId,
    pub permalink: String,
}

/// The aggregate root: a cart in progress plus its computed totals and
/// fulfillment/payment state, owned by exactly one session.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Checkout {
    pub id: CheckoutId,
    pub status: CheckoutStatus,
    pub currency: String,
    pub line_items: Vec<LineItem>,
    pub buyer: BuyerInfo,
    pub fulfillment: FulfillmentSelection,
    pub discounts: Vec<AppliedDiscount>,
    pub totals: Vec<Total>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentSelection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderRef>,
    pub negotiated_profile: Arc<NegotiatedProfile>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Checkout {
    /// Guard for cart-mutating operations. Checked before any per-operation
    /// validation so a failed call leaves the checkout untouched.
    pub fn ensure_cart_mutable(&self, operation: &str) -> Result<(), CheckoutError> {
        if self.status.is_terminal() {
            return Err(CheckoutError::InvalidState {
                operation: operation.to_owned(),
                status: self.status,
            });
        }
        Ok(())
    }

    /// A cart edit on a `ready_for_complete` checkout implicitly reopens it:
    /// the edit invalidates the payment-ready snapshot.
    pub fn reopen_if_ready(&mut self) {
        if self.status == CheckoutStatus::ReadyForComplete {
            self.status = CheckoutStatus::Incomplete;
        }
    }

    /// Units of `product_id` already reserved by this checkout's line items.
    pub fn reserved_quantity(&self, product_id: &ProductId) -> u32 {
        self.line_items
            .iter()
            .filter(|line| &line.product_id == product_id)
            .map(|line| line.quantity)
            .sum()
    }

    pub fn line_item(&self, line_item_id: &LineItemId) -> Option<&LineItem> {
        self.line_items.iter().find(|line| &line.id == line_item_id)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use crate::domain::buyer::BuyerInfo;
    use crate::domain::checkout::{
        Checkout, CheckoutId, CheckoutStatus, LineItem, LineItemId,
    };
    use crate::domain::fulfillment::FulfillmentSelection;
    use crate::domain::product::ProductId;
    use crate::errors::CheckoutError;

    fn checkout(status: CheckoutStatus) -> Checkout {
        Checkout {
            id: CheckoutId("chk-1".to_owned()),
            status,
            currency: "USD".to_owned(),
            line_items: vec![
                LineItem {
                    id: LineItemId("li-1".to_owned()),
                    product_id: ProductId("SKU-1".to_owned()),
                    title: "Widget".to_owned(),
                    quantity: 2,
                    unit_price_snapshot: 499,
                },
                LineItem {
                    id: LineItemId("li-2".to_owned()),
                    product_id: ProductId("SKU-1".to_owned()),
                    title: "Widget".to_owned(),
                    quantity: 1,
                    unit_price_snapshot: 499,
                },
            ],
            buyer: BuyerInfo::default(),
            fulfillment: FulfillmentSelection::default(),
            discounts: Vec::new(),
            totals: Vec::new(),
            payment: None,
            order: None,
            negotiated_profile: Arc::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn cart_mutation_reopens_ready_for_complete() {
        let mut checkout = checkout(CheckoutStatus::ReadyForComplete);
        checkout.ensure_cart_mutable("update_item").expect("mutable");
        checkout.reopen_if_ready();
        assert_eq!(checkout.status, CheckoutStatus::Incomplete);
    }

    #[test]
    fn cart_mutation_is_rejected_on_terminal_checkouts() {
        for status in [CheckoutStatus::Completed, CheckoutStatus::Canceled] {
            let checkout = checkout(status);
            let error = checkout.ensure_cart_mutable("add_item").expect_err("terminal");
            assert!(matches!(error, CheckoutError::InvalidState { .. }));
            assert_eq!(checkout.status, status);
        }
    }

    #[test]
    fn reserved_quantity_sums_across_lines_for_the_same_product() {
        let checkout = checkout(CheckoutStatus::Incomplete);
        assert_eq!(checkout.reserved_quantity(&ProductId("SKU-1".to_owned())), 3);
        assert_eq!(checkout.reserved_quantity(&ProductId("SKU-2".to_owned())), 0);
    }
}
