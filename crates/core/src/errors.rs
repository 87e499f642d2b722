use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::checkout::{CheckoutId, CheckoutStatus, LineItemId};
use crate::domain::product::ProductId;

/// Which `request_payment` fulfillment precondition is unmet. Callers must be
/// able to prompt for the address and the shipping option separately.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentRequirement {
    DestinationAddress,
    SelectedOption,
}

impl fmt::Display for FulfillmentRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DestinationAddress => write!(f, "destination_address"),
            Self::SelectedOption => write!(f, "selected_option"),
        }
    }
}

/// Expected, typed outcomes of checkout operations. None of these represent a
/// crash condition; every variant carries enough detail for the calling layer
/// to auto-correct or render a clear message.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum CheckoutError {
    #[error("invalid argument `{field}`: {reason}")]
    InvalidArgument { field: String, reason: String },
    #[error("product not found: {product_id}")]
    ProductNotFound { product_id: ProductId },
    #[error("insufficient stock for {product_id}: requested {requested}, available {available}")]
    OutOfStock { product_id: ProductId, requested: u32, available: u32 },
    #[error("line item not found: {line_item_id}")]
    LineItemNotFound { line_item_id: LineItemId },
    #[error("checkout not found: {checkout_id}")]
    CheckoutNotFound { checkout_id: CheckoutId },
    #[error("operation `{operation}` is not valid while checkout is {status:?}")]
    InvalidState { operation: String, status: CheckoutStatus },
    #[error("buyer info incomplete: missing {missing}")]
    MissingBuyerInfo { missing: String },
    #[error("fulfillment incomplete: missing {missing}")]
    MissingFulfillment { missing: FulfillmentRequirement },
    #[error("payment declined: {reason}")]
    PaymentDeclined { reason: String },
    #[error("merchant requires capability {capability} at version {required_version}")]
    UnsupportedVersion { capability: String, required_version: String },
    #[error("capability not negotiated for this session: {capability}")]
    CapabilityNotNegotiated { capability: String },
}

impl CheckoutError {
    pub fn invalid_argument(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument { field: field.into(), reason: reason.into() }
    }

    /// True when retrying the same call without changing anything can never
    /// succeed (the caller must correct its input or session first).
    pub fn is_caller_error(&self) -> bool {
        !matches!(self, Self::PaymentDeclined { .. })
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::checkout::CheckoutStatus;
    use crate::domain::product::ProductId;
    use crate::errors::{CheckoutError, FulfillmentRequirement};

    #[test]
    fn out_of_stock_names_product_and_quantities() {
        let error = CheckoutError::OutOfStock {
            product_id: ProductId("SKU-1".to_owned()),
            requested: 2,
            available: 1,
        };

        assert_eq!(
            error.to_string(),
            "insufficient stock for SKU-1: requested 2, available 1"
        );
    }

    #[test]
    fn missing_fulfillment_distinguishes_address_from_option() {
        let address = CheckoutError::MissingFulfillment {
            missing: FulfillmentRequirement::DestinationAddress,
        };
        let option = CheckoutError::MissingFulfillment {
            missing: FulfillmentRequirement::SelectedOption,
        };

        assert_ne!(address, option);
        assert!(address.to_string().contains("destination_address"));
        assert!(option.to_string().contains("selected_option"));
    }

    #[test]
    fn errors_serialize_with_machine_readable_code() {
        let error = CheckoutError::InvalidState {
            operation: "add_item".to_owned(),
            status: CheckoutStatus::Completed,
        };

        let json = serde_json::to_value(&error).expect("serialize error");
        assert_eq!(json["code"], "invalid_state");
        assert_eq!(json["operation"], "add_item");
    }
}
