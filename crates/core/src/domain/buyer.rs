use serde::{Deserialize, Serialize};

use crate::errors::CheckoutError;

/// Destination or billing address. Region is optional; everything else must
/// be non-empty before the engine accepts the address.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street_address: String,
    pub locality: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub postal_code: String,
    pub country: String,
}

impl Address {
    pub fn validate(&self) -> Result<(), CheckoutError> {
        for (field, value) in [
            ("street_address", &self.street_address),
            ("locality", &self.locality),
            ("postal_code", &self.postal_code),
            ("country", &self.country),
        ] {
            if value.trim().is_empty() {
                return Err(CheckoutError::invalid_argument(field, "must not be empty"));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyerInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
}
