use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::buyer::Address;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FulfillmentOptionId(pub String);

impl fmt::Display for FulfillmentOptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A priced delivery or pickup method the buyer can select. `price` is in
/// minor currency units.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillmentOption {
    pub id: FulfillmentOptionId,
    pub title: String,
    pub price: i64,
    pub eta_description: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillmentSelection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_address: Option<Address>,
    pub available_options: Vec<FulfillmentOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_option_id: Option<FulfillmentOptionId>,
}

impl FulfillmentSelection {
    pub fn with_options(options: Vec<FulfillmentOption>) -> Self {
        Self { destination_address: None, available_options: options, selected_option_id: None }
    }

    pub fn selected_option(&self) -> Option<&FulfillmentOption> {
        let selected = self.selected_option_id.as_ref()?;
        self.available_options.iter().find(|option| &option.id == selected)
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::fulfillment::{
        FulfillmentOption, FulfillmentOptionId, FulfillmentSelection,
    };

    #[test]
    fn selected_option_resolves_against_available_options() {
        let mut selection = FulfillmentSelection::with_options(vec![FulfillmentOption {
            id: FulfillmentOptionId("standard".to_owned()),
            title: "Standard Shipping".to_owned(),
            price: 500,
            eta_description: "3-5 business days".to_owned(),
        }]);

        assert!(selection.selected_option().is_none());

        selection.selected_option_id = Some(FulfillmentOptionId("standard".to_owned()));
        assert_eq!(selection.selected_option().map(|o| o.price), Some(500));

        selection.selected_option_id = Some(FulfillmentOptionId("unknown".to_owned()));
        assert!(selection.selected_option().is_none());
    }
}
