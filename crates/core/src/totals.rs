//! Total recalculation.
//!
//! `recalculate` is a pure function from a checkout's line items, fulfillment
//! selection, and applied discounts to the full totals sequence. The store
//! replaces a checkout's totals wholesale with its output on every mutation;
//! nothing ever patches an individual total in place.

use serde::{Deserialize, Serialize};

use crate::domain::buyer::Address;
use crate::domain::checkout::LineItem;
use crate::domain::discount::{AppliedDiscount, DiscountKind};
use crate::domain::fulfillment::FulfillmentSelection;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TotalType {
    Subtotal,
    Discount,
    Tax,
    Shipping,
    Total,
}

/// One monetary line in a checkout's totals sequence. `amount` is in minor
/// currency units; serialization must preserve integers, never floats.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Total {
    #[serde(rename = "type")]
    pub total_type: TotalType,
    pub amount: i64,
    pub display_text: String,
}

impl Total {
    fn new(total_type: TotalType, amount: i64, display_text: impl Into<String>) -> Self {
        Self { total_type, amount, display_text: display_text.into() }
    }
}

/// Tax rate resolution by destination address, in basis points. The default
/// flat rate stands in for a real jurisdiction lookup.
pub trait TaxRateLookup: Send + Sync {
    fn rate_bps(&self, address: &Address) -> u32;
}

#[derive(Clone, Copy, Debug)]
pub struct FlatTaxRate(pub u32);

impl TaxRateLookup for FlatTaxRate {
    fn rate_bps(&self, _address: &Address) -> u32 {
        self.0
    }
}

/// Recompute the totals sequence. Deterministic and side-effect-free.
///
/// Rendering convention: one `discount` entry per applied code, in
/// application order, carrying the deducted amount as a positive number
/// (the `total` entry reflects the subtraction). `tax` is emitted only once
/// a destination address is set, `shipping` only once an option is
/// selected.
pub fn recalculate(
    line_items: &[LineItem],
    fulfillment: &FulfillmentSelection,
    discounts: &[AppliedDiscount],
    tax_rate_bps: u32,
) -> Vec<Total> {
    let subtotal: i64 = line_items
        .iter()
        .map(|line| line.unit_price_snapshot * i64::from(line.quantity))
        .sum();

    let mut totals = vec![Total::new(TotalType::Subtotal, subtotal, "Subtotal")];

    // Discounts apply sequentially to the running subtotal, each clamped so
    // the running amount never goes below zero.
    let mut remaining = subtotal;
    for discount in discounts {
        let amount = match discount.kind {
            DiscountKind::Percentage(pct) => remaining * i64::from(pct) / 100,
            DiscountKind::Fixed(value) => value.min(remaining).max(0),
        };
        remaining -= amount;
        totals.push(Total::new(TotalType::Discount, amount, discount.code.clone()));
    }

    let tax = match &fulfillment.destination_address {
        Some(_) => {
            let tax = remaining * i64::from(tax_rate_bps) / 10_000;
            totals.push(Total::new(TotalType::Tax, tax, "Tax"));
            tax
        }
        None => 0,
    };

    let shipping = match fulfillment.selected_option() {
        Some(option) => {
            totals.push(Total::new(TotalType::Shipping, option.price, option.title.clone()));
            option.price
        }
        None => 0,
    };

    totals.push(Total::new(TotalType::Total, remaining + tax + shipping, "Total"));
    totals
}

/// The grand total of a computed totals sequence.
pub fn grand_total(totals: &[Total]) -> i64 {
    totals
        .iter()
        .find(|total| total.total_type == TotalType::Total)
        .map(|total| total.amount)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use crate::domain::buyer::Address;
    use crate::domain::checkout::{LineItem, LineItemId};
    use crate::domain::discount::{AppliedDiscount, DiscountKind};
    use crate::domain::fulfillment::{
        FulfillmentOption, FulfillmentOptionId, FulfillmentSelection,
    };
    use crate::domain::product::ProductId;
    use crate::totals::{grand_total, recalculate, TotalType};

    fn line(quantity: u32, unit_price: i64) -> LineItem {
        LineItem {
            id: LineItemId("li-1".to_owned()),
            product_id: ProductId("SKU-1".to_owned()),
            title: "Widget".to_owned(),
            quantity,
            unit_price_snapshot: unit_price,
        }
    }

    fn destination() -> Address {
        Address {
            street_address: "500 Market St".to_owned(),
            locality: "San Francisco".to_owned(),
            region: Some("CA".to_owned()),
            postal_code: "94105".to_owned(),
            country: "US".to_owned(),
        }
    }

    fn shipping_selection(price: i64) -> FulfillmentSelection {
        let mut selection = FulfillmentSelection::with_options(vec![FulfillmentOption {
            id: FulfillmentOptionId("standard".to_owned()),
            title: "Standard Shipping".to_owned(),
            price,
            eta_description: "3-5 business days".to_owned(),
        }]);
        selection.destination_address = Some(destination());
        selection.selected_option_id = Some(FulfillmentOptionId("standard".to_owned()));
        selection
    }

    #[test]
    fn subtotal_tax_and_shipping_compose_into_grand_total() {
        // 499 x 2 = 998, tax floor(998 * 10%) = 99, shipping 500.
        let totals = recalculate(&[line(2, 499)], &shipping_selection(500), &[], 1_000);

        let amounts: Vec<(TotalType, i64)> =
            totals.iter().map(|t| (t.total_type, t.amount)).collect();
        assert_eq!(
            amounts,
            vec![
                (TotalType::Subtotal, 998),
                (TotalType::Tax, 99),
                (TotalType::Shipping, 500),
                (TotalType::Total, 1_597),
            ]
        );
    }

    #[test]
    fn percentage_discount_applies_before_tax() {
        // Discount floor(998 * 10%) = 99, tax floor(899 * 10%) = 89.
        let discounts = vec![AppliedDiscount {
            code: "WELCOME10".to_owned(),
            kind: DiscountKind::Percentage(10),
        }];
        let totals = recalculate(&[line(2, 499)], &shipping_selection(500), &discounts, 1_000);

        let discount = totals.iter().find(|t| t.total_type == TotalType::Discount).unwrap();
        assert_eq!(discount.amount, 99);
        assert_eq!(discount.display_text, "WELCOME10");

        let tax = totals.iter().find(|t| t.total_type == TotalType::Tax).unwrap();
        assert_eq!(tax.amount, 89);
        assert_eq!(grand_total(&totals), 1_488);
    }

    #[test]
    fn fixed_discounts_clamp_at_zero() {
        let discounts = vec![
            AppliedDiscount { code: "BIG".to_owned(), kind: DiscountKind::Fixed(900) },
            AppliedDiscount { code: "BIGGER".to_owned(), kind: DiscountKind::Fixed(900) },
        ];
        let totals =
            recalculate(&[line(1, 1_000)], &FulfillmentSelection::default(), &discounts, 1_000);

        let applied: Vec<i64> = totals
            .iter()
            .filter(|t| t.total_type == TotalType::Discount)
            .map(|t| t.amount)
            .collect();
        // Second fixed discount is clamped to the 100 still remaining.
        assert_eq!(applied, vec![900, 100]);
        assert_eq!(grand_total(&totals), 0);
    }

    #[test]
    fn discounts_render_one_entry_per_code_in_application_order() {
        let discounts = vec![
            AppliedDiscount { code: "WELCOME10".to_owned(), kind: DiscountKind::Percentage(10) },
            AppliedDiscount { code: "SAVE5".to_owned(), kind: DiscountKind::Fixed(500) },
        ];
        let totals =
            recalculate(&[line(2, 499)], &FulfillmentSelection::default(), &discounts, 1_000);

        let codes: Vec<&str> = totals
            .iter()
            .filter(|t| t.total_type == TotalType::Discount)
            .map(|t| t.display_text.as_str())
            .collect();
        assert_eq!(codes, vec!["WELCOME10", "SAVE5"]);
    }

    #[test]
    fn tax_is_zero_without_destination_address() {
        let mut selection = shipping_selection(500);
        selection.destination_address = None;

        let totals = recalculate(&[line(2, 499)], &selection, &[], 1_000);
        assert!(totals.iter().all(|t| t.total_type != TotalType::Tax));
        assert_eq!(grand_total(&totals), 1_498);
    }

    #[test]
    fn identical_inputs_yield_identical_totals() {
        let discounts = vec![AppliedDiscount {
            code: "WELCOME10".to_owned(),
            kind: DiscountKind::Percentage(10),
        }];
        let first = recalculate(&[line(3, 731)], &shipping_selection(250), &discounts, 825);
        let second = recalculate(&[line(3, 731)], &shipping_selection(250), &discounts, 825);

        assert_eq!(first, second);
    }

    #[test]
    fn empty_cart_produces_zero_subtotal_and_total() {
        let totals = recalculate(&[], &FulfillmentSelection::default(), &[], 1_000);
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].amount, 0);
        assert_eq!(grand_total(&totals), 0);
    }
}
