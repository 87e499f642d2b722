use serde::{Deserialize, Serialize};

/// How a discount reduces the running subtotal. Percentage values are whole
/// percent (10 = 10% off); fixed values are minor currency units.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum DiscountKind {
    Percentage(u32),
    Fixed(i64),
}

/// Merchant-configured discount code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountDefinition {
    pub code: String,
    #[serde(flatten)]
    pub kind: DiscountKind,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// A discount recorded on a checkout. The kind is snapshotted at apply time
/// so later config edits do not alter an open cart, mirroring how line items
/// snapshot their unit price.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedDiscount {
    pub code: String,
    #[serde(flatten)]
    pub kind: DiscountKind,
}

#[cfg(test)]
mod tests {
    use crate::domain::discount::{DiscountDefinition, DiscountKind};

    #[test]
    fn definitions_parse_from_flattened_toml() {
        let definition: DiscountDefinition = toml::from_str(
            r#"
            code = "WELCOME10"
            type = "percentage"
            value = 10
            "#,
        )
        .expect("parse discount definition");

        assert_eq!(definition.code, "WELCOME10");
        assert_eq!(definition.kind, DiscountKind::Percentage(10));
        assert!(definition.active);
    }
}
