//! MCP tool catalog.
//!
//! The tools fall into four categories:
//! - Session: capability negotiation and session lifecycle
//! - Catalog: product lookup
//! - Cart: line item management
//! - Checkout: buyer details, fulfillment, discounts, payment, completion

/// Session tools category
pub struct SessionTools;

/// Catalog tools category
pub struct CatalogTools;

/// Cart tools category
pub struct CartTools;

/// Checkout tools category
pub struct CheckoutTools;

/// Tool category trait
pub trait ToolCategory {
    /// Category name
    fn category_name() -> &'static str
    where
        Self: Sized;
    /// List of tool names in this category
    fn tool_names() -> &'static [&'static str]
    where
        Self: Sized;
}

impl ToolCategory for SessionTools {
    fn category_name() -> &'static str {
        "session"
    }
    fn tool_names() -> &'static [&'static str] {
        &["session_start"]
    }
}

impl ToolCategory for CatalogTools {
    fn category_name() -> &'static str {
        "catalog"
    }
    fn tool_names() -> &'static [&'static str] {
        &["product_get"]
    }
}

impl ToolCategory for CartTools {
    fn category_name() -> &'static str {
        "cart"
    }
    fn tool_names() -> &'static [&'static str] {
        &["cart_add_item", "cart_update_item", "cart_remove_item"]
    }
}

impl ToolCategory for CheckoutTools {
    fn category_name() -> &'static str {
        "checkout"
    }
    fn tool_names() -> &'static [&'static str] {
        &[
            "checkout_set_buyer",
            "checkout_set_fulfillment",
            "checkout_apply_discount",
            "checkout_request_payment",
            "checkout_complete",
            "checkout_cancel",
            "checkout_get",
            "order_get",
        ]
    }
}

/// All tool names
pub const ALL_TOOL_NAMES: &[&str] = &[
    "session_start",
    "product_get",
    "cart_add_item",
    "cart_update_item",
    "cart_remove_item",
    "checkout_set_buyer",
    "checkout_set_fulfillment",
    "checkout_apply_discount",
    "checkout_request_payment",
    "checkout_complete",
    "checkout_cancel",
    "checkout_get",
    "order_get",
];

/// Total number of tools
pub const TOTAL_TOOLS: usize = ALL_TOOL_NAMES.len();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_cover_every_tool_exactly_once() {
        let mut from_categories: Vec<&str> = Vec::new();
        from_categories.extend(SessionTools::tool_names());
        from_categories.extend(CatalogTools::tool_names());
        from_categories.extend(CartTools::tool_names());
        from_categories.extend(CheckoutTools::tool_names());

        assert_eq!(from_categories.len(), TOTAL_TOOLS);
        for name in ALL_TOOL_NAMES {
            assert!(from_categories.contains(name), "{name} missing from categories");
        }
    }
}
