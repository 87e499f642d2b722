use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::CheckoutError;

/// Protocol version stamped on every capability this registry ships with.
pub const UCP_VERSION: &str = "2026-01-11";

/// A named, versioned commerce feature unit. Identity is `(name, version)`;
/// a capability is immutable once registered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
}

impl Capability {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self { name: name.into(), version: version.into(), extends: None }
    }

    pub fn extending(
        name: impl Into<String>,
        version: impl Into<String>,
        extends: impl Into<String>,
    ) -> Self {
        Self { name: name.into(), version: version.into(), extends: Some(extends.into()) }
    }
}

/// Static catalog of capabilities a merchant can declare. An explicit object
/// with its own lifetime, not process-wide state.
#[derive(Clone, Debug, Default)]
pub struct CapabilityRegistry {
    capabilities: BTreeMap<(String, String), Capability>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded with the UCP shopping capability set: the core
    /// checkout/order pair plus the extensions layered on them.
    pub fn ucp_shopping() -> Self {
        let mut registry = Self::new();
        let capabilities = [
            Capability::new("dev.ucp.shopping.checkout", UCP_VERSION),
            Capability::new("dev.ucp.shopping.order", UCP_VERSION),
            Capability::extending(
                "dev.ucp.shopping.fulfillment",
                UCP_VERSION,
                "dev.ucp.shopping.checkout",
            ),
            Capability::extending(
                "dev.ucp.shopping.discount",
                UCP_VERSION,
                "dev.ucp.shopping.checkout",
            ),
            Capability::extending(
                "dev.ucp.shopping.buyer_consent",
                UCP_VERSION,
                "dev.ucp.shopping.checkout",
            ),
            Capability::extending(
                "dev.ucp.shopping.wishlist",
                UCP_VERSION,
                "dev.ucp.shopping.checkout",
            ),
            Capability::extending(
                "dev.ucp.shopping.loyalty",
                UCP_VERSION,
                "dev.ucp.shopping.checkout",
            ),
            Capability::extending(
                "dev.ucp.shopping.gift_cards",
                UCP_VERSION,
                "dev.ucp.shopping.checkout",
            ),
            Capability::extending(
                "dev.ucp.shopping.subscriptions",
                UCP_VERSION,
                "dev.ucp.shopping.order",
            ),
            Capability::extending(
                "dev.ucp.shopping.returns",
                UCP_VERSION,
                "dev.ucp.shopping.order",
            ),
        ];
        for capability in capabilities {
            registry.register(capability).expect("seed registry without duplicates");
        }
        registry
    }

    pub fn register(&mut self, capability: Capability) -> Result<(), CheckoutError> {
        let key = (capability.name.clone(), capability.version.clone());
        if self.capabilities.contains_key(&key) {
            return Err(CheckoutError::invalid_argument(
                "capability",
                format!("{} {} is already registered", key.0, key.1),
            ));
        }
        self.capabilities.insert(key, capability);
        Ok(())
    }

    pub fn find(&self, name: &str, version: &str) -> Option<&Capability> {
        self.capabilities.get(&(name.to_owned(), version.to_owned()))
    }

    pub fn versions_of(&self, name: &str) -> Vec<&Capability> {
        self.capabilities.values().filter(|capability| capability.name == name).collect()
    }

    pub fn all(&self) -> impl Iterator<Item = &Capability> {
        self.capabilities.values()
    }

    /// Capabilities that extend the given base capability.
    pub fn extensions_of(&self, base: &str) -> Vec<&Capability> {
        self.capabilities
            .values()
            .filter(|capability| capability.extends.as_deref() == Some(base))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::capability::registry::{Capability, CapabilityRegistry, UCP_VERSION};

    #[test]
    fn seeded_registry_contains_core_checkout_capability() {
        let registry = CapabilityRegistry::ucp_shopping();
        assert!(registry.find("dev.ucp.shopping.checkout", UCP_VERSION).is_some());
        assert!(registry.find("dev.ucp.shopping.checkout", "1999-01-01").is_none());
    }

    #[test]
    fn registered_capabilities_are_immutable() {
        let mut registry = CapabilityRegistry::new();
        registry.register(Capability::new("dev.ucp.shopping.checkout", "1")).unwrap();

        let error = registry
            .register(Capability::extending("dev.ucp.shopping.checkout", "1", "other"))
            .expect_err("duplicate identity must be rejected");
        assert!(error.to_string().contains("already registered"));

        // Same name at a different version is a distinct identity.
        registry.register(Capability::new("dev.ucp.shopping.checkout", "2")).unwrap();
        assert_eq!(registry.versions_of("dev.ucp.shopping.checkout").len(), 2);
    }

    #[test]
    fn extensions_resolve_to_their_base() {
        let registry = CapabilityRegistry::ucp_shopping();
        let extensions = registry.extensions_of("dev.ucp.shopping.order");
        let names: Vec<&str> = extensions.iter().map(|c| c.name.as_str()).collect();

        assert!(names.contains(&"dev.ucp.shopping.subscriptions"));
        assert!(names.contains(&"dev.ucp.shopping.returns"));
    }
}
