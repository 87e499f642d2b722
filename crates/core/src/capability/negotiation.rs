//! Profile negotiation.
//!
//! A session's capability set is resolved exactly once, at session start, by
//! intersecting the client-declared and merchant-declared profiles. The
//! result is immutable for the session's lifetime; renegotiation means a new
//! session.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::payment::PaymentHandler;
use crate::errors::CheckoutError;

/// A `(name, version)` pair a client declares support for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityClaim {
    pub name: String,
    pub version: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientProfile {
    pub capabilities: Vec<CapabilityClaim>,
}

impl ClientProfile {
    pub fn supports(&self, name: &str, version: &str) -> bool {
        self.capabilities.iter().any(|claim| claim.name == name && claim.version == version)
    }
}

/// One capability in a merchant's declared profile. `required` capabilities
/// must be matched by the client or negotiation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchantCapability {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchantProfile {
    pub capabilities: Vec<MerchantCapability>,
    pub payment_handlers: Vec<PaymentHandler>,
}

/// The agreed capability set for one session, plus both raw declared
/// profiles for audit. Shared read-only across all of the session's
/// operations; safe without locking.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiatedProfile {
    pub capabilities: BTreeMap<String, String>,
    pub payment_handlers: Vec<PaymentHandler>,
    pub client_declared: ClientProfile,
    pub merchant_declared: MerchantProfile,
}

impl NegotiatedProfile {
    pub fn supports(&self, name: &str) -> bool {
        self.capabilities.contains_key(name)
    }

    pub fn version_of(&self, name: &str) -> Option<&str> {
        self.capabilities.get(name).map(String::as_str)
    }

    /// Gate an operation on a negotiated capability. A capability absent from
    /// the agreed set is inactive for the whole session, independent of what
    /// the merchant nominally supports.
    pub fn require(&self, name: &str) -> Result<(), CheckoutError> {
        if self.supports(name) {
            Ok(())
        } else {
            Err(CheckoutError::CapabilityNotNegotiated { capability: name.to_owned() })
        }
    }
}

/// Intersect the two profiles by exact `(name, version)` match.
pub fn negotiate(
    client: &ClientProfile,
    merchant: &MerchantProfile,
) -> Result<NegotiatedProfile, CheckoutError> {
    let mut capabilities = BTreeMap::new();
    for offered in &merchant.capabilities {
        if client.supports(&offered.name, &offered.version) {
            capabilities.insert(offered.name.clone(), offered.version.clone());
        } else if offered.required {
            return Err(CheckoutError::UnsupportedVersion {
                capability: offered.name.clone(),
                required_version: offered.version.clone(),
            });
        }
    }

    Ok(NegotiatedProfile {
        capabilities,
        payment_handlers: merchant.payment_handlers.clone(),
        client_declared: client.clone(),
        merchant_declared: merchant.clone(),
    })
}

/// `negotiate`, recording the outcome on the audit stream.
pub fn negotiate_audited(
    client: &ClientProfile,
    merchant: &MerchantProfile,
    audit: &dyn AuditSink,
) -> Result<NegotiatedProfile, CheckoutError> {
    match negotiate(client, merchant) {
        Ok(profile) => {
            audit.emit(
                AuditEvent::new(
                    None,
                    "negotiation.agreed",
                    AuditCategory::Negotiation,
                    AuditOutcome::Success,
                )
                .with_metadata("capability_count", profile.capabilities.len().to_string()),
            );
            Ok(profile)
        }
        Err(error) => {
            audit.emit(
                AuditEvent::new(
                    None,
                    "negotiation.rejected",
                    AuditCategory::Negotiation,
                    AuditOutcome::Rejected,
                )
                .with_metadata("reason", error.to_string()),
            );
            Err(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::capability::negotiation::{
        negotiate, CapabilityClaim, ClientProfile, MerchantCapability, MerchantProfile,
    };
    use crate::errors::CheckoutError;

    fn merchant() -> MerchantProfile {
        MerchantProfile {
            capabilities: vec![
                MerchantCapability {
                    name: "dev.ucp.shopping.checkout".to_owned(),
                    version: "2026-01-11".to_owned(),
                    required: true,
                    extends: None,
                },
                MerchantCapability {
                    name: "dev.ucp.shopping.discount".to_owned(),
                    version: "2026-01-11".to_owned(),
                    required: false,
                    extends: Some("dev.ucp.shopping.checkout".to_owned()),
                },
            ],
            payment_handlers: Vec::new(),
        }
    }

    fn client(capabilities: &[(&str, &str)]) -> ClientProfile {
        ClientProfile {
            capabilities: capabilities
                .iter()
                .map(|(name, version)| CapabilityClaim {
                    name: (*name).to_owned(),
                    version: (*version).to_owned(),
                })
                .collect(),
        }
    }

    #[test]
    fn negotiated_set_is_a_subset_of_both_profiles() {
        let client = client(&[
            ("dev.ucp.shopping.checkout", "2026-01-11"),
            ("dev.ucp.shopping.discount", "2026-01-11"),
            ("dev.ucp.shopping.loyalty", "2026-01-11"),
        ]);
        let merchant = merchant();

        let profile = negotiate(&client, &merchant).expect("negotiation succeeds");

        for (name, version) in &profile.capabilities {
            assert!(client.supports(name, version));
            assert!(merchant
                .capabilities
                .iter()
                .any(|cap| &cap.name == name && &cap.version == version));
        }
        // Loyalty was client-only; it must not appear in the agreed set.
        assert!(!profile.supports("dev.ucp.shopping.loyalty"));
    }

    #[test]
    fn missing_required_capability_fails_with_named_version() {
        let error = negotiate(&client(&[("dev.ucp.shopping.checkout", "2020-01-01")]), &merchant())
            .expect_err("version mismatch on required capability");

        assert_eq!(
            error,
            CheckoutError::UnsupportedVersion {
                capability: "dev.ucp.shopping.checkout".to_owned(),
                required_version: "2026-01-11".to_owned(),
            }
        );
    }

    #[test]
    fn optional_capability_version_mismatch_is_dropped_not_fatal() {
        let client = client(&[
            ("dev.ucp.shopping.checkout", "2026-01-11"),
            ("dev.ucp.shopping.discount", "2020-01-01"),
        ]);

        let profile = negotiate(&client, &merchant()).expect("optional mismatch tolerated");
        assert!(profile.supports("dev.ucp.shopping.checkout"));
        assert!(!profile.supports("dev.ucp.shopping.discount"));
    }

    #[test]
    fn empty_client_profile_yields_empty_set_when_nothing_required() {
        let mut merchant = merchant();
        for capability in &mut merchant.capabilities {
            capability.required = false;
        }

        let profile = negotiate(&ClientProfile::default(), &merchant).expect("no crash");
        assert!(profile.capabilities.is_empty());
        assert_eq!(profile.merchant_declared, merchant);
    }

    #[test]
    fn negotiation_outcomes_are_audited() {
        use crate::audit::{AuditCategory, AuditOutcome, InMemoryAuditSink};
        use crate::capability::negotiation::negotiate_audited;

        let sink = InMemoryAuditSink::default();
        negotiate_audited(
            &client(&[("dev.ucp.shopping.checkout", "2026-01-11")]),
            &merchant(),
            &sink,
        )
        .expect("negotiation succeeds");
        negotiate_audited(&ClientProfile::default(), &merchant(), &sink)
            .expect_err("required capability unmatched");

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|event| event.category == AuditCategory::Negotiation));
        assert_eq!(events[0].outcome, AuditOutcome::Success);
        assert_eq!(events[1].outcome, AuditOutcome::Rejected);
    }

    #[test]
    fn ungated_capability_check_returns_typed_error() {
        let profile = negotiate(
            &client(&[("dev.ucp.shopping.checkout", "2026-01-11")]),
            &merchant(),
        )
        .expect("negotiation succeeds");

        let error = profile.require("dev.ucp.shopping.discount").expect_err("not negotiated");
        assert_eq!(
            error,
            CheckoutError::CapabilityNotNegotiated {
                capability: "dev.ucp.shopping.discount".to_owned()
            }
        );
    }
}
