pub mod negotiation;
pub mod registry;

pub use negotiation::{
    negotiate, negotiate_audited, CapabilityClaim, ClientProfile, MerchantCapability,
    MerchantProfile, NegotiatedProfile,
};
pub use registry::{Capability, CapabilityRegistry, UCP_VERSION};
