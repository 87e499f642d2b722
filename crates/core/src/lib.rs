pub mod audit;
pub mod capability;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod payment;
pub mod store;
pub mod totals;

pub use audit::{
    AuditCategory, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink, NullAuditSink,
    TracingAuditSink,
};
pub use capability::{
    negotiate, negotiate_audited, Capability, CapabilityClaim, CapabilityRegistry, ClientProfile,
    MerchantCapability, MerchantProfile, NegotiatedProfile, UCP_VERSION,
};
pub use catalog::{Catalog, InMemoryCatalog};
pub use config::{ConfigError, LogFormat, LoggingConfig, StoreConfig, CONFIG_PATH_ENV};
pub use domain::buyer::{Address, BuyerInfo};
pub use domain::checkout::{
    Checkout, CheckoutId, CheckoutStatus, LineItem, LineItemId, OrderRef,
};
pub use domain::discount::{AppliedDiscount, DiscountDefinition, DiscountKind};
pub use domain::fulfillment::{FulfillmentOption, FulfillmentOptionId, FulfillmentSelection};
pub use domain::order::{Order, OrderId, OrderStatus};
pub use domain::payment::{PaymentHandler, PaymentHandlerId, PaymentInstrument, PaymentSelection};
pub use domain::product::{Product, ProductId};
pub use errors::{CheckoutError, FulfillmentRequirement};
pub use payment::{
    AuthorizationOutcome, MockPaymentHandler, PaymentHandlerAuthorizer, PaymentValidator,
    FAILURE_TOKEN,
};
pub use store::CheckoutStore;
pub use totals::{FlatTaxRate, TaxRateLookup, Total, TotalType};
