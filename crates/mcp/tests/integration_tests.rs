//! Integration tests for the Cartwright MCP server.
//!
//! These drive the server's building blocks the way the protocol layer does:
//! negotiate a profile, bind a session to a checkout, and walk the checkout
//! through the store.

use std::sync::Arc;

use rmcp::ServerHandler;

use cartwright_core::{
    negotiate, BuyerInfo, CapabilityClaim, CapabilityRegistry, CheckoutStatus, CheckoutStore,
    ClientProfile, InMemoryCatalog, Product, ProductId, StoreConfig, UCP_VERSION,
};
use cartwright_mcp::{CartwrightMcpServer, SessionRegistry, TOTAL_TOOLS};

fn catalog() -> Arc<InMemoryCatalog> {
    Arc::new(InMemoryCatalog::new(vec![Product {
        id: ProductId("SKU-1".to_owned()),
        title: "Widget".to_owned(),
        unit_price: 499,
        currency: "USD".to_owned(),
        stock_quantity: 5,
    }]))
}

fn server() -> CartwrightMcpServer {
    let config = StoreConfig::default();
    let catalog = catalog();
    let merchant = config.merchant_profile(&CapabilityRegistry::ucp_shopping());
    let store = Arc::new(CheckoutStore::new(&config, catalog.clone()));
    CartwrightMcpServer::new(store, catalog, merchant)
}

#[tokio::test]
async fn server_info_advertises_tools_and_instructions() {
    let info = server().get_info();

    assert!(info.capabilities.tools.is_some());
    let instructions = info.instructions.expect("instructions set");
    assert!(instructions.contains("session_start"));
    assert!(TOTAL_TOOLS >= 13);
}

#[tokio::test]
async fn session_profile_flows_into_checkouts_it_creates() {
    let config = StoreConfig::default();
    let merchant = config.merchant_profile(&CapabilityRegistry::ucp_shopping());
    let client = ClientProfile {
        capabilities: vec![CapabilityClaim {
            name: "dev.ucp.shopping.checkout".to_owned(),
            version: UCP_VERSION.to_owned(),
        }],
    };
    let negotiated = Arc::new(negotiate(&client, &merchant).expect("negotiation succeeds"));

    let sessions = SessionRegistry::default();
    let context = sessions.start(negotiated.clone());
    let store = CheckoutStore::new(&config, catalog());

    let checkout = store
        .create_checkout(context.negotiated.clone(), &ProductId("SKU-1".to_owned()), 1)
        .await
        .expect("create checkout");
    sessions.bind_checkout(&context.session_id, checkout.id.clone()).expect("bind");

    assert_eq!(
        sessions.active_checkout(&context.session_id).expect("bound checkout"),
        checkout.id
    );
    assert_eq!(checkout.status, CheckoutStatus::Incomplete);
    // The session's agreed capability set rode along onto the checkout.
    assert!(checkout.negotiated_profile.supports("dev.ucp.shopping.checkout"));
    assert!(!checkout.negotiated_profile.supports("dev.ucp.shopping.discount"));

    let updated = store
        .set_buyer_info(
            &checkout.id,
            BuyerInfo { email: Some("buyer@example.com".to_owned()), address: None },
        )
        .await
        .expect("buyer info accepted");
    assert_eq!(updated.buyer.email.as_deref(), Some("buyer@example.com"));
}
