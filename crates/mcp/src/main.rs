//! Cartwright MCP Server Binary
//!
//! Entry point for running the mock store's MCP server over stdio.
//!
//! ## Usage
//!
//! ```bash
//! # Run with the built-in demo store
//! cartwright-mcp
//!
//! # Run with a specific store configuration
//! CARTWRIGHT_CONFIG=store.toml cartwright-mcp
//!
//! # Override the log level
//! CARTWRIGHT_LOG=debug cartwright-mcp
//! ```

use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cartwright_core::{
    CapabilityRegistry, CheckoutStore, InMemoryCatalog, LogFormat, MockPaymentHandler, Product,
    ProductId, StoreConfig, TracingAuditSink,
};
use cartwright_mcp::CartwrightMcpServer;

#[tokio::main]
async fn main() -> Result<()> {
    let config = StoreConfig::load(None)?;

    // The stdio transport owns stdout, so logs go to stderr.
    let filter = EnvFilter::try_new(&config.logging.level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    match config.logging.format {
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Compact => builder.compact().init(),
    }

    info!(store = %config.store.name, currency = %config.store.currency, "starting Cartwright");

    let catalog = Arc::new(demo_catalog());
    let merchant = config.merchant_profile(&CapabilityRegistry::ucp_shopping());
    let audit = Arc::new(TracingAuditSink);
    let store = Arc::new(CheckoutStore::with_parts(
        &config,
        catalog.clone(),
        Arc::new(MockPaymentHandler),
        audit.clone(),
    ));

    let server = CartwrightMcpServer::new(store, catalog, merchant).with_audit_sink(audit);
    server.run_stdio().await
}

/// A small fixed catalog so the mock store is usable out of the box.
fn demo_catalog() -> InMemoryCatalog {
    InMemoryCatalog::new(vec![
        Product {
            id: ProductId("SKU-ROSE-DOZEN".to_owned()),
            title: "Dozen Red Roses".to_owned(),
            unit_price: 4_999,
            currency: "USD".to_owned(),
            stock_quantity: 25,
        },
        Product {
            id: ProductId("SKU-TULIP-MIX".to_owned()),
            title: "Mixed Tulip Bouquet".to_owned(),
            unit_price: 2_499,
            currency: "USD".to_owned(),
            stock_quantity: 40,
        },
        Product {
            id: ProductId("SKU-ORCHID-POT".to_owned()),
            title: "Potted Orchid".to_owned(),
            unit_price: 3_499,
            currency: "USD".to_owned(),
            stock_quantity: 8,
        },
    ])
}
