//! MCP protocol surface.
//!
//! Each tool wraps exactly one engine operation. Expected domain rejections
//! (out of stock, invalid state, declined payment) are returned as tool
//! results carrying the engine's machine-readable error code so agents can
//! auto-correct; protocol-level errors are reserved for malformed requests
//! and unknown sessions.

use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, ErrorData, Implementation, ProtocolVersion, ServerCapabilities,
    ServerInfo,
};
use rmcp::{tool, tool_handler, tool_router, ServerHandler, ServiceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use cartwright_core::{
    negotiate_audited, Address, AuditSink, BuyerInfo, CapabilityClaim, Catalog, CheckoutError,
    CheckoutStore, ClientProfile, FulfillmentOptionId, LineItemId, MerchantProfile,
    NullAuditSink, OrderId, PaymentHandlerId, PaymentInstrument, ProductId,
};

use crate::session::{SessionId, SessionRegistry};
use crate::{McpError, McpResult};

#[derive(Clone)]
pub struct CartwrightMcpServer {
    store: Arc<CheckoutStore>,
    catalog: Arc<dyn Catalog>,
    merchant: MerchantProfile,
    sessions: Arc<SessionRegistry>,
    audit: Arc<dyn AuditSink>,
    tool_router: ToolRouter<Self>,
}

// ============================================================================
// Tool inputs
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CapabilityClaimInput {
    /// Capability name, e.g. "dev.ucp.shopping.checkout"
    pub name: String,
    /// Capability version date, e.g. "2026-01-11"
    pub version: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SessionStartInput {
    /// Capabilities the client declares support for
    pub capabilities: Vec<CapabilityClaimInput>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ProductGetInput {
    pub product_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CartAddItemInput {
    pub session_id: String,
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CartUpdateItemInput {
    pub session_id: String,
    pub line_item_id: String,
    /// New quantity; zero removes the line
    pub quantity: i64,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CartRemoveItemInput {
    pub session_id: String,
    pub line_item_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AddressInput {
    pub street_address: String,
    pub locality: String,
    #[serde(default)]
    pub region: Option<String>,
    pub postal_code: String,
    /// Two-letter country code
    pub country: String,
}

impl From<AddressInput> for Address {
    fn from(input: AddressInput) -> Self {
        Address {
            street_address: input.street_address,
            locality: input.locality,
            region: input.region,
            postal_code: input.postal_code,
            country: input.country,
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CheckoutSetBuyerInput {
    pub session_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<AddressInput>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CheckoutSetFulfillmentInput {
    pub session_id: String,
    #[serde(default)]
    pub destination_address: Option<AddressInput>,
    /// One of the checkout's available fulfillment option ids
    #[serde(default)]
    pub selected_option_id: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CheckoutApplyDiscountInput {
    pub session_id: String,
    pub code: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SessionOnlyInput {
    pub session_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PaymentInstrumentInput {
    /// Instrument kind, e.g. "card"
    #[serde(rename = "type")]
    pub instrument_type: String,
    /// Payment handler the instrument token was minted for
    pub handler_id: String,
    /// Opaque instrument token
    pub token: String,
    #[serde(default)]
    pub last_digits: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub expiry: Option<String>,
}

impl From<PaymentInstrumentInput> for PaymentInstrument {
    fn from(input: PaymentInstrumentInput) -> Self {
        PaymentInstrument {
            instrument_type: input.instrument_type,
            handler_id: PaymentHandlerId(input.handler_id),
            token: input.token,
            last_digits: input.last_digits,
            brand: input.brand,
            expiry: input.expiry,
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CheckoutCompleteInput {
    pub session_id: String,
    pub instrument: PaymentInstrumentInput,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct OrderGetInput {
    pub order_id: String,
}

#[derive(Debug, Serialize)]
struct SessionStartResult<'a> {
    session_id: &'a str,
    ucp_version: &'static str,
    capabilities: &'a std::collections::BTreeMap<String, String>,
    payment_handlers: &'a [cartwright_core::PaymentHandler],
}

// ============================================================================
// Server
// ============================================================================

#[tool_router]
impl CartwrightMcpServer {
    pub fn new(
        store: Arc<CheckoutStore>,
        catalog: Arc<dyn Catalog>,
        merchant: MerchantProfile,
    ) -> Self {
        Self {
            store,
            catalog,
            merchant,
            sessions: Arc::new(SessionRegistry::default()),
            audit: Arc::new(NullAuditSink),
            tool_router: Self::tool_router(),
        }
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Run the server over stdio until the client disconnects.
    pub async fn run_stdio(self) -> anyhow::Result<()> {
        info!("starting MCP server on stdio");
        let service = self.serve(rmcp::transport::stdio()).await?;
        service.waiting().await?;
        info!("MCP server shutdown complete");
        Ok(())
    }

    #[tool(
        name = "session_start",
        description = "Negotiate a capability profile and start a shopping session. \
                       Returns the session id and the agreed capability set."
    )]
    async fn session_start(
        &self,
        Parameters(input): Parameters<SessionStartInput>,
    ) -> Result<CallToolResult, ErrorData> {
        let client = ClientProfile {
            capabilities: input
                .capabilities
                .into_iter()
                .map(|claim| CapabilityClaim { name: claim.name, version: claim.version })
                .collect(),
        };

        let negotiated = match negotiate_audited(&client, &self.merchant, self.audit.as_ref()) {
            Ok(profile) => Arc::new(profile),
            Err(error) => return Ok(domain_error(&error)),
        };

        let context = self.sessions.start(negotiated);
        info!(session_id = %context.session_id, "session started");
        json_result(&SessionStartResult {
            session_id: context.session_id.0.as_str(),
            ucp_version: cartwright_core::UCP_VERSION,
            capabilities: &context.negotiated.capabilities,
            payment_handlers: context.negotiated.payment_handlers.as_slice(),
        })
    }

    #[tool(name = "product_get", description = "Look up a product by id")]
    async fn product_get(
        &self,
        Parameters(input): Parameters<ProductGetInput>,
    ) -> Result<CallToolResult, ErrorData> {
        let product_id = ProductId(input.product_id);
        match self.catalog.lookup_product(&product_id).await {
            Some(product) => json_result(&product),
            None => Ok(domain_error(&CheckoutError::ProductNotFound { product_id })),
        }
    }

    #[tool(
        name = "cart_add_item",
        description = "Add a product to the session's cart. Creates a new checkout if the \
                       session has none (or its previous one is completed or canceled)."
    )]
    async fn cart_add_item(
        &self,
        Parameters(input): Parameters<CartAddItemInput>,
    ) -> Result<CallToolResult, ErrorData> {
        debug!(session_id = %input.session_id, product_id = %input.product_id, "cart_add_item");
        let session_id = SessionId(input.session_id);
        let product_id = ProductId(input.product_id);

        let result = async {
            let context = self.sessions.get(&session_id)?;
            let active = match &context.checkout_id {
                Some(checkout_id) => {
                    let current = self.store.get_checkout(checkout_id).await?;
                    if current.status.is_terminal() {
                        self.sessions.release_checkout(&session_id)?;
                        None
                    } else {
                        Some(checkout_id.clone())
                    }
                }
                None => None,
            };

            match active {
                Some(checkout_id) => {
                    Ok(self.store.add_item(&checkout_id, &product_id, input.quantity).await?)
                }
                None => {
                    let checkout = self
                        .store
                        .create_checkout(context.negotiated.clone(), &product_id, input.quantity)
                        .await?;
                    self.sessions.bind_checkout(&session_id, checkout.id.clone())?;
                    Ok(checkout)
                }
            }
        }
        .await;
        respond(result)
    }

    #[tool(
        name = "cart_update_item",
        description = "Change a cart line's quantity; quantity 0 removes the line"
    )]
    async fn cart_update_item(
        &self,
        Parameters(input): Parameters<CartUpdateItemInput>,
    ) -> Result<CallToolResult, ErrorData> {
        let result = async {
            let checkout_id = self.sessions.active_checkout(&SessionId(input.session_id))?;
            let line_item_id = LineItemId(input.line_item_id);
            Ok(self.store.update_item(&checkout_id, &line_item_id, input.quantity).await?)
        }
        .await;
        respond(result)
    }

    #[tool(name = "cart_remove_item", description = "Remove a line from the session's cart")]
    async fn cart_remove_item(
        &self,
        Parameters(input): Parameters<CartRemoveItemInput>,
    ) -> Result<CallToolResult, ErrorData> {
        let result = async {
            let checkout_id = self.sessions.active_checkout(&SessionId(input.session_id))?;
            let line_item_id = LineItemId(input.line_item_id);
            Ok(self.store.remove_item(&checkout_id, &line_item_id).await?)
        }
        .await;
        respond(result)
    }

    #[tool(
        name = "checkout_set_buyer",
        description = "Set the buyer's contact email and optional billing address"
    )]
    async fn checkout_set_buyer(
        &self,
        Parameters(input): Parameters<CheckoutSetBuyerInput>,
    ) -> Result<CallToolResult, ErrorData> {
        let result = async {
            let checkout_id = self.sessions.active_checkout(&SessionId(input.session_id))?;
            let buyer = BuyerInfo { email: input.email, address: input.address.map(Into::into) };
            Ok(self.store.set_buyer_info(&checkout_id, buyer).await?)
        }
        .await;
        respond(result)
    }

    #[tool(
        name = "checkout_set_fulfillment",
        description = "Set the destination address and/or select a fulfillment option. \
                       Requires the fulfillment capability to have been negotiated."
    )]
    async fn checkout_set_fulfillment(
        &self,
        Parameters(input): Parameters<CheckoutSetFulfillmentInput>,
    ) -> Result<CallToolResult, ErrorData> {
        let result = async {
            let checkout_id = self.sessions.active_checkout(&SessionId(input.session_id))?;
            Ok(self
                .store
                .set_fulfillment(
                    &checkout_id,
                    input.destination_address.map(Into::into),
                    input.selected_option_id.map(FulfillmentOptionId),
                )
                .await?)
        }
        .await;
        respond(result)
    }

    #[tool(
        name = "checkout_apply_discount",
        description = "Apply a discount code to the checkout. Requires the discount \
                       capability to have been negotiated."
    )]
    async fn checkout_apply_discount(
        &self,
        Parameters(input): Parameters<CheckoutApplyDiscountInput>,
    ) -> Result<CallToolResult, ErrorData> {
        let result = async {
            let checkout_id = self.sessions.active_checkout(&SessionId(input.session_id))?;
            Ok(self.store.apply_discount(&checkout_id, &input.code).await?)
        }
        .await;
        respond(result)
    }

    #[tool(
        name = "checkout_request_payment",
        description = "Declare the cart final and move the checkout to ready_for_complete. \
                       Fails naming the missing precondition if buyer email, destination \
                       address, or a fulfillment option is still unset."
    )]
    async fn checkout_request_payment(
        &self,
        Parameters(input): Parameters<SessionOnlyInput>,
    ) -> Result<CallToolResult, ErrorData> {
        let result = async {
            let checkout_id = self.sessions.active_checkout(&SessionId(input.session_id))?;
            Ok(self.store.request_payment(&checkout_id).await?)
        }
        .await;
        respond(result)
    }

    #[tool(
        name = "checkout_complete",
        description = "Submit a payment instrument and finalize the checkout into an order"
    )]
    async fn checkout_complete(
        &self,
        Parameters(input): Parameters<CheckoutCompleteInput>,
    ) -> Result<CallToolResult, ErrorData> {
        let result = async {
            let checkout_id = self.sessions.active_checkout(&SessionId(input.session_id))?;
            Ok(self.store.complete_checkout(&checkout_id, input.instrument.into()).await?)
        }
        .await;
        respond(result)
    }

    #[tool(name = "checkout_cancel", description = "Cancel the session's active checkout")]
    async fn checkout_cancel(
        &self,
        Parameters(input): Parameters<SessionOnlyInput>,
    ) -> Result<CallToolResult, ErrorData> {
        let result = async {
            let checkout_id = self.sessions.active_checkout(&SessionId(input.session_id))?;
            Ok(self.store.cancel_checkout(&checkout_id).await?)
        }
        .await;
        respond(result)
    }

    #[tool(name = "checkout_get", description = "Fetch the current state of the session's checkout")]
    async fn checkout_get(
        &self,
        Parameters(input): Parameters<SessionOnlyInput>,
    ) -> Result<CallToolResult, ErrorData> {
        let result = async {
            let checkout_id = self.sessions.active_checkout(&SessionId(input.session_id))?;
            Ok(self.store.get_checkout(&checkout_id).await?)
        }
        .await;
        respond(result)
    }

    #[tool(name = "order_get", description = "Fetch a confirmed order by id")]
    async fn order_get(
        &self,
        Parameters(input): Parameters<OrderGetInput>,
    ) -> Result<CallToolResult, ErrorData> {
        match self.store.get_order(&OrderId(input.order_id)) {
            Some(order) => json_result(&order),
            None => Ok(domain_error(&CheckoutError::invalid_argument(
                "order_id",
                "no such order",
            ))),
        }
    }
}

#[tool_handler]
impl ServerHandler for CartwrightMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::default(),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Cartwright mock store - agentic checkout over UCP. Start with \
                 session_start to negotiate capabilities, add items with cart_add_item, \
                 then set buyer and fulfillment details, request payment, and complete."
                    .to_string(),
            ),
        }
    }
}

// ============================================================================
// Result plumbing
// ============================================================================

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, ErrorData> {
    let content = serde_json::to_string_pretty(value)
        .map_err(|e| ErrorData::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(content)]))
}

/// Domain rejections stay in-band: the agent gets the machine-readable error
/// code and can correct its next call.
fn domain_error(error: &CheckoutError) -> CallToolResult {
    let payload = json!({
        "error": error,
        "message": error.to_string(),
    });
    CallToolResult::error(vec![Content::text(payload.to_string())])
}

fn respond<T: Serialize>(result: McpResult<T>) -> Result<CallToolResult, ErrorData> {
    match result {
        Ok(value) => json_result(&value),
        Err(McpError::Checkout(error)) => Ok(domain_error(&error)),
        Err(error @ (McpError::UnknownSession(_) | McpError::NoActiveCheckout(_))) => {
            Err(ErrorData::invalid_params(error.to_string(), None))
        }
        Err(McpError::Internal(message)) => Err(ErrorData::internal_error(message, None)),
    }
}
