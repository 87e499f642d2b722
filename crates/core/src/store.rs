//! Checkout store and state machine.
//!
//! Owns every checkout session record and the append-only order log. Each
//! checkout is logically single-writer: a per-id async mutex serializes
//! mutations against one checkout while unrelated checkouts proceed in
//! parallel. Readers take the same lock, so a returned snapshot never shows
//! a half-applied recalculation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, NullAuditSink};
use crate::capability::NegotiatedProfile;
use crate::catalog::Catalog;
use crate::config::StoreConfig;
use crate::domain::buyer::{Address, BuyerInfo};
use crate::domain::checkout::{
    Checkout, CheckoutId, CheckoutStatus, LineItem, LineItemId, OrderRef,
};
use crate::domain::discount::{AppliedDiscount, DiscountDefinition};
use crate::domain::fulfillment::{FulfillmentOption, FulfillmentOptionId, FulfillmentSelection};
use crate::domain::order::{Order, OrderId, OrderStatus};
use crate::domain::payment::{PaymentInstrument, PaymentSelection};
use crate::domain::product::{Product, ProductId};
use crate::errors::{CheckoutError, FulfillmentRequirement};
use crate::payment::{
    AuthorizationOutcome, MockPaymentHandler, PaymentHandlerAuthorizer, PaymentValidator,
};
use crate::totals::{self, FlatTaxRate, TaxRateLookup};

pub const DISCOUNT_CAPABILITY: &str = "dev.ucp.shopping.discount";
pub const FULFILLMENT_CAPABILITY: &str = "dev.ucp.shopping.fulfillment";

type CheckoutSlot = Arc<Mutex<Checkout>>;

pub struct CheckoutStore {
    catalog: Arc<dyn Catalog>,
    tax: Arc<dyn TaxRateLookup>,
    validator: PaymentValidator,
    audit: Arc<dyn AuditSink>,
    currency: String,
    permalink_base: String,
    discount_definitions: Vec<DiscountDefinition>,
    fulfillment_options: Vec<FulfillmentOption>,
    checkouts: StdMutex<HashMap<String, CheckoutSlot>>,
    orders: StdMutex<HashMap<String, Order>>,
}

impl CheckoutStore {
    pub fn new(config: &StoreConfig, catalog: Arc<dyn Catalog>) -> Self {
        Self::with_parts(config, catalog, Arc::new(MockPaymentHandler), Arc::new(NullAuditSink))
    }

    pub fn with_parts(
        config: &StoreConfig,
        catalog: Arc<dyn Catalog>,
        payment_handler: Arc<dyn PaymentHandlerAuthorizer>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let validator = PaymentValidator::new(
            payment_handler,
            Duration::from_millis(config.payment.authorization_timeout_ms),
        );
        Self {
            catalog,
            tax: Arc::new(FlatTaxRate(config.tax.rate_bps)),
            validator,
            audit,
            currency: config.store.currency.clone(),
            permalink_base: config.store.permalink_base.clone(),
            discount_definitions: config.discounts.clone(),
            fulfillment_options: config.fulfillment.options.clone(),
            checkouts: StdMutex::new(HashMap::new()),
            orders: StdMutex::new(HashMap::new()),
        }
    }

    pub fn with_tax_lookup(mut self, tax: Arc<dyn TaxRateLookup>) -> Self {
        self.tax = tax;
        self
    }

    /// Create a checkout from its first item. The checkout only comes into
    /// existence once the product and stock checks pass; a failed first add
    /// leaves nothing behind.
    pub async fn create_checkout(
        &self,
        profile: Arc<NegotiatedProfile>,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<Checkout, CheckoutError> {
        if quantity == 0 {
            return Err(CheckoutError::invalid_argument("quantity", "must be at least 1"));
        }
        let product = self.validated_product(product_id, quantity).await?;

        let now = Utc::now();
        let checkout = Checkout {
            id: CheckoutId(Uuid::new_v4().to_string()),
            status: CheckoutStatus::Incomplete,
            currency: self.currency.clone(),
            line_items: vec![new_line_item(&product, quantity)],
            buyer: BuyerInfo::default(),
            fulfillment: FulfillmentSelection::with_options(self.fulfillment_options.clone()),
            discounts: Vec::new(),
            totals: Vec::new(),
            payment: None,
            order: None,
            negotiated_profile: profile,
            created_at: now,
            updated_at: now,
        };

        let mut checkout = checkout;
        self.recalculate(&mut checkout);
        let snapshot = checkout.clone();

        let mut checkouts = lock_unpoisoned(&self.checkouts);
        checkouts.insert(snapshot.id.0.clone(), Arc::new(Mutex::new(checkout)));
        drop(checkouts);

        info!(checkout_id = %snapshot.id, product_id = %product_id, "checkout created");
        self.audit.emit(AuditEvent::new(
            Some(snapshot.id.clone()),
            "checkout.created",
            AuditCategory::Checkout,
            AuditOutcome::Success,
        ));
        Ok(snapshot)
    }

    pub async fn add_item(
        &self,
        checkout_id: &CheckoutId,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<Checkout, CheckoutError> {
        if quantity == 0 {
            return Err(CheckoutError::invalid_argument("quantity", "must be at least 1"));
        }

        let slot = self.slot(checkout_id)?;
        let mut checkout = slot.lock().await;
        checkout.ensure_cart_mutable("add_item")?;

        // Stock is checked against the reservation total across every line
        // in this checkout that references the product.
        let reserved = checkout.reserved_quantity(product_id);
        let product = self.validated_product(product_id, reserved + quantity).await?;

        checkout.reopen_if_ready();
        match checkout.line_items.iter_mut().find(|line| &line.product_id == product_id) {
            Some(line) => line.quantity += quantity,
            None => checkout.line_items.push(new_line_item(&product, quantity)),
        }
        self.recalculate(&mut checkout);

        debug!(checkout_id = %checkout.id, product_id = %product_id, quantity, "line item added");
        Ok(checkout.clone())
    }

    /// Quantity zero removes the line; negative quantities are rejected
    /// before anything is touched.
    pub async fn update_item(
        &self,
        checkout_id: &CheckoutId,
        line_item_id: &LineItemId,
        quantity: i64,
    ) -> Result<Checkout, CheckoutError> {
        if quantity < 0 {
            return Err(CheckoutError::invalid_argument("quantity", "must not be negative"));
        }

        let slot = self.slot(checkout_id)?;
        let mut checkout = slot.lock().await;
        checkout.ensure_cart_mutable("update_item")?;

        let line = checkout
            .line_item(line_item_id)
            .cloned()
            .ok_or_else(|| CheckoutError::LineItemNotFound { line_item_id: line_item_id.clone() })?;

        if quantity == 0 {
            checkout.reopen_if_ready();
            checkout.line_items.retain(|item| &item.id != line_item_id);
        } else {
            let quantity = u32::try_from(quantity).map_err(|_| {
                CheckoutError::invalid_argument("quantity", "exceeds supported range")
            })?;
            let reserved_elsewhere = checkout.reserved_quantity(&line.product_id) - line.quantity;
            self.validated_product(&line.product_id, reserved_elsewhere + quantity).await?;

            checkout.reopen_if_ready();
            if let Some(item) = checkout.line_items.iter_mut().find(|item| &item.id == line_item_id)
            {
                item.quantity = quantity;
            }
        }
        self.recalculate(&mut checkout);

        debug!(checkout_id = %checkout.id, line_item_id = %line_item_id, quantity, "line item updated");
        Ok(checkout.clone())
    }

    pub async fn remove_item(
        &self,
        checkout_id: &CheckoutId,
        line_item_id: &LineItemId,
    ) -> Result<Checkout, CheckoutError> {
        let slot = self.slot(checkout_id)?;
        let mut checkout = slot.lock().await;
        checkout.ensure_cart_mutable("remove_item")?;

        if checkout.line_item(line_item_id).is_none() {
            return Err(CheckoutError::LineItemNotFound { line_item_id: line_item_id.clone() });
        }

        checkout.reopen_if_ready();
        checkout.line_items.retain(|item| &item.id != line_item_id);
        self.recalculate(&mut checkout);

        debug!(checkout_id = %checkout.id, line_item_id = %line_item_id, "line item removed");
        Ok(checkout.clone())
    }

    /// Replaces the buyer info. An invalid address shape is rejected without
    /// mutating anything.
    pub async fn set_buyer_info(
        &self,
        checkout_id: &CheckoutId,
        buyer: BuyerInfo,
    ) -> Result<Checkout, CheckoutError> {
        let slot = self.slot(checkout_id)?;
        let mut checkout = slot.lock().await;
        checkout.ensure_cart_mutable("set_buyer_info")?;
        if let Some(address) = &buyer.address {
            address.validate()?;
        }

        checkout.reopen_if_ready();
        checkout.buyer = buyer;
        self.recalculate(&mut checkout);
        Ok(checkout.clone())
    }

    /// Set the destination address and/or select a fulfillment option.
    /// Fields left as `None` are preserved.
    pub async fn set_fulfillment(
        &self,
        checkout_id: &CheckoutId,
        destination: Option<Address>,
        selected_option: Option<FulfillmentOptionId>,
    ) -> Result<Checkout, CheckoutError> {
        let slot = self.slot(checkout_id)?;
        let mut checkout = slot.lock().await;
        checkout.negotiated_profile.require(FULFILLMENT_CAPABILITY)?;
        checkout.ensure_cart_mutable("set_fulfillment")?;

        if let Some(address) = &destination {
            address.validate()?;
        }
        if let Some(option_id) = &selected_option {
            let known =
                checkout.fulfillment.available_options.iter().any(|option| &option.id == option_id);
            if !known {
                return Err(CheckoutError::invalid_argument(
                    "selected_option_id",
                    format!("unknown fulfillment option `{option_id}`"),
                ));
            }
        }

        checkout.reopen_if_ready();
        if destination.is_some() {
            checkout.fulfillment.destination_address = destination;
        }
        if selected_option.is_some() {
            checkout.fulfillment.selected_option_id = selected_option;
        }
        self.recalculate(&mut checkout);
        Ok(checkout.clone())
    }

    /// Record a discount code. Requires the discount capability to have been
    /// negotiated for the session; re-applying an already-applied code is a
    /// no-op.
    pub async fn apply_discount(
        &self,
        checkout_id: &CheckoutId,
        code: &str,
    ) -> Result<Checkout, CheckoutError> {
        let slot = self.slot(checkout_id)?;
        let mut checkout = slot.lock().await;
        checkout.negotiated_profile.require(DISCOUNT_CAPABILITY)?;
        checkout.ensure_cart_mutable("apply_discount")?;

        let definition = self
            .discount_definitions
            .iter()
            .find(|definition| definition.code == code && definition.active)
            .ok_or_else(|| {
                CheckoutError::invalid_argument("code", "unknown or inactive discount code")
            })?;

        if checkout.discounts.iter().any(|applied| applied.code == code) {
            return Ok(checkout.clone());
        }

        checkout.reopen_if_ready();
        checkout
            .discounts
            .push(AppliedDiscount { code: definition.code.clone(), kind: definition.kind });
        self.recalculate(&mut checkout);

        self.audit.emit(
            AuditEvent::new(
                Some(checkout.id.clone()),
                "checkout.discount_applied",
                AuditCategory::Pricing,
                AuditOutcome::Success,
            )
            .with_metadata("code", code),
        );
        Ok(checkout.clone())
    }

    /// Move an incomplete checkout to `ready_for_complete`, naming exactly
    /// which precondition blocks it otherwise.
    pub async fn request_payment(
        &self,
        checkout_id: &CheckoutId,
    ) -> Result<Checkout, CheckoutError> {
        let slot = self.slot(checkout_id)?;
        let mut checkout = slot.lock().await;
        if checkout.status.is_terminal() {
            return Err(CheckoutError::InvalidState {
                operation: "request_payment".to_owned(),
                status: checkout.status,
            });
        }

        if checkout.buyer.email.is_none() {
            return Err(CheckoutError::MissingBuyerInfo { missing: "email".to_owned() });
        }
        if checkout.fulfillment.destination_address.is_none() {
            return Err(CheckoutError::MissingFulfillment {
                missing: FulfillmentRequirement::DestinationAddress,
            });
        }
        if checkout.fulfillment.selected_option().is_none() {
            return Err(CheckoutError::MissingFulfillment {
                missing: FulfillmentRequirement::SelectedOption,
            });
        }

        checkout.payment = Some(PaymentSelection {
            handlers: checkout.negotiated_profile.payment_handlers.clone(),
            instrument: None,
        });
        self.recalculate(&mut checkout);
        checkout.status = CheckoutStatus::ReadyForComplete;

        info!(checkout_id = %checkout.id, "checkout ready for completion");
        self.audit.emit(AuditEvent::new(
            Some(checkout.id.clone()),
            "checkout.ready_for_complete",
            AuditCategory::Checkout,
            AuditOutcome::Success,
        ));
        Ok(checkout.clone())
    }

    /// Validate the instrument and finalize the checkout into an order.
    ///
    /// All-or-nothing: nothing is mutated until authorization has succeeded,
    /// so an abandoned in-flight call can never leave a dangling partial
    /// order. Re-submitting the same instrument token after completion
    /// returns the existing order.
    pub async fn complete_checkout(
        &self,
        checkout_id: &CheckoutId,
        instrument: PaymentInstrument,
    ) -> Result<Checkout, CheckoutError> {
        let slot = self.slot(checkout_id)?;
        let mut checkout = slot.lock().await;

        match checkout.status {
            CheckoutStatus::Completed => {
                let same_token = checkout
                    .payment
                    .as_ref()
                    .and_then(|payment| payment.instrument.as_ref())
                    .map(|existing| existing.token == instrument.token)
                    .unwrap_or(false);
                if same_token {
                    return Ok(checkout.clone());
                }
                return Err(CheckoutError::InvalidState {
                    operation: "complete_checkout".to_owned(),
                    status: checkout.status,
                });
            }
            CheckoutStatus::Canceled | CheckoutStatus::Incomplete => {
                return Err(CheckoutError::InvalidState {
                    operation: "complete_checkout".to_owned(),
                    status: checkout.status,
                });
            }
            CheckoutStatus::ReadyForComplete => {}
        }

        match self.validator.validate(&checkout, &instrument).await {
            AuthorizationOutcome::Approved => {}
            AuthorizationOutcome::Declined { reason } => {
                self.audit.emit(
                    AuditEvent::new(
                        Some(checkout.id.clone()),
                        "payment.declined",
                        AuditCategory::Payment,
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("reason", reason.clone()),
                );
                return Err(CheckoutError::PaymentDeclined { reason });
            }
        }

        let order_id = OrderId(Uuid::new_v4().to_string());
        let permalink = format!("{}/orders/{}", self.permalink_base, order_id);
        let order = Order {
            id: order_id.clone(),
            checkout_id: checkout.id.clone(),
            status: OrderStatus::Confirmed,
            currency: checkout.currency.clone(),
            line_items: checkout.line_items.clone(),
            totals: checkout.totals.clone(),
            permalink: permalink.clone(),
            created_at: Utc::now(),
        };

        let mut orders = lock_unpoisoned(&self.orders);
        orders.insert(order_id.0.clone(), order);
        drop(orders);

        if let Some(payment) = checkout.payment.as_mut() {
            payment.instrument = Some(instrument);
        }
        checkout.order = Some(OrderRef { id: order_id.clone(), permalink });
        checkout.status = CheckoutStatus::Completed;
        checkout.touch();

        info!(checkout_id = %checkout.id, order_id = %order_id, "checkout completed");
        self.audit.emit(
            AuditEvent::new(
                Some(checkout.id.clone()),
                "checkout.completed",
                AuditCategory::Order,
                AuditOutcome::Success,
            )
            .with_metadata("order_id", order_id.0.clone()),
        );
        Ok(checkout.clone())
    }

    /// Cancel a non-completed checkout. Idempotent on already-canceled ones.
    pub async fn cancel_checkout(
        &self,
        checkout_id: &CheckoutId,
    ) -> Result<Checkout, CheckoutError> {
        let slot = self.slot(checkout_id)?;
        let mut checkout = slot.lock().await;

        match checkout.status {
            CheckoutStatus::Completed => Err(CheckoutError::InvalidState {
                operation: "cancel_checkout".to_owned(),
                status: checkout.status,
            }),
            CheckoutStatus::Canceled => Ok(checkout.clone()),
            CheckoutStatus::Incomplete | CheckoutStatus::ReadyForComplete => {
                checkout.status = CheckoutStatus::Canceled;
                checkout.touch();
                info!(checkout_id = %checkout.id, "checkout canceled");
                self.audit.emit(AuditEvent::new(
                    Some(checkout.id.clone()),
                    "checkout.canceled",
                    AuditCategory::Checkout,
                    AuditOutcome::Success,
                ));
                Ok(checkout.clone())
            }
        }
    }

    pub async fn get_checkout(&self, checkout_id: &CheckoutId) -> Result<Checkout, CheckoutError> {
        let slot = self.slot(checkout_id)?;
        let checkout = slot.lock().await;
        Ok(checkout.clone())
    }

    pub fn get_order(&self, order_id: &OrderId) -> Option<Order> {
        let orders = lock_unpoisoned(&self.orders);
        orders.get(&order_id.0).cloned()
    }

    fn slot(&self, checkout_id: &CheckoutId) -> Result<CheckoutSlot, CheckoutError> {
        let checkouts = lock_unpoisoned(&self.checkouts);
        checkouts
            .get(&checkout_id.0)
            .cloned()
            .ok_or_else(|| CheckoutError::CheckoutNotFound { checkout_id: checkout_id.clone() })
    }

    async fn validated_product(
        &self,
        product_id: &ProductId,
        requested_total: u32,
    ) -> Result<Product, CheckoutError> {
        let product = self
            .catalog
            .lookup_product(product_id)
            .await
            .ok_or_else(|| CheckoutError::ProductNotFound { product_id: product_id.clone() })?;
        if product.currency != self.currency {
            return Err(CheckoutError::invalid_argument(
                "product_id",
                format!("product is priced in {}, store sells in {}", product.currency, self.currency),
            ));
        }
        if !self.catalog.check_stock(product_id, requested_total).await {
            return Err(CheckoutError::OutOfStock {
                product_id: product_id.clone(),
                requested: requested_total,
                available: product.stock_quantity,
            });
        }
        Ok(product)
    }

    fn recalculate(&self, checkout: &mut Checkout) {
        let rate_bps = checkout
            .fulfillment
            .destination_address
            .as_ref()
            .map(|address| self.tax.rate_bps(address))
            .unwrap_or(0);
        checkout.totals = totals::recalculate(
            &checkout.line_items,
            &checkout.fulfillment,
            &checkout.discounts,
            rate_bps,
        );
        checkout.touch();
    }
}

fn new_line_item(product: &Product, quantity: u32) -> LineItem {
    LineItem {
        id: LineItemId(Uuid::new_v4().to_string()),
        product_id: product.id.clone(),
        title: product.title.clone(),
        quantity,
        unit_price_snapshot: product.unit_price,
    }
}

fn lock_unpoisoned<T>(mutex: &StdMutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
