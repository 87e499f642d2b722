//! Payment validation.
//!
//! The validator never mutates a checkout; it produces an outcome the store
//! uses to drive the `ready_for_complete -> completed` transition. The
//! external handler call is the engine's only suspension point and is
//! bounded by a timeout so a hung processor cannot strand a checkout.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::checkout::{Checkout, CheckoutStatus};
use crate::domain::payment::PaymentInstrument;
use crate::totals;

/// Token that simulates a processor decline in the mock handler.
pub const FAILURE_TOKEN: &str = "instr_fail";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AuthorizationOutcome {
    Approved,
    Declined { reason: String },
}

impl AuthorizationOutcome {
    pub fn declined(reason: impl Into<String>) -> Self {
        Self::Declined { reason: reason.into() }
    }
}

/// External payment handler seam.
#[async_trait::async_trait]
pub trait PaymentHandlerAuthorizer: Send + Sync {
    async fn authorize(
        &self,
        instrument: &PaymentInstrument,
        amount: i64,
        currency: &str,
    ) -> AuthorizationOutcome;
}

/// Deterministic mock: approves everything except the failure-simulation
/// token. No real payment processing happens anywhere in this crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct MockPaymentHandler;

#[async_trait::async_trait]
impl PaymentHandlerAuthorizer for MockPaymentHandler {
    async fn authorize(
        &self,
        instrument: &PaymentInstrument,
        _amount: i64,
        _currency: &str,
    ) -> AuthorizationOutcome {
        if instrument.token == FAILURE_TOKEN {
            AuthorizationOutcome::declined("payment processing failed")
        } else {
            AuthorizationOutcome::Approved
        }
    }
}

pub struct PaymentValidator {
    handler: Arc<dyn PaymentHandlerAuthorizer>,
    authorization_timeout: Duration,
}

impl PaymentValidator {
    pub fn new(handler: Arc<dyn PaymentHandlerAuthorizer>, authorization_timeout: Duration) -> Self {
        Self { handler, authorization_timeout }
    }

    /// Validate an instrument against a ready checkout. The handler id must
    /// be among the handlers negotiated for the session; the authorization
    /// call is bounded by the configured timeout and a timeout surfaces as a
    /// decline rather than an ambiguous state.
    pub async fn validate(
        &self,
        checkout: &Checkout,
        instrument: &PaymentInstrument,
    ) -> AuthorizationOutcome {
        debug_assert_eq!(checkout.status, CheckoutStatus::ReadyForComplete);

        let accepted = checkout
            .payment
            .as_ref()
            .map(|payment| payment.accepts_handler(&instrument.handler_id))
            .unwrap_or(false);
        if !accepted {
            return AuthorizationOutcome::declined("unsupported handler");
        }

        let amount = totals::grand_total(&checkout.totals);
        let authorize = self.handler.authorize(instrument, amount, &checkout.currency);
        match tokio::time::timeout(self.authorization_timeout, authorize).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    checkout_id = %checkout.id,
                    handler_id = %instrument.handler_id,
                    "payment authorization timed out"
                );
                AuthorizationOutcome::declined("timeout")
            }
        }
    }
}
