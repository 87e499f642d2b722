use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentHandlerId(pub String);

impl fmt::Display for PaymentHandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A payment handler the merchant declares in its profile. Attached to a
/// checkout when it becomes ready for completion so the client knows which
/// handlers the session negotiated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentHandler {
    pub id: PaymentHandlerId,
    pub name: String,
    pub version: String,
}

/// Opaque credential reference. The engine never stores raw card data, only
/// this tokenized shape.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInstrument {
    #[serde(rename = "type")]
    pub instrument_type: String,
    pub handler_id: PaymentHandlerId,
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_digits: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<String>,
}

/// Payment state on a checkout: the handlers negotiated for the session and
/// the instrument presented at completion, if any.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSelection {
    pub handlers: Vec<PaymentHandler>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument: Option<PaymentInstrument>,
}

impl PaymentSelection {
    pub fn accepts_handler(&self, handler_id: &PaymentHandlerId) -> bool {
        self.handlers.iter().any(|handler| &handler.id == handler_id)
    }
}
