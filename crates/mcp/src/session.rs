//! Per-agent sessions.
//!
//! A session is created by `session_start` and carries the capability
//! profile negotiated at that moment. The profile never changes afterwards;
//! an agent wanting different capabilities starts a new session. At most one
//! checkout is active per session at a time.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use cartwright_core::{CheckoutId, NegotiatedProfile};

use crate::{McpError, McpResult};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug)]
pub struct SessionContext {
    pub session_id: SessionId,
    pub negotiated: Arc<NegotiatedProfile>,
    pub checkout_id: Option<CheckoutId>,
    pub started_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, SessionContext>>,
}

impl SessionRegistry {
    pub fn start(&self, negotiated: Arc<NegotiatedProfile>) -> SessionContext {
        let context = SessionContext {
            session_id: SessionId(Uuid::new_v4().to_string()),
            negotiated,
            checkout_id: None,
            started_at: Utc::now(),
        };
        let mut sessions = lock_unpoisoned(&self.sessions);
        sessions.insert(context.session_id.0.clone(), context.clone());
        context
    }

    pub fn get(&self, session_id: &SessionId) -> McpResult<SessionContext> {
        let sessions = lock_unpoisoned(&self.sessions);
        sessions
            .get(&session_id.0)
            .cloned()
            .ok_or_else(|| McpError::UnknownSession(session_id.0.clone()))
    }

    /// The checkout the session is currently working on.
    pub fn active_checkout(&self, session_id: &SessionId) -> McpResult<CheckoutId> {
        self.get(session_id)?
            .checkout_id
            .ok_or_else(|| McpError::NoActiveCheckout(session_id.0.clone()))
    }

    pub fn bind_checkout(&self, session_id: &SessionId, checkout_id: CheckoutId) -> McpResult<()> {
        let mut sessions = lock_unpoisoned(&self.sessions);
        let context = sessions
            .get_mut(&session_id.0)
            .ok_or_else(|| McpError::UnknownSession(session_id.0.clone()))?;
        context.checkout_id = Some(checkout_id);
        Ok(())
    }

    /// Detach a finished checkout so the session can start a fresh one.
    pub fn release_checkout(&self, session_id: &SessionId) -> McpResult<()> {
        let mut sessions = lock_unpoisoned(&self.sessions);
        let context = sessions
            .get_mut(&session_id.0)
            .ok_or_else(|| McpError::UnknownSession(session_id.0.clone()))?;
        context.checkout_id = None;
        Ok(())
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
