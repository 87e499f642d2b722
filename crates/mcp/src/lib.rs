//! Cartwright MCP (Model Context Protocol) Server
//!
//! This crate exposes the checkout engine to AI agents over MCP. A session
//! starts by negotiating a capability profile; every subsequent tool call is
//! scoped to that session and can only reach the operations the negotiated
//! profile allows.
//!
//! ## Architecture
//!
//! - `CartwrightMcpServer`: the MCP protocol surface, one tool per engine
//!   operation
//! - `session`: per-agent session registry binding a negotiated profile to
//!   an active checkout
//! - `tools`: tool catalog grouped by category

mod server;
mod session;
mod tools;

pub use server::CartwrightMcpServer;
pub use session::{SessionContext, SessionId, SessionRegistry};
pub use tools::*;

use cartwright_core::CheckoutError;
use thiserror::Error;

/// Errors specific to MCP server operations.
#[derive(Error, Debug)]
pub enum McpError {
    #[error("unknown session: {0}")]
    UnknownSession(String),

    #[error("session has no active checkout: {0}")]
    NoActiveCheckout(String),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl McpError {
    /// Convert to JSON-RPC error code
    pub fn error_code(&self) -> i32 {
        match self {
            McpError::UnknownSession(_) | McpError::NoActiveCheckout(_) => -32602, // Invalid params
            McpError::Checkout(error) if error.is_caller_error() => -32602, // Invalid params
            McpError::Checkout(_) => -32600,                                // Invalid request
            McpError::Internal(_) => -32603,                                // Internal error
        }
    }
}

/// Result type for MCP operations
pub type McpResult<T> = Result<T, McpError>;
