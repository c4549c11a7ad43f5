//! Error types of the league.
//!
//! Protocol errors ([`RpcError`](crate::jsonrpc::RpcError)) live with the JSON-RPC envelope.
//! Everything here is either absorbed by the referee ([`CallError`]) or surfaced to HTTP
//! clients through [`ApiError`].

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::jsonrpc::{ErrorCode, RpcError};

/// Failure of an outgoing JSON-RPC call.
#[derive(Debug, Error)]
pub enum CallError {
    /// No complete answer within the allotted time.
    #[error("no answer within {0:?}")]
    Timeout(Duration),
    /// Connection or protocol failure below JSON-RPC.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// Non-2xx HTTP status.
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    /// The body was not a JSON-RPC response.
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    /// The peer answered with a JSON-RPC error.
    #[error(transparent)]
    Rpc(#[from] RpcError),
}

impl CallError {
    /// Whether the peer certainly did not run the method: the request never reached it, or it
    /// was turned away before dispatch.
    ///
    /// Timeouts, undecodable answers and internal errors are not: the peer may have run the
    /// method, or may still be running it.
    pub fn rejected_before_running(&self) -> bool {
        match self {
            CallError::Transport(err) => err.is_connect() || err.is_builder(),
            CallError::Status(status) => (400..500).contains(status),
            CallError::Rpc(err) => matches!(
                err.kind(),
                Some(
                    ErrorCode::ParseError
                        | ErrorCode::InvalidRequest
                        | ErrorCode::MethodNotFound
                        | ErrorCode::InvalidParams
                )
            ),
            CallError::Timeout(_) | CallError::Decode(_) => false,
        }
    }
}

/// Why the league refused to start.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartError {
    /// Fewer than two players are registered.
    #[error("Need at least 2 agents to start league")]
    NotEnoughAgents {
        /// Number of players registered when start was requested.
        registered: usize,
    },
    #[allow(missing_docs)]
    #[error("League is already running")]
    AlreadyRunning,
    #[allow(missing_docs)]
    #[error("League has already completed")]
    AlreadyCompleted,
}

/// Lookup failures of the agent registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[allow(missing_docs)]
    #[error("agent '{0}' is not registered")]
    NotFound(String),
}

/// A player was configured with a strategy name that is not in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown strategy '{name}' (available: {})", available.join(", "))]
pub struct UnknownStrategy {
    /// Requested name.
    pub name: String,
    /// Registered names, sorted.
    pub available: Vec<String>,
}

/// Errors of the league REST surface, rendered as `{"error": message}`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or incomplete request body.
    #[error("{0}")]
    BadRequest(String),
    #[allow(missing_docs)]
    #[error(transparent)]
    Start(#[from] StartError),
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Start(StartError::NotEnoughAgents { .. }) => StatusCode::BAD_REQUEST,
            ApiError::Start(_) => StatusCode::CONFLICT,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
