//! Remote query endpoint boundary.
//!
//! The endpoint accepts `{"query": ..., "variables"?: ...}` over HTTP POST and answers
//! `{"data": {...}}` or `{"errors": [{"message": ...}]}`. Jobs only see this trait, so
//! the transport can be swapped (HTTP in production, scripted replies in tests).

mod http;
mod scripted;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub use http::HttpGateway;
pub use scripted::ScriptedGateway;

/// Placeholder used when an error payload carries no usable message.
pub const UNKNOWN_REMOTE_ERROR: &str = "Unknown GraphQL error";

/// Request body sent to the endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            variables: None,
        }
    }

    pub fn with_variables(mut self, variables: Value) -> Self {
        self.variables = Some(variables);
        self
    }
}

/// Raw endpoint answer: HTTP status plus decoded JSON body.
///
/// Non-200 answers carry `Value::Null` when the body was not JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResponse {
    pub status: u16,
    pub body: Value,
}

impl QueryResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// A 200 answer with `body`.
    pub fn ok(body: Value) -> Self {
        Self::new(200, body)
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// The `data` object, if present and not null.
    pub fn data(&self) -> Option<&serde_json::Map<String, Value>> {
        self.body.get("data").and_then(Value::as_object)
    }

    /// A top-level field of `data`. Present-but-null fields are returned as `Value::Null`.
    pub fn data_field(&self, key: &str) -> Option<&Value> {
        self.data().and_then(|data| data.get(key))
    }

    /// Message of the first reported error, or [`UNKNOWN_REMOTE_ERROR`] when the error
    /// list is missing, empty or malformed.
    pub fn first_error_message(&self) -> String {
        self.body
            .get("errors")
            .and_then(Value::as_array)
            .and_then(|errors| errors.first())
            .and_then(|error| error.get("message"))
            .and_then(Value::as_str)
            .unwrap_or(UNKNOWN_REMOTE_ERROR)
            .to_string()
    }
}

/// Failure to obtain a [`QueryResponse`] at all.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// Connection refused, DNS failure, timeout, reset, ...
    #[error("{0}")]
    Transport(String),

    /// The endpoint answered 200 but the body was not valid JSON.
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl GatewayError {
    pub fn is_transport(&self) -> bool {
        matches!(self, GatewayError::Transport(_))
    }
}

/// Client for the remote query endpoint.
pub trait QueryGateway: Send + Sync {
    /// Send one request, bounded by `timeout`. No retries.
    fn execute(&self, request: &QueryRequest, timeout: Duration) -> Result<QueryResponse, GatewayError>;
}

impl<G> QueryGateway for Arc<G>
where
    G: QueryGateway + ?Sized,
{
    fn execute(&self, request: &QueryRequest, timeout: Duration) -> Result<QueryResponse, GatewayError> {
        (**self).execute(request, timeout)
    }
}
