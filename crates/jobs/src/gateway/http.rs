use std::error::Error as _;
use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::Value;
use tracing::debug;

use super::{GatewayError, QueryGateway, QueryRequest, QueryResponse};

/// Blocking HTTP client for the remote query endpoint.
///
/// Must not be used from inside an async runtime; the scheduler runs jobs on plain
/// threads.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    endpoint: String,
}

impl HttpGateway {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .build()
            .map_err(|e| GatewayError::Transport(describe(&e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

impl QueryGateway for HttpGateway {
    fn execute(&self, request: &QueryRequest, timeout: Duration) -> Result<QueryResponse, GatewayError> {
        debug!(endpoint = %self.endpoint, timeout_ms = timeout.as_millis() as u64, "sending query");

        let response = self
            .client
            .post(&self.endpoint)
            .timeout(timeout)
            .json(request)
            .send()
            .map_err(|e| GatewayError::Transport(describe(&e)))?;

        let status = response.status().as_u16();
        let text = response.text().map_err(|e| GatewayError::Transport(describe(&e)))?;

        if status != 200 {
            let body = serde_json::from_str(&text).unwrap_or(Value::Null);
            return Ok(QueryResponse::new(status, body));
        }

        let body = serde_json::from_str(&text).map_err(|e| GatewayError::Decode(e.to_string()))?;
        Ok(QueryResponse::new(status, body))
    }
}

/// Render an error with its source chain (reqwest hides the root cause otherwise).
fn describe(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
