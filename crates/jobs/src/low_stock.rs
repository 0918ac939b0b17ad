//! Low-stock restock: trigger the remote mutation and log what it changed.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Deserialize;
use serde_json::Value;

use crate::audit_log::AuditLog;
use crate::gateway::{GatewayError, QueryGateway, QueryRequest, QueryResponse};
use crate::job::{self, Job, JobError, JobName, JobResult, Outcome};

pub const RESTOCK_MUTATION: &str =
    "mutation { updateLowStockProducts { updatedProducts { id name stock } message } }";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const TIMESTAMP_FORMAT: &str = "%d/%m/%Y-%H:%M:%S";

const NO_MESSAGE: &str = "No message";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RestockPayload {
    #[serde(default)]
    updated_products: Option<Vec<UpdatedProduct>>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct UpdatedProduct {
    name: String,
    stock: u32,
}

pub struct LowStockJob {
    gateway: Arc<dyn QueryGateway>,
    log: AuditLog,
    timeout: Duration,
}

impl LowStockJob {
    pub fn new(gateway: Arc<dyn QueryGateway>, log: AuditLog) -> Self {
        Self {
            gateway,
            log,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Split a 200 answer into the mutation payload, an application error, or a malformed body.
fn restock_payload(response: &QueryResponse) -> Result<RestockPayload, JobError> {
    match response.data_field("updateLowStockProducts") {
        None => Err(JobError::Remote(response.first_error_message())),
        Some(Value::Null) => Err(JobError::Malformed("updateLowStockProducts is null".to_string())),
        Some(value) => RestockPayload::deserialize(value).map_err(|e| JobError::Malformed(e.to_string())),
    }
}

fn render(prefix: &str, payload: RestockPayload) -> Vec<String> {
    let message = payload.message.as_deref().unwrap_or(NO_MESSAGE);
    let products = payload.updated_products.unwrap_or_default();

    std::iter::once(format!("{prefix} {message}"))
        .chain(
            products
                .iter()
                .map(|p| format!("{prefix} Updated product: {}, New stock: {}", p.name, p.stock)),
        )
        .collect()
}

impl Job for LowStockJob {
    fn name(&self) -> JobName {
        JobName::LowStock
    }

    fn run_at(&self, now: DateTime<Local>) -> JobResult {
        let prefix = format!("[{}]", now.format(TIMESTAMP_FORMAT));

        let interpreted = self
            .gateway
            .execute(&QueryRequest::new(RESTOCK_MUTATION), self.timeout)
            .map_err(JobError::from)
            .and_then(|response| {
                if response.is_ok() {
                    restock_payload(&response)
                } else {
                    Err(JobError::HttpStatus(response.status))
                }
            });

        let (lines, result) = match interpreted {
            Ok(payload) => (render(&prefix, payload), Ok(Outcome::Success)),
            Err(error) => {
                let line = match &error {
                    JobError::Gateway(e @ GatewayError::Transport(_)) => format!("{prefix} Connection error: {e}"),
                    JobError::Remote(_) | JobError::HttpStatus(_) => format!("{prefix} {error}"),
                    other => format!("{prefix} Error: {other}"),
                };
                (vec![line], Err(error))
            }
        };

        job::finish(self.name(), &self.log, now, lines, result)
    }
}
