//! Weekly CRM report.
//!
//! Figures come from the remote endpoint; when that endpoint cannot be reached at all
//! the same figures are read straight from the data store. Remote application errors
//! and HTTP errors do not fall back.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::{Map, Value};
use tracing::debug;

use crate::audit_log::AuditLog;
use crate::gateway::{GatewayError, QueryGateway, QueryRequest, QueryResponse};
use crate::job::{self, Job, JobError, JobName, JobResult, Outcome};
use crate::store::{DataStore, StoreError};

pub const REPORT_QUERY: &str = "query { customers { id } orders { id totalPrice } }";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The three aggregate figures a report is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportFigures {
    pub customers: u64,
    pub orders: u64,
    pub revenue: Decimal,
}

impl ReportFigures {
    /// Count entries and sum `totalPrice` over a `{ customers, orders }` payload.
    ///
    /// A missing list counts as empty; a missing or null price counts as zero.
    pub fn from_payload(data: &Map<String, Value>) -> Result<Self, JobError> {
        let customers = list(data, "customers")?;
        let orders = list(data, "orders")?;

        let revenue = orders
            .iter()
            .map(order_total)
            .try_fold(Decimal::ZERO, |sum, price| {
                sum.checked_add(price?)
                    .ok_or_else(|| JobError::Malformed("revenue overflow".to_string()))
            })?;

        Ok(Self {
            customers: customers.len() as u64,
            orders: orders.len() as u64,
            revenue,
        })
    }

    pub fn from_store(store: &dyn DataStore) -> Result<Self, StoreError> {
        Ok(Self {
            customers: store.count_customers()?,
            orders: store.count_orders()?,
            revenue: store.sum_order_totals()?,
        })
    }

    /// `N customers, M orders, $X.XX revenue`
    pub fn summary(&self) -> String {
        let revenue = self
            .revenue
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        format!("{} customers, {} orders, ${:.2} revenue", self.customers, self.orders, revenue)
    }
}

fn list<'a>(data: &'a Map<String, Value>, key: &str) -> Result<&'a [Value], JobError> {
    match data.get(key) {
        None => Ok(&[]),
        Some(Value::Array(items)) => Ok(items),
        Some(other) => Err(JobError::Malformed(format!("{key} is not a list: {other}"))),
    }
}

fn order_total(order: &Value) -> Result<Decimal, JobError> {
    let entry = order
        .as_object()
        .ok_or_else(|| JobError::Malformed(format!("order entry is not an object: {order}")))?;

    match entry.get("totalPrice") {
        None | Some(Value::Null) => Ok(Decimal::ZERO),
        Some(Value::String(raw)) => parse_decimal(raw),
        Some(Value::Number(n)) => parse_decimal(&n.to_string()),
        Some(other) => Err(JobError::Malformed(format!("totalPrice is not a number: {other}"))),
    }
}

fn parse_decimal(raw: &str) -> Result<Decimal, JobError> {
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .map_err(|e| JobError::Malformed(format!("invalid totalPrice {raw:?}: {e}")))
}

/// Where a successful report's figures came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FigureSource {
    Remote,
    Store,
}

impl fmt::Display for FigureSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FigureSource::Remote => f.write_str("Report"),
            FigureSource::Store => f.write_str("Report (DB fallback)"),
        }
    }
}

pub struct ReportJob {
    gateway: Arc<dyn QueryGateway>,
    store: Option<Arc<dyn DataStore>>,
    log: AuditLog,
    timeout: Duration,
}

impl ReportJob {
    pub fn new(gateway: Arc<dyn QueryGateway>, store: Option<Arc<dyn DataStore>>, log: AuditLog) -> Self {
        Self {
            gateway,
            store,
            log,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn remote_figures(&self) -> Result<ReportFigures, JobError> {
        let response = self.gateway.execute(&QueryRequest::new(REPORT_QUERY), self.timeout)?;
        figures_from_response(&response)
    }

    fn store_figures(&self) -> Result<ReportFigures, StoreError> {
        let store = self.store.as_ref().ok_or(StoreError::NotConfigured)?;
        ReportFigures::from_store(store.as_ref())
    }

    /// Remote first; the store is consulted only for transport failures.
    pub fn gather(&self) -> Result<(FigureSource, ReportFigures), JobError> {
        self.remote_figures()
            .map(|figures| (FigureSource::Remote, figures))
            .or_else(|error| match error {
                JobError::Gateway(primary @ GatewayError::Transport(_)) => {
                    debug!(error = %primary, "report endpoint unreachable, reading data store");
                    self.store_figures()
                        .map(|figures| (FigureSource::Store, figures))
                        .map_err(|fallback| JobError::FallbackFailed { primary, fallback })
                }
                other => Err(other),
            })
    }
}

fn figures_from_response(response: &QueryResponse) -> Result<ReportFigures, JobError> {
    if !response.is_ok() {
        return Err(JobError::HttpStatus(response.status));
    }

    let data = response
        .data()
        .ok_or_else(|| JobError::Remote(response.first_error_message()))?;
    ReportFigures::from_payload(data)
}

fn report_line(timestamp: &str, gathered: &Result<(FigureSource, ReportFigures), JobError>) -> String {
    match gathered {
        Ok((source, figures)) => format!("{timestamp} - {source}: {}", figures.summary()),
        Err(error @ (JobError::Remote(_) | JobError::HttpStatus(_))) => format!("{timestamp} - {error}"),
        Err(error @ JobError::FallbackFailed { .. }) => {
            format!("{timestamp} - Connection error and DB fallback failed: {error}")
        }
        Err(error) => format!("{timestamp} - Error generating report: {error}"),
    }
}

impl Job for ReportJob {
    fn name(&self) -> JobName {
        JobName::Report
    }

    fn run_at(&self, now: DateTime<Local>) -> JobResult {
        let timestamp = now.format(TIMESTAMP_FORMAT).to_string();
        let gathered = self.gather();
        let line = report_line(&timestamp, &gathered);

        let result = gathered.map(|(source, _)| match source {
            FigureSource::Remote => Outcome::Success,
            FigureSource::Store => Outcome::Fallback,
        });

        job::finish(self.name(), &self.log, now, vec![line], result)
    }
}
