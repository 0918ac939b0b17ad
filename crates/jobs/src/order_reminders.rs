//! Order reminders: list orders from the last week with their customer's email.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use serde_json::json;

use crate::audit_log::AuditLog;
use crate::gateway::{QueryGateway, QueryRequest, QueryResponse};
use crate::job::{self, Job, JobError, JobName, JobResult, Outcome};

pub const RECENT_ORDERS_QUERY: &str = "query GetRecentOrders($dateFilter: String!) { \
     orders(orderDate_Gte: $dateFilter) { id orderDate customer { email } } }";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub const LOOKBACK_DAYS: i64 = 7;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const BOUNDARY_FORMAT: &str = "%Y-%m-%d";

/// Calendar date `LOOKBACK_DAYS` before `now`; orders on or after it are due a reminder.
pub fn lookback_boundary(now: DateTime<Local>) -> NaiveDate {
    (now - chrono::Duration::days(LOOKBACK_DAYS)).date_naive()
}

/// Order ids come back as strings from most servers, but numbers are accepted too.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
enum OrderRef {
    Text(String),
    Number(i64),
}

impl fmt::Display for OrderRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderRef::Text(id) => f.write_str(id),
            OrderRef::Number(id) => write!(f, "{id}"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecentOrder {
    id: OrderRef,
    #[serde(default)]
    order_date: Option<String>,
    customer: ReminderRecipient,
}

#[derive(Debug, Clone, Deserialize)]
struct ReminderRecipient {
    email: String,
}

impl RecentOrder {
    /// Orders whose date cannot be read are kept; the server already applied the filter.
    fn is_due(&self, boundary: NaiveDate) -> bool {
        self.order_date
            .as_deref()
            .and_then(order_day)
            .map_or(true, |day| day >= boundary)
    }
}

fn order_day(raw: &str) -> Option<NaiveDate> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.date_naive())
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|dt| dt.date()))
        .or_else(|_| NaiveDate::parse_from_str(raw, BOUNDARY_FORMAT))
        .ok()
}

fn recent_orders(response: &QueryResponse) -> Result<Vec<RecentOrder>, JobError> {
    if !response.is_ok() {
        return Err(JobError::HttpStatus(response.status));
    }

    let orders = response
        .data_field("orders")
        .ok_or_else(|| JobError::Remote(response.first_error_message()))?;

    Vec::<RecentOrder>::deserialize(orders).map_err(|e| JobError::Malformed(e.to_string()))
}

pub struct OrderRemindersJob {
    gateway: Arc<dyn QueryGateway>,
    log: AuditLog,
    timeout: Duration,
}

impl OrderRemindersJob {
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

impl Job for OrderRemindersJob {
    fn name(&self) -> JobName {
        JobName::OrderReminders
    }

    fn run_at(&self, now: DateTime<Local>) -> JobResult {
        let prefix = format!("[{}]", now.format(TIMESTAMP_FORMAT));
        let boundary = lookback_boundary(now);
        let date_filter = boundary.format(BOUNDARY_FORMAT).to_string();

        let request =
            QueryRequest::new(RECENT_ORDERS_QUERY).with_variables(json!({ "dateFilter": date_filter }));

        let fetched = self
            .gateway
            .execute(&request, self.timeout)
            .map_err(JobError::from)
            .and_then(|response| recent_orders(&response));

        let (lines, result) = match fetched {
            Ok(orders) => {
                let mut lines: Vec<String> = orders
                    .iter()
                    .filter(|order| order.is_due(boundary))
                    .map(|order| format!("{prefix} Order ID: {}, Customer Email: {}", order.id, order.customer.email))
                    .collect();

                if lines.is_empty() {
                    lines.push(format!("{prefix} No orders to remind since {date_filter}"));
                }
                (lines, Ok(Outcome::Success))
            }
            Err(error) => (vec![format!("{prefix} Error processing reminders: {error}")], Err(error)),
        };

        job::finish(self.name(), &self.log, now, lines, result)
    }
}
