//! Core job types: names, outcome classification and run records.

use std::str::FromStr;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::audit_log::AuditLog;
use crate::gateway::GatewayError;
use crate::store::StoreError;

/// The scheduled routines this worker knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobName {
    Heartbeat,
    LowStock,
    OrderReminders,
    Report,
}

impl JobName {
    pub const ALL: [JobName; 4] = [
        JobName::Heartbeat,
        JobName::LowStock,
        JobName::OrderReminders,
        JobName::Report,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobName::Heartbeat => "heartbeat",
            JobName::LowStock => "low_stock",
            JobName::OrderReminders => "order_reminders",
            JobName::Report => "report",
        }
    }

    /// File name of the job's audit log inside the log directory.
    pub fn log_file_name(&self) -> &'static str {
        match self {
            JobName::Heartbeat => "crm_heartbeat_log.txt",
            JobName::LowStock => "low_stock_updates_log.txt",
            JobName::OrderReminders => "order_reminders_log.txt",
            JobName::Report => "crm_report_log.txt",
        }
    }
}

impl std::fmt::Display for JobName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown job {0:?} (expected one of: heartbeat, low_stock, order_reminders, report)")]
pub struct UnknownJob(pub String);

impl FromStr for JobName {
    type Err = UnknownJob;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        JobName::ALL
            .into_iter()
            .find(|name| name.as_str() == normalized)
            .ok_or_else(|| UnknownJob(s.to_string()))
    }
}

/// Outcome classification of a single invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The remote call succeeded and was fully interpreted.
    Success,
    /// The remote call failed but a secondary source produced the result.
    Fallback,
    /// The endpoint answered 200 with an error payload.
    ApplicationError,
    /// The endpoint answered with a non-200 status.
    HttpError(u16),
    /// The endpoint could not be reached (connect failure, timeout).
    TransportError,
    /// Anything else (undecodable body, malformed payload).
    Unexpected,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success | Outcome::Fallback)
    }
}

/// Why an invocation failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JobError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("GraphQL error: {0}")]
    Remote(String),

    #[error("HTTP error: Status {0}")]
    HttpStatus(u16),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("{primary}, {fallback}")]
    FallbackFailed {
        primary: GatewayError,
        fallback: StoreError,
    },
}

impl JobError {
    pub fn outcome(&self) -> Outcome {
        match self {
            JobError::Gateway(GatewayError::Transport(_)) => Outcome::TransportError,
            JobError::Gateway(GatewayError::Decode(_)) => Outcome::Unexpected,
            JobError::Remote(_) => Outcome::ApplicationError,
            JobError::HttpStatus(status) => Outcome::HttpError(*status),
            JobError::Malformed(_) => Outcome::Unexpected,
            JobError::FallbackFailed { .. } => Outcome::TransportError,
        }
    }
}

/// Record of one invocation: what happened and exactly what was written to the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobRun {
    pub job: JobName,
    pub invoked_at: DateTime<Local>,
    pub outcome: Outcome,
    /// Lines appended to the audit log, without trailing newlines.
    pub lines: Vec<String>,
}

impl JobRun {
    /// The first line written by this invocation (the whole record for single-line jobs).
    pub fn headline(&self) -> &str {
        self.lines.first().map(String::as_str).unwrap_or_default()
    }
}

/// A failed invocation. The audit lines were still written.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{job} job failed: {error}", job = .run.job)]
pub struct JobFailure {
    pub run: JobRun,
    #[source]
    pub error: JobError,
}

pub type JobResult = Result<JobRun, JobFailure>;

/// Access the run record regardless of which variant was returned.
pub trait JobResultExt {
    fn run(&self) -> &JobRun;
}

impl JobResultExt for JobResult {
    fn run(&self) -> &JobRun {
        match self {
            Ok(run) => run,
            Err(failure) => &failure.run,
        }
    }
}

/// A schedulable routine.
///
/// Every invocation appends at least one line to the job's audit log and reports the
/// outcome as a typed result; callers decide whether a failure warrants alerting.
pub trait Job: Send + Sync + 'static {
    fn name(&self) -> JobName;

    /// Run with an explicit invocation time (used for timestamps and date windows).
    fn run_at(&self, now: DateTime<Local>) -> JobResult;

    fn run(&self) -> JobResult {
        self.run_at(Local::now())
    }
}

/// Append `lines` to the job's log and turn the interpretation into a [`JobResult`].
pub(crate) fn finish(
    job: JobName,
    log: &AuditLog,
    invoked_at: DateTime<Local>,
    lines: Vec<String>,
    result: Result<Outcome, JobError>,
) -> JobResult {
    log.append_or_report(job, &lines);

    match result {
        Ok(outcome) => {
            info!(job = %job, outcome = ?outcome, lines = lines.len(), "job run recorded");
            Ok(JobRun {
                job,
                invoked_at,
                outcome,
                lines,
            })
        }
        Err(error) => {
            let outcome = error.outcome();
            warn!(job = %job, outcome = ?outcome, error = %error, "job run failed");
            Err(JobFailure {
                run: JobRun {
                    job,
                    invoked_at,
                    outcome,
                    lines,
                },
                error,
            })
        }
    }
}
