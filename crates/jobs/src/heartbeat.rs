//! Liveness heartbeat: probe the endpoint and record one line per invocation.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};

use crate::audit_log::AuditLog;
use crate::gateway::{GatewayError, QueryGateway, QueryRequest};
use crate::job::{self, Job, JobError, JobName, JobResult, Outcome};

pub const HELLO_QUERY: &str = "{ hello }";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const TIMESTAMP_FORMAT: &str = "%d/%m/%Y-%H:%M:%S";

pub struct HeartbeatJob {
    gateway: Arc<dyn QueryGateway>,
    log: AuditLog,
    timeout: Duration,
}

impl HeartbeatJob {
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

    /// Classify the probe into a line suffix plus result.
    fn probe(&self) -> (String, Result<Outcome, JobError>) {
        match self.gateway.execute(&QueryRequest::new(HELLO_QUERY), self.timeout) {
            Ok(response) if response.is_ok() => {
                if response.data_field("hello").is_some() {
                    ("GraphQL endpoint responsive".to_string(), Ok(Outcome::Success))
                } else {
                    (
                        "GraphQL endpoint error".to_string(),
                        Err(JobError::Remote(response.first_error_message())),
                    )
                }
            }
            Ok(response) => (
                format!("GraphQL endpoint returned status {}", response.status),
                Err(JobError::HttpStatus(response.status)),
            ),
            Err(err @ GatewayError::Transport(_)) => {
                (format!("GraphQL endpoint unreachable: {err}"), Err(err.into()))
            }
            Err(err) => (format!("Error testing GraphQL: {err}"), Err(err.into())),
        }
    }
}

impl Job for HeartbeatJob {
    fn name(&self) -> JobName {
        JobName::Heartbeat
    }

    fn run_at(&self, now: DateTime<Local>) -> JobResult {
        let timestamp = now.format(TIMESTAMP_FORMAT);
        let (detail, result) = self.probe();
        let line = format!("{timestamp} CRM is alive - {detail}");

        job::finish(self.name(), &self.log, now, vec![line], result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{QueryResponse, ScriptedGateway};
    use crate::job::JobResultExt;
    use chrono::TimeZone;
    use serde_json::json;

    fn fixed_now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    fn job_with(gateway: ScriptedGateway) -> (tempfile::TempDir, HeartbeatJob) {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path().join(JobName::Heartbeat.log_file_name()));
        (dir, HeartbeatJob::new(Arc::new(gateway), log))
    }

    fn log_lines(job: &HeartbeatJob) -> Vec<String> {
        std::fs::read_to_string(job.log.path())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn responsive_endpoint_is_logged_as_alive() {
        let gateway = ScriptedGateway::always(Ok(QueryResponse::ok(json!({ "data": { "hello": "Hello, GraphQL!" } }))));
        let (_dir, job) = job_with(gateway);

        let run = job.run_at(fixed_now()).unwrap();

        assert_eq!(run.outcome, Outcome::Success);
        assert_eq!(
            log_lines(&job),
            vec!["09/03/2024-14:05:07 CRM is alive - GraphQL endpoint responsive"]
        );
    }

    #[test]
    fn missing_hello_field_is_an_endpoint_error() {
        let gateway = ScriptedGateway::always(Ok(QueryResponse::ok(json!({ "errors": [{ "message": "bad" }] }))));
        let (_dir, job) = job_with(gateway);

        let failure = job.run_at(fixed_now()).unwrap_err();

        assert_eq!(failure.run.outcome, Outcome::ApplicationError);
        assert_eq!(failure.run.headline(), "09/03/2024-14:05:07 CRM is alive - GraphQL endpoint error");
    }

    #[test]
    fn null_data_without_errors_is_an_endpoint_error() {
        let gateway = ScriptedGateway::always(Ok(QueryResponse::ok(json!({ "data": null }))));
        let (_dir, job) = job_with(gateway);

        let failure = job.run_at(fixed_now()).unwrap_err();

        assert_eq!(failure.run.outcome, Outcome::ApplicationError);
        assert_eq!(
            log_lines(&job),
            vec!["09/03/2024-14:05:07 CRM is alive - GraphQL endpoint error"]
        );
    }

    #[test]
    fn non_200_status_is_reported_with_the_code() {
        let gateway = ScriptedGateway::always(Ok(QueryResponse::new(503, serde_json::Value::Null)));
        let (_dir, job) = job_with(gateway);

        let result = job.run_at(fixed_now());

        assert_eq!(result.run().outcome, Outcome::HttpError(503));
        assert_eq!(
            log_lines(&job),
            vec!["09/03/2024-14:05:07 CRM is alive - GraphQL endpoint returned status 503"]
        );
    }

    #[test]
    fn transport_failure_is_unreachable_and_still_logged() {
        let gateway = ScriptedGateway::always(Err(GatewayError::Transport("connection refused".into())));
        let (_dir, job) = job_with(gateway);

        let failure = job.run_at(fixed_now()).unwrap_err();

        assert_eq!(failure.run.outcome, Outcome::TransportError);
        assert_eq!(
            log_lines(&job),
            vec!["09/03/2024-14:05:07 CRM is alive - GraphQL endpoint unreachable: connection refused"]
        );
    }

    #[test]
    fn undecodable_body_is_an_unexpected_failure() {
        let gateway = ScriptedGateway::always(Err(GatewayError::Decode("expected value at line 1".into())));
        let (_dir, job) = job_with(gateway);

        let failure = job.run_at(fixed_now()).unwrap_err();

        assert_eq!(failure.run.outcome, Outcome::Unexpected);
        assert!(failure.run.headline().contains("CRM is alive - Error testing GraphQL: invalid response body"));
    }

    #[test]
    fn repeated_runs_append_one_line_each() {
        let gateway = ScriptedGateway::always(Ok(QueryResponse::ok(json!({ "data": { "hello": "hi" } }))));
        let (_dir, job) = job_with(gateway);

        for _ in 0..5 {
            assert!(job.run_at(fixed_now()).is_ok());
        }

        let lines = log_lines(&job);
        assert_eq!(lines.len(), 5);
        assert!(lines.iter().all(|l| l.ends_with("GraphQL endpoint responsive")));
    }

    #[test]
    fn probe_sends_the_hello_query() {
        let gateway = Arc::new(ScriptedGateway::always(Ok(QueryResponse::ok(json!({ "data": { "hello": "hi" } })))));
        let dir = tempfile::tempdir().unwrap();
        let job = HeartbeatJob::new(gateway.clone(), AuditLog::new(dir.path().join("hb.txt")));

        job.run_at(fixed_now()).unwrap();

        let requests = gateway.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].query, HELLO_QUERY);
        assert!(requests[0].variables.is_none());
    }
}
