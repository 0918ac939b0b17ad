//! Scheduled CRM maintenance jobs.
//!
//! Four routines (heartbeat, low-stock restock, order reminders, weekly report) talk to
//! the CRM's remote query endpoint, append plain-text audit lines to one file each, and
//! return a typed [`JobResult`]. The [`JobScheduler`] runs them on a fixed cadence.

pub mod audit_log;
pub mod config;
pub mod context;
pub mod gateway;
pub mod heartbeat;
pub mod job;
pub mod low_stock;
pub mod order_reminders;
pub mod report;
pub mod scheduler;
pub mod store;

pub use audit_log::{AuditLog, LogDirectory};
pub use self::config::{load_config, ConfigError, JobSettings, JobsConfig, WorkerConfig, MAX_INTERVAL_SECS};
pub use context::JobContext;
pub use gateway::{GatewayError, HttpGateway, QueryGateway, QueryRequest, QueryResponse, ScriptedGateway};
pub use heartbeat::HeartbeatJob;
pub use job::{Job, JobError, JobFailure, JobName, JobResult, JobResultExt, JobRun, Outcome, UnknownJob};
pub use low_stock::LowStockJob;
pub use order_reminders::OrderRemindersJob;
pub use report::{FigureSource, ReportFigures, ReportJob};
pub use scheduler::{JobScheduler, JobStats, SchedulerHandle};
pub use store::{BulkCreateOutcome, DataStore, InMemoryDataStore, PostgresDataStore, StoreError};
