use std::sync::Arc;

use crate::audit_log::LogDirectory;
use crate::config::JobSettings;
use crate::gateway::QueryGateway;
use crate::heartbeat::HeartbeatJob;
use crate::job::{Job, JobName};
use crate::low_stock::LowStockJob;
use crate::order_reminders::OrderRemindersJob;
use crate::report::ReportJob;
use crate::store::DataStore;

/// Process-wide handles shared by every job.
///
/// Built once at startup; jobs hold clones of the `Arc`s.
#[derive(Clone)]
pub struct JobContext {
    pub gateway: Arc<dyn QueryGateway>,
    pub store: Option<Arc<dyn DataStore>>,
    pub logs: LogDirectory,
}

impl JobContext {
    pub fn new(gateway: Arc<dyn QueryGateway>, store: Option<Arc<dyn DataStore>>, logs: LogDirectory) -> Self {
        Self { gateway, store, logs }
    }

    pub fn build_job(&self, name: JobName, settings: &JobSettings) -> Arc<dyn Job> {
        let gateway = Arc::clone(&self.gateway);
        let log = self.logs.log_for(name);
        let timeout = settings.timeout();

        match name {
            JobName::Heartbeat => Arc::new(HeartbeatJob::new(gateway, log).with_timeout(timeout)),
            JobName::LowStock => Arc::new(LowStockJob::new(gateway, log).with_timeout(timeout)),
            JobName::OrderReminders => Arc::new(OrderRemindersJob::new(gateway, log).with_timeout(timeout)),
            JobName::Report => Arc::new(ReportJob::new(gateway, self.store.clone(), log).with_timeout(timeout)),
        }
    }
}
