use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use super::{GatewayError, QueryGateway, QueryRequest, QueryResponse};

type Reply = Result<QueryResponse, GatewayError>;

/// In-process gateway for tests/dev.
///
/// Replies are served in the order they were queued; once the queue is empty the
/// `repeat` reply (if any) is served forever. Every request is recorded.
#[derive(Debug, Default)]
pub struct ScriptedGateway {
    queue: Mutex<VecDeque<Reply>>,
    repeat: Mutex<Option<Reply>>,
    requests: Mutex<Vec<QueryRequest>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gateway that always answers with `reply`.
    pub fn always(reply: Reply) -> Self {
        let gateway = Self::new();
        *gateway.repeat.lock().unwrap_or_else(PoisonError::into_inner) = Some(reply);
        gateway
    }

    pub fn push(&self, reply: Reply) {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).push_back(reply);
    }

    pub fn requests(&self) -> Vec<QueryRequest> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl QueryGateway for ScriptedGateway {
    fn execute(&self, request: &QueryRequest, _timeout: Duration) -> Result<QueryResponse, GatewayError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        if let Some(reply) = self.queue.lock().unwrap_or_else(PoisonError::into_inner).pop_front() {
            return reply;
        }

        self.repeat
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or_else(|| Err(GatewayError::Transport("no scripted reply".to_string())))
    }
}
