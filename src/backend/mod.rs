use async_trait::async_trait;

use crate::aggregators::RawRow;
use crate::errors::BackendError;
use crate::query::ReportRequest;

pub mod credentials;
pub mod google;

pub use google::GoogleReportingBackend;

/// The analytics reporting API, one request per call.
#[async_trait]
pub trait ReportingBackend: Send + Sync {
    async fn execute(&self, request: &ReportRequest) -> Result<Vec<RawRow>, BackendError>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    /// Replays canned responses in call order, recording every request.
    #[derive(Default)]
    pub struct ScriptedBackend {
        batches: Mutex<VecDeque<Result<Vec<RawRow>, BackendError>>>,
        pub requests: Mutex<Vec<ReportRequest>>,
    }

    impl ScriptedBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_rows(&self, rows: &[(&str, &str)]) {
            let rows = rows.iter().map(|(k, v)| RawRow::new(*k, *v)).collect();
            self.batches.lock().unwrap().push_back(Ok(rows));
        }

        pub fn push_error(&self, error: BackendError) {
            self.batches.lock().unwrap().push_back(Err(error));
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ReportingBackend for ScriptedBackend {
        async fn execute(&self, request: &ReportRequest) -> Result<Vec<RawRow>, BackendError> {
            self.requests.lock().unwrap().push(request.clone());
            self.batches
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(BackendError::Transport("no scripted response".into())))
        }
    }

    /// Answers by filter expression, so responses do not depend on the order
    /// in which batches run.
    #[derive(Default)]
    pub struct KeyedBackend {
        responses: HashMap<String, Result<Vec<RawRow>, BackendError>>,
    }

    impl KeyedBackend {
        pub fn with_rows(mut self, path: &str, rows: &[(&str, &str)]) -> Self {
            let rows = rows.iter().map(|(k, v)| RawRow::new(*k, *v)).collect();
            self.responses.insert(path.to_string(), Ok(rows));
            self
        }

        pub fn with_error(mut self, path: &str, error: BackendError) -> Self {
            self.responses.insert(path.to_string(), Err(error));
            self
        }
    }

    #[async_trait]
    impl ReportingBackend for KeyedBackend {
        async fn execute(&self, request: &ReportRequest) -> Result<Vec<RawRow>, BackendError> {
            let key = request
                .filter
                .as_ref()
                .map(|f| f.expression.clone())
                .unwrap_or_default();
            // longer keys answer sooner, so completion order differs from
            // request order
            let delay = 30u64.saturating_sub(key.len() as u64 * 3);
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
            self.responses
                .get(&key)
                .cloned()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }
}
