use std::sync::Arc;
use tracing::{debug, error, warn};

use super::{BatchFailure, FailureKind, RawRow};
use crate::backend::ReportingBackend;
use crate::errors::PageViewError;
use crate::query::ReportRequest;

/// Runs single batches against the backend and classifies their outcome.
pub struct BaseReportAggregator {
    backend: Arc<dyn ReportingBackend>,
}

impl BaseReportAggregator {
    pub fn new(backend: Arc<dyn ReportingBackend>) -> Self {
        Self { backend }
    }

    /// Executes one request and turns its rows into `T`. Backend errors and
    /// unreadable rows both end the batch as a failure; neither is retried.
    pub async fn run_batch<T, F>(
        &self,
        label: &str,
        request: &ReportRequest,
        reconstruct: F,
    ) -> Result<T, BatchFailure>
    where
        F: FnOnce(&[RawRow]) -> Result<T, PageViewError>,
    {
        let rows = match self.backend.execute(request).await {
            Ok(rows) => rows,
            Err(e) if e.is_contract_violation() => {
                error!("Backend contract violation for {}: {}", label, e);
                return Err(BatchFailure {
                    kind: FailureKind::ContractViolation,
                    message: e.to_string(),
                });
            }
            Err(e) => {
                warn!("Backend request for {} failed: {}", label, e);
                return Err(BatchFailure {
                    kind: FailureKind::Transport,
                    message: e.to_string(),
                });
            }
        };

        debug!("Received {} row(s) for {}", rows.len(), label);

        reconstruct(&rows).map_err(|e| {
            let kind = match e {
                PageViewError::Backend(ref b) if !b.is_contract_violation() => FailureKind::Transport,
                _ => FailureKind::ContractViolation,
            };
            if kind == FailureKind::ContractViolation {
                error!("Backend contract violation for {}: {}", label, e);
            } else {
                warn!("Batch for {} failed: {}", label, e);
            }
            BatchFailure {
                kind,
                message: e.to_string(),
            }
        })
    }
}
