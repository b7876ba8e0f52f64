use futures_util::stream::{self, StreamExt};
use std::collections::HashSet;
use std::ops::Deref;
use std::sync::Arc;
use tracing::info;

use super::base_report_aggregator::BaseReportAggregator;
use super::{BatchOutcome, EntityResult, Metric};
use crate::backend::ReportingBackend;
use crate::date_range::DateRange;
use crate::query::{QueryBuilder, ReportRequest};
use crate::reconstruct::densify;
use crate::title::PageTitle;

pub struct PageSeriesAggregator {
    base: BaseReportAggregator,
    builder: QueryBuilder,
    concurrency: usize,
}

impl Deref for PageSeriesAggregator {
    type Target = BaseReportAggregator;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

impl PageSeriesAggregator {
    pub fn new(backend: Arc<dyn ReportingBackend>, article_path: &str, concurrency: usize) -> Self {
        Self {
            base: BaseReportAggregator::new(backend),
            builder: QueryBuilder::new(article_path),
            concurrency: concurrency.max(1),
        }
    }

    async fn fetch_page(
        &self,
        title: &PageTitle,
        request: &ReportRequest,
        range: &DateRange,
    ) -> EntityResult {
        match self
            .run_batch(title.as_str(), request, |rows| densify(rows, range))
            .await
        {
            Ok(series) => EntityResult::Success(series),
            Err(failure) => EntityResult::Failure(failure),
        }
    }

    /// Fetches one daily series per page. A failing page never affects the
    /// others; results come back in the order the pages were given, however
    /// the batches were scheduled.
    pub async fn get_series(
        &self,
        titles: &[PageTitle],
        range: DateRange,
        metric: Metric,
    ) -> BatchOutcome {
        let mut seen = HashSet::new();
        let titles: Vec<PageTitle> = titles
            .iter()
            .filter(|title| seen.insert((*title).clone()))
            .cloned()
            .collect();

        let requests = self.builder.page_series_batches(&titles, range, metric);

        let results: Vec<EntityResult> = if self.concurrency == 1 {
            let mut results = Vec::with_capacity(titles.len());
            for (title, request) in titles.iter().zip(&requests) {
                results.push(self.fetch_page(title, request, &range).await);
            }
            results
        } else {
            let mut completed: Vec<(usize, EntityResult)> =
                stream::iter(titles.iter().cloned().zip(requests.iter().cloned()).enumerate())
                    .map(|(idx, (title, request))| async move {
                        (idx, self.fetch_page(&title, &request, &range).await)
                    })
                    .buffer_unordered(self.concurrency)
                    .collect()
                    .await;
            completed.sort_by_key(|(idx, _)| *idx);
            completed.into_iter().map(|(_, result)| result).collect()
        };

        let outcome = BatchOutcome::new(titles.into_iter().zip(results).collect());
        info!(
            "Fetched page views for {} page(s): {} succeeded, {} failed",
            outcome.total(),
            outcome.success_count(),
            outcome.fail_count()
        );
        outcome
    }
}
