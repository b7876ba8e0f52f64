use std::ops::Deref;
use std::sync::Arc;

use super::base_report_aggregator::BaseReportAggregator;
use super::{Metric, Report, TopPages};
use crate::backend::ReportingBackend;
use crate::date_range::DateRange;
use crate::query::QueryBuilder;
use crate::reconstruct::top_pages;

pub struct TopPagesAggregator {
    base: BaseReportAggregator,
    builder: QueryBuilder,
    site_name: String,
}

impl Deref for TopPagesAggregator {
    type Target = BaseReportAggregator;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

impl TopPagesAggregator {
    pub fn new(backend: Arc<dyn ReportingBackend>, article_path: &str, site_name: &str) -> Self {
        Self {
            base: BaseReportAggregator::new(backend),
            builder: QueryBuilder::new(article_path),
            site_name: site_name.to_string(),
        }
    }

    pub async fn get_top(&self, range: DateRange, metric: Metric, limit: usize) -> Report<TopPages> {
        let request = self.builder.top_pages(range, metric, limit);
        match self
            .run_batch("top pages", &request, |rows| {
                top_pages(rows, &self.site_name, limit)
            })
            .await
        {
            Ok(pages) => Report::good(pages),
            Err(failure) => Report::fatal(format!(
                "Failed to fetch top pages: {}",
                failure.message
            )),
        }
    }
}
