use std::ops::Deref;
use std::sync::Arc;

use super::base_report_aggregator::BaseReportAggregator;
use super::{DenseSeries, Metric, Report};
use crate::backend::ReportingBackend;
use crate::date_range::DateRange;
use crate::query::QueryBuilder;
use crate::reconstruct::densify;

pub struct SiteSeriesAggregator {
    base: BaseReportAggregator,
    builder: QueryBuilder,
}

impl Deref for SiteSeriesAggregator {
    type Target = BaseReportAggregator;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

impl SiteSeriesAggregator {
    pub fn new(backend: Arc<dyn ReportingBackend>, article_path: &str) -> Self {
        Self {
            base: BaseReportAggregator::new(backend),
            builder: QueryBuilder::new(article_path),
        }
    }

    pub async fn get_series(&self, range: DateRange, metric: Metric) -> Report<DenseSeries> {
        let request = self.builder.site_series(range, metric);
        match self
            .run_batch("site", &request, |rows| densify(rows, &range))
            .await
        {
            Ok(series) => Report::good(series),
            Err(failure) => Report::fatal(format!(
                "Failed to fetch site page views: {}",
                failure.message
            )),
        }
    }
}
