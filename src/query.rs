use serde::Serialize;

use crate::aggregators::Metric;
use crate::date_range::DateRange;
use crate::title::PageTitle;

/// Largest page size the reporting API accepts.
pub const MAX_PAGE_SIZE: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Dimension {
    /// One row per day, keyed `YYYYMMDD`.
    Date,
    /// One row per page, keyed `"<title> - <sitename>"`.
    PageTitle,
}

impl Dimension {
    pub fn name(self) -> &'static str {
        match self {
            Dimension::Date => "ga:date",
            Dimension::PageTitle => "ga:pageTitle",
        }
    }
}

/// Exact match of a single dimension value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityFilter {
    pub dimension: &'static str,
    pub expression: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricOrder {
    pub metric: Metric,
    pub descending: bool,
}

/// One backend round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRequest {
    pub metric: Metric,
    pub dimension: Option<Dimension>,
    pub filter: Option<EntityFilter>,
    pub order: Option<MetricOrder>,
    pub page_size: Option<usize>,
    pub date_range: DateRange,
}

pub struct QueryBuilder {
    article_path: String,
}

impl QueryBuilder {
    pub fn new(article_path: impl Into<String>) -> Self {
        Self {
            article_path: article_path.into(),
        }
    }

    /// Daily series for a single page.
    pub fn page_series(&self, title: &PageTitle, range: DateRange, metric: Metric) -> ReportRequest {
        ReportRequest {
            metric,
            dimension: Some(Dimension::Date),
            filter: Some(EntityFilter {
                dimension: "ga:pagePath",
                expression: title.url_path(&self.article_path),
            }),
            order: None,
            page_size: None,
            date_range: range,
        }
    }

    /// One request per page, in the order given.
    pub fn page_series_batches(
        &self,
        titles: &[PageTitle],
        range: DateRange,
        metric: Metric,
    ) -> Vec<ReportRequest> {
        titles
            .iter()
            .map(|title| self.page_series(title, range, metric))
            .collect()
    }

    /// Daily series for the whole site.
    pub fn site_series(&self, range: DateRange, metric: Metric) -> ReportRequest {
        ReportRequest {
            metric,
            dimension: Some(Dimension::Date),
            filter: None,
            order: None,
            page_size: None,
            date_range: range,
        }
    }

    pub fn top_pages(&self, range: DateRange, metric: Metric, limit: usize) -> ReportRequest {
        ReportRequest {
            metric,
            dimension: Some(Dimension::PageTitle),
            filter: None,
            order: Some(MetricOrder {
                metric,
                descending: true,
            }),
            page_size: Some(limit.clamp(1, MAX_PAGE_SIZE)),
            date_range: range,
        }
    }
}
