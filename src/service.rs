use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::aggregators::page_series_aggregator::PageSeriesAggregator;
use crate::aggregators::site_series_aggregator::SiteSeriesAggregator;
use crate::aggregators::top_pages_aggregator::TopPagesAggregator;
use crate::aggregators::{BatchOutcome, DenseSeries, Metric, Report, TopPages};
use crate::backend::credentials::ServiceAccountKey;
use crate::backend::{GoogleReportingBackend, ReportingBackend};
use crate::config::ServiceConfig;
use crate::date_range::{Clock, RangeResolver};
use crate::errors::PageViewError;
use crate::query::MAX_PAGE_SIZE;
use crate::title::PageTitle;

pub const DEFAULT_TOP_PAGES_LIMIT: usize = 1000;

/// Page view statistics of a wiki, read from its analytics view.
pub struct PageViewService {
    config: ServiceConfig,
    resolver: RangeResolver,
    pages: PageSeriesAggregator,
    site: SiteSeriesAggregator,
    top: TopPagesAggregator,
}

impl PageViewService {
    /// Builds the service against the Google reporting API. Fails if the
    /// profile id is missing or a configured credentials file cannot be
    /// loaded.
    pub fn new(config: ServiceConfig) -> Result<Self, PageViewError> {
        config.validate()?;
        let key = config
            .credentials_file
            .as_deref()
            .map(ServiceAccountKey::from_file)
            .transpose()?;

        match &key {
            Some(key) => info!("Authenticating to analytics as {}", key.client_email),
            None => info!("No analytics credentials configured, sending unauthenticated requests"),
        }

        let backend = GoogleReportingBackend::new(
            config.profile_id.clone(),
            key,
            Duration::from_secs(config.request_timeout_secs),
        )?;
        Self::with_backend(config, Arc::new(backend))
    }

    pub fn with_backend(
        config: ServiceConfig,
        backend: Arc<dyn ReportingBackend>,
    ) -> Result<Self, PageViewError> {
        config.validate()?;
        Ok(Self {
            resolver: RangeResolver::system(),
            pages: PageSeriesAggregator::new(backend.clone(), &config.article_path, config.concurrency),
            site: SiteSeriesAggregator::new(backend.clone(), &config.article_path),
            top: TopPagesAggregator::new(backend, &config.article_path, &config.site_name),
            config,
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Replaces the notion of "now"; cached ranges are dropped.
    pub fn set_clock(&self, clock: Arc<dyn Clock>) {
        self.resolver.set_clock(clock);
    }

    /// Daily views of each page over the last `days` complete days.
    pub async fn get_page_data(
        &self,
        titles: &[PageTitle],
        days: i64,
        metric: Metric,
    ) -> Result<BatchOutcome, PageViewError> {
        let range = self.resolver.resolve(days)?;
        Ok(self.pages.get_series(titles, range, metric).await)
    }

    /// Daily views of the whole site over the last `days` complete days.
    pub async fn get_site_data(
        &self,
        days: i64,
        metric: Metric,
    ) -> Result<Report<DenseSeries>, PageViewError> {
        let range = self.resolver.resolve(days)?;
        Ok(self.site.get_series(range, metric).await)
    }

    /// Most viewed pages over the configured lookback.
    pub async fn get_top_pages(&self, limit: Option<usize>) -> Result<Report<TopPages>, PageViewError> {
        let limit = limit.unwrap_or(DEFAULT_TOP_PAGES_LIMIT);
        if limit == 0 || limit > MAX_PAGE_SIZE {
            return Err(PageViewError::InvalidArgument(format!(
                "limit must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, limit
            )));
        }
        let range = self.resolver.resolve(self.config.top_pages_days)?;
        Ok(self.top.get_top(range, Metric::Pageviews, limit).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregators::Status;
    use crate::backend::testing::ScriptedBackend;
    use crate::date_range::FixedClock;
    use crate::errors::BackendError;
    use chrono::NaiveDate;
    use serde_json::json;

    fn config() -> ServiceConfig {
        ServiceConfig::new("123456", "ExampleWiki", None)
    }

    fn service(backend: Arc<ScriptedBackend>) -> PageViewService {
        PageViewService::with_backend(config(), backend).unwrap()
    }

    fn mock_date(service: &PageViewService, end: &str) {
        let day = NaiveDate::parse_from_str(end, "%Y-%m-%d").unwrap();
        service.set_clock(Arc::new(FixedClock::with_last_complete_day(day)));
    }

    fn titles(names: &[&str]) -> Vec<PageTitle> {
        names.iter().map(|n| PageTitle::normalize(n)).collect()
    }

    #[test]
    fn constructor_validates_configuration() {
        assert!(matches!(
            PageViewService::new(ServiceConfig::default()),
            Err(PageViewError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            PageViewService::new(ServiceConfig::new(
                "foobar",
                "ExampleWiki",
                Some("non-exist-file.json".into())
            )),
            Err(PageViewError::InvalidConfiguration(_))
        ));
        assert!(PageViewService::new(ServiceConfig::new("123456", "ExampleWiki", None)).is_ok());
    }

    #[tokio::test]
    async fn page_data_for_two_pages() {
        let backend = Arc::new(ScriptedBackend::new());
        let service = service(backend.clone());
        mock_date(&service, "2000-01-05");

        for page in ["Foo", "Bar"] {
            let (a, b, c) = if page == "Foo" {
                ("1000", "100", "10")
            } else {
                ("500", "50", "5")
            };
            backend.push_rows(&[("20000101", a), ("20000102", b), ("20000104", c)]);
        }

        let outcome = service
            .get_page_data(&titles(&["Foo", "Bar"]), 5, Metric::Pageviews)
            .await
            .unwrap();

        assert!(outcome.status().is_good(), "{:?}", outcome.messages());
        let body = serde_json::to_value(&outcome).unwrap();
        assert_eq!(
            body["values"],
            json!({
                "Foo": {
                    "2000-01-01": 1000,
                    "2000-01-02": 100,
                    "2000-01-03": null,
                    "2000-01-04": 10,
                    "2000-01-05": null
                },
                "Bar": {
                    "2000-01-01": 500,
                    "2000-01-02": 50,
                    "2000-01-03": null,
                    "2000-01-04": 5,
                    "2000-01-05": null
                }
            })
        );
        assert_eq!(body["success"], json!({"Foo": true, "Bar": true}));
        assert_eq!(outcome.success_count(), 2);
        assert_eq!(outcome.fail_count(), 0);
    }

    #[tokio::test]
    async fn page_data_with_partial_failure() {
        let backend = Arc::new(ScriptedBackend::new());
        let service = service(backend.clone());
        mock_date(&service, "2000-01-01");

        backend.push_rows(&[("20000101", "1")]);
        backend.push_rows(&[]);
        backend.push_error(BackendError::Transport("connection refused".into()));

        let outcome = service
            .get_page_data(&titles(&["A", "B", "C"]), 1, Metric::Pageviews)
            .await
            .unwrap();

        assert!(!outcome.status().is_good());
        assert!(outcome.status().is_ok());
        let body = serde_json::to_value(&outcome).unwrap();
        assert_eq!(
            body["values"],
            json!({"A": {"2000-01-01": 1}, "B": {"2000-01-01": null}})
        );
        assert_eq!(body["success"], json!({"A": true, "B": true, "C": false}));
        assert_eq!(outcome.success_count(), 2);
        assert_eq!(outcome.fail_count(), 1);
    }

    #[tokio::test]
    async fn page_data_all_failing() {
        let backend = Arc::new(ScriptedBackend::new());
        let service = service(backend.clone());
        mock_date(&service, "2000-01-01");

        backend.push_error(BackendError::Transport("down".into()));
        backend.push_error(BackendError::Quota("exhausted".into()));

        let outcome = service
            .get_page_data(&titles(&["A", "B"]), 1, Metric::Pageviews)
            .await
            .unwrap();

        assert!(!outcome.status().is_ok());
        assert_eq!(
            serde_json::to_value(outcome.success()).unwrap(),
            json!({"A": false, "B": false})
        );
        assert_eq!(outcome.success_count(), 0);
        assert_eq!(outcome.fail_count(), 2);
        assert_eq!(outcome.messages().len(), 2);
    }

    #[tokio::test]
    async fn page_data_rejects_non_positive_days() {
        let backend = Arc::new(ScriptedBackend::new());
        let service = service(backend.clone());

        let result = service
            .get_page_data(&titles(&["A"]), 0, Metric::Pageviews)
            .await;
        assert!(matches!(result, Err(PageViewError::InvalidArgument(_))));
        assert_eq!(backend.request_count(), 0);
    }

    #[tokio::test]
    async fn site_data() {
        for metric in [Metric::Pageviews, Metric::UniquePageviews] {
            let backend = Arc::new(ScriptedBackend::new());
            let service = service(backend.clone());
            mock_date(&service, "2000-01-05");

            backend.push_rows(&[("20000101", "1000"), ("20000102", "100"), ("20000104", "10")]);
            let report = service.get_site_data(5, metric).await.unwrap();
            assert!(report.is_good(), "{:?}", report.messages);
            assert_eq!(
                serde_json::to_value(report.value.unwrap()).unwrap(),
                json!({
                    "2000-01-01": 1000,
                    "2000-01-02": 100,
                    "2000-01-03": null,
                    "2000-01-04": 10,
                    "2000-01-05": null
                })
            );

            backend.push_rows(&[]);
            let report = service.get_site_data(5, metric).await.unwrap();
            assert!(report.is_good());
            assert_eq!(report.value.unwrap().values(), vec![None; 5]);

            backend.push_error(BackendError::Transport("boom".into()));
            let report = service.get_site_data(5, metric).await.unwrap();
            assert!(!report.is_ok());

            let requests = backend.requests.lock().unwrap();
            assert!(requests.iter().all(|r| r.metric == metric));
        }
    }

    #[tokio::test]
    async fn top_pages() {
        let backend = Arc::new(ScriptedBackend::new());
        let service = service(backend.clone());
        mock_date(&service, "2000-01-05");

        backend.push_rows(&[
            ("Main Page - ExampleWiki", "1000"),
            ("Special:Search - ExampleWiki", "100"),
            ("404.php", "10"),
        ]);
        let report = service.get_top_pages(None).await.unwrap();
        assert!(report.is_good(), "{:?}", report.messages);
        assert_eq!(
            serde_json::to_string(&report.value.unwrap()).unwrap(),
            r#"{"Main_Page":1000,"Special:Search":100,"404.php":10}"#
        );

        backend.push_rows(&[]);
        let report = service.get_top_pages(None).await.unwrap();
        assert!(report.is_good());
        assert!(report.value.unwrap().is_empty());

        backend.push_error(BackendError::Transport("boom".into()));
        let report = service.get_top_pages(None).await.unwrap();
        assert!(!report.is_ok());

        let requests = backend.requests.lock().unwrap();
        assert_eq!(requests[0].page_size, Some(DEFAULT_TOP_PAGES_LIMIT));
        assert_eq!(requests[0].date_range.days(), 30);
        assert_eq!(
            requests[0].date_range.end,
            NaiveDate::from_ymd_opt(2000, 1, 5).unwrap()
        );
    }

    #[tokio::test]
    async fn top_pages_limit_is_validated() {
        let service = service(Arc::new(ScriptedBackend::new()));
        assert!(matches!(
            service.get_top_pages(Some(0)).await,
            Err(PageViewError::InvalidArgument(_))
        ));
        assert!(matches!(
            service.get_top_pages(Some(MAX_PAGE_SIZE + 1)).await,
            Err(PageViewError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn status_classification_is_exposed() {
        let backend = Arc::new(ScriptedBackend::new());
        let service = service(backend.clone());
        mock_date(&service, "2000-01-01");
        backend.push_rows(&[]);
        let outcome = service
            .get_page_data(&titles(&["Only"]), 1, Metric::Pageviews)
            .await
            .unwrap();
        assert_eq!(outcome.status(), Status::Good);
    }
}
