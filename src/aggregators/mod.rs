use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

use crate::date_range::DateRange;
use crate::title::PageTitle;

pub mod base_report_aggregator;
pub mod page_series_aggregator;
pub mod site_series_aggregator;
pub mod top_pages_aggregator;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Metric {
    #[default]
    #[serde(rename = "pageviews")]
    Pageviews,
    #[serde(rename = "unique")]
    UniquePageviews,
}

impl Metric {
    pub fn expression(self) -> &'static str {
        match self {
            Metric::Pageviews => "ga:pageviews",
            Metric::UniquePageviews => "ga:uniquePageviews",
        }
    }
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Good,
    Degraded,
    Fatal,
}

impl Status {
    pub fn is_good(self) -> bool {
        self == Status::Good
    }

    /// Good or degraded: at least some data is usable.
    pub fn is_ok(self) -> bool {
        self != Status::Fatal
    }
}

/// One result row as returned by the reporting backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub dimension_key: String,
    pub metric_value: String,
}

impl RawRow {
    pub fn new(dimension_key: impl Into<String>, metric_value: impl Into<String>) -> Self {
        Self {
            dimension_key: dimension_key.into(),
            metric_value: metric_value.into(),
        }
    }
}

/// Per-day counts covering every day of a range; `None` marks days the
/// backend returned nothing for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DenseSeries(BTreeMap<NaiveDate, Option<i64>>);

impl DenseSeries {
    /// Series with every day of `range` set to `None`.
    pub fn empty(range: &DateRange) -> Self {
        Self(range.iter_days().map(|day| (day, None)).collect())
    }

    /// Sets a day that is already part of the series. Returns false for days
    /// outside it.
    pub fn set(&mut self, day: NaiveDate, value: i64) -> bool {
        match self.0.get_mut(&day) {
            Some(slot) => {
                *slot = Some(value);
                true
            }
            None => false,
        }
    }

    pub fn values(&self) -> Vec<Option<i64>> {
        self.0.values().copied().collect()
    }
}

/// Most viewed pages, highest count first.
pub type TopPages = IndexMap<PageTitle, i64>;

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Network, authentication, quota or timeout error.
    Transport,
    /// The backend answered with rows we could not read.
    ContractViolation,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityResult {
    Success(DenseSeries),
    Failure(BatchFailure),
}

impl EntityResult {
    pub fn is_success(&self) -> bool {
        matches!(self, EntityResult::Success(_))
    }
}

/// Per-page results of a multi-page query, in request order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchOutcome {
    results: Vec<(PageTitle, EntityResult)>,
}

impl BatchOutcome {
    pub fn new(results: Vec<(PageTitle, EntityResult)>) -> Self {
        Self { results }
    }

    /// Series of the pages that were fetched; failed pages are absent.
    pub fn values(&self) -> IndexMap<&PageTitle, &DenseSeries> {
        self.results
            .iter()
            .filter_map(|(title, result)| match result {
                EntityResult::Success(series) => Some((title, series)),
                EntityResult::Failure(_) => None,
            })
            .collect()
    }

    pub fn success(&self) -> IndexMap<&PageTitle, bool> {
        self.results
            .iter()
            .map(|(title, result)| (title, result.is_success()))
            .collect()
    }

    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|(_, r)| r.is_success()).count()
    }

    pub fn fail_count(&self) -> usize {
        self.results.len() - self.success_count()
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn status(&self) -> Status {
        if self.fail_count() == 0 {
            Status::Good
        } else if self.success_count() > 0 {
            Status::Degraded
        } else {
            Status::Fatal
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.results
            .iter()
            .filter_map(|(title, result)| match result {
                EntityResult::Failure(failure) => Some(format!(
                    "Failed to fetch page views for {}: {}",
                    title, failure.message
                )),
                EntityResult::Success(_) => None,
            })
            .collect()
    }
}

impl Serialize for BatchOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("BatchOutcome", 6)?;
        state.serialize_field("status", &self.status())?;
        state.serialize_field("success_count", &self.success_count())?;
        state.serialize_field("fail_count", &self.fail_count())?;
        state.serialize_field("success", &self.success())?;
        state.serialize_field("values", &self.values())?;
        state.serialize_field("messages", &self.messages())?;
        state.end()
    }
}

/// Outcome of a query that runs as a single batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report<T> {
    pub status: Status,
    pub messages: Vec<String>,
    pub value: Option<T>,
}

impl<T> Report<T> {
    pub fn good(value: T) -> Self {
        Self {
            status: Status::Good,
            messages: Vec::new(),
            value: Some(value),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            status: Status::Fatal,
            messages: vec![message.into()],
            value: None,
        }
    }

    pub fn is_good(&self) -> bool {
        self.status.is_good()
    }

    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn range() -> DateRange {
        DateRange::ending_at(NaiveDate::from_ymd_opt(2000, 1, 3).unwrap(), 3).unwrap()
    }

    fn failure() -> EntityResult {
        EntityResult::Failure(BatchFailure {
            kind: FailureKind::Transport,
            message: "boom".to_string(),
        })
    }

    #[test]
    fn dense_series_serializes_with_nulls() {
        let mut series = DenseSeries::empty(&range());
        assert!(series.set(NaiveDate::from_ymd_opt(2000, 1, 2).unwrap(), 7));
        assert!(!series.set(NaiveDate::from_ymd_opt(2000, 1, 4).unwrap(), 7));

        assert_eq!(
            serde_json::to_value(&series).unwrap(),
            json!({"2000-01-01": null, "2000-01-02": 7, "2000-01-03": null})
        );
    }

    #[test]
    fn outcome_status_follows_counts() {
        let ok = EntityResult::Success(DenseSeries::empty(&range()));

        let all_good = BatchOutcome::new(vec![(PageTitle::normalize("A"), ok.clone())]);
        assert_eq!(all_good.status(), Status::Good);

        let partial = BatchOutcome::new(vec![
            (PageTitle::normalize("A"), ok.clone()),
            (PageTitle::normalize("B"), failure()),
        ]);
        assert_eq!(partial.status(), Status::Degraded);
        assert!(partial.status().is_ok());
        assert_eq!(partial.messages().len(), 1);

        let none = BatchOutcome::new(vec![
            (PageTitle::normalize("A"), failure()),
            (PageTitle::normalize("B"), failure()),
        ]);
        assert_eq!(none.status(), Status::Fatal);
        assert_eq!(none.success_count() + none.fail_count(), 2);

        assert_eq!(BatchOutcome::default().status(), Status::Good);
    }

    #[test]
    fn outcome_serializes_success_map_and_values() {
        let outcome = BatchOutcome::new(vec![
            (PageTitle::normalize("A"), EntityResult::Success(DenseSeries::empty(&range()))),
            (PageTitle::normalize("C"), failure()),
        ]);
        let body = serde_json::to_value(&outcome).unwrap();

        assert_eq!(body["status"], "degraded");
        assert_eq!(body["success"], json!({"A": true, "C": false}));
        assert!(body["values"].get("A").is_some());
        assert!(body["values"].get("C").is_none());
    }

    #[test]
    fn outcome_maps_keep_request_order() {
        let outcome = BatchOutcome::new(vec![
            (PageTitle::normalize("Zed"), failure()),
            (PageTitle::normalize("Alpha"), EntityResult::Success(DenseSeries::empty(&range()))),
        ]);
        assert_eq!(
            serde_json::to_string(&outcome.success()).unwrap(),
            r#"{"Zed":false,"Alpha":true}"#
        );
        let keys: Vec<_> = outcome.values().keys().map(|t| t.as_str()).collect();
        assert_eq!(keys, vec!["Alpha"]);
    }

    #[test]
    fn metric_names_round_trip_through_query_strings() {
        let metric: Metric = serde_json::from_str("\"unique\"").unwrap();
        assert_eq!(metric, Metric::UniquePageviews);
        assert_eq!(metric.expression(), "ga:uniquePageviews");
        assert_eq!(Metric::default(), Metric::Pageviews);
    }
}
