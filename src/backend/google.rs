use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::credentials::{ServiceAccountAuth, ServiceAccountKey};
use super::ReportingBackend;
use crate::aggregators::RawRow;
use crate::errors::{BackendError, PageViewError};
use crate::query::ReportRequest;

pub const REPORTING_ENDPOINT: &str = "https://analyticsreporting.googleapis.com/v4/reports:batchGet";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchGetRequest<'a> {
    report_requests: Vec<ReportRequestBody<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportRequestBody<'a> {
    view_id: &'a str,
    date_ranges: Vec<DateRangeBody>,
    metrics: Vec<MetricBody>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    dimensions: Vec<DimensionBody>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    dimension_filter_clauses: Vec<FilterClauseBody>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    order_bys: Vec<OrderByBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    page_size: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DateRangeBody {
    start_date: String,
    end_date: String,
}

#[derive(Debug, Serialize)]
struct MetricBody {
    expression: &'static str,
}

#[derive(Debug, Serialize)]
struct DimensionBody {
    name: &'static str,
}

#[derive(Debug, Serialize)]
struct FilterClauseBody {
    filters: Vec<FilterBody>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FilterBody {
    dimension_name: &'static str,
    operator: &'static str,
    expressions: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderByBody {
    field_name: &'static str,
    sort_order: &'static str,
}

#[derive(Debug, Deserialize)]
struct BatchGetResponse {
    #[serde(default)]
    reports: Vec<ReportBody>,
}

#[derive(Debug, Deserialize)]
struct ReportBody {
    data: ReportData,
}

#[derive(Debug, Deserialize)]
struct ReportData {
    #[serde(default)]
    rows: Vec<ReportRow>,
}

#[derive(Debug, Deserialize)]
struct ReportRow {
    #[serde(default)]
    dimensions: Vec<String>,
    #[serde(default)]
    metrics: Vec<DateRangeValues>,
}

#[derive(Debug, Deserialize)]
struct DateRangeValues {
    #[serde(default)]
    values: Vec<String>,
}

impl TryFrom<ReportRow> for RawRow {
    type Error = BackendError;

    fn try_from(row: ReportRow) -> Result<Self, Self::Error> {
        let dimension_key = row
            .dimensions
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::MalformedResponse("row without dimensions".into()))?;
        let metric_value = row
            .metrics
            .into_iter()
            .next()
            .and_then(|m| m.values.into_iter().next())
            .ok_or_else(|| BackendError::MalformedResponse("row without metric values".into()))?;
        Ok(RawRow {
            dimension_key,
            metric_value,
        })
    }
}

/// Google Analytics Reporting API v4 client for a single view.
pub struct GoogleReportingBackend {
    http: reqwest::Client,
    endpoint: String,
    view_id: String,
    auth: Option<ServiceAccountAuth>,
}

impl GoogleReportingBackend {
    pub fn new(
        view_id: impl Into<String>,
        key: Option<ServiceAccountKey>,
        timeout: Duration,
    ) -> Result<Self, PageViewError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                PageViewError::InvalidConfiguration(format!("cannot build HTTP client: {}", e))
            })?;
        let auth = key.map(|key| ServiceAccountAuth::new(key, http.clone()));

        Ok(Self {
            http,
            endpoint: REPORTING_ENDPOINT.to_string(),
            view_id: view_id.into(),
            auth,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn request_body<'a>(&'a self, request: &ReportRequest) -> BatchGetRequest<'a> {
        let report = ReportRequestBody {
            view_id: &self.view_id,
            date_ranges: vec![DateRangeBody {
                start_date: request.date_range.start_str(),
                end_date: request.date_range.end_str(),
            }],
            metrics: vec![MetricBody {
                expression: request.metric.expression(),
            }],
            dimensions: request
                .dimension
                .iter()
                .map(|d| DimensionBody { name: d.name() })
                .collect(),
            dimension_filter_clauses: request
                .filter
                .iter()
                .map(|f| FilterClauseBody {
                    filters: vec![FilterBody {
                        dimension_name: f.dimension,
                        operator: "EXACT",
                        expressions: vec![f.expression.clone()],
                    }],
                })
                .collect(),
            order_bys: request
                .order
                .iter()
                .map(|o| OrderByBody {
                    field_name: o.metric.expression(),
                    sort_order: if o.descending {
                        "DESCENDING"
                    } else {
                        "ASCENDING"
                    },
                })
                .collect(),
            page_size: request.page_size,
        };

        BatchGetRequest {
            report_requests: vec![report],
        }
    }
}

fn classify_status(status: StatusCode, body: String) -> BackendError {
    let message = format!("reporting API returned {}: {}", status, body);
    match status {
        StatusCode::TOO_MANY_REQUESTS => BackendError::Quota(message),
        StatusCode::FORBIDDEN if body.contains("RESOURCE_EXHAUSTED") || body.contains("quota") => {
            BackendError::Quota(message)
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::Auth(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => BackendError::Timeout(message),
        _ => BackendError::Transport(message),
    }
}

fn transport_error(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout(e.to_string())
    } else {
        BackendError::Transport(e.to_string())
    }
}

#[async_trait]
impl ReportingBackend for GoogleReportingBackend {
    async fn execute(&self, request: &ReportRequest) -> Result<Vec<RawRow>, BackendError> {
        let body = self.request_body(request);
        let mut builder = self.http.post(&self.endpoint).json(&body);
        if let Some(auth) = &self.auth {
            builder = builder.bearer_auth(auth.access_token().await?);
        }

        debug!(
            "Querying {} for {:?} {}..{}",
            request.metric.expression(),
            request.filter.as_ref().map(|f| f.expression.as_str()),
            request.date_range.start,
            request.date_range.end
        );

        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let text = response.text().await.map_err(transport_error)?;
        let parsed: BatchGetResponse = serde_json::from_str(&text)
            .map_err(|e| BackendError::MalformedResponse(format!("unreadable response: {}", e)))?;

        let report = parsed
            .reports
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::MalformedResponse("response has no reports".into()))?;

        report
            .data
            .rows
            .into_iter()
            .map(RawRow::try_from)
            .collect()
    }
}
