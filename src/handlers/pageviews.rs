use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::aggregators::{BatchOutcome, DenseSeries, Metric, Report, Status, TopPages};
use crate::errors::PageViewError;
use crate::title::PageTitle;
use crate::AppState;

const DEFAULT_DAYS: i64 = 30;

fn default_days() -> i64 {
    DEFAULT_DAYS
}

#[derive(Debug, Deserialize)]
pub struct PageDataParams {
    /// Pipe-separated titles, e.g. `Main_Page|Foo`.
    pub titles: String,
    #[serde(default = "default_days")]
    pub days: i64,
    #[serde(default)]
    pub metric: Metric,
}

#[derive(Debug, Deserialize)]
pub struct SiteDataParams {
    #[serde(default = "default_days")]
    pub days: i64,
    #[serde(default)]
    pub metric: Metric,
}

#[derive(Debug, Deserialize)]
pub struct TopPagesParams {
    pub limit: Option<usize>,
}

fn http_status(status: Status) -> StatusCode {
    match status {
        Status::Good | Status::Degraded => StatusCode::OK,
        Status::Fatal => StatusCode::BAD_GATEWAY,
    }
}

pub fn parse_titles(raw: &str) -> Vec<PageTitle> {
    raw.split('|')
        .map(PageTitle::normalize)
        .filter(|title| !title.is_empty())
        .collect()
}

pub async fn get_page_data(
    State(state): State<AppState>,
    Query(params): Query<PageDataParams>,
) -> Result<(StatusCode, Json<BatchOutcome>), PageViewError> {
    let titles = parse_titles(&params.titles);
    if titles.is_empty() {
        return Err(PageViewError::InvalidArgument(
            "at least one title is required".to_string(),
        ));
    }

    let outcome = state
        .service
        .get_page_data(&titles, params.days, params.metric)
        .await?;
    Ok((http_status(outcome.status()), Json(outcome)))
}

pub async fn get_site_data(
    State(state): State<AppState>,
    Query(params): Query<SiteDataParams>,
) -> Result<(StatusCode, Json<Report<DenseSeries>>), PageViewError> {
    let report = state
        .service
        .get_site_data(params.days, params.metric)
        .await?;
    Ok((http_status(report.status), Json(report)))
}

pub async fn get_top_pages(
    State(state): State<AppState>,
    Query(params): Query<TopPagesParams>,
) -> Result<(StatusCode, Json<Report<TopPages>>), PageViewError> {
    let report = state.service.get_top_pages(params.limit).await?;
    Ok((http_status(report.status), Json(report)))
}
