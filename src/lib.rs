use axum::{middleware::from_fn_with_state, routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod aggregators;
pub mod backend;
pub mod config;
pub mod date_range;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod query;
pub mod reconstruct;
pub mod service;
pub mod title;

pub use aggregators::{BatchOutcome, DenseSeries, EntityResult, Metric, Report, Status, TopPages};
pub use config::ServiceConfig;
pub use errors::{BackendError, PageViewError};
pub use service::PageViewService;
pub use title::PageTitle;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PageViewService>,
    pub auth: Option<middleware::BasicCredentials>,
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/pageviews/pages", get(handlers::get_page_data))
        .route("/pageviews/site", get(handlers::get_site_data))
        .route("/pageviews/top", get(handlers::get_top_pages))
        .layer(from_fn_with_state(state.clone(), middleware::basic_auth));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
