use pageview_service::middleware::BasicCredentials;
use pageview_service::{router, AppState, PageViewService, ServiceConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting page view service...");

    let config = ServiceConfig::from_env()?;
    let service = PageViewService::new(config)?;
    info!(
        "Reading analytics view {} for site {:?}",
        service.config().profile_id,
        service.config().site_name
    );

    let auth = if std::env::var("PAGEVIEWS_REQUIRE_AUTH").as_deref() == Ok("1") {
        let credentials = BasicCredentials::from_env().ok_or_else(|| {
            anyhow::anyhow!("DASHBOARD_USERNAME and DASHBOARD_PASSWORD must be set when PAGEVIEWS_REQUIRE_AUTH=1")
        })?;
        Some(credentials)
    } else {
        warn!("API endpoints are not protected by basic auth");
        None
    };

    let app = router(AppState {
        service: Arc::new(service),
        auth,
    });

    // Start server
    let addr: SocketAddr = std::env::var("PAGEVIEWS_LISTEN_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
        .parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
