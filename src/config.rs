use std::path::PathBuf;

use crate::date_range::MAX_DAYS;
use crate::errors::PageViewError;

pub const DEFAULT_ARTICLE_PATH: &str = "/w/$1";
pub const DEFAULT_TOP_PAGES_DAYS: i64 = 30;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Service account key file; `None` sends requests unauthenticated.
    pub credentials_file: Option<PathBuf>,
    /// Analytics view (profile) id.
    pub profile_id: String,
    /// Site name the backend appends to page titles.
    pub site_name: String,
    /// URL path pattern of wiki pages, `$1` standing for the title.
    pub article_path: String,
    pub top_pages_days: i64,
    /// Number of page batches in flight at once.
    pub concurrency: usize,
    pub request_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            credentials_file: None,
            profile_id: String::new(),
            site_name: String::new(),
            article_path: DEFAULT_ARTICLE_PATH.to_string(),
            top_pages_days: DEFAULT_TOP_PAGES_DAYS,
            concurrency: 1,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: Option<String>, default: T) -> Result<T, PageViewError> {
    match value {
        Some(raw) if !raw.trim().is_empty() => raw.trim().parse().map_err(|_| {
            PageViewError::InvalidConfiguration(format!("{} must be a number, got {:?}", key, raw))
        }),
        _ => Ok(default),
    }
}

impl ServiceConfig {
    pub fn new(
        profile_id: impl Into<String>,
        site_name: impl Into<String>,
        credentials_file: Option<PathBuf>,
    ) -> Self {
        Self {
            profile_id: profile_id.into(),
            site_name: site_name.into(),
            credentials_file,
            ..Self::default()
        }
    }

    pub fn from_env() -> Result<Self, PageViewError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, PageViewError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let credentials_file = lookup("PAGEVIEWS_CREDENTIALS_FILE")
            .filter(|path| !path.is_empty() && path != "false")
            .map(PathBuf::from);

        Ok(Self {
            credentials_file,
            profile_id: lookup("PAGEVIEWS_PROFILE_ID").unwrap_or_default(),
            site_name: lookup("PAGEVIEWS_SITE_NAME").unwrap_or_default(),
            article_path: lookup("PAGEVIEWS_ARTICLE_PATH")
                .filter(|path| !path.is_empty())
                .unwrap_or_else(|| DEFAULT_ARTICLE_PATH.to_string()),
            top_pages_days: parse_var(
                "PAGEVIEWS_TOP_PAGES_DAYS",
                lookup("PAGEVIEWS_TOP_PAGES_DAYS"),
                DEFAULT_TOP_PAGES_DAYS,
            )?,
            concurrency: parse_var("PAGEVIEWS_CONCURRENCY", lookup("PAGEVIEWS_CONCURRENCY"), 1)?,
            request_timeout_secs: parse_var(
                "PAGEVIEWS_REQUEST_TIMEOUT_SECS",
                lookup("PAGEVIEWS_REQUEST_TIMEOUT_SECS"),
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?,
        })
    }

    /// Checks everything that does not need the filesystem.
    pub fn validate(&self) -> Result<(), PageViewError> {
        if self.profile_id.trim().is_empty() {
            return Err(PageViewError::InvalidConfiguration(
                "profile id must not be empty".to_string(),
            ));
        }
        if self.site_name.trim().is_empty() {
            return Err(PageViewError::InvalidConfiguration(
                "site name must not be empty".to_string(),
            ));
        }
        if !self.article_path.contains("$1") {
            return Err(PageViewError::InvalidConfiguration(format!(
                "article path {:?} must contain $1",
                self.article_path
            )));
        }
        if !(1..=MAX_DAYS).contains(&self.top_pages_days) {
            return Err(PageViewError::InvalidConfiguration(format!(
                "top pages lookback must be between 1 and {} days, got {}",
                MAX_DAYS, self.top_pages_days
            )));
        }
        if self.concurrency == 0 {
            return Err(PageViewError::InvalidConfiguration(
                "concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
