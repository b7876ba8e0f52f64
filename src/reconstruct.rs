use chrono::NaiveDate;
use tracing::debug;

use crate::aggregators::{DenseSeries, RawRow, TopPages};
use crate::date_range::DateRange;
use crate::errors::PageViewError;
use crate::title::PageTitle;

const SITE_NAME_DELIMITER: &str = " - ";

fn parse_day(key: &str) -> Result<NaiveDate, PageViewError> {
    if key.len() != 8 || !key.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PageViewError::ContractViolation(format!(
            "expected a YYYYMMDD date dimension, got {:?}",
            key
        )));
    }
    NaiveDate::parse_from_str(key, "%Y%m%d").map_err(|e| {
        PageViewError::ContractViolation(format!("invalid date dimension {:?}: {}", key, e))
    })
}

fn parse_count(value: &str) -> Result<i64, PageViewError> {
    value.trim().parse::<i64>().map_err(|_| {
        PageViewError::ContractViolation(format!("expected an integer metric value, got {:?}", value))
    })
}

/// Expands sparse per-day rows into a series with one entry per day of
/// `range`. Rows dated outside the range are dropped; an unreadable row fails
/// the whole batch.
pub fn densify(rows: &[RawRow], range: &DateRange) -> Result<DenseSeries, PageViewError> {
    let mut series = DenseSeries::empty(range);

    for row in rows {
        let day = parse_day(&row.dimension_key)?;
        if !range.contains(day) {
            debug!(
                "Ignoring row for {} outside {}..{}",
                day, range.start, range.end
            );
            continue;
        }
        let count = parse_count(&row.metric_value)?;
        series.set(day, count);
    }

    Ok(series)
}

/// Strips the trailing `" - <site_name>"` from a page-title dimension.
pub fn strip_site_name<'a>(key: &'a str, site_name: &str) -> &'a str {
    let suffix_start = match key.rfind(SITE_NAME_DELIMITER) {
        Some(idx) => idx,
        None => return key,
    };
    if &key[suffix_start + SITE_NAME_DELIMITER.len()..] == site_name {
        &key[..suffix_start]
    } else {
        key
    }
}

/// Reads ranked page-title rows into a title → count mapping, keeping the
/// backend's order and at most `limit` entries.
pub fn top_pages(rows: &[RawRow], site_name: &str, limit: usize) -> Result<TopPages, PageViewError> {
    let mut pages = TopPages::new();

    for row in rows {
        if pages.len() >= limit {
            break;
        }
        let title = PageTitle::normalize(strip_site_name(&row.dimension_key, site_name));
        let count = parse_count(&row.metric_value)?;
        // the backend may report the same page under differently encoded
        // titles; keep the first, highest ranked one
        pages.entry(title).or_insert(count);
    }

    Ok(pages)
}
