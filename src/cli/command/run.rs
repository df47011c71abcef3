use anyhow::Result;
use chrono::NaiveDate;

use crate::{composite::RunSummary, config::Settings, download::Fetch};

use super::{current, daily};

/// Rebuilds the template, then composites the daily rasters.
pub async fn run<F: Fetch + ?Sized>(
    settings: &Settings,
    fetcher: &F,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<(RunSummary, String)> {
    current(settings, fetcher).await?;
    daily(settings, fetcher, from, to).await
}
