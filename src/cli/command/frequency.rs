use anyhow::{Context, Result};

use crate::{
    cli::create_spinner,
    config::Settings,
    frequency::{aggregate, Period},
};

/// Recomputes the frequency rasters of every month or year with daily
/// rasters.
pub fn frequency(settings: &Settings, period: Period) -> Result<(usize, String)> {
    let layout = &settings.layout;
    let bar = create_spinner(format!("Aggregating daily rasters ({:?})...", period));
    let written = aggregate(layout, period).context("cannot aggregate daily rasters")?;
    bar.finish_with_message(format!("{} frequency rasters written", written.len()));

    let dir = match period {
        Period::Monthly => layout.month_dir(),
        Period::Annual => layout.year_dir(),
    };

    Ok((written.len(), dir.to_string_lossy().to_string()))
}
