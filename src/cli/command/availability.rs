use anyhow::{Context, Result};
use log::info;

use crate::{
    availability::{fetch_availability, AvailabilityTable},
    cli::create_spinner,
    config::Settings,
    download::Fetch,
    parquet,
};

/// Lists every tile, saves the table to `availability.parquet` and returns
/// the table with the path written.
pub async fn availability<F: Fetch + ?Sized>(
    settings: &Settings,
    fetcher: &F,
) -> Result<(AvailabilityTable, String)> {
    let bar = create_spinner(format!(
        "Listing daily archives of {} tiles...",
        settings.tiles.len()
    ));
    let table = fetch_availability(fetcher, &settings.daily_url, &settings.tiles)
        .await
        .context("cannot build availability table")?;
    bar.finish_with_message("Daily archives listed");

    let with_data = table
        .dates()
        .filter(|date| table.available_count(*date) > 0)
        .count();
    match (table.dates().next(), table.dates().last()) {
        (Some(first), Some(last)) => info!(
            "{}: {} to {}, {} days, {} with at least one tile",
            settings.name,
            first,
            last,
            table.len(),
            with_data
        ),
        _ => info!("{}: no daily archives listed", settings.name),
    }

    let file_path = settings.layout.availability();
    parquet::save_availability(&table, &file_path)?;

    Ok((table, file_path.to_string_lossy().to_string()))
}

// -- Tests -------------------------------------------------------------------
