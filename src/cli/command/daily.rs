use anyhow::{Context, Result};
use chrono::NaiveDate;

use crate::{
    cli::create_spinner,
    composite::{Compositor, RunSummary},
    config::Settings,
    download::Fetch,
    raster::read_grid,
};

use super::{availability, load_boundary};

/// Composites one raster per date between `from` and `to` (inclusive, both
/// optional) on the grid of `current_mosaic.tif`.
pub async fn daily<F: Fetch + ?Sized>(
    settings: &Settings,
    fetcher: &F,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<(RunSummary, String)> {
    let layout = &settings.layout;

    let bar = create_spinner("Loading template and boundary...".to_string());
    let template_path = layout.current_mosaic();
    let template = read_grid(&template_path).with_context(|| {
        format!(
            "cannot read template {}; run the `current` command first",
            template_path.display()
        )
    })?;
    let boundary = load_boundary(settings)?;
    bar.finish_with_message("Template and boundary loaded");

    let (table, _) = availability(settings, fetcher).await?;
    let table = table.within(from, to);

    let nodata = settings.nodata.into();
    let compositor = Compositor::new(
        fetcher,
        &settings.daily_url,
        layout,
        template,
        boundary,
        nodata,
    );
    let summary = compositor.run(table).await?;

    Ok((summary, layout.day_dir().to_string_lossy().to_string()))
}

// -- Tests -------------------------------------------------------------------
