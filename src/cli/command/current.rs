use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use log::{info, warn};

use crate::{
    cli::{create_progress_bar, create_spinner},
    config::Settings,
    download::{download_if_missing, files_with_extension, DownloadOutcome, DownloadTally, Fetch},
    listing::{geotiff_names, list_tile, tile_url},
    raster::{crop_and_mask, mosaic, read_raster, write_raster, Raster, SampleType},
};

use super::load_boundary;

/// Downloads the current two-week GeoTIFFs of every tile, mosaics them and
/// masks the mosaic to the boundary. The result is the template grid of the
/// daily rasters.
pub async fn current<F: Fetch + ?Sized>(settings: &Settings, fetcher: &F) -> Result<String> {
    let layout = &settings.layout;
    let current_dir = layout.current_dir();
    fs::create_dir_all(&current_dir)
        .with_context(|| format!("cannot create {}", current_dir.display()))?;

    let mut tally = DownloadTally::default();
    for tile in &settings.tiles {
        let links = list_tile(fetcher, &settings.current_url, tile)
            .await
            .with_context(|| format!("cannot list current products of {}", tile))?;

        for name in geotiff_names(&links) {
            let stem = Path::new(&name)
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| name.clone());
            let url = format!("{}{}", tile_url(&settings.current_url, tile), name);
            let dest = current_dir.join(format!("{}_{}.tif", stem, tile));

            let outcome = download_if_missing(fetcher, &url, &dest).await?;
            tally.record(&outcome);
            if let DownloadOutcome::Failed { reason } = outcome {
                warn!("{} not downloaded: {}", url, reason);
            }
        }
    }
    info!("{}", tally);

    let files = files_with_extension(&current_dir, "tif")?;
    if files.is_empty() {
        bail!("no current GeoTIFFs in {}", current_dir.display());
    }

    let pb = create_progress_bar(files.len() as u64, "Reading current products".to_string());
    let mut rasters: Vec<Raster> = Vec::with_capacity(files.len());
    for file in &files {
        rasters.push(read_raster(file).with_context(|| format!("cannot read {}", file.display()))?);
        pb.inc(1);
    }
    pb.finish_with_message("Current products read");

    let bar = create_spinner("Mosaicking and masking...".to_string());
    let merged = mosaic(&rasters).context("cannot mosaic current products")?;
    let boundary = load_boundary(settings)?;
    let masked = crop_and_mask(&merged, &boundary, settings.nodata.into())?;

    let file_path = layout.current_mosaic();
    write_raster(&file_path, &masked, SampleType::Int16)?;
    bar.finish_with_message("Template saved");
    info!("{} is saved.", file_path.display());

    Ok(file_path.to_string_lossy().to_string())
}

// -- Tests -------------------------------------------------------------------
