//! Daily download, burn and composite loop.
//!
//! Every date is handled on its own: the archives of the tiles available
//! that day are fetched into the scratch directory, extracted, burned onto
//! the template grid and summed, then the sum is masked to the boundary and
//! written as `day/inun_{YYYYMMDD}.tif`. The scratch directory is wiped
//! before and after each date. A date whose output already exists is skipped,
//! which makes an interrupted run resumable by running it again.

use std::{
    collections::BTreeMap,
    fmt, fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use geo::MultiPolygon;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    availability::AvailabilityTable,
    cli::create_progress_bar,
    config::Layout,
    download::{
        clear_directory, download_if_missing, extract_zip, files_with_extension, partial_path,
        DownloadOutcome, DownloadTally, ExtractOutcome, Fetch,
    },
    error::LayerCountError,
    raster::{crop_and_mask, write_raster, CountAccumulator, GridSpec, SampleType},
    tile::{julian_code, TileCode},
    vector::read_features,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Where a date is in its processing.
pub enum DayStage {
    Pending,
    Fetching,
    Extracting,
    Rasterizing,
    Masking,
    Cleanup,
    Done,
}

impl fmt::Display for DayStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DayStage::Pending => "pending",
            DayStage::Fetching => "fetching",
            DayStage::Extracting => "extracting",
            DayStage::Rasterizing => "rasterizing",
            DayStage::Masking => "masking",
            DayStage::Cleanup => "cleaning up",
            DayStage::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A recoverable problem: the date is still composited without the file.
pub enum Warning {
    DownloadFailed {
        tile: TileCode,
        url: String,
        reason: String,
    },
    CorruptArchive {
        archive: String,
        reason: String,
    },
    EmptyLayer {
        layer: String,
    },
    UnreadableLayer {
        layer: String,
        reason: String,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::DownloadFailed { tile, url, reason } => {
                write!(f, "tile {} not downloaded from {}: {}", tile, url, reason)
            }
            Warning::CorruptArchive { archive, reason } => {
                write!(f, "{} is not a readable zip archive: {}", archive, reason)
            }
            Warning::EmptyLayer { layer } => write!(f, "{} has no features", layer),
            Warning::UnreadableLayer { layer, reason } => {
                write!(f, "{} cannot be read: {}", layer, reason)
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
/// Number of non-empty layers burned per tile on one date. Saved next to
/// each daily raster as `inun_{YYYYMMDD}.layers.yaml`.
pub struct LayerCounts(BTreeMap<TileCode, usize>);

impl LayerCounts {
    pub fn add(&mut self, tile: &TileCode) {
        *self.0.entry(tile.clone()).or_insert(0) += 1;
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TileCode, usize)> {
        self.0.iter().map(|(tile, &count)| (tile, count))
    }

    pub fn save(&self, path: &Path) -> Result<(), LayerCountError> {
        let text = serde_yaml::to_string(self).map_err(|source| LayerCountError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;

        let io = |source| LayerCountError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io)?;
        }
        let partial = partial_path(path);
        fs::write(&partial, text).map_err(io)?;
        fs::rename(&partial, path).map_err(io)
    }

    pub fn load(path: &Path) -> Result<Self, LayerCountError> {
        let text = fs::read_to_string(path).map_err(|source| LayerCountError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&text).map_err(|source| LayerCountError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DayOutcome {
    /// The output existed before the run.
    Skipped,
    /// The output was written from these non-empty shapefiles.
    Written { layers: LayerCounts },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayReport {
    pub date: NaiveDate,
    pub outcome: DayOutcome,
    pub tally: DownloadTally,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub days: usize,
    pub skipped: usize,
    pub written: usize,
    pub layers: usize,
    pub downloaded: usize,
    pub warnings: Vec<(NaiveDate, Warning)>,
}

impl RunSummary {
    fn record(&mut self, report: DayReport) {
        self.days += 1;
        self.downloaded += report.tally.downloaded;
        match report.outcome {
            DayOutcome::Skipped => self.skipped += 1,
            DayOutcome::Written { layers } => {
                self.written += 1;
                self.layers += layers.total();
            }
        }
        self.warnings
            .extend(report.warnings.into_iter().map(|w| (report.date, w)));
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} days: {} written ({} archives downloaded, {} layers burned), {} already present, {} warnings",
            self.days,
            self.written,
            self.downloaded,
            self.layers,
            self.skipped,
            self.warnings.len()
        )
    }
}

/// Runs the daily loop for one region.
pub struct Compositor<'a, F: Fetch + ?Sized> {
    fetcher: &'a F,
    daily_url: &'a str,
    layout: &'a Layout,
    template: GridSpec,
    boundary: MultiPolygon<f64>,
    nodata: i32,
}

impl<'a, F: Fetch + ?Sized> Compositor<'a, F> {
    pub fn new(
        fetcher: &'a F,
        daily_url: &'a str,
        layout: &'a Layout,
        template: GridSpec,
        boundary: MultiPolygon<f64>,
        nodata: i32,
    ) -> Self {
        Compositor {
            fetcher,
            daily_url,
            layout,
            template,
            boundary,
            nodata,
        }
    }

    /// Processes every date of `table` with at least one available tile.
    pub async fn run(&self, table: AvailabilityTable) -> Result<RunSummary> {
        let table = table.without_empty_days();
        if table.is_empty() {
            info!("No dates with daily archives to process");
            return Ok(RunSummary::default());
        }
        info!(
            "Compositing {} dates below {}",
            table.len(),
            self.layout.root().display()
        );

        let day_dir = self.layout.day_dir();
        fs::create_dir_all(&day_dir)
            .with_context(|| format!("cannot create {}", day_dir.display()))?;
        clear_directory(&self.layout.temp_dir())?;

        let pb = create_progress_bar(table.len() as u64, "Compositing daily inundation".to_string());
        let mut summary = RunSummary::default();

        for date in table.dates() {
            let tiles = table.available_tiles(date);
            let report = self.process_day(date, &tiles).await?;
            summary.record(report);
            pb.inc(1);
        }

        pb.finish_with_message("Daily composites complete");
        info!("{}", summary);

        Ok(summary)
    }

    /// Processes one date. Scratch is cleared before fetching and after
    /// processing, whether or not processing succeeded.
    pub async fn process_day(&self, date: NaiveDate, tiles: &[&TileCode]) -> Result<DayReport> {
        let output = self.layout.day_raster(date);

        if output.exists() {
            debug!("{} exists, skipping {}", output.display(), date);
            return Ok(DayReport {
                date,
                outcome: DayOutcome::Skipped,
                tally: DownloadTally::default(),
                warnings: Vec::new(),
            });
        }

        let scratch = self.layout.temp_dir();
        clear_directory(&scratch).with_context(|| stage_context(date, DayStage::Pending))?;

        let result = self.composite(date, tiles, &scratch, &output).await;
        let cleared = clear_directory(&scratch).with_context(|| stage_context(date, DayStage::Cleanup));

        let report = result?;
        cleared?;
        debug!("{} {}", date, DayStage::Done);

        Ok(report)
    }

    async fn composite(
        &self,
        date: NaiveDate,
        tiles: &[&TileCode],
        scratch: &Path,
        output: &Path,
    ) -> Result<DayReport> {
        let mut warnings = Vec::new();

        debug!("{} {}", date, DayStage::Fetching);
        let mut tally = DownloadTally::default();
        let mut archives: Vec<(&TileCode, PathBuf)> = Vec::with_capacity(tiles.len());
        let code = julian_code(date);
        for tile in tiles {
            let name = format!("{}_{}.zip", code, tile);
            let url = format!("{}/{}/{}", self.daily_url.trim_end_matches('/'), tile, name);
            let archive = scratch.join(&name);

            let outcome = download_if_missing(self.fetcher, &url, &archive)
                .await
                .with_context(|| stage_context(date, DayStage::Fetching))?;
            tally.record(&outcome);

            match outcome {
                DownloadOutcome::Failed { reason } => warnings.push(Warning::DownloadFailed {
                    tile: (*tile).clone(),
                    url,
                    reason,
                }),
                _ => archives.push((*tile, archive)),
            }
        }
        info!("{}: {}", date, tally);

        // Each archive is extracted into a directory named by its tile, so
        // every layer can be credited to the tile it came from.
        debug!("{} {}", date, DayStage::Extracting);
        for (tile, archive) in &archives {
            let tile_dir = scratch.join(tile.as_str());
            fs::create_dir_all(&tile_dir)
                .with_context(|| stage_context(date, DayStage::Extracting))?;
            let outcome = extract_zip(archive, &tile_dir)
                .with_context(|| stage_context(date, DayStage::Extracting))?;
            if let ExtractOutcome::Skipped { reason } = outcome {
                warnings.push(Warning::CorruptArchive {
                    archive: display_name(archive),
                    reason,
                });
            }
        }

        debug!("{} {}", date, DayStage::Rasterizing);
        let mut counts = CountAccumulator::new(self.template.clone());
        let mut layers = LayerCounts::default();
        for (tile, _) in &archives {
            let shapefiles = files_with_extension(&scratch.join(tile.as_str()), "shp")
                .with_context(|| stage_context(date, DayStage::Rasterizing))?;
            for layer in shapefiles {
                match read_features(&layer) {
                    Ok(features) if features.is_empty() => warnings.push(Warning::EmptyLayer {
                        layer: display_name(&layer),
                    }),
                    Ok(features) => {
                        counts.add_layer(&features);
                        layers.add(tile);
                        info!("{} is burned.", display_name(&layer));
                    }
                    Err(e) => warnings.push(Warning::UnreadableLayer {
                        layer: display_name(&layer),
                        reason: e.to_string(),
                    }),
                }
            }
        }

        debug!("{} {}", date, DayStage::Masking);
        let masked = crop_and_mask(&counts.into_raster(None), &self.boundary, self.nodata)
            .with_context(|| stage_context(date, DayStage::Masking))?;

        // The counts go first: a daily raster never exists without them.
        let layers_path = self.layout.day_layers(date);
        layers
            .save(&layers_path)
            .with_context(|| format!("cannot write {}", layers_path.display()))?;
        write_raster(output, &masked, SampleType::Int16)
            .with_context(|| format!("cannot write {}", output.display()))?;
        info!("{} is saved.", output.display());

        for warning in &warnings {
            warn!("{}: {}", date, warning);
        }

        Ok(DayReport {
            date,
            outcome: DayOutcome::Written { layers },
            tally,
            warnings,
        })
    }
}

fn stage_context(date: NaiveDate, stage: DayStage) -> String {
    format!("{} failed while {}", date, stage)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// -- Tests -------------------------------------------------------------------
