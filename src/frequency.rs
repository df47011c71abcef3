//! Monthly and annual inundation frequency from the daily rasters.
//!
//! A cell's frequency is the share of layers covering it that showed it
//! flooded. Layers come from the counts saved next to each daily raster.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::ValueEnum;
use geo::MultiPolygon;
use log::{info, warn};

use crate::{
    composite::LayerCounts,
    config::{Layout, NODATA},
    error::RasterError,
    raster::{burn_presence, read_raster, write_raster, GridSpec, Raster, SampleType},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Period {
    #[default]
    Monthly,
    Annual,
}

impl Period {
    fn key(&self, date: NaiveDate) -> String {
        match self {
            Period::Monthly => date.format("%Y%m").to_string(),
            Period::Annual => date.format("%Y").to_string(),
        }
    }

    fn output(&self, layout: &Layout, key: &str) -> PathBuf {
        let dir = match self {
            Period::Monthly => layout.month_dir(),
            Period::Annual => layout.year_dir(),
        };
        dir.join(format!("inun_{}.tif", key))
    }
}

/// Parses `inun_YYYYMMDD.tif`.
pub fn day_raster_date(path: &Path) -> Option<NaiveDate> {
    let name = path.file_name()?.to_str()?;
    let digits = name.strip_prefix("inun_")?.strip_suffix(".tif")?;
    if digits.len() != 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(digits, "%Y%m%d").ok()
}

/// Daily rasters of `day_dir` grouped by period key, each group in date order.
pub fn group_day_rasters(
    day_dir: &Path,
    period: Period,
) -> Result<BTreeMap<String, Vec<(NaiveDate, PathBuf)>>, RasterError> {
    let mut days: Vec<(NaiveDate, PathBuf)> = Vec::new();
    if day_dir.is_dir() {
        for entry in fs::read_dir(day_dir)? {
            let path = entry?.path();
            if let Some(date) = day_raster_date(&path) {
                days.push((date, path));
            }
        }
    }
    days.sort();

    let mut groups: BTreeMap<String, Vec<(NaiveDate, PathBuf)>> = BTreeMap::new();
    for (date, path) in days {
        groups.entry(period.key(date)).or_default().push((date, path));
    }

    Ok(groups)
}

/// One daily raster with the number of layers that observed each cell.
pub struct ObservedDay {
    pub raster: Raster,
    pub observations: Vec<i32>,
}

/// Per cell, the number of layers burned that day by tiles whose footprint
/// covers the cell.
pub fn observation_counts(grid: &GridSpec, layers: &LayerCounts) -> Vec<i32> {
    let mut counts = vec![0; grid.len()];

    for (tile, count) in layers.iter() {
        let footprint = MultiPolygon::new(vec![tile.footprint().to_polygon()]);
        let covered = burn_presence(grid, &[footprint]);
        for (cell, inside) in counts.iter_mut().zip(covered) {
            if inside {
                *cell += count as i32;
            }
        }
    }

    counts
}

/// Percentage of observations each cell was inundated:
/// `sum * 100 / observations`, where the sum runs over the valid daily values
/// and the observations over the layers of the tiles covering the cell.
/// Cells never observed, or no-data on every day, are no-data.
pub fn frequency(days: &[ObservedDay]) -> Result<Raster, RasterError> {
    let first = &days.first().ok_or(RasterError::EmptyMosaic)?.raster;
    for day in &days[1..] {
        let grid = &day.raster.grid;
        if !grid.is_aligned_with(&first.grid) {
            return Err(RasterError::IncompatibleGrids(format!(
                "{}x{} grid differs from {}x{}",
                grid.width, grid.height, first.grid.width, first.grid.height
            )));
        }
    }

    let nodata = first.nodata.unwrap_or_else(|| NODATA.into());
    let mut sums = vec![0i64; first.grid.len()];
    let mut observed = vec![0i64; first.grid.len()];
    let mut valid = vec![false; first.grid.len()];

    for day in days {
        for (i, &value) in day.raster.data.iter().enumerate() {
            if !day.raster.is_nodata(value) {
                sums[i] += i64::from(value);
                valid[i] = true;
            }
        }
        for (total, &count) in observed.iter_mut().zip(&day.observations) {
            *total += i64::from(count);
        }
    }

    let data = sums
        .iter()
        .zip(&observed)
        .zip(&valid)
        .map(|((&sum, &observed), &valid)| match valid && observed > 0 {
            true => (sum * 100 / observed).clamp(i32::MIN.into(), i32::MAX.into()) as i32,
            false => nodata,
        })
        .collect();

    Ok(Raster {
        grid: first.grid.clone(),
        data,
        nodata: Some(nodata),
    })
}

/// Reads a daily raster with its layer counts. A raster written without
/// counts is taken as one observation of every cell.
fn read_observed_day(layout: &Layout, date: NaiveDate, path: &Path) -> Result<ObservedDay> {
    let raster = read_raster(path).with_context(|| format!("cannot read {}", path.display()))?;

    let layers_path = layout.day_layers(date);
    let observations = if layers_path.exists() {
        let layers = LayerCounts::load(&layers_path)?;
        observation_counts(&raster.grid, &layers)
    } else {
        warn!(
            "{} has no layer counts, counting one observation per cell",
            path.display()
        );
        vec![1; raster.grid.len()]
    };

    Ok(ObservedDay {
        raster,
        observations,
    })
}

/// Writes one frequency raster per group of daily rasters and returns the
/// written paths.
pub fn aggregate(layout: &Layout, period: Period) -> Result<Vec<PathBuf>> {
    let groups = group_day_rasters(&layout.day_dir(), period)?;
    let mut written = Vec::with_capacity(groups.len());

    for (key, dated) in groups {
        let days = dated
            .iter()
            .map(|(date, path)| read_observed_day(layout, *date, path))
            .collect::<Result<Vec<_>>>()?;
        let raster = frequency(&days).with_context(|| format!("cannot aggregate {}", key))?;

        let output = period.output(layout, &key);
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)?;
        }
        write_raster(&output, &raster, SampleType::Int32)
            .with_context(|| format!("cannot write {}", output.display()))?;
        info!("{} is saved from {} days.", output.display(), days.len());

        written.push(output);
    }

    Ok(written)
}

// -- Tests -------------------------------------------------------------------
