//! Region configuration and the on-disk layout derived from it.

use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::Deserialize;

use crate::{error::ConfigError, tile::TileCode};

pub const DAILY_URL: &str = "https://csdms.colorado.edu/pub/flood_observatory/MODISlance";
pub const CURRENT_URL: &str = "https://csdms.colorado.edu/pub/flood_observatory/MODISlance_2wkpro";
pub const NODATA: i16 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
/// Regions with a known tile set.
pub enum Preset {
    Peru,
    Bangladesh,
}

impl Preset {
    pub fn name(&self) -> &'static str {
        match self {
            Preset::Peru => "per",
            Preset::Bangladesh => "bgd",
        }
    }

    pub fn tiles(&self) -> Vec<TileCode> {
        let codes: &[&str] = match self {
            Preset::Peru => &["090w000s", "080w000s", "070w000s", "080w010s", "070w010s"],
            Preset::Bangladesh => &["080e030n", "090e030n"],
        };

        codes
            .iter()
            .filter_map(|code| code.parse().ok())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
/// Everything a run needs to know about one area of interest.
pub struct RegionConfig {
    pub name: String,
    pub tiles: Vec<TileCode>,
    pub boundary: Option<PathBuf>,
    pub save_dir: Option<PathBuf>,
    #[serde(default = "default_daily_url")]
    pub daily_url: String,
    #[serde(default = "default_current_url")]
    pub current_url: String,
    #[serde(default = "default_nodata")]
    pub nodata: i16,
}

fn default_daily_url() -> String {
    DAILY_URL.to_string()
}

fn default_current_url() -> String {
    CURRENT_URL.to_string()
}

fn default_nodata() -> i16 {
    NODATA
}

impl RegionConfig {
    pub fn from_preset(preset: Preset) -> Self {
        RegionConfig {
            name: preset.name().to_string(),
            tiles: preset.tiles(),
            boundary: None,
            save_dir: None,
            daily_url: default_daily_url(),
            current_url: default_current_url(),
            nodata: NODATA,
        }
    }

    pub fn from_yaml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text, path)
    }
}

#[derive(Debug, Clone, Default)]
/// Values given on the command line; they win over the config file.
pub struct Overrides {
    pub boundary: Option<PathBuf>,
    pub save_dir: Option<PathBuf>,
    pub tiles: Option<Vec<TileCode>>,
    pub nodata: Option<i16>,
}

#[derive(Debug, Clone, PartialEq)]
/// A fully resolved configuration.
pub struct Settings {
    pub name: String,
    pub tiles: Vec<TileCode>,
    pub boundary: PathBuf,
    pub daily_url: String,
    pub current_url: String,
    pub nodata: i16,
    pub layout: Layout,
}

impl Settings {
    /// Resolves the config file, else the preset, then applies `overrides`.
    pub fn resolve(
        config: Option<&Path>,
        preset: Option<Preset>,
        overrides: Overrides,
    ) -> Result<Self, ConfigError> {
        let region = match (config, preset) {
            (Some(path), _) => RegionConfig::load(path)?,
            (None, Some(preset)) => RegionConfig::from_preset(preset),
            (None, None) => return Err(ConfigError::NoRegion),
        };

        Self::from_region(region, overrides, dirs::home_dir())
    }

    pub fn from_region(
        region: RegionConfig,
        overrides: Overrides,
        home: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let tiles = overrides.tiles.unwrap_or(region.tiles);
        if tiles.is_empty() {
            return Err(ConfigError::NoTiles);
        }

        let boundary = overrides
            .boundary
            .or(region.boundary)
            .ok_or(ConfigError::NoBoundary)?;

        let save_dir = match overrides.save_dir.or(region.save_dir) {
            Some(dir) => dir,
            None => home
                .ok_or(ConfigError::NoHome)?
                .join("inundation")
                .join(&region.name),
        };

        Ok(Settings {
            name: region.name,
            tiles,
            boundary,
            daily_url: region.daily_url,
            current_url: region.current_url,
            nodata: overrides.nodata.unwrap_or(region.nodata),
            layout: Layout::new(save_dir),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Paths below the save directory.
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: PathBuf) -> Self {
        Layout { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn day_dir(&self) -> PathBuf {
        self.root.join("day")
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.root.join("temp")
    }

    pub fn current_dir(&self) -> PathBuf {
        self.root.join("current")
    }

    pub fn current_mosaic(&self) -> PathBuf {
        self.root.join("current_mosaic.tif")
    }

    pub fn month_dir(&self) -> PathBuf {
        self.root.join("month")
    }

    pub fn year_dir(&self) -> PathBuf {
        self.root.join("year")
    }

    pub fn availability(&self) -> PathBuf {
        self.root.join("availability.parquet")
    }

    /// `day/inun_{YYYYMMDD}.tif`
    pub fn day_raster(&self, date: NaiveDate) -> PathBuf {
        self.day_dir()
            .join(format!("inun_{}.tif", date.format("%Y%m%d")))
    }

    /// `day/inun_{YYYYMMDD}.layers.yaml`, the layer counts of a daily raster.
    pub fn day_layers(&self, date: NaiveDate) -> PathBuf {
        self.day_dir()
            .join(format!("inun_{}.layers.yaml", date.format("%Y%m%d")))
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_yaml_with_defaults() {
        let yaml = "
name: bgd
tiles: [080e030n, 090e030n]
boundary: /data/bgd/gadm36_BGD_0.shp
";
        let region = RegionConfig::from_yaml(yaml, Path::new("bgd.yaml")).unwrap();

        assert_eq!(region.tiles.len(), 2);
        assert_eq!(region.daily_url, DAILY_URL);
        assert_eq!(region.nodata, NODATA);
        assert_eq!(region.save_dir, None);
    }

    #[test]
    fn should_reject_bad_tiles_and_unknown_keys() {
        let bad_tile = "name: x\ntiles: [nowhere]\n";
        assert!(RegionConfig::from_yaml(bad_tile, Path::new("x.yaml")).is_err());

        let unknown = "name: x\ntiles: [080e030n]\ncolour: blue\n";
        assert!(RegionConfig::from_yaml(unknown, Path::new("x.yaml")).is_err());
    }

    #[test]
    fn should_reproduce_preset_tile_lists() {
        assert_eq!(Preset::Peru.tiles().len(), 5);
        assert_eq!(
            Preset::Bangladesh.tiles(),
            vec!["080e030n".parse::<TileCode>().unwrap(), "090e030n".parse::<TileCode>().unwrap()]
        );
    }

    #[test]
    fn should_apply_overrides_and_default_save_dir() {
        let region = RegionConfig::from_preset(Preset::Bangladesh);
        let overrides = Overrides {
            boundary: Some(PathBuf::from("/b.shp")),
            nodata: Some(-9999),
            ..Default::default()
        };

        let settings =
            Settings::from_region(region, overrides, Some(PathBuf::from("/home/u"))).unwrap();

        assert_eq!(settings.boundary, PathBuf::from("/b.shp"));
        assert_eq!(settings.nodata, -9999);
        assert_eq!(settings.layout.root(), Path::new("/home/u/inundation/bgd"));
    }

    #[test]
    fn should_require_boundary() {
        let region = RegionConfig::from_preset(Preset::Peru);
        let err = Settings::from_region(region, Overrides::default(), None).unwrap_err();

        assert!(matches!(err, ConfigError::NoBoundary));
    }

    #[test]
    fn should_name_day_rasters_by_calendar_date() {
        let layout = Layout::new(PathBuf::from("/s"));
        let date = NaiveDate::from_ymd_opt(2019, 1, 1).unwrap();

        assert_eq!(layout.day_raster(date), PathBuf::from("/s/day/inun_20190101.tif"));
        assert_eq!(
            layout.day_layers(date),
            PathBuf::from("/s/day/inun_20190101.layers.yaml")
        );
        assert_eq!(layout.temp_dir(), PathBuf::from("/s/temp"));
    }
}
