//! Error types for listing, downloading and raster processing.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by a [`crate::download::Fetch`] implementation.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level failure (DNS, connection, body stream).
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// No resource at the given URL (HTTP 404).
    #[error("{0} not found")]
    NotFound(String),

    /// Writing the body to disk failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fatal errors while downloading. Network failures are not errors, they are
/// reported as [`crate::download::DownloadOutcome::Failed`].
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("cannot create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors while reading a remote directory listing.
#[derive(Debug, Error)]
pub enum ListingError {
    #[error("failed to fetch listing {url}: {source}")]
    Fetch { url: String, source: FetchError },

    /// A data file name carries a 7-digit code that is not a valid `YYYYDDD`.
    #[error("malformed Julian date `{code}` in file name `{file}`")]
    MalformedDate { code: String, file: String },
}

/// Errors reading or writing rasters.
#[derive(Debug, Error)]
pub enum RasterError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    /// Missing or unusable georeferencing tags.
    #[error("invalid GeoTIFF {path}: {reason}")]
    InvalidGeoTiff { path: PathBuf, reason: String },

    /// Rasters that must share a grid do not.
    #[error("incompatible grids: {0}")]
    IncompatibleGrids(String),

    /// The mask boundary does not overlap the raster.
    #[error("boundary does not intersect the raster extent")]
    BoundaryOutsideGrid,

    #[error("nothing to mosaic")]
    EmptyMosaic,
}

/// Errors saving or loading the per-day layer counts.
#[derive(Debug, Error)]
pub enum LayerCountError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid layer counts {path}: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

/// Errors reading polygon shapefiles.
#[derive(Debug, Error)]
pub enum VectorError {
    #[error("cannot read shapefile {path}: {source}")]
    Shapefile {
        path: PathBuf,
        source: shapefile::Error,
    },

    #[error("shapefile {0} has no polygon features")]
    NoPolygons(PathBuf),
}

/// Errors resolving the region configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("invalid tile code `{0}` (expected e.g. 080e030n)")]
    InvalidTile(String),

    #[error("no region given: pass --config or --region")]
    NoRegion,

    #[error("no boundary shapefile given: set `boundary` or pass --boundary")]
    NoBoundary,

    #[error("no tiles configured")]
    NoTiles,

    #[error("home directory not found; pass --save-dir")]
    NoHome,
}
