pub mod availability;
pub mod current;
pub mod daily;
pub mod frequency;
pub mod run;

use anyhow::{Context, Result};
use geo::MultiPolygon;

pub use availability::availability;
pub use current::current;
pub use daily::daily;
pub use frequency::frequency;
pub use run::run;

use crate::{config::Settings, vector::read_boundary};

/// Reads the region boundary every raster output is masked to.
pub fn load_boundary(settings: &Settings) -> Result<MultiPolygon<f64>> {
    read_boundary(&settings.boundary)
        .with_context(|| format!("cannot load boundary {}", settings.boundary.display()))
}

#[cfg(test)]
pub mod testing {
    //! Settings for a region rooted in a temporary directory.

    use std::path::Path;

    use crate::{
        config::{Layout, Settings},
        tile::TileCode,
        vector::testing::write_rectangles,
    };

    pub const DAILY: &str = "http://dfo/MODISlance";
    pub const CURRENT: &str = "http://dfo/MODISlance_2wkpro";

    /// The boundary is the rectangle `(0, 0)`-`(3, 4)`.
    pub fn settings(root: &Path, tiles: &[&str]) -> Settings {
        let boundary = root.join("adm0.shp");
        write_rectangles(&boundary, &[(0.0, 0.0, 3.0, 4.0)]);

        Settings {
            name: "test".to_string(),
            tiles: tiles
                .iter()
                .map(|t| t.parse::<TileCode>().unwrap())
                .collect(),
            boundary,
            daily_url: DAILY.to_string(),
            current_url: CURRENT.to_string(),
            nodata: -1,
            layout: Layout::new(root.join("save")),
        }
    }
}
