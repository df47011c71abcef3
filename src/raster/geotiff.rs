//! Reads and writes single-band GeoTIFFs.
//!
//! Only north-up rasters georeferenced with ModelTiepoint + ModelPixelScale
//! are supported. The coordinate system is not interpreted: the GeoKey tags
//! are read and written back verbatim.

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Read, Seek, Write},
    path::Path,
};

use tiff::{
    decoder::{Decoder, DecodingResult, Limits},
    encoder::{colortype, compression::Lzw, DirectoryEncoder, TiffEncoder, TiffKind},
    tags::Tag,
    TiffResult,
};

use super::{CrsKeys, GeoTransform, GridSpec, Raster};
use crate::{download::partial_path, error::RasterError};

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GEO_DOUBLE_PARAMS: u16 = 34736;
const GEO_ASCII_PARAMS: u16 = 34737;
const GDAL_NODATA: u16 = 42113;

fn tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Sample type of a written raster.
pub enum SampleType {
    Int16,
    Int32,
}

fn open(path: &Path) -> Result<Decoder<BufReader<File>>, RasterError> {
    let file = BufReader::new(File::open(path)?);

    // Country-sized mosaics at 250 m exceed the default limits.
    let mut limits = Limits::default();
    limits.decoding_buffer_size = 1024 * 1024 * 1024;
    limits.intermediate_buffer_size = 1024 * 1024 * 1024;
    limits.ifd_value_size = 64 * 1024 * 1024;

    Ok(Decoder::new(file)?.with_limits(limits))
}

/// Reads the grid of a GeoTIFF without decoding its pixels.
pub fn read_grid(path: &Path) -> Result<GridSpec, RasterError> {
    let mut decoder = open(path)?;
    grid_of(&mut decoder, path)
}

fn grid_of<R: Read + Seek>(decoder: &mut Decoder<R>, path: &Path) -> Result<GridSpec, RasterError> {
    let invalid = |reason: &str| RasterError::InvalidGeoTiff {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let (width, height) = decoder.dimensions()?;
    let tiepoint = decoder
        .get_tag_f64_vec(tag(MODEL_TIEPOINT))
        .map_err(|_| invalid("missing ModelTiepoint"))?;
    let scale = decoder
        .get_tag_f64_vec(tag(MODEL_PIXEL_SCALE))
        .map_err(|_| invalid("missing ModelPixelScale"))?;

    if tiepoint.len() < 6 || scale.len() < 2 {
        return Err(invalid("short ModelTiepoint or ModelPixelScale"));
    }
    if scale[0] <= 0.0 || scale[1] <= 0.0 {
        return Err(invalid("non-positive pixel scale"));
    }

    // Tiepoint: [i, j, k, x, y, z] ties raster cell (i, j) to map (x, y).
    let transform = GeoTransform {
        origin_x: tiepoint[3] - tiepoint[0] * scale[0],
        origin_y: tiepoint[4] + tiepoint[1] * scale[1],
        pixel_width: scale[0],
        pixel_height: -scale[1],
    };

    let crs = CrsKeys {
        key_directory: decoder.get_tag_u16_vec(tag(GEO_KEY_DIRECTORY)).ok(),
        double_params: decoder.get_tag_f64_vec(tag(GEO_DOUBLE_PARAMS)).ok(),
        ascii_params: decoder
            .get_tag_ascii_string(tag(GEO_ASCII_PARAMS))
            .ok()
            .map(|s| s.trim_end_matches('\0').to_string()),
    };

    Ok(GridSpec {
        width: width as usize,
        height: height as usize,
        transform,
        crs,
    })
}

/// Reads the grid, first band and no-data value of a GeoTIFF.
pub fn read_raster(path: &Path) -> Result<Raster, RasterError> {
    let mut decoder = open(path)?;
    let grid = grid_of(&mut decoder, path)?;

    let nodata = decoder
        .get_tag_ascii_string(tag(GDAL_NODATA))
        .ok()
        .and_then(|text| parse_nodata(&text));

    let data = to_i32(decoder.read_image()?);
    if data.len() != grid.len() {
        return Err(RasterError::InvalidGeoTiff {
            path: path.to_path_buf(),
            reason: format!("expected one band of {} cells, found {} samples", grid.len(), data.len()),
        });
    }

    Ok(Raster { grid, data, nodata })
}

/// GDAL writes the no-data value as text. A value no integer sample can
/// equal, such as `nan`, means no no-data value.
fn parse_nodata(text: &str) -> Option<i32> {
    text.trim_end_matches('\0')
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| v as i32)
}

fn to_i32(result: DecodingResult) -> Vec<i32> {
    fn saturate<T: TryInto<i32> + PartialOrd + Default>(v: T) -> i32 {
        let negative = v < T::default();
        v.try_into()
            .unwrap_or(if negative { i32::MIN } else { i32::MAX })
    }

    match result {
        DecodingResult::U8(data) => data.into_iter().map(i32::from).collect(),
        DecodingResult::U16(data) => data.into_iter().map(i32::from).collect(),
        DecodingResult::U32(data) => data.into_iter().map(saturate).collect(),
        DecodingResult::U64(data) => data.into_iter().map(saturate).collect(),
        DecodingResult::I8(data) => data.into_iter().map(i32::from).collect(),
        DecodingResult::I16(data) => data.into_iter().map(i32::from).collect(),
        DecodingResult::I32(data) => data,
        DecodingResult::I64(data) => data.into_iter().map(saturate).collect(),
        DecodingResult::F32(data) => data.into_iter().map(|v| v as i32).collect(),
        DecodingResult::F64(data) => data.into_iter().map(|v| v as i32).collect(),
    }
}

/// Writes `raster` as an LZW-compressed single-band GeoTIFF.
///
/// The file is written next to `path` and renamed into place, so `path`
/// exists only once complete. Values outside the range of `sample` saturate.
pub fn write_raster(path: &Path, raster: &Raster, sample: SampleType) -> Result<(), RasterError> {
    let partial = partial_path(path);

    match encode(&partial, raster, sample) {
        Ok(()) => {
            fs::rename(&partial, path)?;
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_file(&partial);
            Err(e)
        }
    }
}

fn encode(path: &Path, raster: &Raster, sample: SampleType) -> Result<(), RasterError> {
    let mut file = BufWriter::new(File::create(path)?);
    let width = raster.grid.width as u32;
    let height = raster.grid.height as u32;

    {
        let mut encoder = TiffEncoder::new(&mut file)?;
        match sample {
            SampleType::Int16 => {
                let data: Vec<i16> = raster
                    .data
                    .iter()
                    .map(|&v| v.clamp(i16::MIN.into(), i16::MAX.into()) as i16)
                    .collect();
                let mut image = encoder.new_image_with_compression::<colortype::GrayI16, _>(
                    width,
                    height,
                    Lzw::default(),
                )?;
                write_geo_tags(image.encoder(), raster)?;
                image.write_data(&data)?;
            }
            SampleType::Int32 => {
                let mut image = encoder.new_image_with_compression::<colortype::GrayI32, _>(
                    width,
                    height,
                    Lzw::default(),
                )?;
                write_geo_tags(image.encoder(), raster)?;
                image.write_data(&raster.data)?;
            }
        }
    }

    file.flush()?;
    Ok(())
}

fn write_geo_tags<W: Write + Seek, K: TiffKind>(
    dir: &mut DirectoryEncoder<'_, W, K>,
    raster: &Raster,
) -> TiffResult<()> {
    let t = &raster.grid.transform;
    let tiepoint = [0.0, 0.0, 0.0, t.origin_x, t.origin_y, 0.0];
    let scale = [t.pixel_width, -t.pixel_height, 0.0];

    dir.write_tag(tag(MODEL_PIXEL_SCALE), &scale[..])?;
    dir.write_tag(tag(MODEL_TIEPOINT), &tiepoint[..])?;

    let crs = &raster.grid.crs;
    if let Some(keys) = &crs.key_directory {
        dir.write_tag(tag(GEO_KEY_DIRECTORY), keys.as_slice())?;
    }
    if let Some(params) = &crs.double_params {
        dir.write_tag(tag(GEO_DOUBLE_PARAMS), params.as_slice())?;
    }
    if let Some(params) = &crs.ascii_params {
        dir.write_tag(tag(GEO_ASCII_PARAMS), params.as_str())?;
    }
    if let Some(nodata) = raster.nodata {
        dir.write_tag(tag(GDAL_NODATA), nodata.to_string().as_str())?;
    }

    Ok(())
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::raster::testing::unit_grid;

    #[test]
    fn should_preserve_grid_values_and_nodata() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("inun.tif");
        let raster = Raster {
            grid: unit_grid(88.0, 26.5, 3, 2),
            data: vec![0, 1, 2, -1, 3, 0],
            nodata: Some(-1),
        };

        write_raster(&path, &raster, SampleType::Int16).unwrap();
        let read = read_raster(&path).unwrap();

        assert_eq!(read, raster);
        assert!(!partial_path(&path).exists());
    }

    #[test]
    fn should_read_grid_without_pixels() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("grid.tif");
        let raster = Raster::filled(unit_grid(-81.0, 0.0, 4, 5), 0, None);

        write_raster(&path, &raster, SampleType::Int32).unwrap();
        let grid = read_grid(&path).unwrap();

        assert_eq!(grid, raster.grid);
    }

    #[test]
    fn should_saturate_to_int16() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("big.tif");
        let raster = Raster {
            grid: unit_grid(0.0, 1.0, 2, 1),
            data: vec![40_000, -40_000],
            nodata: None,
        };

        write_raster(&path, &raster, SampleType::Int16).unwrap();

        assert_eq!(read_raster(&path).unwrap().data, vec![32767, -32768]);
    }

    #[test]
    fn should_parse_only_finite_nodata() {
        assert_eq!(parse_nodata("-9999"), Some(-9999));
        assert_eq!(parse_nodata("-1\0"), Some(-1));
        assert_eq!(parse_nodata(" 255 "), Some(255));
        assert_eq!(parse_nodata("nan"), None);
        assert_eq!(parse_nodata("-inf"), None);
        assert_eq!(parse_nodata("none"), None);
    }

    #[test]
    fn should_read_nan_nodata_as_untagged() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nan.tif");
        let raster = Raster {
            grid: unit_grid(0.0, 1.0, 2, 1),
            data: vec![0, 1],
            nodata: None,
        };
        {
            let file = File::create(&path).unwrap();
            let mut encoder = TiffEncoder::new(file).unwrap();
            let mut image = encoder.new_image::<colortype::GrayI16>(2, 1).unwrap();
            write_geo_tags(image.encoder(), &raster).unwrap();
            image
                .encoder()
                .write_tag(tag(GDAL_NODATA), "nan")
                .unwrap();
            image.write_data(&[0i16, 1]).unwrap();
        }

        let read = read_raster(&path).unwrap();

        assert_eq!(read.nodata, None);
        assert_eq!(read.data, vec![0, 1]);
    }

    #[test]
    fn should_reject_tiff_without_georeferencing() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("plain.tif");
        {
            let file = File::create(&path).unwrap();
            let mut encoder = TiffEncoder::new(file).unwrap();
            encoder
                .write_image::<colortype::Gray8>(1, 1, &[0u8])
                .unwrap();
        }

        assert!(matches!(
            read_grid(&path),
            Err(RasterError::InvalidGeoTiff { .. })
        ));
    }
}
