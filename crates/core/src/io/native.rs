//! Native GeoTIFF reading/writing using the `tiff` crate.
//!
//! Georeferencing is carried in the standard GeoTIFF tags:
//! - ModelPixelScaleTag (33550) + ModelTiepointTag (33922): geotransform
//! - GeoKeyDirectoryTag (34735): EPSG code of the CRS
//! - GDAL_NODATA (42113): no-data value as ASCII

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use num_traits::NumCast;
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;
use tracing::{debug, warn};

const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
const TAG_MODEL_TIEPOINT: u16 = 33922;
const TAG_GEO_KEY_DIRECTORY: u16 = 34735;
const TAG_GDAL_NODATA: u16 = 42113;

const KEY_MODEL_TYPE: u16 = 1024;
const KEY_RASTER_TYPE: u16 = 1025;
const KEY_GEOGRAPHIC_TYPE: u16 = 2048;
const KEY_PROJECTED_CS_TYPE: u16 = 3072;
const USER_DEFINED: u16 = 32767;

/// Canonical tag for a code, so lookups match however the `tiff` crate names it
fn tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

/// Options for writing GeoTIFF files
#[derive(Debug, Clone)]
pub struct GeoTiffOptions {
    /// Write the raster CRS as an EPSG GeoKey when one is known
    pub write_crs: bool,
    /// Write the GDAL_NODATA tag when the raster has a no-data value
    pub write_nodata: bool,
}

impl Default for GeoTiffOptions {
    fn default() -> Self {
        Self {
            write_crs: true,
            write_nodata: true,
        }
    }
}

/// Read one band of a GeoTIFF file into a Raster
///
/// # Arguments
/// * `path` - Path to the GeoTIFF file
/// * `band` - Band number (1-indexed), defaults to 1
pub fn read_geotiff<T, P>(path: P, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    let raster = decode_geotiff(BufReader::new(file), band)?;
    debug!(
        "read {} x {} raster from {}",
        raster.cols(),
        raster.rows(),
        path.as_ref().display()
    );
    Ok(raster)
}

/// Read a GeoTIFF from an in-memory buffer into a Raster
pub fn read_geotiff_from_buffer<T>(data: &[u8], band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
{
    decode_geotiff(Cursor::new(data), band)
}

fn cast_all<S, T>(buf: Vec<S>) -> Vec<T>
where
    S: NumCast + Copy,
    T: RasterElement,
{
    buf.into_iter()
        .map(|v| num_traits::cast(v).unwrap_or(T::default_nodata()))
        .collect()
}

fn decode_geotiff<T, R>(reader: R, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
    R: std::io::Read + std::io::Seek,
{
    let mut decoder =
        Decoder::new(reader).map_err(|e| Error::Other(format!("TIFF decode error: {}", e)))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Other(format!("Cannot read dimensions: {}", e)))?;

    let rows = height as usize;
    let cols = width as usize;

    let result = decoder
        .read_image()
        .map_err(|e| Error::Other(format!("Cannot read image data: {}", e)))?;

    let samples: Vec<T> = match result {
        DecodingResult::F32(buf) => cast_all(buf),
        DecodingResult::F64(buf) => cast_all(buf),
        DecodingResult::U8(buf) => cast_all(buf),
        DecodingResult::U16(buf) => cast_all(buf),
        DecodingResult::U32(buf) => cast_all(buf),
        DecodingResult::I8(buf) => cast_all(buf),
        DecodingResult::I16(buf) => cast_all(buf),
        DecodingResult::I32(buf) => cast_all(buf),
        _ => return Err(Error::UnsupportedDataType("Unsupported TIFF pixel format".to_string())),
    };

    let data = select_band(samples, rows, cols, band.unwrap_or(1))?;
    let mut raster = Raster::from_vec(data, rows, cols)?;

    if let Some(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }
    raster.set_crs(read_crs(&mut decoder));
    raster.set_nodata(read_nodata(&mut decoder));

    Ok(raster)
}

/// Pick one band out of pixel-interleaved samples
fn select_band<T: Copy>(samples: Vec<T>, rows: usize, cols: usize, band: usize) -> Result<Vec<T>> {
    let cells = rows * cols;
    if cells == 0 || samples.len() % cells != 0 {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let bands = samples.len() / cells;
    if band == 0 || band > bands {
        return Err(Error::InvalidParameter {
            name: "band",
            value: band.to_string(),
            reason: format!("raster has {} band(s)", bands),
        });
    }

    if bands == 1 {
        return Ok(samples);
    }
    Ok(samples.into_iter().skip(band - 1).step_by(bands).collect())
}

fn read_geotransform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(tag(TAG_MODEL_PIXEL_SCALE)).ok()?;
    let tiepoint = decoder.get_tag_f64_vec(tag(TAG_MODEL_TIEPOINT)).ok()?;

    if scale.len() < 2 || tiepoint.len() < 6 {
        return None;
    }

    // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
    Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
}

fn read_crs<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder.get_tag_u16_vec(tag(TAG_GEO_KEY_DIRECTORY)).ok()?;
    parse_geokeys(&keys)
}

/// EPSG code from a GeoKeyDirectory, projected key taking precedence
fn parse_geokeys(keys: &[u16]) -> Option<CRS> {
    if keys.len() < 4 {
        return None;
    }
    let count = keys[3] as usize;

    let mut geographic = None;
    let mut projected = None;
    for entry in keys[4..].chunks_exact(4).take(count) {
        let (key, location, value) = (entry[0], entry[1], entry[3]);
        // location 0 means the value is stored inline
        if location != 0 || value == 0 || value == USER_DEFINED {
            continue;
        }
        match key {
            KEY_PROJECTED_CS_TYPE => projected = Some(value),
            KEY_GEOGRAPHIC_TYPE => geographic = Some(value),
            _ => {}
        }
    }

    projected
        .or(geographic)
        .map(|code| CRS::from_epsg(code as u32))
}

fn read_nodata<T, R>(decoder: &mut Decoder<R>) -> Option<T>
where
    T: RasterElement,
    R: std::io::Read + std::io::Seek,
{
    let text = decoder.get_tag_ascii_string(tag(TAG_GDAL_NODATA)).ok()?;
    let value: f64 = text.trim_matches(|c: char| c == '\0' || c.is_whitespace()).parse().ok()?;
    num_traits::cast(value)
}

fn build_geokeys(crs: Option<&CRS>) -> Vec<u16> {
    let code = crs
        .and_then(|c| c.epsg().map(|e| (e, c.is_geographic())))
        .and_then(|(e, geographic)| u16::try_from(e).ok().map(|e| (e, geographic)));

    match code {
        Some((epsg, true)) => vec![
            1, 1, 0, 3, // Version 1.1.0, 3 keys
            KEY_MODEL_TYPE, 0, 1, 2, // ModelTypeGeographic
            KEY_RASTER_TYPE, 0, 1, 1, // RasterPixelIsArea
            KEY_GEOGRAPHIC_TYPE, 0, 1, epsg,
        ],
        Some((epsg, false)) => vec![
            1, 1, 0, 3,
            KEY_MODEL_TYPE, 0, 1, 1, // ModelTypeProjected
            KEY_RASTER_TYPE, 0, 1, 1,
            KEY_PROJECTED_CS_TYPE, 0, 1, epsg,
        ],
        // Minimal directory so other tools still recognise a GeoTIFF
        None => vec![
            1, 1, 0, 2,
            KEY_MODEL_TYPE, 0, 1, 1,
            KEY_RASTER_TYPE, 0, 1, 1,
        ],
    }
}

fn format_nodata(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else {
        format!("{}", value)
    }
}

/// Write a Raster to a single-band Float32 GeoTIFF file
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P, options: Option<GeoTiffOptions>) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    encode_geotiff(raster, BufWriter::new(file), &options.unwrap_or_default())?;
    debug!(
        "wrote {} x {} raster to {}",
        raster.cols(),
        raster.rows(),
        path.as_ref().display()
    );
    Ok(())
}

/// Write a Raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T>(raster: &Raster<T>, options: Option<GeoTiffOptions>) -> Result<Vec<u8>>
where
    T: RasterElement,
{
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf), &options.unwrap_or_default())?;
    Ok(buf)
}

fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W, options: &GeoTiffOptions) -> Result<()>
where
    T: RasterElement,
    W: std::io::Write + std::io::Seek,
{
    let mut encoder =
        TiffEncoder::new(writer).map_err(|e| Error::Other(format!("TIFF encoder error: {}", e)))?;

    let (rows, cols) = raster.shape();

    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| num_traits::cast(v).unwrap_or(f32::NAN))
        .collect();

    let mut image = encoder
        .new_image::<Gray32Float>(cols as u32, rows as u32)
        .map_err(|e| Error::Other(format!("Cannot create TIFF image: {}", e)))?;

    let gt = raster.transform();
    if !gt.is_north_up() {
        warn!("rotated geotransform {:?}; only scale and origin are written", gt);
    }

    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(tag(TAG_MODEL_PIXEL_SCALE), &scale[..])
        .map_err(|e| Error::Other(format!("Cannot write scale tag: {}", e)))?;

    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(tag(TAG_MODEL_TIEPOINT), &tiepoint[..])
        .map_err(|e| Error::Other(format!("Cannot write tiepoint tag: {}", e)))?;

    let crs = if options.write_crs { raster.crs() } else { None };
    let geokeys = build_geokeys(crs);
    image
        .encoder()
        .write_tag(tag(TAG_GEO_KEY_DIRECTORY), &geokeys[..])
        .map_err(|e| Error::Other(format!("Cannot write geokey tag: {}", e)))?;

    if options.write_nodata {
        if let Some(nodata) = raster.nodata().and_then(|nd| nd.to_f64()) {
            let text = format_nodata(nodata);
            image
                .encoder()
                .write_tag(tag(TAG_GDAL_NODATA), text.as_str())
                .map_err(|e| Error::Other(format!("Cannot write nodata tag: {}", e)))?;
        }
    }

    image
        .write_data(&data)
        .map_err(|e| Error::Other(format!("Cannot write image data: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn sample() -> Raster<f64> {
        let mut raster = Raster::from_vec((0..12).map(|v| v as f64).collect(), 3, 4).unwrap();
        raster.set_transform(GeoTransform::new(500_000.0, 4_000_000.0, 30.0, -30.0));
        raster.set_crs(Some(CRS::from_epsg(32630)));
        raster.set_nodata(Some(-99.0));
        raster.set(1, 1, -99.0).unwrap();
        raster
    }

    #[test]
    fn test_write_read_roundtrip_file() {
        let raster = sample();
        let tmp = NamedTempFile::with_suffix(".tif").unwrap();
        write_geotiff(&raster, tmp.path(), None).unwrap();

        let loaded: Raster<f64> = read_geotiff(tmp.path(), None).unwrap();
        assert_eq!(loaded.shape(), (3, 4));
        assert_eq!(loaded.get(2, 3).unwrap(), 11.0);
        assert_eq!(loaded.nodata(), Some(-99.0));
        assert!(loaded.is_nodata_at(1, 1).unwrap());
        assert_eq!(loaded.crs(), Some(&CRS::from_epsg(32630)));
        assert_eq!(*loaded.transform(), *raster.transform());
    }

    #[test]
    fn test_buffer_roundtrip_geographic_without_nodata() {
        let mut raster: Raster<f64> = Raster::filled(2, 2, 1.5);
        raster.set_transform(GeoTransform::new(-10.0, 5.0, 0.5, -0.5));
        raster.set_crs(Some(CRS::wgs84()));

        let buf = write_geotiff_to_buffer(&raster, None).unwrap();
        let loaded: Raster<f32> = read_geotiff_from_buffer(&buf, None).unwrap();
        assert_eq!(loaded.get(1, 1).unwrap(), 1.5);
        assert_eq!(loaded.nodata(), None);
        assert_eq!(loaded.crs(), Some(&CRS::wgs84()));
    }

    #[test]
    fn test_options_suppress_tags() {
        let options = GeoTiffOptions {
            write_crs: false,
            write_nodata: false,
        };
        let buf = write_geotiff_to_buffer(&sample(), Some(options)).unwrap();
        let loaded: Raster<f64> = read_geotiff_from_buffer(&buf, None).unwrap();
        assert_eq!(loaded.crs(), None);
        assert_eq!(loaded.nodata(), None);
    }

    #[test]
    fn test_missing_file() {
        let err = read_geotiff::<f64, _>("/no/such/raster.tif", None).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_select_band_deinterleaves() {
        // 2 cells, 3 bands, pixel-interleaved
        let samples = vec![1, 10, 100, 2, 20, 200];
        assert_eq!(select_band(samples.clone(), 1, 2, 1).unwrap(), vec![1, 2]);
        assert_eq!(select_band(samples.clone(), 1, 2, 3).unwrap(), vec![100, 200]);
        assert!(select_band(samples.clone(), 1, 2, 4).is_err());
        assert!(select_band(samples, 1, 4, 1).is_err());
    }

    #[test]
    fn test_parse_geokeys() {
        assert_eq!(parse_geokeys(&build_geokeys(Some(&CRS::from_epsg(32721)))), Some(CRS::from_epsg(32721)));
        assert_eq!(parse_geokeys(&build_geokeys(Some(&CRS::wgs84()))), Some(CRS::wgs84()));
        assert_eq!(parse_geokeys(&build_geokeys(None)), None);
        // 900913 does not fit a GeoKey short
        assert_eq!(parse_geokeys(&build_geokeys(Some(&CRS::from_epsg(900_913)))), None);
    }
}
