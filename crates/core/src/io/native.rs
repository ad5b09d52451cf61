//! Native GeoTIFF reading/writing on top of the `tiff` crate.
//!
//! Supports single-band rasters with the georeferencing this pipeline needs:
//! the affine transform (pixel scale + tiepoint, or a transformation matrix),
//! the EPSG code from the GeoKey directory and the GDAL nodata tag.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::colortype::{Gray32Float, Gray64Float};
use tiff::encoder::{colortype::ColorType as EncoderColorType, TiffEncoder, TiffKind};
use tiff::tags::Tag;
use tiff::ColorType;

// GeoKey ids (GeoTIFF 1.1, section 7)
const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GEOGRAPHIC_TYPE: u16 = 2048;
const PROJECTED_CS_TYPE: u16 = 3072;

const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;
const RASTER_PIXEL_IS_POINT: u16 = 2;

// A full Landsat scene as f64 is close to 500 MB, past the decoder's default
const DECODE_LIMIT_BYTES: usize = 2 * 1024 * 1024 * 1024;

/// Sample format written to disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleType {
    Float32,
    #[default]
    Float64,
}

/// Options for writing GeoTIFF files
#[derive(Debug, Clone, Default)]
pub struct GeoTiffOptions {
    pub sample_type: SampleType,
}

/// Read a single-band GeoTIFF file into a Raster
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode_geotiff(file)
}

/// Read a GeoTIFF from an in-memory buffer into a Raster
pub fn read_geotiff_from_buffer<T>(data: &[u8]) -> Result<Raster<T>>
where
    T: RasterElement,
{
    decode_geotiff(Cursor::new(data))
}

fn cast_all<S, T>(buf: Vec<S>) -> Vec<T>
where
    S: num_traits::NumCast + Copy,
    T: RasterElement,
{
    buf.into_iter()
        .map(|v| num_traits::cast(v).unwrap_or_else(T::nodata))
        .collect()
}

fn decode_geotiff<T, R>(reader: R) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut limits = Limits::default();
    limits.decoding_buffer_size = DECODE_LIMIT_BYTES;
    limits.intermediate_buffer_size = DECODE_LIMIT_BYTES;
    limits.ifd_value_size = DECODE_LIMIT_BYTES;
    let mut decoder = Decoder::new(reader)?.with_limits(limits);

    match decoder.colortype()? {
        ColorType::Gray(_) => {}
        other => {
            return Err(Error::UnsupportedDataType(format!(
                "expected a single-band image, found {:?}",
                other
            )))
        }
    }

    let (width, height) = decoder.dimensions()?;
    let rows = height as usize;
    let cols = width as usize;

    let data: Vec<T> = match decoder.read_image()? {
        DecodingResult::F32(buf) => cast_all(buf),
        DecodingResult::F64(buf) => cast_all(buf),
        DecodingResult::U8(buf) => cast_all(buf),
        DecodingResult::U16(buf) => cast_all(buf),
        DecodingResult::U32(buf) => cast_all(buf),
        DecodingResult::I8(buf) => cast_all(buf),
        DecodingResult::I16(buf) => cast_all(buf),
        DecodingResult::I32(buf) => cast_all(buf),
        _ => return Err(Error::UnsupportedDataType("unsupported TIFF sample format".into())),
    };

    let mut raster = Raster::from_vec(data, rows, cols)?;

    let geokeys = decoder.get_tag_u16_vec(Tag::GeoKeyDirectoryTag).ok();
    let raster_type = geokeys
        .as_deref()
        .and_then(|keys| geokey_value(keys, GT_RASTER_TYPE))
        .unwrap_or(RASTER_PIXEL_IS_AREA);

    if let Some(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(to_pixel_is_area(transform, raster_type));
    }
    raster.set_crs(
        geokeys
            .as_deref()
            .and_then(parse_geokey_epsg)
            .map(|code| CRS::from_epsg(u32::from(code))),
    );
    raster.set_nodata(read_nodata(&mut decoder));

    Ok(raster)
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag).ok();
    let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag).ok();

    if let (Some(scale), Some(tiepoint)) = (scale, tiepoint) {
        if scale.len() >= 2 && tiepoint.len() >= 6 {
            // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
            let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
            let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
            return Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
        }
    }

    // 4x4 row-major model transformation matrix
    let matrix = decoder.get_tag_f64_vec(Tag::ModelTransformationTag).ok()?;
    if matrix.len() < 16 {
        return None;
    }
    Some(GeoTransform {
        origin_x: matrix[3],
        origin_y: matrix[7],
        pixel_width: matrix[0],
        pixel_height: matrix[5],
        row_rotation: matrix[1],
        col_rotation: matrix[4],
    })
}

/// Move a PixelIsPoint transform, whose origin is the center of the first
/// pixel, to the corner-based origin `GeoTransform` uses.
fn to_pixel_is_area(gt: GeoTransform, raster_type: u16) -> GeoTransform {
    if raster_type != RASTER_PIXEL_IS_POINT {
        return gt;
    }
    GeoTransform {
        origin_x: gt.origin_x - 0.5 * (gt.pixel_width + gt.row_rotation),
        origin_y: gt.origin_y - 0.5 * (gt.col_rotation + gt.pixel_height),
        ..gt
    }
}

/// Inline value of a GeoKey, if present
fn geokey_value(keys: &[u16], key: u16) -> Option<u16> {
    let count = usize::from(*keys.get(3)?);
    keys.get(4..)?
        .chunks_exact(4)
        .take(count)
        .find(|entry| entry[0] == key && entry[1] == 0)
        .map(|entry| entry[3])
}

/// EPSG code from a GeoKey directory: the projected CS key wins over the
/// geographic one. Only values stored inline (location 0) are considered.
fn parse_geokey_epsg(keys: &[u16]) -> Option<u16> {
    let count = usize::from(*keys.get(3)?);
    let mut geographic = None;

    for entry in keys.get(4..)?.chunks_exact(4).take(count) {
        let (id, location, value) = (entry[0], entry[1], entry[3]);
        if location != 0 || value == 0 || value == 32767 {
            continue;
        }
        match id {
            PROJECTED_CS_TYPE => return Some(value),
            GEOGRAPHIC_TYPE => geographic = Some(value),
            _ => {}
        }
    }

    geographic
}

fn read_nodata<T: RasterElement, R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<T> {
    let text = decoder.get_tag_ascii_string(Tag::GdalNodata).ok()?;
    let value: f64 = text.trim_end_matches('\0').trim().parse().ok()?;
    num_traits::cast(value)
}

fn build_geokeys(crs: Option<&CRS>) -> Vec<u16> {
    let mut entries: Vec<[u16; 4]> = Vec::new();

    let epsg = crs.and_then(CRS::epsg).and_then(|c| u16::try_from(c).ok());
    if let (Some(crs), Some(code)) = (crs, epsg) {
        if crs.is_geographic() {
            entries.push([GT_MODEL_TYPE, 0, 1, MODEL_TYPE_GEOGRAPHIC]);
            entries.push([GT_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA]);
            entries.push([GEOGRAPHIC_TYPE, 0, 1, code]);
        } else {
            entries.push([GT_MODEL_TYPE, 0, 1, MODEL_TYPE_PROJECTED]);
            entries.push([GT_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA]);
            entries.push([PROJECTED_CS_TYPE, 0, 1, code]);
        }
    } else {
        entries.push([GT_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA]);
    }

    let mut keys = vec![1, 1, 0, entries.len() as u16];
    keys.extend(entries.into_iter().flatten());
    keys
}

/// Write a Raster to a GeoTIFF file.
///
/// The image is encoded into a temporary file next to `path` and renamed into
/// place once encoding has finished, so a failed write never leaves a
/// truncated file at `path`. Missing parent directories are created.
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P, options: Option<GeoTiffOptions>) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".limnosat-")
        .suffix(".partial")
        .tempfile_in(dir)?;
    encode_geotiff(raster, tmp.as_file_mut(), &options.unwrap_or_default())?;
    tmp.as_file_mut().flush()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
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
    W: Write + Seek,
{
    let mut encoder = TiffEncoder::new(writer)?;
    match options.sample_type {
        SampleType::Float32 => {
            let data: Vec<f32> = raster
                .data()
                .iter()
                .map(|&v| num_traits::cast(v).unwrap_or(f32::NAN))
                .collect();
            write_image::<Gray32Float, _, _, _>(&mut encoder, raster, &data)
        }
        SampleType::Float64 => {
            let data: Vec<f64> = raster
                .data()
                .iter()
                .map(|&v| num_traits::cast(v).unwrap_or(f64::NAN))
                .collect();
            write_image::<Gray64Float, _, _, _>(&mut encoder, raster, &data)
        }
    }
}

fn write_image<C, T, W, K>(
    encoder: &mut TiffEncoder<W, K>,
    raster: &Raster<T>,
    data: &[C::Inner],
) -> Result<()>
where
    C: EncoderColorType,
    [C::Inner]: tiff::encoder::TiffValue,
    T: RasterElement,
    W: Write + Seek,
    K: TiffKind,
{
    let (rows, cols) = raster.shape();
    let mut image = encoder.new_image::<C>(cols as u32, rows as u32)?;

    let gt = raster.transform();
    if gt.row_rotation == 0.0 && gt.col_rotation == 0.0 {
        let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
        image.encoder().write_tag(Tag::ModelPixelScaleTag, &scale[..])?;
        let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
        image.encoder().write_tag(Tag::ModelTiepointTag, &tiepoint[..])?;
    } else {
        let matrix = [
            gt.pixel_width, gt.row_rotation, 0.0, gt.origin_x,
            gt.col_rotation, gt.pixel_height, 0.0, gt.origin_y,
            0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        image.encoder().write_tag(Tag::ModelTransformationTag, &matrix[..])?;
    }

    let geokeys = build_geokeys(raster.crs());
    image.encoder().write_tag(Tag::GeoKeyDirectoryTag, &geokeys[..])?;

    if let Some(nodata) = raster.nodata() {
        let text = match nodata.to_f64() {
            Some(v) if !v.is_nan() => v.to_string(),
            _ => "nan".to_string(),
        };
        image.encoder().write_tag(Tag::GdalNodata, text.as_str())?;
    }

    image.write_data(data)?;
    Ok(())
}
