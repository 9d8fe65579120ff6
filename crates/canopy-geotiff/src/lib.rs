//! GeoTIFF bridge: single-band integer LULC rasters in, class rasters out.
//!
//! Georeferencing is read from the raw GeoTIFF tags: ModelPixelScale +
//! ModelTiepoint (or ModelTransformation) for the affine transform and the
//! GeoKeyDirectory for the EPSG code. Rotated or sheared transforms are only
//! supported through ModelTransformation.
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;

use canopy_core::{AffineTransform, ClassRaster, ConnectivityError, Crs, Georef, Grid, LulcRaster};
use thiserror::Error;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;
use tiff::{ColorType, TiffError};

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;

const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GEOGRAPHIC_TYPE: u16 = 2048;
const PROJECTED_CS_TYPE: u16 = 3072;

const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

#[derive(Debug, Error)]
pub enum GeoTiffError {
    #[error("TIFF: {0}")]
    Tiff(#[from] TiffError),
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Connectivity(#[from] ConnectivityError),
    #[error("unsupported GeoTIFF: {0}")]
    Unsupported(String),
}

pub type Result<T> = std::result::Result<T, GeoTiffError>;

fn tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

/// Read a single-band integer GeoTIFF as an LULC raster.
pub fn read_lulc(path: impl AsRef<Path>) -> Result<LulcRaster> {
    let file = File::open(path.as_ref())?;
    decode_lulc(BufReader::new(file))
}

pub fn decode_lulc<R: Read + Seek>(reader: R) -> Result<LulcRaster> {
    let mut decoder = Decoder::new(reader)?;
    let (width, height) = decoder.dimensions()?;
    match decoder.colortype()? {
        ColorType::Gray(_) => {}
        other => {
            return Err(GeoTiffError::Unsupported(format!(
                "expected one band, got {other:?}"
            )))
        }
    }

    let georef = read_georef(&mut decoder)?;
    let codes: Vec<i32> = match decoder.read_image()? {
        DecodingResult::U8(v) => v.into_iter().map(i32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(i32::from).collect(),
        DecodingResult::I8(v) => v.into_iter().map(i32::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(i32::from).collect(),
        DecodingResult::I32(v) => v,
        DecodingResult::U32(v) => v
            .into_iter()
            .map(|x| {
                i32::try_from(x)
                    .map_err(|_| GeoTiffError::Unsupported(format!("code {x} does not fit i32")))
            })
            .collect::<Result<_>>()?,
        _ => {
            return Err(GeoTiffError::Unsupported(
                "pixel type must be an integer of at most 32 bits".into(),
            ))
        }
    };

    log::debug!("decoded {width}×{height} LULC raster, CRS {}", georef.crs);
    let grid = Grid::from_vec(width as usize, height as usize, codes)?;
    Ok(LulcRaster::new(grid, georef)?)
}

fn read_georef<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Georef> {
    let transform = if decoder.find_tag(tag(MODEL_TRANSFORMATION))?.is_some() {
        let m = decoder.get_tag_f64_vec(tag(MODEL_TRANSFORMATION))?;
        if m.len() < 8 {
            return Err(GeoTiffError::Unsupported("short ModelTransformation tag".into()));
        }
        AffineTransform::new(m[0], m[1], m[3], m[4], m[5], m[7])
    } else {
        let missing = || GeoTiffError::Unsupported("no ModelPixelScale/ModelTiepoint tags".into());
        if decoder.find_tag(tag(MODEL_PIXEL_SCALE))?.is_none() || decoder.find_tag(tag(MODEL_TIEPOINT))?.is_none() {
            return Err(missing());
        }
        let scale = decoder.get_tag_f64_vec(tag(MODEL_PIXEL_SCALE))?;
        let tie = decoder.get_tag_f64_vec(tag(MODEL_TIEPOINT))?;
        if scale.len() < 2 || tie.len() < 6 {
            return Err(missing());
        }
        let (sx, sy) = (scale[0], scale[1]);
        let (i, j, x, y) = (tie[0], tie[1], tie[3], tie[4]);
        AffineTransform::from_origin(x - i * sx, y + j * sy, sx, sy)
    };

    let crs = match decoder.find_tag(tag(GEO_KEY_DIRECTORY))? {
        Some(_) => {
            let keys = decoder.get_tag_u16_vec(tag(GEO_KEY_DIRECTORY))?;
            epsg_from_geokeys(&keys).map(Crs::epsg)
        }
        None => None,
    };
    let crs = crs.unwrap_or_else(|| {
        log::warn!("GeoTIFF carries no EPSG code; treating coordinates as projected metres");
        Crs::new("unknown")
    });
    Ok(Georef::new(transform, crs))
}

/// EPSG code from a GeoKeyDirectory: the projected CS key, else the
/// geographic type key. Only keys stored inline in the directory are read.
fn epsg_from_geokeys(keys: &[u16]) -> Option<u32> {
    let count = *keys.get(3)? as usize;
    let entries: Vec<&[u16]> = keys.get(4..4 + 4 * count)?.chunks_exact(4).collect();
    let inline = |id: u16| {
        entries
            .iter()
            .find(|e| e[0] == id && e[1] == 0)
            .map(|e| u32::from(e[3]))
    };
    inline(PROJECTED_CS_TYPE).or_else(|| inline(GEOGRAPHIC_TYPE))
}

/// GeoKeyDirectory for `crs`; `None` when the CRS has no EPSG code.
fn geokeys_for(crs: &Crs) -> Result<Option<Vec<u16>>> {
    let Some(epsg) = crs.epsg_code() else {
        return Ok(None);
    };
    let code = u16::try_from(epsg)
        .map_err(|_| GeoTiffError::Unsupported(format!("EPSG code {epsg} does not fit a GeoKey")))?;
    let (model, key) = if crs.is_geographic() {
        (MODEL_TYPE_GEOGRAPHIC, GEOGRAPHIC_TYPE)
    } else {
        (MODEL_TYPE_PROJECTED, PROJECTED_CS_TYPE)
    };
    Ok(Some(vec![
        1, 1, 0, 3, //
        GT_MODEL_TYPE, 0, 1, model, //
        GT_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA, //
        key, 0, 1, code,
    ]))
}

/// Pixel scale + tiepoint for a north-up transform.
fn model_tags(transform: &AffineTransform) -> Result<([f64; 3], [f64; 6])> {
    if transform.b != 0.0 || transform.d != 0.0 || transform.a <= 0.0 || transform.e >= 0.0 {
        return Err(GeoTiffError::Unsupported(format!(
            "only north-up transforms can be written, got {transform:?}"
        )));
    }
    Ok((
        [transform.a, -transform.e, 0.0],
        [0.0, 0.0, 0.0, transform.c, transform.f, 0.0],
    ))
}

fn encode_gray8<W: Write + Seek>(writer: W, width: usize, height: usize, data: &[u8], georef: &Georef) -> Result<()> {
    let (scale, tie) = model_tags(&georef.transform)?;
    let keys = geokeys_for(&georef.crs)?;
    let mut encoder = TiffEncoder::new(writer)?;
    let mut image = encoder.new_image::<colortype::Gray8>(width as u32, height as u32)?;
    image.encoder().write_tag(tag(MODEL_PIXEL_SCALE), &scale[..])?;
    image.encoder().write_tag(tag(MODEL_TIEPOINT), &tie[..])?;
    match &keys {
        Some(keys) => image.encoder().write_tag(tag(GEO_KEY_DIRECTORY), &keys[..])?,
        None => log::warn!("CRS {} has no EPSG code; writing the transform without GeoKeys", georef.crs),
    }
    image.write_data(data)?;
    Ok(())
}

/// Write a class raster (values 0–3) as a u8 GeoTIFF.
pub fn write_class_raster(path: impl AsRef<Path>, raster: &ClassRaster) -> Result<()> {
    let mut out = BufWriter::new(File::create(path.as_ref())?);
    encode_gray8(&mut out, raster.width(), raster.height(), &raster.classes.data, &raster.georef)?;
    out.flush()?;
    Ok(())
}

/// Write an LULC raster whose codes all fit in a byte as a u8 GeoTIFF.
pub fn write_lulc(path: impl AsRef<Path>, raster: &LulcRaster) -> Result<()> {
    let data = raster
        .codes
        .data
        .iter()
        .map(|&c| u8::try_from(c).map_err(|_| GeoTiffError::Unsupported(format!("LULC code {c} does not fit u8"))))
        .collect::<Result<Vec<u8>>>()?;
    let mut out = BufWriter::new(File::create(path.as_ref())?);
    encode_gray8(&mut out, raster.width(), raster.height(), &data, &raster.georef)?;
    out.flush()?;
    Ok(())
}
