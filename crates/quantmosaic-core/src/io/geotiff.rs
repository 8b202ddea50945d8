use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek};
use std::path::Path;

use ndarray::{Array2, ArrayView2};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;
use tiff::ColorType;
use tracing::{debug, info};

use crate::error::{MosaicError, Result};
use crate::raster::{GeoKeys, GridSpec, Raster};

// GeoTIFF and GDAL private tag codes.
const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GEO_DOUBLE_PARAMS: u16 = 34736;
const GEO_ASCII_PARAMS: u16 = 34737;
const GDAL_NODATA: u16 = 42113;

fn tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

/// Read the grid and nodata value of a raster without decoding pixels.
pub fn read_grid(path: &Path) -> Result<(GridSpec, Option<f64>)> {
    let mut decoder = open_decoder(path)?;
    let (width, height) = decoder.dimensions()?;
    let grid = read_grid_tags(&mut decoder, width as usize, height as usize)?;
    let nodata = read_nodata(&mut decoder)?;
    Ok((grid, nodata))
}

/// Read a single-band raster into an `f32` array.
pub fn read_raster(path: &Path) -> Result<Raster> {
    info!("Reading raster: {}", path.display());
    let mut decoder = open_decoder(path)?;

    let (width, height) = decoder.dimensions()?;
    if width == 0 || height == 0 {
        return Err(MosaicError::UnsupportedRaster(format!(
            "{} has empty dimensions {}x{}",
            path.display(),
            width,
            height
        )));
    }
    match decoder.colortype()? {
        ColorType::Gray(_) => {}
        other => {
            return Err(MosaicError::UnsupportedRaster(format!(
                "{} is not single-band ({:?})",
                path.display(),
                other
            )))
        }
    }

    let grid = read_grid_tags(&mut decoder, width as usize, height as usize)?;
    let nodata = read_nodata(&mut decoder)?;

    let values: Vec<f32> = match decoder.read_image()? {
        DecodingResult::U8(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U16(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I8(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I16(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|x| x as f32).collect(),
    };
    let data = Array2::from_shape_vec((height as usize, width as usize), values)?;

    debug!(width, height, ?nodata, "Raster decoded");
    Ok(Raster { data, grid, nodata })
}

/// Write a Float32 GeoTIFF on `grid`, tagging `nodata` for GDAL readers.
pub fn write_raster(
    path: &Path,
    data: ArrayView2<f32>,
    grid: &GridSpec,
    nodata: Option<f32>,
) -> Result<()> {
    let (rows, cols) = data.dim();
    if (rows, cols) != (grid.height, grid.width) {
        return Err(MosaicError::ShapeMismatch {
            expected: (grid.height, grid.width, 1),
            actual: (rows, cols, 1),
        });
    }
    info!("Writing raster: {}", path.display());

    let file = BufWriter::new(File::create(path)?);
    let mut encoder = TiffEncoder::new(file)?;
    let mut image = encoder.new_image::<colortype::Gray32Float>(cols as u32, rows as u32)?;

    let gt = &grid.geo_transform;
    if grid.is_rotated() {
        let matrix = [
            gt[1], gt[2], 0.0, gt[0], //
            gt[4], gt[5], 0.0, gt[3], //
            0.0, 0.0, 0.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ];
        image
            .encoder()
            .write_tag(tag(MODEL_TRANSFORMATION), &matrix[..])?;
    } else {
        let scale = [gt[1], -gt[5], 0.0];
        let tiepoint = [0.0, 0.0, 0.0, gt[0], gt[3], 0.0];
        image.encoder().write_tag(tag(MODEL_PIXEL_SCALE), &scale[..])?;
        image.encoder().write_tag(tag(MODEL_TIEPOINT), &tiepoint[..])?;
    }

    let keys = &grid.geo_keys;
    if !keys.directory.is_empty() {
        image
            .encoder()
            .write_tag(tag(GEO_KEY_DIRECTORY), &keys.directory[..])?;
    }
    if !keys.double_params.is_empty() {
        image
            .encoder()
            .write_tag(tag(GEO_DOUBLE_PARAMS), &keys.double_params[..])?;
    }
    if !keys.ascii_params.is_empty() {
        image
            .encoder()
            .write_tag(tag(GEO_ASCII_PARAMS), keys.ascii_params.as_str())?;
    }
    if let Some(nodata) = nodata {
        let text = nodata.to_string();
        image.encoder().write_tag(tag(GDAL_NODATA), text.as_str())?;
    }

    let contiguous = data.as_standard_layout();
    let pixels = contiguous
        .as_slice()
        .ok_or_else(|| MosaicError::UnsupportedRaster("pixel buffer is not contiguous".into()))?;
    image.write_data(pixels)?;
    Ok(())
}

fn open_decoder(path: &Path) -> Result<Decoder<BufReader<File>>> {
    let file = File::open(path)?;
    Ok(Decoder::new(BufReader::new(file))?)
}

fn read_grid_tags<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    width: usize,
    height: usize,
) -> Result<GridSpec> {
    let f64_tag = |d: &mut Decoder<R>, code: u16| -> Result<Option<Vec<f64>>> {
        Ok(d.find_tag(tag(code))?.map(|v| v.into_f64_vec()).transpose()?)
    };

    let geo_transform = if let Some(m) = f64_tag(decoder, MODEL_TRANSFORMATION)? {
        if m.len() < 16 {
            return Err(MosaicError::UnsupportedRaster(
                "ModelTransformation tag must hold 16 values".into(),
            ));
        }
        [m[3], m[0], m[1], m[7], m[4], m[5]]
    } else {
        let scale = f64_tag(decoder, MODEL_PIXEL_SCALE)?;
        let tiepoint = f64_tag(decoder, MODEL_TIEPOINT)?;
        match (scale, tiepoint) {
            (Some(s), Some(t)) if s.len() >= 2 && t.len() >= 6 => {
                [t[3] - t[0] * s[0], s[0], 0.0, t[4] + t[1] * s[1], 0.0, -s[1]]
            }
            _ => {
                debug!("No georeferencing tags, using pixel coordinates");
                [0.0, 1.0, 0.0, 0.0, 0.0, -1.0]
            }
        }
    };

    let directory = match decoder.find_tag(tag(GEO_KEY_DIRECTORY))? {
        Some(v) => v.into_u16_vec()?,
        None => Vec::new(),
    };
    let double_params = f64_tag(decoder, GEO_DOUBLE_PARAMS)?.unwrap_or_default();
    let ascii_params = match decoder.find_tag(tag(GEO_ASCII_PARAMS))? {
        Some(v) => v.into_string()?,
        None => String::new(),
    };

    Ok(GridSpec {
        width,
        height,
        geo_transform,
        geo_keys: GeoKeys {
            directory,
            double_params,
            ascii_params,
        },
    })
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Option<f64>> {
    let Some(value) = decoder.find_tag(tag(GDAL_NODATA))? else {
        return Ok(None);
    };
    let text = value.into_string()?;
    let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    Ok(text.parse::<f64>().ok())
}
