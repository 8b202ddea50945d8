use ndarray::{s, Array2};
use tracing::debug;

use crate::error::{MosaicError, Result};
use crate::raster::{GridSpec, Raster, Sample};

/// Integer pixel offset of a tile's origin on a reference grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridOffset {
    pub row: isize,
    pub col: isize,
}

/// Check that every grid has the same size, origin, pixel size and projection.
pub fn check_aligned(grids: &[GridSpec], tolerance: f64) -> Result<()> {
    let Some((first, rest)) = grids.split_first() else {
        return Ok(());
    };
    for (i, grid) in rest.iter().enumerate() {
        let index = i + 1;
        if (grid.width, grid.height) != (first.width, first.height) {
            return Err(MosaicError::Alignment(format!(
                "raster {} is {}x{}, raster 0 is {}x{}",
                index, grid.width, grid.height, first.width, first.height
            )));
        }
        let mismatch = grid
            .geo_transform
            .iter()
            .zip(first.geo_transform.iter())
            .any(|(a, b)| (a - b).abs() > tolerance);
        if mismatch {
            return Err(MosaicError::Alignment(format!(
                "raster {} has geotransform {:?}, raster 0 has {:?}",
                index, grid.geo_transform, first.geo_transform
            )));
        }
        if !grid.same_projection(first) {
            return Err(MosaicError::Alignment(format!(
                "raster {index} is in a different projection"
            )));
        }
    }
    Ok(())
}

/// Offset of `tile` on `reference`, in whole pixels.
///
/// Fails when the grids differ in projection, pixel size or rotation, or when
/// the tile origin does not fall on a reference pixel corner.
pub fn grid_offset(tile: &GridSpec, reference: &GridSpec, tolerance: f64) -> Result<GridOffset> {
    if !tile.same_projection(reference) {
        return Err(MosaicError::Alignment(
            "tile projection differs from the reference".into(),
        ));
    }
    if tile.is_rotated() || reference.is_rotated() {
        return Err(MosaicError::Alignment(
            "rotated geotransforms are not supported".into(),
        ));
    }
    let rt = &reference.geo_transform;
    let tt = &tile.geo_transform;
    if (tt[1] - rt[1]).abs() > tolerance || (tt[5] - rt[5]).abs() > tolerance {
        return Err(MosaicError::Alignment(format!(
            "pixel size {}x{} differs from reference {}x{}",
            tt[1], tt[5], rt[1], rt[5]
        )));
    }

    let col = (tt[0] - rt[0]) / rt[1];
    let row = (tt[3] - rt[3]) / rt[5];
    let whole = |v: f64| (v - v.round()).abs() * rt[1].abs().max(rt[5].abs()) <= tolerance;
    if !whole(col) || !whole(row) {
        return Err(MosaicError::Alignment(format!(
            "tile origin sits at fractional pixel offset ({row:.4}, {col:.4})"
        )));
    }
    Ok(GridOffset {
        row: row.round() as isize,
        col: col.round() as isize,
    })
}

/// Place a tile onto the reference grid, filling uncovered pixels with `nodata`.
///
/// The tile's own nodata value (and NaN) is rewritten to `nodata`. Returns
/// `Ok(None)` when the tile does not overlap the reference at all.
pub fn place_on_grid(
    tile: &Raster,
    reference: &GridSpec,
    nodata: f32,
    tolerance: f64,
) -> Result<Option<Array2<f32>>> {
    if !tile.grid.intersects(reference) {
        return Ok(None);
    }
    let offset = grid_offset(&tile.grid, reference, tolerance)?;

    let (th, tw) = tile.data.dim();
    let (rh, rw) = (reference.height as isize, reference.width as isize);

    // Overlap window in reference pixel coordinates.
    let r0 = offset.row.max(0);
    let c0 = offset.col.max(0);
    let r1 = (offset.row + th as isize).min(rh);
    let c1 = (offset.col + tw as isize).min(rw);
    if r0 >= r1 || c0 >= c1 {
        return Ok(None);
    }
    debug!(
        row_offset = offset.row,
        col_offset = offset.col,
        rows = r1 - r0,
        cols = c1 - c0,
        "Placing tile on reference grid"
    );

    let tile_nodata = tile.nodata.map(|v| v as f32).unwrap_or(f32::NAN);
    let src = tile.data.slice(s![
        (r0 - offset.row)..(r1 - offset.row),
        (c0 - offset.col)..(c1 - offset.col)
    ]);

    let mut out = Array2::from_elem((reference.height, reference.width), nodata);
    out.slice_mut(s![r0..r1, c0..c1])
        .zip_mut_with(&src, |dst, &v| {
            *dst = match Sample::classify(v, tile_nodata) {
                Sample::Valid(v) => v,
                Sample::NoData => nodata,
            };
        });
    Ok(Some(out))
}
