use ndarray::{Array2, Array3, ArrayView2, Axis};

use crate::error::{MosaicError, Result};

/// A pixel sample tagged with its validity.
///
/// Every aggregation step matches on this tag rather than comparing raw
/// values against the sentinel. NaN is always treated as nodata.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Sample {
    Valid(f32),
    NoData,
}

impl Sample {
    #[inline]
    pub fn classify(value: f32, nodata: f32) -> Self {
        if value.is_nan() || value == nodata {
            Self::NoData
        } else {
            Self::Valid(value)
        }
    }

    pub fn value(self) -> Option<f32> {
        match self {
            Self::Valid(v) => Some(v),
            Self::NoData => None,
        }
    }

    pub fn is_valid(self) -> bool {
        matches!(self, Self::Valid(_))
    }
}

/// GeoTIFF projection description, carried through untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GeoKeys {
    pub directory: Vec<u16>,
    pub double_params: Vec<f64>,
    pub ascii_params: String,
}

impl GeoKeys {
    pub fn is_empty(&self) -> bool {
        self.directory.is_empty()
    }
}

/// Axis-aligned extent in georeferenced units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

/// Pixel grid of a raster: size, affine geotransform and projection.
///
/// The geotransform follows the GDAL convention:
/// `[origin_x, pixel_width, row_rotation, origin_y, col_rotation, pixel_height]`.
#[derive(Clone, Debug, PartialEq)]
pub struct GridSpec {
    pub width: usize,
    pub height: usize,
    pub geo_transform: [f64; 6],
    pub geo_keys: GeoKeys,
}

impl GridSpec {
    pub fn new(width: usize, height: usize, geo_transform: [f64; 6]) -> Self {
        Self {
            width,
            height,
            geo_transform,
            geo_keys: GeoKeys::default(),
        }
    }

    pub fn pixel_width(&self) -> f64 {
        self.geo_transform[1].abs()
    }

    pub fn pixel_height(&self) -> f64 {
        self.geo_transform[5].abs()
    }

    pub fn is_rotated(&self) -> bool {
        self.geo_transform[2] != 0.0 || self.geo_transform[4] != 0.0
    }

    pub fn bounds(&self) -> Bounds {
        let gt = &self.geo_transform;
        let x0 = gt[0];
        let x1 = gt[0] + gt[1] * self.width as f64;
        let y0 = gt[3];
        let y1 = gt[3] + gt[5] * self.height as f64;
        Bounds {
            x_min: x0.min(x1),
            x_max: x0.max(x1),
            y_min: y0.min(y1),
            y_max: y0.max(y1),
        }
    }

    /// True when the two extents share a region of positive area.
    pub fn intersects(&self, other: &GridSpec) -> bool {
        let a = self.bounds();
        let b = other.bounds();
        a.x_min < b.x_max && b.x_min < a.x_max && a.y_min < b.y_max && b.y_min < a.y_max
    }

    pub fn same_projection(&self, other: &GridSpec) -> bool {
        self.geo_keys == other.geo_keys
    }
}

/// A single-band raster with its grid.
#[derive(Clone, Debug)]
pub struct Raster {
    /// Pixel data, row-major, shape = (height, width)
    pub data: Array2<f32>,
    pub grid: GridSpec,
    pub nodata: Option<f64>,
}

impl Raster {
    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }
}

/// Co-registered temporal stack, axes (row, col, time).
#[derive(Clone, Debug)]
pub struct RasterStack {
    values: Array3<f32>,
    feather: Option<Array3<f32>>,
    nodata: f32,
}

impl RasterStack {
    pub fn new(values: Array3<f32>, nodata: f32) -> Result<Self> {
        if values.is_empty() {
            return Err(MosaicError::EmptyStack);
        }
        Ok(Self {
            values,
            feather: None,
            nodata,
        })
    }

    /// Stack equally sized 2-D layers along the time axis.
    pub fn from_layers(layers: &[ArrayView2<f32>], nodata: f32) -> Result<Self> {
        if layers.is_empty() {
            return Err(MosaicError::EmptyStack);
        }
        let values = ndarray::stack(Axis(2), layers).map_err(|_| {
            MosaicError::Alignment("stack layers differ in shape".to_string())
        })?;
        Self::new(values, nodata)
    }

    /// Attach per-sample feather weights of the same shape as the stack.
    pub fn with_feather(mut self, feather: Array3<f32>) -> Result<Self> {
        if feather.dim() != self.values.dim() {
            return Err(MosaicError::ShapeMismatch {
                expected: self.values.dim(),
                actual: feather.dim(),
            });
        }
        check_feather_weights(feather.iter())?;
        self.feather = Some(feather);
        Ok(self)
    }

    pub fn dim(&self) -> (usize, usize, usize) {
        self.values.dim()
    }

    pub fn nodata(&self) -> f32 {
        self.nodata
    }

    pub fn values(&self) -> &Array3<f32> {
        &self.values
    }

    pub fn feather(&self) -> Option<&Array3<f32>> {
        self.feather.as_ref()
    }
}

/// Feather weights must be finite and non-negative.
pub fn check_feather_weights<'a>(weights: impl IntoIterator<Item = &'a f32>) -> Result<()> {
    match weights
        .into_iter()
        .find(|w| !(w.is_finite() && **w >= 0.0))
    {
        Some(&bad) => Err(MosaicError::InvalidFeatherWeight(bad)),
        None => Ok(()),
    }
}

/// Collapsed 2-D composite carrying the stack's nodata sentinel.
#[derive(Clone, Debug)]
pub struct Mosaic {
    pub data: Array2<f32>,
    pub nodata: f32,
}

impl Mosaic {
    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Nodata mask: `true` where the composite has no valid value.
    pub fn mask(&self) -> Array2<bool> {
        let nodata = self.nodata;
        self.data
            .mapv(|v| !Sample::classify(v, nodata).is_valid())
    }

    /// Rewrite every masked pixel (including NaN) to the sentinel.
    pub fn apply_mask(&mut self) {
        let nodata = self.nodata;
        self.data.mapv_inplace(|v| match Sample::classify(v, nodata) {
            Sample::Valid(v) => v,
            Sample::NoData => nodata,
        });
    }

    pub fn valid_count(&self) -> usize {
        self.mask().iter().filter(|&&masked| !masked).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_sample_classify() {
        assert_eq!(Sample::classify(1.5, -9999.0), Sample::Valid(1.5));
        assert_eq!(Sample::classify(-9999.0, -9999.0), Sample::NoData);
        assert_eq!(Sample::classify(f32::NAN, -9999.0), Sample::NoData);
    }

    #[test]
    fn test_grid_intersects() {
        let a = GridSpec::new(10, 10, [0.0, 10.0, 0.0, 100.0, 0.0, -10.0]);
        let b = GridSpec::new(10, 10, [50.0, 10.0, 0.0, 100.0, 0.0, -10.0]);
        let c = GridSpec::new(10, 10, [100.0, 10.0, 0.0, 100.0, 0.0, -10.0]);
        assert!(a.intersects(&b));
        // Touching edges share no area.
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_from_layers_rejects_mismatched_shapes() {
        let a = Array2::<f32>::zeros((2, 2));
        let b = Array2::<f32>::zeros((3, 2));
        assert!(RasterStack::from_layers(&[a.view(), b.view()], -9999.0).is_err());
    }

    #[test]
    fn test_with_feather_rejects_invalid_weights() {
        let values = ndarray::Array3::<f32>::ones((2, 2, 2));
        for bad in [f32::NAN, f32::INFINITY, -0.5] {
            let mut feather = ndarray::Array3::<f32>::ones((2, 2, 2));
            feather[[1, 1, 0]] = bad;
            let stack = RasterStack::new(values.clone(), -9999.0).unwrap();
            assert!(matches!(
                stack.with_feather(feather),
                Err(MosaicError::InvalidFeatherWeight(_))
            ));
        }
        let stack = RasterStack::new(values.clone(), -9999.0).unwrap();
        assert!(stack.with_feather(ndarray::Array3::zeros((2, 2, 2))).is_ok());
    }

    #[test]
    fn test_mosaic_mask() {
        let mut m = Mosaic {
            data: arr2(&[[1.0, -9999.0], [f32::NAN, 2.0]]),
            nodata: -9999.0,
        };
        assert_eq!(m.mask(), arr2(&[[false, true], [true, false]]));
        m.apply_mask();
        assert_eq!(m.data[[1, 0]], -9999.0);
        assert_eq!(m.valid_count(), 2);
    }
}
