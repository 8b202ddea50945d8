mod common;

use ndarray::Array2;

use common::NODATA;
use quantmosaic_core::prep::{feather_layers, feather_weights, PixelSpacing};

const TEN_METRES: PixelSpacing = PixelSpacing { x: 10.0, y: 10.0 };

fn tile_with_nodata_margin(size: usize, margin: usize) -> Array2<f32> {
    Array2::from_shape_fn((size, size), |(r, c)| {
        if r < margin || c < margin || r >= size - margin || c >= size - margin {
            NODATA
        } else {
            1.0
        }
    })
}

#[test]
fn test_weights_rise_away_from_border() {
    let layer = tile_with_nodata_margin(21, 3);
    let w = feather_weights(layer.view(), NODATA, TEN_METRES, 1000.0).unwrap();
    // Along the middle row, from the data edge towards the centre.
    let row: Vec<f32> = (3..=10).map(|c| w[[10, c]]).collect();
    for pair in row.windows(2) {
        assert!(pair[1] > pair[0], "{row:?}");
    }
}

#[test]
fn test_nodata_has_zero_weight_and_valid_is_positive() {
    let layer = tile_with_nodata_margin(15, 2);
    let w = feather_weights(layer.view(), NODATA, TEN_METRES, 50.0).unwrap();
    for ((r, c), &v) in w.indexed_iter() {
        if layer[[r, c]] == NODATA {
            assert_eq!(v, 0.0);
        } else {
            assert!(v > 0.0 && v <= 1.0, "({r}, {c}) = {v}");
        }
    }
}

#[test]
fn test_weights_saturate_at_distance() {
    let layer = Array2::<f32>::ones((30, 30));
    let w = feather_weights(layer.view(), NODATA, TEN_METRES, 50.0).unwrap();
    assert_eq!(w[[15, 15]], 1.0);
    // One pixel in from the raster edge: 10 m of 50 m.
    assert!((w[[0, 15]] - 0.2).abs() < 1e-6);
}

#[test]
fn test_parallel_layers_match_sequential() {
    let layers: Vec<Array2<f32>> = (0..6).map(|m| tile_with_nodata_margin(12, m % 4)).collect();
    let views: Vec<_> = layers.iter().map(|l| l.view()).collect();

    let batch = feather_layers(&views, NODATA, TEN_METRES, 40.0).unwrap();
    for (layer, weights) in layers.iter().zip(batch.iter()) {
        let single = feather_weights(layer.view(), NODATA, TEN_METRES, 40.0).unwrap();
        assert_eq!(&single, weights);
    }
}
