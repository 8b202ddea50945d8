use approx::assert_relative_eq;

use quantmosaic_core::kernel::{DistanceWeighting, KernelConfig, KernelOffset, KernelTable};

fn keep_all() -> KernelConfig {
    KernelConfig {
        remove_zero_weights: false,
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Table shape
// ---------------------------------------------------------------------------

#[test]
fn test_full_table_has_nine_entries_per_layer() {
    for depth in 1..=9 {
        let kernel = KernelTable::build(depth, &keep_all()).unwrap();
        assert_eq!(kernel.len(), 9 * depth, "depth = {depth}");
    }
}

#[test]
fn test_zero_weight_removal_only_shrinks() {
    for depth in 1..=9 {
        let kernel = KernelTable::build(depth, &KernelConfig::default()).unwrap();
        assert!(kernel.len() <= 9 * depth);
        assert!(kernel.offsets().iter().all(|o| o.weight > 0.0));
    }
}

#[test]
fn test_temporal_offsets_odd_depth() {
    let kernel = KernelTable::build(5, &keep_all()).unwrap();
    let min = kernel.offsets().iter().map(|o| o.dz).min().unwrap();
    let max = kernel.offsets().iter().map(|o| o.dz).max().unwrap();
    assert_eq!((min, max), (-2, 2));
}

#[test]
fn test_temporal_offsets_even_depth() {
    let kernel = KernelTable::build(4, &keep_all()).unwrap();
    let min = kernel.offsets().iter().map(|o| o.dz).min().unwrap();
    let max = kernel.offsets().iter().map(|o| o.dz).max().unwrap();
    assert_eq!(kernel.z_origin(), 1);
    assert_eq!((min, max), (-1, 2));
}

#[test]
fn test_row_radius_is_one() {
    let kernel = KernelTable::build(3, &KernelConfig::default()).unwrap();
    assert_eq!(kernel.row_radius(), 1);
}

// ---------------------------------------------------------------------------
// Weights
// ---------------------------------------------------------------------------

#[test]
fn test_weights_sum_to_one() {
    for weighting in [
        DistanceWeighting::Uniform,
        DistanceWeighting::Linear,
        DistanceWeighting::Gaussian { sigma: 1.0 },
    ] {
        for depth in 1..=7 {
            let config = KernelConfig {
                weighting: weighting.clone(),
                ..Default::default()
            };
            let kernel = KernelTable::build(depth, &config).unwrap();
            let sum: f64 = kernel.offsets().iter().map(|o| o.weight as f64).sum();
            assert_relative_eq!(sum, 1.0, epsilon = 1e-5);
        }
    }
}

#[test]
fn test_weights_point_symmetric_for_odd_depth() {
    let kernel = KernelTable::build(3, &keep_all()).unwrap();
    for o in kernel.offsets() {
        let mirror = kernel
            .offsets()
            .iter()
            .find(|m| m.dx == -o.dx && m.dy == -o.dy && m.dz == -o.dz)
            .unwrap();
        assert_relative_eq!(o.weight, mirror.weight, epsilon = 1e-6);
    }
}

#[test]
fn test_centre_outweighs_corner() {
    let kernel = KernelTable::build(3, &keep_all()).unwrap();
    let weight = |dx, dy, dz| {
        kernel
            .offsets()
            .iter()
            .find(|o| (o.dx, o.dy, o.dz) == (dx, dy, dz))
            .unwrap()
            .weight
    };
    assert!(weight(0, 0, 0) > weight(1, 1, 1));
}

#[test]
fn test_centre_only_without_edge_weights() {
    // In/out by cell centre: with depth 3 the corner centres (1, 1, +-1) lie
    // outside the ellipsoid while their cells still overlap it.
    let config = KernelConfig {
        edge_weights: false,
        ..Default::default()
    };
    let kernel = KernelTable::build(3, &config).unwrap();
    let has = |dx, dy, dz| kernel.offsets().iter().any(|o| (o.dx, o.dy, o.dz) == (dx, dy, dz));
    assert!(has(0, 0, 0));
    assert!(!has(1, 1, 1));
    assert!(!has(-1, -1, -1));

    let covered = KernelTable::build(3, &KernelConfig::default()).unwrap();
    assert!(covered.len() > kernel.len());
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[test]
fn test_zero_depth_rejected() {
    assert!(KernelTable::build(0, &KernelConfig::default()).is_err());
    assert!(KernelTable::uniform(0).is_err());
}

#[test]
fn test_non_positive_sigma_rejected() {
    let config = KernelConfig {
        weighting: DistanceWeighting::Gaussian { sigma: 0.0 },
        ..Default::default()
    };
    assert!(KernelTable::build(3, &config).is_err());
}

#[test]
fn test_all_zero_table_rejected() {
    let offsets = vec![KernelOffset {
        dx: 0,
        dy: 0,
        dz: 0,
        weight: 0.0,
    }];
    assert!(KernelTable::from_offsets(offsets, 1).is_err());
}

#[test]
fn test_negative_weight_rejected() {
    let offsets = vec![KernelOffset {
        dx: 0,
        dy: 0,
        dz: 0,
        weight: -1.0,
    }];
    assert!(KernelTable::from_offsets(offsets, 1).is_err());
}
