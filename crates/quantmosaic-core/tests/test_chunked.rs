mod common;

use ndarray::{Array3, Axis};

use common::{noisy_stack, NODATA};
use quantmosaic_core::kernel::{KernelConfig, KernelTable};
use quantmosaic_core::mosaic::{
    collapse_chunked, collapse_chunked_with_progress, DiskStaging, MappedStackBuilder,
    MemoryStaging, StagingArea,
};
use quantmosaic_core::raster::{Mosaic, RasterStack};
use quantmosaic_core::stack::collapse::{collapse, CollapseParams};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn params() -> CollapseParams {
    CollapseParams {
        nodata: NODATA,
        ..Default::default()
    }
}

fn feathered_stack(h: usize, w: usize, depth: usize) -> RasterStack {
    let values = noisy_stack(h, w, depth, 3);
    let feather = Array3::from_shape_fn((h, w, depth), |(r, c, t)| {
        0.1 + ((r * 7 + c * 3 + t) % 10) as f32 / 10.0
    });
    RasterStack::new(values, NODATA)
        .unwrap()
        .with_feather(feather)
        .unwrap()
}

fn assert_bitwise_eq(a: &Mosaic, b: &Mosaic, label: &str) {
    assert_eq!(a.dim(), b.dim(), "{label}");
    for ((idx, x), y) in a.data.indexed_iter().zip(b.data.iter()) {
        assert_eq!(x.to_bits(), y.to_bits(), "{label} at {idx:?}: {x} vs {y}");
    }
}

// ---------------------------------------------------------------------------
// Chunk invariance
// ---------------------------------------------------------------------------

#[test]
fn test_memory_chunks_match_unchunked() {
    let stack = feathered_stack(17, 6, 5);
    let kernel = KernelTable::build(5, &KernelConfig::default()).unwrap();

    let reference = collapse(
        stack.values().view(),
        stack.feather().map(|f| f.view()),
        &kernel,
        &params(),
    )
    .unwrap();

    for k in 1..=17 {
        let mut sink = MemoryStaging::new();
        let mosaic = collapse_chunked(&stack, &kernel, &params(), k, &mut sink).unwrap();
        let expected = Mosaic {
            data: reference.clone(),
            nodata: NODATA,
        };
        assert_bitwise_eq(&mosaic, &expected, &format!("k = {k}"));
    }
}

#[test]
fn test_disk_chunks_match_memory_chunks() {
    let stack = feathered_stack(12, 5, 3);
    let kernel = KernelTable::build(3, &KernelConfig::default()).unwrap();

    let mut memory = MemoryStaging::new();
    let baseline = collapse_chunked(&stack, &kernel, &params(), 1, &mut memory).unwrap();

    for k in [2, 3, 5, 12] {
        let area = StagingArea::new(None).unwrap();
        let mut sink = DiskStaging::new(&area);
        let mosaic = collapse_chunked(&stack, &kernel, &params(), k, &mut sink).unwrap();
        assert_bitwise_eq(&mosaic, &baseline, &format!("disk k = {k}"));
        area.release().unwrap();
    }
}

#[test]
fn test_mapped_stack_matches_in_memory_stack() {
    let stack = feathered_stack(10, 4, 3);
    let kernel = KernelTable::build(3, &KernelConfig::default()).unwrap();
    let mut memory = MemoryStaging::new();
    let baseline = collapse_chunked(&stack, &kernel, &params(), 1, &mut memory).unwrap();

    let area = StagingArea::new(None).unwrap();
    let mut builder = MappedStackBuilder::new(&area);
    let feather = stack.feather().unwrap();
    for t in 0..3 {
        builder
            .push(
                stack.values().index_axis(Axis(2), t),
                Some(feather.index_axis(Axis(2), t)),
            )
            .unwrap();
    }
    let mapped = builder.finish(NODATA).unwrap();

    let mut sink = DiskStaging::new(&area);
    let mosaic = collapse_chunked(&mapped, &kernel, &params(), 4, &mut sink).unwrap();
    assert_bitwise_eq(&mosaic, &baseline, "mapped k = 4");
}

#[test]
fn test_more_chunks_than_rows_still_covers_output() {
    let stack = feathered_stack(3, 4, 2);
    let kernel = KernelTable::build(2, &KernelConfig::default()).unwrap();
    let mut sink = MemoryStaging::new();
    let mosaic = collapse_chunked(&stack, &kernel, &params(), 50, &mut sink).unwrap();
    assert_eq!(mosaic.dim(), (3, 4));
}

#[test]
fn test_zero_chunks_rejected() {
    let stack = feathered_stack(3, 3, 2);
    let kernel = KernelTable::uniform(2).unwrap();
    let mut sink = MemoryStaging::new();
    assert!(collapse_chunked(&stack, &kernel, &params(), 0, &mut sink).is_err());
}

#[test]
fn test_progress_reports_each_chunk() {
    let stack = feathered_stack(9, 3, 2);
    let kernel = KernelTable::uniform(2).unwrap();
    let mut sink = MemoryStaging::new();
    let mut seen = Vec::new();
    collapse_chunked_with_progress(&stack, &kernel, &params(), 3, &mut sink, |done| {
        seen.push(done)
    })
    .unwrap();
    assert_eq!(seen, vec![1, 2, 3]);
}

// ---------------------------------------------------------------------------
// Staging cleanup
// ---------------------------------------------------------------------------

#[test]
fn test_staging_area_removed_on_release() {
    let parent = tempfile::tempdir().unwrap();
    let area = StagingArea::new(Some(parent.path())).unwrap();
    let staged_dir = area.path().to_path_buf();

    let stack = feathered_stack(8, 3, 2);
    let kernel = KernelTable::uniform(2).unwrap();
    {
        let mut sink = DiskStaging::new(&area);
        collapse_chunked(&stack, &kernel, &params(), 4, &mut sink).unwrap();
    }
    // Chunk files are consumed during assembly.
    assert_eq!(std::fs::read_dir(&staged_dir).unwrap().count(), 0);

    area.release().unwrap();
    assert!(!staged_dir.exists());
}

#[test]
fn test_concurrent_runs_use_distinct_tokens() {
    let parent = tempfile::tempdir().unwrap();
    let a = StagingArea::new(Some(parent.path())).unwrap();
    let b = StagingArea::new(Some(parent.path())).unwrap();
    assert_ne!(a.token(), b.token());
    assert_ne!(a.key_path("chunk", 0), b.key_path("chunk", 0));
}
