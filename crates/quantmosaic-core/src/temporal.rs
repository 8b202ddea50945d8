use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::{MosaicError, Result};

/// Position of the acquisition timestamp among the `_`-separated fields of a
/// Sentinel-1 product name, e.g.
/// `S1A_IW_GRDH_1SDV_20210101T053412_20210101T053437_...`.
const TIMESTAMP_FIELD: usize = 5;

const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Parse the acquisition start time from a product file name.
pub fn acquisition_time(path: &Path) -> Result<DateTime<Utc>> {
    let invalid = |reason: String| MosaicError::AcquisitionTime {
        path: path.to_path_buf(),
        reason,
    };

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| invalid("file name is not valid UTF-8".to_string()))?;

    let field = name
        .split('_')
        .nth(TIMESTAMP_FIELD)
        .ok_or_else(|| invalid(format!("expected at least {} '_' fields", TIMESTAMP_FIELD + 1)))?;

    // The field may carry an extension when it is the last one.
    let stamp = field.split('.').next().unwrap_or(field);
    let naive = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT)
        .map_err(|e| invalid(format!("'{stamp}': {e}")))?;

    Ok(naive.and_utc())
}

/// Stack position of each time-sorted rank.
///
/// Rank 0 (earliest) lands at `n / 2`; later ranks alternate left and right
/// of it: `mid-1, mid+1, mid-2, mid+2, ...`.
pub fn stack_positions(n: usize) -> Vec<usize> {
    let mid = n / 2;
    (0..n)
        .map(|rank| {
            if rank == 0 {
                mid
            } else {
                let step = rank.div_ceil(2);
                if rank % 2 == 1 {
                    mid - step
                } else {
                    mid + step
                }
            }
        })
        .collect()
}

/// Arrange items so that stack distance from the centre tracks calendar
/// distance from the earliest acquisition.
///
/// Items with identical timestamps keep their input order.
pub fn temporal_order<T>(items: Vec<(T, DateTime<Utc>)>) -> Vec<T> {
    let n = items.len();
    let mut indexed: Vec<(usize, (T, DateTime<Utc>))> = items.into_iter().enumerate().collect();
    indexed.sort_by(|(ia, (_, ta)), (ib, (_, tb))| ta.cmp(tb).then(ia.cmp(ib)));

    let mut slots: Vec<Option<T>> = (0..n).map(|_| None).collect();
    for ((_, (item, _)), pos) in indexed.into_iter().zip(stack_positions(n)) {
        slots[pos] = Some(item);
    }
    slots.into_iter().flatten().collect()
}

/// Order product paths by acquisition time around the earliest acquisition.
pub fn order_by_acquisition(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let dated = paths
        .iter()
        .map(|p| acquisition_time(p).map(|t| (p.clone(), t)))
        .collect::<Result<Vec<_>>>()?;
    Ok(temporal_order(dated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_acquisition_time_parses_sixth_field() {
        let p = Path::new(
            "/data/S1A_IW_GRDH_1SDV_Gamma0_20210314T053412_20210314T053437_VV.tif",
        );
        let t = acquisition_time(p).unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2021, 3, 14, 5, 34, 12).unwrap());
    }

    #[test]
    fn test_acquisition_time_rejects_short_name() {
        assert!(acquisition_time(Path::new("tile_a.tif")).is_err());
    }

    #[test]
    fn test_stack_positions_are_a_permutation() {
        for n in 1..12 {
            let mut pos = stack_positions(n);
            pos.sort_unstable();
            assert_eq!(pos, (0..n).collect::<Vec<_>>(), "n = {n}");
        }
    }

    #[test]
    fn test_even_count_layout() {
        // mid = 2: ranks 0..4 -> 2, 1, 3, 0
        assert_eq!(stack_positions(4), vec![2, 1, 3, 0]);
    }
}
