/// Weighted quantile of `(value, weight)` pairs, Hazen plotting positions.
///
/// Sorts `samples` by value in place. The sort is stable, so equal values
/// keep the order they were gathered in. Each sample sits at
/// `p_i = (C_i - w_i / 2) / C_n` where `C_i` is the cumulative weight, and the
/// quantile is linearly interpolated between neighbouring positions, clamped
/// to the first/last value outside `[p_0, p_n]`.
///
/// Returns `None` when there are no samples or the total weight is not positive.
pub fn weighted_quantile(samples: &mut [(f32, f32)], quantile: f64) -> Option<f32> {
    if samples.is_empty() {
        return None;
    }
    samples.sort_by(|a, b| a.0.total_cmp(&b.0));

    let total: f64 = samples.iter().map(|&(_, w)| w as f64).sum();
    if total <= 0.0 {
        return None;
    }

    let mut cumulative = 0.0f64;
    let mut prev: Option<(f64, f32)> = None;
    for &(value, weight) in samples.iter() {
        let w = weight as f64;
        cumulative += w;
        let position = (cumulative - 0.5 * w) / total;

        if quantile < position {
            return Some(match prev {
                None => value,
                Some((p0, v0)) => {
                    let t = (quantile - p0) / (position - p0);
                    (v0 as f64 + t * (value as f64 - v0 as f64)) as f32
                }
            });
        }
        prev = Some((position, value));
    }

    prev.map(|(_, v)| v)
}

/// Convenience wrapper over parallel value and weight slices.
pub fn weighted_quantile_of(values: &[f32], weights: &[f32], quantile: f64) -> Option<f32> {
    let mut samples: Vec<(f32, f32)> = values.iter().copied().zip(weights.iter().copied()).collect();
    weighted_quantile(&mut samples, quantile)
}

/// Unweighted median. Uses `select_nth_unstable` for O(n) median without full sort.
pub fn median(values: &mut [f32]) -> Option<f32> {
    let n = values.len();
    if n == 0 {
        return None;
    }
    if n == 1 {
        return Some(values[0]);
    }
    let mid = n / 2;
    if n % 2 == 1 {
        Some(*values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b)).1)
    } else {
        values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
        values[..mid].select_nth_unstable_by(mid - 1, |a, b| a.total_cmp(b));
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_sample() {
        assert_eq!(weighted_quantile(&mut [(4.0, 1.0)], 0.9), Some(4.0));
    }

    #[test]
    fn test_zero_total_weight() {
        assert_eq!(weighted_quantile(&mut [(1.0, 0.0), (2.0, 0.0)], 0.5), None);
    }

    #[test]
    fn test_clamped_ends() {
        let mut s = [(1.0, 1.0), (2.0, 1.0), (3.0, 1.0)];
        assert_eq!(weighted_quantile(&mut s, 0.0), Some(1.0));
        assert_eq!(weighted_quantile(&mut s, 1.0), Some(3.0));
    }

    #[test]
    fn test_heavy_weight_pulls_quantile() {
        let mut s = [(1.0, 0.1), (10.0, 0.8), (20.0, 0.1)];
        assert_eq!(weighted_quantile(&mut s, 0.5), Some(10.0));
    }

    #[test]
    fn test_median_even() {
        let mut v = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(median(&mut v), Some(2.5));
    }
}
