//! Small numeric helpers shared by the correctors.

use std::collections::HashMap;
use std::f64::consts::PI;

use ndarray::{Array1, Array2, Axis};

/// For each query value, the index of the nearest element of `samples`.
///
/// `samples` must be sorted ascending and non-empty. Ties go to the earlier
/// sample. This is deliberately nearest-sample selection, not interpolation:
/// both the gain-time and geometry-time axes are matched to dataset times
/// this way.
pub fn nearest_val_idx(queries: &[f64], samples: &[f64]) -> Vec<usize> {
    assert!(!samples.is_empty(), "nearest_val_idx: no samples");
    queries
        .iter()
        .map(|&q| {
            let i = samples.partition_point(|&s| s < q);
            if i == 0 {
                0
            } else if i == samples.len() {
                samples.len() - 1
            } else if q - samples[i - 1] <= samples[i] - q {
                i - 1
            } else {
                i
            }
        })
        .collect()
}

/// Indices of values common to `a` and `b` when compared at `precision`
/// decimal digits.
///
/// Returns `(idx_a, idx_b)` of equal length; `idx_a` is ascending. When `b`
/// contains duplicates at the given precision, the first occurrence wins.
pub fn common_val_idx(a: &[f64], b: &[f64], precision: u32) -> (Vec<usize>, Vec<usize>) {
    let scale = 10f64.powi(precision as i32);
    let key = |v: f64| (v * scale).round() as i64;
    let mut b_keys: HashMap<i64, usize> = HashMap::with_capacity(b.len());
    for (j, &v) in b.iter().enumerate() {
        b_keys.entry(key(v)).or_insert(j);
    }
    let mut idx_a = vec![];
    let mut idx_b = vec![];
    for (i, &v) in a.iter().enumerate() {
        if let Some(&j) = b_keys.get(&key(v)) {
            idx_a.push(i);
            idx_b.push(j);
        }
    }
    (idx_a, idx_b)
}

/// Reduce an angle in radians to the canonical range (-π, π].
pub fn lobe(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(2.0 * PI);
    if wrapped > PI {
        wrapped - 2.0 * PI
    } else {
        wrapped
    }
}

/// Median of a slice; the mean of the central pair for even lengths.
pub fn median(values: &[f64]) -> f64 {
    assert!(!values.is_empty(), "median: no values");
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("median: non-finite value"));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Median along the second axis of a 2-d array, e.g. per-antenna medians of a
/// `[antenna][time]` table.
pub fn median_axis1(arr: &Array2<f64>) -> Array1<f64> {
    arr.axis_iter(Axis(0))
        .map(|row| median(&row.iter().copied().collect::<Vec<_>>()))
        .collect()
}
