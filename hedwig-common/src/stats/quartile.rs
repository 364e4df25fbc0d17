//! Quartile labelling of ratings

use std::collections::BTreeMap;

/// Label each key with the quartile its value falls in.
///
/// Labels run from 4 (above the upper break point) down to 1. The break
/// points are sample values at sorted positions `q * n - 1` rather than
/// interpolated quartiles: they only need to split the values into four
/// groups of roughly equal size.
pub fn label_quartiles<K: Ord + Clone>(values: &BTreeMap<K, f64>) -> BTreeMap<K, u8> {
    let n = values.len();
    if n == 0 {
        return BTreeMap::new();
    }

    let mut sorted: Vec<f64> = values.values().copied().collect();
    sorted.sort_by(f64::total_cmp);

    let break_point = |q: f64| sorted[((q * n as f64 - 1.0) as i64).max(0) as usize];
    let q1 = break_point(0.25);
    let q2 = break_point(0.5);
    let q3 = break_point(0.75);

    values
        .iter()
        .map(|(key, value)| {
            let label = if *value > q3 {
                4
            } else if *value > q2 {
                3
            } else if *value > q1 {
                2
            } else {
                1
            };
            (key.clone(), label)
        })
        .collect()
}
