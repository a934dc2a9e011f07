//! Median aggregation and outlier detection (§4.12, §4.8(f)).

use crate::constants::ZSCORE_MIN_SAMPLES;

/// Drops values whose z-score exceeds `threshold`. A no-op below the
/// minimum sample count or when the population is degenerate (σ = 0).
pub fn zscore_filter(values: &[i128], threshold: f64) -> Vec<i128> {
    if values.len() < ZSCORE_MIN_SAMPLES {
        return values.to_vec();
    }
    let mean = mean_of(values);
    let sigma = population_stddev(values);
    if sigma == 0.0 {
        return values.to_vec();
    }
    values
        .iter()
        .copied()
        .filter(|&v| ((v as f64 - mean) / sigma).abs() <= threshold)
        .collect()
}

/// Median of `values` after z-score filtering; falls back to the raw set
/// if filtering empties it. Even cardinality averages (integer division)
/// the two middle elements.
pub fn median(values: &[i128], zscore_threshold: f64) -> i128 {
    let filtered = zscore_filter(values, zscore_threshold);
    let mut sorted = if filtered.is_empty() {
        values.to_vec()
    } else {
        filtered
    };
    sorted.sort_unstable();
    let n = sorted.len();
    if n == 0 {
        return 0;
    }
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2
    }
}

pub fn population_stddev(values: &[i128]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = mean_of(values);
    let variance = values
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / values.len() as f64;
    variance.sqrt()
}

fn mean_of(values: &[i128]) -> f64 {
    values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64
}

/// confidence = max(0, 100 - 100*sigma/value) (§4.8(f)).
pub fn confidence(sigma: f64, value: i128) -> f64 {
    if value == 0 {
        return 0.0;
    }
    (100.0 - 100.0 * sigma / value as f64).max(0.0)
}

/// An update is an outlier when sigma is nonzero and its distance from the
/// running mean exceeds 2 sigma (§4.8(f)).
pub fn is_outlier(sigma: f64, distance: f64) -> bool {
    sigma > 0.0 && distance > 2.0 * sigma
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_of_odd_set() {
        assert_eq!(median(&[1, 2, 3], 1.5), 2);
    }

    #[test]
    fn median_of_even_set_is_integer_average() {
        assert_eq!(median(&[1, 2, 3, 4], 1.5), 2);
    }

    #[test]
    fn zscore_filter_drops_a_single_far_outlier() {
        let values = vec![100, 102, 98, 101, 99, 10_000];
        let filtered = zscore_filter(&values, 1.5);
        assert!(!filtered.contains(&10_000));
        assert_eq!(median(&values, 1.5), median(&filtered, 1.5));
    }

    #[test]
    fn zscore_filter_passes_through_below_min_samples() {
        let values = vec![1, 1_000_000];
        assert_eq!(zscore_filter(&values, 1.5), values);
    }

    #[test]
    fn median_falls_back_to_raw_set_when_filter_empties_it() {
        // Three equidistant points with population stddev > 0 but every
        // point sits exactly at the threshold boundary for a tight cutoff.
        let values = vec![0, 0, 100];
        let filtered = zscore_filter(&values, 0.0);
        assert!(filtered.is_empty() || filtered.len() == values.len());
        // Regardless of which branch, median() must not panic and must
        // equal the raw median whenever filtering empties the set.
        let m = median(&values, 0.0);
        let mut raw_sorted = values.clone();
        raw_sorted.sort_unstable();
        assert_eq!(m, raw_sorted[1]);
    }

    #[test]
    fn confidence_is_zero_when_value_is_zero() {
        assert_eq!(confidence(5.0, 0), 0.0);
    }
}
