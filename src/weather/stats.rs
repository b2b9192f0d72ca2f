//! Descriptive statistics over one timestep's ensemble values

/// Round to 2 decimals
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Round to 3 decimals
pub fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Median of already-sorted values
fn median_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Sample standard deviation; 0 for fewer than two values
pub fn sample_stddev(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let m = values.iter().sum::<f64>() / n as f64;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / (n - 1) as f64).sqrt()
}

/// First and third quartiles using the exclusive method
///
/// Positions are interpolated on `(n + 1)` with the index clamped to the
/// data, so with two values the quartiles extrapolate past the extremes. A
/// single value is its own quartile.
pub fn quartiles_sorted(sorted: &[f64]) -> (f64, f64) {
    let n = sorted.len();
    match n {
        0 => (f64::NAN, f64::NAN),
        1 => (sorted[0], sorted[0]),
        _ => {
            let m = (n + 1) as i64;
            let at = |i: i64| {
                let j = (i * m / 4).clamp(1, n as i64 - 1);
                let delta = (i * m - j * 4) as f64;
                let j = j as usize;
                (sorted[j - 1] * (4.0 - delta) + sorted[j] * delta) / 4.0
            };
            (at(1), at(3))
        }
    }
}

/// Summary of the values observed at one timestep
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointStats {
    pub mean: f64,
    pub median: f64,
    pub stddev: f64,
    pub min: f64,
    pub max: f64,
    pub percentile_25: f64,
    pub percentile_75: f64,
    pub spread: f64,
}

impl PointStats {
    /// Compute unrounded statistics; `None` for an empty slice
    pub fn compute(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let min = sorted[0];
        let max = sorted[sorted.len() - 1];
        let (p25, p75) = quartiles_sorted(&sorted);

        Some(Self {
            mean: sorted.iter().sum::<f64>() / sorted.len() as f64,
            median: median_sorted(&sorted),
            stddev: sample_stddev(&sorted),
            min,
            max,
            percentile_25: p25,
            percentile_75: p75,
            spread: max - min,
        })
    }

    pub fn rounded(self) -> Self {
        Self {
            mean: round2(self.mean),
            median: round2(self.median),
            stddev: round2(self.stddev),
            min: round2(self.min),
            max: round2(self.max),
            percentile_25: round2(self.percentile_25),
            percentile_75: round2(self.percentile_75),
            spread: round2(self.spread),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_rounding() {
        assert_eq!(round2(1.005_1), 1.01);
        assert_eq!(round2(-2.344), -2.34);
        assert_eq!(round3(0.123_45), 0.123);
    }

    #[test]
    fn test_sample_stddev() {
        assert_eq!(sample_stddev(&[42.0]), 0.0);
        assert!(close(sample_stddev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), 2.138_089_935_299_395));
    }

    #[test]
    fn test_quartiles_exclusive_method() {
        // Matches the exclusive quantile method: [1..=9] -> 2.5, 7.5
        let data: Vec<f64> = (1..=9).map(f64::from).collect();
        assert_eq!(quartiles_sorted(&data), (2.5, 7.5));

        // Four points: positions 1.25 and 3.75
        assert_eq!(quartiles_sorted(&[1.0, 2.0, 3.0, 4.0]), (1.25, 3.75));

        // Two points extrapolate beyond the data
        assert_eq!(quartiles_sorted(&[1.0, 2.0]), (0.75, 2.25));

        assert_eq!(quartiles_sorted(&[5.5]), (5.5, 5.5));
    }

    #[test]
    fn test_point_stats_three_models() {
        let stats = PointStats::compute(&[52.0, 48.0, 50.0]).unwrap();
        assert!(close(stats.mean, 50.0));
        assert!(close(stats.median, 50.0));
        assert!(close(stats.stddev, 2.0));
        assert_eq!(stats.min, 48.0);
        assert_eq!(stats.max, 52.0);
        assert_eq!(stats.spread, 4.0);
        assert_eq!(stats.percentile_25, 48.0);
        assert_eq!(stats.percentile_75, 52.0);
    }

    #[test]
    fn test_point_stats_single_value() {
        let stats = PointStats::compute(&[61.3]).unwrap();
        assert_eq!(stats.stddev, 0.0);
        assert_eq!(stats.spread, 0.0);
        assert_eq!(stats.percentile_25, 61.3);
        assert_eq!(stats.percentile_75, 61.3);
    }

    #[test]
    fn test_point_stats_empty() {
        assert!(PointStats::compute(&[]).is_none());
        assert!(mean(&[]).is_none());
    }

    #[test]
    fn test_even_median() {
        let stats = PointStats::compute(&[1.0, 4.0, 2.0, 3.0]).unwrap();
        assert_eq!(stats.median, 2.5);
    }
}
