//! Percentile trimming and summary statistics used by the summative characters
//! and the flood exposure tables.
//!
//! Two percentile flavours coexist on purpose: band limits for trimming use
//! the nearest rank, the interquartile range interpolates linearly.

use crate::commons::error::{MorphoError, MorphoResult};

/// Interquartile band used for the trimmed mean
pub const IQ_BAND: (f64, f64) = (25.0, 75.0);

/// Inter-decile band used for the Theil index
pub const ID_BAND: (f64, f64) = (10.0, 90.0);

/// Ascending copy of `values` without NaN
pub fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

/// Percentile of an ascending, non-empty slice with linear interpolation
/// between the two closest ranks. `q` is in [0, 100].
pub fn percentile_linear(sorted: &[f64], q: f64) -> f64 {
    let position = q / 100.0 * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

/// Percentile of an ascending, non-empty slice taking the nearest rank.
/// Half ranks go to the even index.
pub fn percentile_nearest(sorted: &[f64], q: f64) -> f64 {
    let position = (q / 100.0 * (sorted.len() - 1) as f64).round_ties_even() as usize;
    sorted[position.min(sorted.len() - 1)]
}

/// Keep the observations lying inside the inclusive `[lower, upper]`
/// percentile band, in their original order.
///
/// Sequences of two or fewer observations are returned unchanged since no
/// band can be drawn from them. NaN observations are dropped.
pub fn limit_range(values: &[f64], band: (f64, f64)) -> Vec<f64> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if finite.len() <= 2 {
        return finite;
    }

    let sorted = sorted_finite(&finite);
    let (lower, upper) = if band.0 <= band.1 {
        band
    } else {
        (band.1, band.0)
    };
    let low = percentile_nearest(&sorted, lower);
    let high = percentile_nearest(&sorted, upper);

    finite
        .into_iter()
        .filter(|v| low <= *v && *v <= high)
        .collect()
}

/// Arithmetic mean, `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Median with the midpoint of the two central values for even lengths
pub fn median(values: &[f64]) -> Option<f64> {
    let sorted = sorted_finite(values);
    if sorted.is_empty() {
        None
    } else {
        Some(percentile_linear(&sorted, 50.0))
    }
}

/// Theil inequality index `T = sum(s_i * ln(n * s_i))` with `s_i = y_i / sum(y)`.
///
/// Zero observations are lifted to the smallest positive normal float so the
/// logarithm stays defined. 0 for perfect equality.
pub fn theil(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let lifted: Vec<f64> = values
        .iter()
        .map(|&y| if y == 0.0 { f64::MIN_POSITIVE } else { y })
        .collect();
    let total: f64 = lifted.iter().sum();

    lifted
        .iter()
        .map(|&y| {
            let share = y / total;
            share * (n * share).ln()
        })
        .sum()
}

/// Mean of the observations inside the interquartile band
pub fn mean_iq(values: &[f64]) -> MorphoResult<f64> {
    if values.is_empty() {
        return Err(MorphoError::EmptyInput("meanIQ".to_string()));
    }
    let trimmed = limit_range(values, IQ_BAND);
    if trimmed.len() < 2 {
        return Err(MorphoError::UndefinedStatistic {
            statistic: "meanIQ",
            observations: trimmed.len(),
        });
    }
    mean(&trimmed).ok_or_else(|| MorphoError::EmptyInput("meanIQ".to_string()))
}

/// Interquartile range of the untrimmed observations
///
/// Unlike `mean_iq` and `theil_id` nothing is cut before the statistic.
pub fn range_iq(values: &[f64]) -> MorphoResult<f64> {
    let sorted = sorted_finite(values);
    if sorted.is_empty() {
        return Err(MorphoError::EmptyInput("rangeIQ".to_string()));
    }
    Ok(percentile_linear(&sorted, IQ_BAND.1) - percentile_linear(&sorted, IQ_BAND.0))
}

/// Theil index of the observations inside the inter-decile band
pub fn theil_id(values: &[f64]) -> MorphoResult<f64> {
    if values.is_empty() {
        return Err(MorphoError::EmptyInput("TheilID".to_string()));
    }
    let trimmed = limit_range(values, ID_BAND);
    if trimmed.len() < 2 {
        return Err(MorphoError::UndefinedStatistic {
            statistic: "TheilID",
            observations: trimmed.len(),
        });
    }
    Ok(theil(&trimmed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_to_nine() -> Vec<f64> {
        (1..=9).map(|v| v as f64).collect()
    }

    #[test]
    fn test_percentile_linear() {
        let sorted = one_to_nine();
        assert_eq!(percentile_linear(&sorted, 25.0), 3.0);
        assert_eq!(percentile_linear(&sorted, 75.0), 7.0);
        assert_eq!(percentile_linear(&[1.0, 2.0, 3.0, 4.0], 50.0), 2.5);
    }

    #[test]
    fn test_percentile_nearest_ties_to_even() {
        // rank 0.75 -> 1, rank 2.25 -> 2
        let sorted = [10.0, 20.0, 30.0, 40.0];
        assert_eq!(percentile_nearest(&sorted, 25.0), 20.0);
        assert_eq!(percentile_nearest(&sorted, 75.0), 30.0);
        // rank 0.5 -> 0, rank 1.5 -> 2
        let sorted = [1.0, 2.0, 3.0];
        assert_eq!(percentile_nearest(&sorted, 25.0), 1.0);
        assert_eq!(percentile_nearest(&sorted, 75.0), 3.0);
    }

    #[test]
    fn test_limit_range_keeps_band_edges() {
        let trimmed = limit_range(&one_to_nine(), IQ_BAND);
        assert_eq!(trimmed, vec![3.0, 4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_limit_range_keeps_order() {
        let values = [9.0, 1.0, 5.0, 3.0, 7.0];
        assert_eq!(limit_range(&values, IQ_BAND), vec![5.0, 3.0, 7.0]);
    }

    #[test]
    fn test_limit_range_short_sequences_untouched() {
        assert_eq!(limit_range(&[4.0, 1.0], IQ_BAND), vec![4.0, 1.0]);
        assert!(limit_range(&[], ID_BAND).is_empty());
    }

    #[test]
    fn test_mean_iq() {
        assert_eq!(mean_iq(&one_to_nine()).unwrap(), 5.0);
    }

    #[test]
    fn test_range_iq_uses_untrimmed_values() {
        assert!((range_iq(&one_to_nine()).unwrap() - 4.0).abs() < 1e-12);
        // an outlier widens nothing here but would be cut by the trimmed path
        let values = [1.0, 2.0, 3.0, 4.0, 100.0];
        assert_eq!(range_iq(&values).unwrap(), 2.0);
    }

    #[test]
    fn test_theil_of_equal_values_is_zero() {
        assert!(theil(&[3.0; 6]).abs() < 1e-12);
        assert!(theil_id(&[2.5; 10]).unwrap().abs() < 1e-12);
    }

    #[test]
    fn test_theil_grows_with_inequality() {
        let mild = theil(&[4.0, 5.0, 6.0]);
        let strong = theil(&[1.0, 1.0, 13.0]);
        assert!(mild > 0.0);
        assert!(strong > mild);
    }

    #[test]
    fn test_theil_with_zero_observation_is_finite() {
        assert!(theil(&[0.0, 1.0, 2.0]).is_finite());
    }

    #[test]
    fn test_undefined_statistics() {
        assert_eq!(
            mean_iq(&[]),
            Err(MorphoError::EmptyInput("meanIQ".to_string()))
        );
        assert_eq!(
            theil_id(&[7.0]),
            Err(MorphoError::UndefinedStatistic {
                statistic: "TheilID",
                observations: 1
            })
        );
        assert!(range_iq(&[]).is_err());
        assert_eq!(range_iq(&[7.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }
}
