//! Descriptive statistics used by the detectors
//!
//! Building blocks, not user-facing contracts: every function returns zero
//! on empty or degenerate input instead of signaling an error.
//!
//! `compute_median` and `compute_mad` work in place. They take `&mut [T]`
//! so the reordering is visible at the call site; pass a scratch copy when
//! the original order matters.

use num_traits::Float;
use std::cmp::Ordering;

fn len_as<T: Float>(n: usize) -> T {
    T::from(n).unwrap_or_else(T::zero)
}

/// Arithmetic mean
pub fn compute_mean<T: Float>(data: &[T]) -> T {
    if data.is_empty() {
        return T::zero();
    }
    let sum = data.iter().fold(T::zero(), |acc, &x| acc + x);
    sum / len_as(data.len())
}

/// Sample variance with Bessel's correction (n - 1); zero for n <= 1
pub fn compute_variance<T: Float>(data: &[T]) -> T {
    if data.len() <= 1 {
        return T::zero();
    }
    let mean = compute_mean(data);
    let sum_sq = data.iter().fold(T::zero(), |acc, &x| {
        let d = x - mean;
        acc + d * d
    });
    sum_sq / len_as(data.len() - 1)
}

/// Sample standard deviation (square root of `compute_variance`)
pub fn compute_std_dev<T: Float>(data: &[T]) -> T {
    compute_variance(data).sqrt()
}

/// Median of `data`, sorting it in place.
///
/// NaNs compare equal to everything so they never panic the sort.
pub fn compute_median<T: Float>(data: &mut [T]) -> T {
    let n = data.len();
    if n == 0 {
        return T::zero();
    }
    data.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    if n % 2 == 1 {
        data[n / 2]
    } else {
        let two = T::one() + T::one();
        (data[n / 2 - 1] + data[n / 2]) / two
    }
}

/// Median absolute deviation.
///
/// Overwrites `data` with `|x - median|` (sorted) and returns the median of
/// those deviations.
pub fn compute_mad<T: Float>(data: &mut [T]) -> T {
    if data.is_empty() {
        return T::zero();
    }
    let median = compute_median(data);
    for x in data.iter_mut() {
        *x = (*x - median).abs();
    }
    compute_median(data)
}

/// Central moment of the given order around a caller-supplied mean
pub fn compute_moment<T: Float>(data: &[T], mean: T, order: i32) -> T {
    if data.is_empty() {
        return T::zero();
    }
    let sum = data
        .iter()
        .fold(T::zero(), |acc, &x| acc + (x - mean).powi(order));
    sum / len_as(data.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_mean_and_variance() {
        let data = [2.0_f64, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_abs_diff_eq!(compute_mean(&data), 5.0);
        // Sum of squared deviations is 32, n - 1 = 7
        assert_abs_diff_eq!(compute_variance(&data), 32.0 / 7.0, epsilon = 1e-12);
        assert_abs_diff_eq!(compute_std_dev(&data), (32.0_f64 / 7.0).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_inputs_return_zero() {
        let empty: [f32; 0] = [];
        let mut scratch: [f32; 0] = [];
        assert_eq!(compute_mean(&empty), 0.0);
        assert_eq!(compute_variance(&[3.0_f32]), 0.0);
        assert_eq!(compute_median(&mut scratch), 0.0);
        assert_eq!(compute_mad(&mut scratch), 0.0);
        assert_eq!(compute_moment(&empty, 0.0, 2), 0.0);
    }

    #[test]
    fn test_median_sorts_in_place() {
        let mut odd = [5.0_f32, 1.0, 3.0];
        assert_eq!(compute_median(&mut odd), 3.0);
        assert_eq!(odd, [1.0, 3.0, 5.0]);

        let mut even = [4.0_f32, 1.0, 3.0, 2.0];
        assert_eq!(compute_median(&mut even), 2.5);
    }

    #[test]
    fn test_mad_overwrites_with_deviations() {
        let mut data = [1.0_f64, 1.0, 2.0, 2.0, 4.0, 6.0, 9.0];
        // median 2, deviations [1,1,0,0,2,4,7] -> median 1
        assert_eq!(compute_mad(&mut data), 1.0);
        assert_eq!(data, [0.0, 0.0, 1.0, 1.0, 2.0, 4.0, 7.0]);
    }

    #[test]
    fn test_mad_resists_outliers() {
        let mut clean = [1.0_f64, 2.0, 3.0, 4.0, 5.0];
        let mut dirty = [1.0_f64, 2.0, 3.0, 4.0, 500.0];
        assert_eq!(compute_mad(&mut clean), compute_mad(&mut dirty));
    }

    #[test]
    fn test_central_moments() {
        let data = [1.0_f64, -1.0, 1.0, -1.0];
        assert_abs_diff_eq!(compute_moment(&data, 0.0, 2), 1.0);
        assert_abs_diff_eq!(compute_moment(&data, 0.0, 3), 0.0);
        assert_abs_diff_eq!(compute_moment(&data, 0.0, 4), 1.0);
    }
}
