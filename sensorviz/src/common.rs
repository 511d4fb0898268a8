/// Generate a vec of domain values which are linearly spaced between `start` and `end` and which
/// have a count of `count`. The first value will be `start` and the last value will be `end`. A
/// count of one produces only `start`, and a count of zero produces an empty vec.
///
/// # Arguments
///
/// * `start`: the starting value of the domain, inclusive
/// * `end`: the ending value of the domain, inclusive
/// * `count`: the total number of discrete, evenly spaced values in the domain
///
/// returns: Vec<f64, Global>
///
/// # Examples
///
/// ```
/// use sensorviz::common::linear_space;
/// let domain = linear_space(0.0, 1.0, 3);
/// assert_eq!(domain, vec![0.0, 0.5, 1.0]);
/// ```
pub fn linear_space(start: f64, end: f64, count: usize) -> Vec<f64> {
    if count < 2 {
        return vec![start; count];
    }

    let step = (end - start) / (count - 1) as f64;
    let mut result = Vec::with_capacity(count);
    for i in 0..count - 1 {
        result.push(start + i as f64 * step);
    }

    // The last value is pinned so that the end of the domain is hit exactly
    result.push(end);
    result
}

/// Pick `count` indices evenly spread over `0..len`, always including the first and the last
/// index when `count >= 2`. If `count >= len` every index is returned.
pub fn spread_indices(len: usize, count: usize) -> Vec<usize> {
    if count >= len {
        return (0..len).collect();
    }

    linear_space(0.0, (len - 1) as f64, count)
        .into_iter()
        .map(|f| f.round() as usize)
        .collect()
}

/// Returns `value` if it is finite, otherwise `fallback`. Values typed into free-form number
/// fields can transiently be NaN or infinite, so this is the first step of every sanitizer.
pub fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() { value } else { fallback }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use test_case::test_case;

    #[test]
    fn linear_space_hits_both_ends() {
        let values = linear_space(-15.0, 15.0, 16);
        assert_eq!(values.len(), 16);
        assert_eq!(values[0], -15.0);
        assert_eq!(values[15], 15.0);
        assert_relative_eq!(values[1] - values[0], 2.0, epsilon = 1e-12);
    }

    #[test_case(0, 0)]
    #[test_case(1, 1)]
    fn linear_space_degenerate(count: usize, expected: usize) {
        let values = linear_space(3.0, 7.0, count);
        assert_eq!(values.len(), expected);
        assert!(values.iter().all(|v| *v == 3.0));
    }

    #[test]
    fn spread_indices_keeps_extremes() {
        let indices = spread_indices(128, 5);
        assert_eq!(indices, vec![0, 32, 64, 95, 127]);
    }

    #[test]
    fn spread_indices_saturates() {
        assert_eq!(spread_indices(4, 10), vec![0, 1, 2, 3]);
    }

    #[test]
    fn finite_or_replaces_nan() {
        assert_eq!(finite_or(f64::NAN, 2.0), 2.0);
        assert_eq!(finite_or(f64::INFINITY, 2.0), 2.0);
        assert_eq!(finite_or(1.5, 2.0), 1.5);
    }
}
