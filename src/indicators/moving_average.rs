/// Arithmetic mean of a whole series
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (divides by `n`, not `n - 1`)
pub fn population_std(values: &[f64]) -> Option<f64> {
    let avg = mean(values)?;
    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[100.0, 102.0, 104.0, 106.0, 108.0]), Some(104.0));
    }

    #[test]
    fn test_population_std() {
        // mean 5, squared deviations sum to 32, n = 8
        let values = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(population_std(&values), Some(2.0));
    }

    #[test]
    fn test_empty_series() {
        assert!(mean(&[]).is_none());
        assert!(population_std(&[]).is_none());
    }
}
