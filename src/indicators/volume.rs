/// Volume contraction analysis
///
/// Compares the latest session's volume with the mean of the sessions before it.

use super::moving_average::mean;

/// Latest volume and the average of the preceding sessions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeSample {
    pub today: f64,
    pub past_avg: f64,
}

/// Split a trailing volume window into (today, mean of the rest)
///
/// Returns None unless the window holds exactly `lookback + 1` observations.
pub fn volume_sample(volumes: &[f64], lookback: usize) -> Option<VolumeSample> {
    if lookback == 0 || volumes.len() != lookback + 1 {
        return None;
    }

    let (past, today) = volumes.split_at(lookback);
    Some(VolumeSample {
        today: today[0],
        past_avg: mean(past)?,
    })
}

/// Equal-weight ratio of average today-volume to average past-volume
///
/// Returns None for an empty sample set or when past volume averages to zero.
pub fn contraction_ratio(samples: &[VolumeSample]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }

    let n = samples.len() as f64;
    let avg_today = samples.iter().map(|s| s.today).sum::<f64>() / n;
    let avg_past = samples.iter().map(|s| s.past_avg).sum::<f64>() / n;

    if avg_past <= 0.0 {
        return None;
    }

    Some(avg_today / avg_past)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_sample() {
        let volumes = vec![1000.0, 2000.0, 3000.0, 2000.0, 500.0];
        let sample = volume_sample(&volumes, 4).unwrap();

        assert_eq!(sample.today, 500.0);
        assert_eq!(sample.past_avg, 2000.0);
    }

    #[test]
    fn test_volume_sample_wrong_length() {
        assert!(volume_sample(&[1.0, 2.0, 3.0], 4).is_none());
    }

    #[test]
    fn test_contraction_ratio_averages_across_symbols() {
        let samples = vec![
            VolumeSample { today: 600.0, past_avg: 1000.0 },
            VolumeSample { today: 1000.0, past_avg: 1000.0 },
        ];

        // (800 / 1000)
        assert_eq!(contraction_ratio(&samples), Some(0.8));
    }

    #[test]
    fn test_contraction_ratio_zero_past_volume() {
        let samples = vec![VolumeSample { today: 10.0, past_avg: 0.0 }];
        assert!(contraction_ratio(&samples).is_none());
        assert!(contraction_ratio(&[]).is_none());
    }
}
