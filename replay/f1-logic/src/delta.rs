// Time delta of every driver against the fastest lap, aligned by distance.

use log::debug;

use crate::model::DriverRecord;

pub const SMOOTHING_WINDOW: usize = 15;

/// Index of the driver with the lowest lap time. Drivers without a time never
/// win unless nobody has one; the earliest driver wins ties.
pub fn reference_driver(drivers: &[DriverRecord]) -> Option<usize> {
    drivers
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (index, driver)| {
            let lap_time = driver.lap_time.unwrap_or(f64::INFINITY);
            match best {
                Some((_, best_time)) if lap_time >= best_time => best,
                _ => Some((index, lap_time)),
            }
        })
        .map(|(index, _)| index)
}

/// Index of the value closest to `target` in an ascending slice. Equal
/// distances resolve to the lowest index, the same answer a linear argmin gives.
pub fn nearest_index(sorted: &[f64], target: f64) -> Option<usize> {
    if sorted.is_empty() {
        return None;
    }
    let upper = sorted.partition_point(|value| *value < target);
    let candidate = if upper == 0 {
        0
    } else if upper == sorted.len() {
        sorted.len() - 1
    } else if (sorted[upper - 1] - target).abs() <= (sorted[upper] - target).abs() {
        upper - 1
    } else {
        upper
    };
    // Step back to the first occurrence of a repeated value.
    let value = sorted[candidate];
    Some(sorted[..candidate].partition_point(|v| *v < value))
}

/// Raw elapsed-time delta of `target` against `reference`, one value per
/// target sample, matching each target distance to the nearest reference
/// distance.
pub fn raw_delta(target: &DriverRecord, reference: &DriverRecord) -> Vec<f64> {
    let reference_distances: Vec<f64> = reference.telemetry.iter().map(|s| s.distance).collect();
    let reference_elapsed = reference.elapsed_times();
    let target_elapsed = target.elapsed_times();

    target
        .telemetry
        .iter()
        .zip(&target_elapsed)
        .map(|(sample, elapsed)| match nearest_index(&reference_distances, sample.distance) {
            Some(closest) => elapsed - reference_elapsed[closest],
            None => 0.0,
        })
        .collect()
}

/// Centered moving average; the window shrinks at both ends instead of padding.
pub fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    let half = window / 2;
    (0..values.len())
        .map(|j| {
            let start = j.saturating_sub(half);
            let end = (j + half + 1).min(values.len());
            let slice = &values[start..end];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}

/// Smoothed delta curves for every driver, in driver order. The reference
/// driver's curve is all zeros.
pub fn delta_curves(drivers: &[DriverRecord], reference: usize) -> Vec<Vec<f64>> {
    drivers
        .iter()
        .enumerate()
        .map(|(index, driver)| {
            if index == reference {
                vec![0.0; driver.len()]
            } else {
                let curve = moving_average(&raw_delta(driver, &drivers[reference]), SMOOTHING_WINDOW);
                debug!(
                    "{} delta to {} at finish: {:.3}s",
                    driver.id,
                    drivers[reference].id,
                    curve.last().copied().unwrap_or_default()
                );
                curve
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RgbColor, TelemetrySample};

    fn driver(id: &str, lap_time: Option<f64>, samples: &[(f64, f64)]) -> DriverRecord {
        DriverRecord {
            id: id.to_string(),
            color: RgbColor::new(1, 2, 3),
            team: "Team".to_string(),
            lap_time,
            position: 1,
            telemetry: samples
                .iter()
                .map(|&(distance, time)| TelemetrySample {
                    distance,
                    time,
                    speed: 200.0,
                    throttle: 100.0,
                    brake: 0.0,
                    position: None,
                })
                .collect(),
        }
    }

    fn linear_argmin(values: &[f64], target: f64) -> usize {
        let mut best = 0;
        for (i, value) in values.iter().enumerate() {
            if (value - target).abs() < (values[best] - target).abs() {
                best = i;
            }
        }
        best
    }

    #[test]
    fn test_reference_is_fastest_lap() {
        let drivers = vec![
            driver("AAA", Some(81.2), &[]),
            driver("BBB", Some(80.9), &[]),
            driver("CCC", Some(80.9), &[]),
        ];
        assert_eq!(reference_driver(&drivers), Some(1));

        let drivers = vec![driver("AAA", None, &[]), driver("BBB", Some(95.0), &[])];
        assert_eq!(reference_driver(&drivers), Some(1));

        let drivers = vec![driver("AAA", None, &[]), driver("BBB", None, &[])];
        assert_eq!(reference_driver(&drivers), Some(0));
        assert_eq!(reference_driver(&[]), None);
    }

    #[test]
    fn test_nearest_index_matches_linear_scan() {
        let sorted = vec![0.0, 1.0, 1.0, 1.0, 2.5, 4.0, 4.0, 7.0, 11.0];
        for step in -20..260 {
            let target = step as f64 * 0.05;
            assert_eq!(
                nearest_index(&sorted, target),
                Some(linear_argmin(&sorted, target)),
                "target {}",
                target
            );
        }
        assert_eq!(nearest_index(&[], 1.0), None);
        assert_eq!(nearest_index(&[5.0], -100.0), Some(0));
    }

    #[test]
    fn test_nearest_index_midpoint_prefers_lower() {
        assert_eq!(nearest_index(&[0.0, 2.0], 1.0), Some(0));
        assert_eq!(nearest_index(&[0.0, 2.0, 2.0], 2.0), Some(1));
    }

    #[test]
    fn test_moving_average_shrinks_at_edges() {
        let values: Vec<f64> = (0..20).map(|v| v as f64).collect();
        let smoothed = moving_average(&values, 15);
        assert_eq!(smoothed.len(), values.len());
        // j = 0 averages 0..=7
        assert!((smoothed[0] - 3.5).abs() < 1e-12);
        // j = 10 averages 3..=17
        assert!((smoothed[10] - 10.0).abs() < 1e-12);
        // j = 19 averages 12..=19
        assert!((smoothed[19] - 15.5).abs() < 1e-12);
        assert!(moving_average(&[], 15).is_empty());
    }

    #[test]
    fn test_constant_gap_is_preserved() {
        // Target covers the same distances half a second slower per 100 m.
        let reference: Vec<(f64, f64)> = (0..50).map(|i| (i as f64 * 100.0, 10.0 + i as f64)).collect();
        let target: Vec<(f64, f64)> = (0..50).map(|i| (i as f64 * 100.0, 3.0 + i as f64 * 1.5)).collect();
        let drivers = vec![driver("REF", Some(49.0), &reference), driver("TGT", Some(73.5), &target)];

        let raw = raw_delta(&drivers[1], &drivers[0]);
        for (i, delta) in raw.iter().enumerate() {
            assert!((delta - i as f64 * 0.5).abs() < 1e-9);
        }

        let curves = delta_curves(&drivers, 0);
        assert_eq!(curves.len(), 2);
        assert_eq!(curves[0], vec![0.0; 50]);
        assert_eq!(curves[1].len(), 50);
        // Linear input keeps its value under a symmetric window.
        assert!((curves[1][25] - 12.5).abs() < 1e-9);
    }

    #[test]
    fn test_alignment_uses_distance_not_index() {
        // Reference sampled twice as densely as the target.
        let reference: Vec<(f64, f64)> = (0..21).map(|i| (i as f64 * 5.0, i as f64 * 0.5)).collect();
        let target: Vec<(f64, f64)> = (0..11).map(|i| (i as f64 * 10.0, i as f64 * 1.2)).collect();
        let drivers = vec![driver("REF", Some(10.0), &reference), driver("TGT", Some(12.0), &target)];
        let raw = raw_delta(&drivers[1], &drivers[0]);
        assert_eq!(raw.len(), 11);
        for (i, delta) in raw.iter().enumerate() {
            assert!((delta - i as f64 * 0.2).abs() < 1e-9);
        }
    }

    #[test]
    fn test_reference_curve_is_zero_whatever_its_position() {
        let a: Vec<(f64, f64)> = (0..30).map(|i| (i as f64, i as f64 * 0.3)).collect();
        let b: Vec<(f64, f64)> = (0..35).map(|i| (i as f64, i as f64 * 0.2)).collect();
        let drivers = vec![driver("AAA", Some(9.0), &a), driver("BBB", Some(7.0), &b)];
        let reference = reference_driver(&drivers).unwrap();
        assert_eq!(reference, 1);
        let curves = delta_curves(&drivers, reference);
        assert_eq!(curves[1].len(), 35);
        assert!(curves[1].iter().all(|v| *v == 0.0));
        assert_eq!(curves[0].len(), 30);
    }
}
