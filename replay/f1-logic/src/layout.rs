// Track outline normalization for display framing.

use std::f64::consts::PI;

use log::{debug, warn};

use crate::error::{ReplayError, Result};
use crate::model::{DriverRecord, Point};

const ROTATION_STEP_DEG: usize = 10;
const HEIGHT_EPSILON: f64 = 0.001;
const PLACEHOLDER_RADIUS: f64 = 1000.0;

/// Display outline of the circuit, one point per reference sample.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackGeometry {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    /// Rotation applied to the centered raw positions, `None` for the placeholder.
    pub rotation_deg: Option<usize>,
}

impl TrackGeometry {
    /// Builds the outline from a driver's positions, or a placeholder circle
    /// when the trace carries no position data.
    pub fn from_driver(driver: &DriverRecord) -> Result<Self> {
        if driver.has_positions() {
            let (x, y): (Vec<f64>, Vec<f64>) = driver
                .telemetry
                .iter()
                .filter_map(|sample| sample.position)
                .map(|point| (point.x, point.y))
                .unzip();
            optimize_track_layout(&x, &y)
        } else {
            warn!("{} has no position data, using placeholder track", driver.id);
            Ok(placeholder_circle(driver.len()))
        }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn point(&self, index: usize) -> Point {
        Point::new(self.x[index], self.y[index])
    }

    /// `(min_x, max_x, min_y, max_y)`
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        let (min_x, max_x) = min_max(&self.x);
        let (min_y, max_y) = min_max(&self.y);
        (min_x, max_x, min_y, max_y)
    }
}

/// Centers the outline and rotates it on a 10 degree grid so that it is as
/// wide as possible relative to its height. The first best angle wins.
pub fn optimize_track_layout(track_x: &[f64], track_y: &[f64]) -> Result<TrackGeometry> {
    let count = track_x.len().min(track_y.len());
    if count < 1 {
        return Err(ReplayError::InsufficientData {
            what: "track layout",
            needed: 1,
            got: count,
        });
    }
    let (track_x, track_y) = (&track_x[..count], &track_y[..count]);

    let mean_x = track_x.iter().sum::<f64>() / count as f64;
    let mean_y = track_y.iter().sum::<f64>() / count as f64;
    let centered_x: Vec<f64> = track_x.iter().map(|x| x - mean_x).collect();
    let centered_y: Vec<f64> = track_y.iter().map(|y| y - mean_y).collect();

    let mut best: Option<(f64, usize, Vec<f64>, Vec<f64>)> = None;
    for angle_deg in (0..180).step_by(ROTATION_STEP_DEG) {
        let (x_rot, y_rot) = rotate(&centered_x, &centered_y, angle_deg);

        let (min_x, max_x) = min_max(&x_rot);
        let (min_y, max_y) = min_max(&y_rot);
        let width_ratio = (max_x - min_x) / (max_y - min_y + HEIGHT_EPSILON);

        let better = match &best {
            Some((best_ratio, ..)) => width_ratio > *best_ratio,
            None => true,
        };
        if better {
            best = Some((width_ratio, angle_deg, x_rot, y_rot));
        }
    }

    // The grid is never empty, so a candidate always exists.
    let (ratio, angle_deg, x, y) = best.ok_or(ReplayError::InsufficientData {
        what: "track layout",
        needed: 1,
        got: 0,
    })?;
    debug!("track rotated by {} deg, width ratio {:.3}", angle_deg, ratio);

    Ok(TrackGeometry {
        x,
        y,
        rotation_deg: Some(angle_deg),
    })
}

/// Stand-in outline for traces without positions: a circle of radius 1000
/// sampled at `count` evenly spaced angles including both ends.
pub fn placeholder_circle(count: usize) -> TrackGeometry {
    let step = if count > 1 {
        2.0 * PI / (count - 1) as f64
    } else {
        0.0
    };
    let (x, y) = (0..count)
        .map(|i| {
            let angle = step * i as f64;
            (PLACEHOLDER_RADIUS * angle.cos(), PLACEHOLDER_RADIUS * angle.sin())
        })
        .unzip();
    TrackGeometry {
        x,
        y,
        rotation_deg: None,
    }
}

fn rotate(x: &[f64], y: &[f64], angle_deg: usize) -> (Vec<f64>, Vec<f64>) {
    let (sin, cos) = (angle_deg as f64).to_radians().sin_cos();
    x.iter()
        .zip(y)
        .map(|(x, y)| (x * cos - y * sin, x * sin + y * cos))
        .unzip()
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::MAX, f64::MIN), |(min, max), v| (min.min(*v), max.max(*v)))
}
