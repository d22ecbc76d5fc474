// Axis extents and header labels derived from the loaded telemetry.

use crate::layout::TrackGeometry;
use crate::model::{format_lap_time, DriverRecord, TelemetrySample};
use crate::replay::ReplayVariant;

const TRACK_PADDING: f64 = 0.1;
const CAR_SIZE: f64 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisRange {
    pub min: f64,
    pub max: f64,
}

impl AxisRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    /// Position of `value` inside the range as a fraction, 0 at `min`.
    pub fn fraction(&self, value: f64) -> f64 {
        let span = self.span();
        if span.abs() < f64::EPSILON {
            0.0
        } else {
            (value - self.min) / span
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartExtents {
    pub distance: AxisRange,
    pub speed: AxisRange,
    pub throttle: AxisRange,
    pub brake: AxisRange,
    pub delta: AxisRange,
    pub track_x: AxisRange,
    pub track_y: AxisRange,
    pub car_radius: f64,
}

pub fn chart_extents(drivers: &[DriverRecord], track: &TrackGeometry, variant: ReplayVariant) -> ChartExtents {
    let max_of = |field: fn(&TelemetrySample) -> f64| {
        drivers
            .iter()
            .flat_map(|driver| driver.telemetry.iter())
            .map(field)
            .filter(|value| value.is_finite())
            .fold(0.0, f64::max)
    };
    let max_distance = max_of(|s| s.distance);
    let max_speed = max_of(|s| s.speed);
    let max_throttle = max_of(|s| s.throttle);
    let max_brake = max_of(|s| s.brake);

    let brake = match variant {
        ReplayVariant::Session => AxisRange::new(0.0, 1.1),
        ReplayVariant::Qualifying => AxisRange::new(0.0, (max_brake * 1.2).max(5.0)),
    };

    let (min_x, max_x, min_y, max_y) = if track.is_empty() {
        (0.0, 0.0, 0.0, 0.0)
    } else {
        track.bounds()
    };
    let x_range = max_x - min_x;
    let y_range = max_y - min_y;

    ChartExtents {
        distance: AxisRange::new(0.0, max_distance),
        speed: AxisRange::new(0.0, max_speed * 1.05),
        throttle: AxisRange::new(0.0, (max_throttle * 1.05).max(100.0)),
        brake,
        delta: AxisRange::new(-1.0, 1.0),
        track_x: AxisRange::new(min_x - TRACK_PADDING * x_range, max_x + TRACK_PADDING * x_range),
        track_y: AxisRange::new(min_y - TRACK_PADDING * y_range, max_y + TRACK_PADDING * y_range),
        car_radius: x_range.max(y_range) * CAR_SIZE,
    }
}

/// `P{pos}: {driver} ({team}) - {lap}` for every driver, by finishing position.
pub fn header_labels(drivers: &[DriverRecord]) -> Vec<String> {
    let mut sorted: Vec<&DriverRecord> = drivers.iter().collect();
    sorted.sort_by_key(|driver| driver.position);
    sorted
        .into_iter()
        .map(|driver| {
            format!(
                "P{}: {} ({}) - {}",
                driver.position,
                driver.id,
                driver.team,
                format_lap_time(driver.lap_time)
            )
        })
        .collect()
}
