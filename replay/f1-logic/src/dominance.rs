// Sector dominance: which driver carries the highest average speed through
// each slice of the shared sample range.

use log::debug;

use crate::model::{DriverId, DriverRecord, RgbColor};
use crate::palette::UNKNOWN_COLOR;

pub const DEFAULT_SECTOR_COUNT: usize = 100;

pub(crate) static UNKNOWN: Dominant = Dominant::Unknown;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dominant {
    Driver(DriverId),
    Unknown,
}

impl Dominant {
    pub fn driver(&self) -> Option<&str> {
        match self {
            Dominant::Driver(id) => Some(id),
            Dominant::Unknown => None,
        }
    }

    pub fn label(&self) -> &str {
        self.driver().unwrap_or("unknown")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sector {
    pub start: usize,
    pub end: usize,
    pub dominant: Dominant,
    pub color: RgbColor,
}

/// Per-sample dominance over `[0, min trace length)`.
#[derive(Debug, Clone, PartialEq)]
pub struct SectorDominance {
    pub sector_size: usize,
    pub sectors: Vec<Sector>,
    pub colors: Vec<RgbColor>,
    pub drivers: Vec<Dominant>,
}

impl SectorDominance {
    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    /// Dominant driver at `index`, clamped to the last assigned sample.
    pub fn dominant_at(&self, index: usize) -> &Dominant {
        match self.drivers.len() {
            0 => &UNKNOWN,
            len => &self.drivers[index.min(len - 1)],
        }
    }
}

/// Shortest trace length across the comparison; bounds every per-frame index.
pub fn min_trace_length(drivers: &[DriverRecord]) -> usize {
    drivers.iter().map(DriverRecord::len).min().unwrap_or(0)
}

/// Splits `[0, min length)` into sectors of `max(1, min length / num_sectors)`
/// samples (the last one may be shorter) and assigns each sector to the driver
/// with the strictly highest mean speed. Ties go to the earlier driver.
pub fn calculate_sector_dominance(drivers: &[DriverRecord], num_sectors: usize) -> SectorDominance {
    let min_length = min_trace_length(drivers);
    let sector_size = (min_length / num_sectors.max(1)).max(1);

    let mut sectors = Vec::with_capacity(min_length / sector_size + 1);
    let mut colors = Vec::with_capacity(min_length);
    let mut dominant_drivers = Vec::with_capacity(min_length);

    for start in (0..min_length).step_by(sector_size) {
        let end = (start + sector_size).min(min_length);

        let mut fastest: Option<(&DriverRecord, f64)> = None;
        for driver in drivers {
            let avg_speed = match mean_speed(driver, start, end) {
                Some(speed) => speed,
                None => continue,
            };
            let faster = match fastest {
                Some((_, best)) => avg_speed > best,
                None => true,
            };
            if faster {
                fastest = Some((driver, avg_speed));
            }
        }

        let (dominant, color) = match fastest {
            Some((driver, _)) => (Dominant::Driver(driver.id.clone()), driver.color),
            None => (Dominant::Unknown, UNKNOWN_COLOR),
        };

        let points_in_sector = end - start;
        colors.extend(std::iter::repeat(color).take(points_in_sector));
        dominant_drivers.extend(std::iter::repeat(dominant.clone()).take(points_in_sector));
        sectors.push(Sector {
            start,
            end,
            dominant,
            color,
        });
    }

    debug!(
        "sector dominance: {} samples, {} sectors of {}",
        min_length,
        sectors.len(),
        sector_size
    );

    SectorDominance {
        sector_size,
        sectors,
        colors,
        drivers: dominant_drivers,
    }
}

fn mean_speed(driver: &DriverRecord, start: usize, end: usize) -> Option<f64> {
    let end = end.min(driver.len());
    if start >= end {
        return None;
    }
    let slice = &driver.telemetry[start..end];
    let mean = slice.iter().map(|sample| sample.speed).sum::<f64>() / slice.len() as f64;
    if mean.is_nan() {
        None
    } else {
        Some(mean)
    }
}
