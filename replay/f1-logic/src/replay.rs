// Precomputed replay state: everything a frame needs, built once before playback.

use log::info;

use crate::chart::{chart_extents, ChartExtents};
use crate::delta::{delta_curves, reference_driver};
use crate::dominance::{calculate_sector_dominance, min_trace_length, SectorDominance, DEFAULT_SECTOR_COUNT};
use crate::error::{ReplayError, Result};
use crate::frame::{synthesize_frame, DrawInstruction};
use crate::layout::TrackGeometry;
use crate::model::DriverRecord;

/// How a frame index maps onto each driver's trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimingModel {
    /// The frame is a sample index; every driver advances one sample per frame.
    SampleIndex,
    /// The frame drives a shared lap clock and each driver shows the sample
    /// closest to that clock.
    ElapsedTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayVariant {
    /// Single-lap comparison of the qualifying top 3.
    Qualifying,
    /// Any-session comparison with time delta traces.
    Session,
}

impl ReplayVariant {
    pub fn timing(&self) -> TimingModel {
        match self {
            ReplayVariant::Qualifying => TimingModel::SampleIndex,
            ReplayVariant::Session => TimingModel::ElapsedTime,
        }
    }

    /// Track and trace segments are only emitted for frames above this.
    pub fn frame_threshold(&self) -> usize {
        match self {
            ReplayVariant::Qualifying => 1,
            ReplayVariant::Session => 10,
        }
    }

    /// A driver's traces are only emitted once its own clamped frame is above this.
    pub fn driver_threshold(&self) -> usize {
        match self {
            ReplayVariant::Qualifying => 0,
            ReplayVariant::Session => 10,
        }
    }

    pub fn with_delta(&self) -> bool {
        matches!(self, ReplayVariant::Session)
    }

    pub fn frame_interval_ms(&self) -> u64 {
        match self {
            ReplayVariant::Qualifying => 75,
            ReplayVariant::Session => 20,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReplayState {
    pub(crate) variant: ReplayVariant,
    pub(crate) drivers: Vec<DriverRecord>,
    pub(crate) track: TrackGeometry,
    pub(crate) dominance: SectorDominance,
    pub(crate) reference: usize,
    /// Smoothed delta per driver, empty when the variant has no delta traces.
    pub(crate) deltas: Vec<Vec<f64>>,
    pub(crate) elapsed: Vec<Vec<f64>>,
    pub(crate) frame_count: usize,
    pub(crate) time_per_frame: f64,
    pub(crate) extents: ChartExtents,
}

impl ReplayState {
    pub fn new(drivers: Vec<DriverRecord>, variant: ReplayVariant) -> Result<Self> {
        Self::with_sector_count(drivers, variant, DEFAULT_SECTOR_COUNT)
    }

    pub fn with_sector_count(
        drivers: Vec<DriverRecord>,
        variant: ReplayVariant,
        num_sectors: usize,
    ) -> Result<Self> {
        if drivers.len() < 2 {
            return Err(ReplayError::TooFewDrivers { found: drivers.len() });
        }
        let frame_count = min_trace_length(&drivers);
        if frame_count < 1 {
            return Err(ReplayError::InsufficientData {
                what: "telemetry trace",
                needed: 1,
                got: 0,
            });
        }

        let track = TrackGeometry::from_driver(&drivers[0])?;
        let dominance = calculate_sector_dominance(&drivers, num_sectors);
        let reference = reference_driver(&drivers).unwrap_or(0);
        let deltas = if variant.with_delta() {
            delta_curves(&drivers, reference)
        } else {
            Vec::new()
        };
        let elapsed: Vec<Vec<f64>> = drivers.iter().map(DriverRecord::elapsed_times).collect();

        // Slowest lap spread over the shortest trace.
        let slowest_lap = drivers
            .iter()
            .filter_map(|driver| driver.lap_time)
            .fold(None, |acc: Option<f64>, t| Some(acc.map_or(t, |a| a.max(t))))
            .unwrap_or_else(|| {
                elapsed
                    .iter()
                    .filter_map(|e| e.last().copied())
                    .fold(0.0, f64::max)
            });
        let time_per_frame = slowest_lap / frame_count as f64;

        let extents = chart_extents(&drivers, &track, variant);

        info!(
            "replay ready: {} drivers, {} frames, reference {}, {} sectors",
            drivers.len(),
            frame_count,
            drivers[reference].id,
            dominance.sectors.len()
        );

        Ok(Self {
            variant,
            drivers,
            track,
            dominance,
            reference,
            deltas,
            elapsed,
            frame_count,
            time_per_frame,
            extents,
        })
    }

    /// The draw instruction for one frame in `[0, frame_count)`.
    pub fn frame(&self, frame: usize) -> Result<DrawInstruction> {
        synthesize_frame(frame, self)
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn variant(&self) -> ReplayVariant {
        self.variant
    }

    pub fn drivers(&self) -> &[DriverRecord] {
        &self.drivers
    }

    pub fn track(&self) -> &TrackGeometry {
        &self.track
    }

    pub fn dominance(&self) -> &SectorDominance {
        &self.dominance
    }

    pub fn reference_driver(&self) -> &DriverRecord {
        &self.drivers[self.reference]
    }

    pub fn delta_curve(&self, driver: usize) -> Option<&[f64]> {
        self.deltas.get(driver).map(Vec::as_slice)
    }

    pub fn extents(&self) -> &ChartExtents {
        &self.extents
    }

    pub fn time_per_frame(&self) -> f64 {
        self.time_per_frame
    }
}
