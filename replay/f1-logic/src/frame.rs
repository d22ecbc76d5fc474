// Frame synthesis: turns a frame index and the precomputed replay state into
// plain draw instructions for the rendering surface.

use crate::delta::nearest_index;
use crate::dominance::{Dominant, UNKNOWN};
use crate::error::{ReplayError, Result};
use crate::model::{DriverId, DriverRecord, Point, RgbColor, TelemetrySample};
use crate::replay::{ReplayState, TimingModel};

pub const CAR_BASE_Z: u32 = 10;
pub const CAR_LEADER_Z: u32 = 15;
pub const TRACE_BASE_Z: u32 = 5;
pub const TRACE_LEADER_BOOST: u32 = 10;
pub const TRACK_TRACE_Z: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub from: Point,
    pub to: Point,
    pub color: RgbColor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Speed,
    Throttle,
    Brake,
    Delta,
}

impl Channel {
    pub fn title(&self) -> &'static str {
        match self {
            Channel::Speed => "Speed",
            Channel::Throttle => "Throttle",
            Channel::Brake => "Brake",
            Channel::Delta => "Time Delta vs Fastest Driver",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CarMarker {
    pub driver: DriverId,
    pub center: Point,
    pub color: RgbColor,
    pub z_order: u32,
    /// Sample of the driver's own trace the marker represents.
    pub sample_index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelTrace {
    pub channel: Channel,
    pub segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DriverTraces {
    pub driver: DriverId,
    pub z_order: u32,
    pub channels: Vec<ChannelTrace>,
}

impl DriverTraces {
    pub fn channel(&self, channel: Channel) -> Option<&ChannelTrace> {
        self.channels.iter().find(|trace| trace.channel == channel)
    }
}

/// Everything the rendering surface redraws for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawInstruction {
    pub frame: usize,
    /// Shared lap clock, only for the elapsed-time model.
    pub lap_clock: Option<f64>,
    /// Sector-dominant driver at this frame.
    pub leader: Dominant,
    pub cars: Vec<CarMarker>,
    pub track: Vec<Segment>,
    pub track_z_order: u32,
    pub traces: Vec<DriverTraces>,
}

pub fn synthesize_frame(frame: usize, state: &ReplayState) -> Result<DrawInstruction> {
    if frame >= state.frame_count {
        return Err(ReplayError::FrameOutOfRange {
            frame,
            frames: state.frame_count,
        });
    }

    let timing = state.variant.timing();
    let lap_clock = match timing {
        TimingModel::SampleIndex => None,
        TimingModel::ElapsedTime => Some(frame as f64 * state.time_per_frame),
    };

    let leader = state.dominance.dominant_at(frame).clone();
    let cars = state
        .drivers
        .iter()
        .enumerate()
        .map(|(index, driver)| {
            let sample_index = match lap_clock {
                Some(clock) => clock_sample(&state.elapsed[index], clock),
                None => frame.min(driver.len() - 1),
            };
            let track_index = track_index(state.track.len(), sample_index, driver.len(), timing);
            CarMarker {
                driver: driver.id.clone(),
                center: state.track.point(track_index),
                color: driver.color,
                z_order: if leader.driver() == Some(driver.id.as_str()) {
                    CAR_LEADER_Z
                } else {
                    CAR_BASE_Z
                },
                sample_index,
            }
        })
        .collect();

    let threshold = state.variant.frame_threshold();
    let mut track = Vec::new();
    let mut trace_leader = &UNKNOWN;
    if frame > threshold {
        let end = (frame - 1).min(state.track.len().saturating_sub(1));
        for i in 0..end.min(state.dominance.colors.len()) {
            track.push(Segment {
                from: state.track.point(i),
                to: state.track.point(i + 1),
                color: state.dominance.colors[i],
            });
        }
        trace_leader = state.dominance.dominant_at(frame - 1);
    }

    let traces = state
        .drivers
        .iter()
        .enumerate()
        .map(|(index, driver)| {
            let z_order = if trace_leader.driver() == Some(driver.id.as_str()) {
                TRACE_BASE_Z + TRACE_LEADER_BOOST
            } else {
                TRACE_BASE_Z + index as u32
            };
            let current = frame.min(driver.len() - 1);
            let channels = if frame > threshold && current > state.variant.driver_threshold() {
                driver_channels(driver, state.deltas.get(index), current + 1)
            } else {
                Vec::new()
            };
            DriverTraces {
                driver: driver.id.clone(),
                z_order,
                channels,
            }
        })
        .collect();

    Ok(DrawInstruction {
        frame,
        lap_clock,
        leader,
        cars,
        track,
        track_z_order: TRACK_TRACE_Z,
        traces,
    })
}

/// Sample shown at the shared lap clock: the nearest elapsed time while the
/// lap is running, the last sample once it has finished.
fn clock_sample(elapsed: &[f64], clock: f64) -> usize {
    let last = elapsed.len() - 1;
    if clock <= elapsed[last] {
        nearest_index(elapsed, clock).unwrap_or(last).min(last)
    } else {
        last
    }
}

fn track_index(track_len: usize, sample_index: usize, driver_len: usize, timing: TimingModel) -> usize {
    let progress = match timing {
        TimingModel::SampleIndex => sample_index as f64 / driver_len as f64,
        TimingModel::ElapsedTime if driver_len > 1 => sample_index as f64 / (driver_len - 1) as f64,
        TimingModel::ElapsedTime => 0.0,
    };
    let last = track_len - 1;
    ((progress * last as f64) as usize).min(last)
}

fn driver_channels(driver: &DriverRecord, delta: Option<&Vec<f64>>, count: usize) -> Vec<ChannelTrace> {
    let samples = &driver.telemetry[..count];
    let mut channels = vec![
        channel_trace(Channel::Speed, samples, driver.color, |_, s| s.speed),
        channel_trace(Channel::Throttle, samples, driver.color, |_, s| s.throttle),
        channel_trace(Channel::Brake, samples, driver.color, |_, s| s.brake),
    ];
    if let Some(delta) = delta {
        channels.push(channel_trace(Channel::Delta, samples, driver.color, |i, _| delta[i]));
    }
    channels
}

/// Consecutive `(distance, value)` pairs joined into segments.
fn channel_trace<F>(channel: Channel, samples: &[TelemetrySample], color: RgbColor, value: F) -> ChannelTrace
where
    F: Fn(usize, &TelemetrySample) -> f64,
{
    let segments = samples
        .windows(2)
        .enumerate()
        .map(|(i, pair)| Segment {
            from: Point::new(pair[0].distance, value(i, &pair[0])),
            to: Point::new(pair[1].distance, value(i + 1, &pair[1])),
            color,
        })
        .collect();
    ChannelTrace { channel, segments }
}
