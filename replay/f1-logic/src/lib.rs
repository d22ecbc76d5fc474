//! Telemetry comparison logic for the F1 replay viewer: track layout,
//! sector dominance, lap deltas and per-frame draw instructions.

pub mod cache;
pub mod chart;
pub mod delta;
pub mod dominance;
pub mod error;
pub mod frame;
pub mod layout;
pub mod loader;
pub mod model;
pub mod palette;
pub mod replay;

pub use error::{ReplayError, Result};
pub use loader::{load_comparison, Comparison, DriverSelection, TelemetryProvider};
pub use model::{DriverRecord, FastestLap, SessionKind, SessionRequest, SessionResult, TelemetrySample};
pub use replay::{ReplayState, ReplayVariant, TimingModel};
