use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("insufficient data for {what}: need at least {needed}, got {got}")]
    InsufficientData {
        what: &'static str,
        needed: usize,
        got: usize,
    },
    #[error("need at least 2 drivers with usable telemetry, found {found}")]
    TooFewDrivers { found: usize },
    #[error("telemetry provider failed: {0}")]
    Provider(String),
    #[error("session cache failed: {0}")]
    Cache(String),
    #[error("invalid session: {0}")]
    InvalidSession(String),
    #[error("frame {frame} is outside the replay range of {frames} frames")]
    FrameOutOfRange { frame: usize, frames: usize },
}

pub type Result<T> = std::result::Result<T, ReplayError>;
