use std::fmt;
use std::str::FromStr;

use bincode::{Decode, Encode};

use crate::error::ReplayError;

pub type DriverId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RgbColor {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses `#rrggbb` (the leading `#` is optional).
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
        Some(Self {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Encode, Decode)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One telemetry sample of a lap.
///
/// `time` is whatever clock the provider reports (session time for OpenF1),
/// elapsed lap time is always derived relative to the first sample of a trace.
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct TelemetrySample {
    pub distance: f64,
    pub time: f64,
    pub speed: f64,
    pub throttle: f64,
    pub brake: f64,
    pub position: Option<Point>,
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct DriverRecord {
    pub id: DriverId,
    pub color: RgbColor,
    pub team: String,
    /// Lap time in seconds, `None` when the provider has no valid time.
    pub lap_time: Option<f64>,
    pub position: u32,
    pub telemetry: Vec<TelemetrySample>,
}

impl DriverRecord {
    pub fn len(&self) -> usize {
        self.telemetry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.telemetry.is_empty()
    }

    /// Seconds since the first sample of this trace, one entry per sample.
    pub fn elapsed_times(&self) -> Vec<f64> {
        let start = match self.telemetry.first() {
            Some(sample) => sample.time,
            None => return Vec::new(),
        };
        self.telemetry.iter().map(|sample| sample.time - start).collect()
    }

    pub fn has_positions(&self) -> bool {
        !self.telemetry.is_empty() && self.telemetry.iter().all(|s| s.position.is_some())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Encode, Decode)]
pub enum SessionKind {
    Qualifying,
    Race,
    Practice1,
    Practice2,
    Practice3,
}

impl SessionKind {
    pub const ALL: [SessionKind; 5] = [
        SessionKind::Qualifying,
        SessionKind::Race,
        SessionKind::Practice1,
        SessionKind::Practice2,
        SessionKind::Practice3,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            SessionKind::Qualifying => "Q",
            SessionKind::Race => "R",
            SessionKind::Practice1 => "FP1",
            SessionKind::Practice2 => "FP2",
            SessionKind::Practice3 => "FP3",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SessionKind::Qualifying => "Qualifying",
            SessionKind::Race => "Race",
            SessionKind::Practice1 => "Practice 1",
            SessionKind::Practice2 => "Practice 2",
            SessionKind::Practice3 => "Practice 3",
        }
    }
}

impl FromStr for SessionKind {
    type Err = ReplayError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let code = value.trim().to_ascii_uppercase();
        SessionKind::ALL
            .into_iter()
            .find(|kind| kind.code() == code)
            .ok_or_else(|| ReplayError::InvalidSession(format!("unknown session code '{value}'")))
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Encode, Decode)]
pub struct SessionRequest {
    pub year: u16,
    pub round: u8,
    pub kind: SessionKind,
}

impl fmt::Display for SessionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Round {} {}", self.year, self.round, self.kind)
    }
}

/// One row of the session classification.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct SessionResult {
    pub abbreviation: String,
    pub team: String,
    pub position: u32,
}

/// Everything the provider knows about a driver's fastest lap.
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct FastestLap {
    pub lap_time: Option<f64>,
    pub telemetry: Vec<TelemetrySample>,
}

/// Formats a lap time as `M:SS.sss`, or `No Time` when absent.
pub fn format_lap_time(lap_time: Option<f64>) -> String {
    match lap_time {
        Some(seconds) if seconds.is_finite() => {
            let minutes = (seconds / 60.0).floor();
            let rest = seconds - minutes * 60.0;
            format!("{}:{:06.3}", minutes as i64, rest)
        }
        _ => "No Time".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_colors() {
        assert_eq!(RgbColor::from_hex("#005aff"), Some(RgbColor::new(0, 90, 255)));
        assert_eq!(RgbColor::from_hex("FF8700"), Some(RgbColor::new(255, 135, 0)));
        assert_eq!(RgbColor::from_hex("#12345"), None);
        assert_eq!(RgbColor::from_hex("#zz0000"), None);
        assert_eq!(RgbColor::new(220, 0, 0).to_hex(), "#dc0000");
    }

    #[test]
    fn test_session_codes() {
        assert_eq!("q".parse::<SessionKind>().unwrap(), SessionKind::Qualifying);
        assert_eq!(" fp2 ".parse::<SessionKind>().unwrap(), SessionKind::Practice2);
        assert_eq!("R".parse::<SessionKind>().unwrap(), SessionKind::Race);
        assert!("FP4".parse::<SessionKind>().is_err());
        assert!("".parse::<SessionKind>().is_err());
    }

    #[test]
    fn test_format_lap_time() {
        assert_eq!(format_lap_time(Some(83.456)), "1:23.456");
        assert_eq!(format_lap_time(Some(59.5)), "0:59.500");
        assert_eq!(format_lap_time(Some(125.0)), "2:05.000");
        assert_eq!(format_lap_time(None), "No Time");
        assert_eq!(format_lap_time(Some(f64::NAN)), "No Time");
    }

    #[test]
    fn test_elapsed_times_start_at_zero() {
        let record = DriverRecord {
            id: "VER".into(),
            color: RgbColor::new(0, 0, 0),
            team: "Red Bull Racing".into(),
            lap_time: Some(90.0),
            position: 1,
            telemetry: [100.0, 100.5, 101.25]
                .iter()
                .map(|&time| TelemetrySample {
                    distance: 0.0,
                    time,
                    speed: 0.0,
                    throttle: 0.0,
                    brake: 0.0,
                    position: None,
                })
                .collect(),
        };
        assert_eq!(record.elapsed_times(), vec![0.0, 0.5, 1.25]);
        assert!(!record.has_positions());
    }
}
