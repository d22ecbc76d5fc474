// Synthetic offline session: a closed track and a handful of drivers with
// seeded pace variations.

use std::f64::consts::TAU;

use async_trait::async_trait;
use f1_replay_logic::model::Point;
use f1_replay_logic::{FastestLap, Result, SessionRequest, SessionResult, TelemetryProvider, TelemetrySample};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const GRID: [(&str, &str); 5] = [
    ("VER", "Red Bull Racing"),
    ("NOR", "McLaren"),
    ("LEC", "Ferrari"),
    ("RUS", "Mercedes"),
    ("ALO", "Aston Martin"),
];
const TRACK_LENGTH: f64 = 5200.0;
const TRACK_TILT: f64 = 0.6;

pub struct DemoProvider {
    seed: u64,
}

impl DemoProvider {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    fn rng(&self, request: &SessionRequest, salt: u64) -> StdRng {
        let request_seed = (request.year as u64) << 16 | (request.round as u64) << 8 | request.kind as u64;
        StdRng::seed_from_u64(self.seed ^ request_seed.wrapping_mul(0x9e37_79b9) ^ salt)
    }

    fn field_size(&self, request: &SessionRequest) -> usize {
        self.rng(request, 0).gen_range(3..=GRID.len())
    }
}

#[async_trait]
impl TelemetryProvider for DemoProvider {
    async fn session_results(&self, request: &SessionRequest) -> Result<Vec<SessionResult>> {
        Ok(GRID
            .iter()
            .take(self.field_size(request))
            .enumerate()
            .map(|(i, (abbreviation, team))| SessionResult {
                abbreviation: abbreviation.to_string(),
                team: team.to_string(),
                position: i as u32 + 1,
            })
            .collect())
    }

    async fn fastest_lap(&self, request: &SessionRequest, driver: &str) -> Result<Option<FastestLap>> {
        let slot = GRID
            .iter()
            .take(self.field_size(request))
            .position(|(abbreviation, _)| abbreviation.eq_ignore_ascii_case(driver));
        let slot = match slot {
            Some(slot) => slot,
            None => return Ok(None),
        };
        let mut rng = self.rng(request, slot as u64 + 1);

        let lap_time = 80.0 + slot as f64 * 0.15 + rng.gen_range(0.0..0.4);
        let samples: usize = rng.gen_range(620..700);
        let phase = rng.gen_range(-0.05..0.05);

        let telemetry = (0..samples)
            .map(|i| {
                let progress = i as f64 / (samples - 1) as f64;
                let theta = TAU * progress;
                let speed = 215.0 + 95.0 * (3.0 * theta + phase).cos() + rng.gen_range(-2.0..2.0);
                let braking = (3.0 * theta + phase).sin() > 0.85;
                TelemetrySample {
                    distance: TRACK_LENGTH * progress,
                    time: lap_time * progress,
                    speed,
                    throttle: if braking { 0.0 } else { ((speed - 120.0) / 1.6).clamp(0.0, 100.0) },
                    brake: if braking { 1.0 } else { 0.0 },
                    position: Some(track_point(theta)),
                }
            })
            .collect();

        Ok(Some(FastestLap {
            lap_time: Some(lap_time),
            telemetry,
        }))
    }
}

/// A lobed loop, tilted so the layout search has something to straighten.
fn track_point(theta: f64) -> Point {
    let x = 3000.0 * theta.cos() + 400.0 * (3.0 * theta).cos();
    let y = 1100.0 * theta.sin() + 250.0 * (2.0 * theta).sin();
    let (sin, cos) = TRACK_TILT.sin_cos();
    Point::new(x * cos - y * sin, x * sin + y * cos)
}
