// Telemetry provider backed by the public OpenF1 REST API.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use f1_replay_logic::delta::nearest_index;
use f1_replay_logic::model::Point;
use f1_replay_logic::{FastestLap, ReplayError, Result, SessionRequest, SessionResult, TelemetryProvider, TelemetrySample};
use log::{debug, info, warn};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;

pub const DEFAULT_BASE_URL: &str = "https://api.openf1.org/v1";

#[derive(Debug, Deserialize)]
struct Meeting {
    meeting_key: u32,
    meeting_name: String,
    date_start: String,
}

#[derive(Debug, Deserialize)]
struct Session {
    session_key: u32,
    session_name: String,
}

#[derive(Debug, Deserialize)]
struct Driver {
    driver_number: u32,
    name_acronym: Option<String>,
    team_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResultRow {
    driver_number: u32,
    position: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct Lap {
    date_start: Option<String>,
    lap_duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CarData {
    date: String,
    speed: f64,
    throttle: f64,
    brake: f64,
}

#[derive(Debug, Deserialize)]
struct LocationData {
    date: String,
    x: f64,
    y: f64,
}

#[derive(Debug, Clone)]
struct ResolvedSession {
    session_key: u32,
    /// Abbreviation to (driver number, team).
    drivers: HashMap<String, (u32, String)>,
}

pub struct OpenF1Provider {
    client: Client,
    base_url: String,
    sessions: Mutex<HashMap<SessionRequest, ResolvedSession>>,
}

impl OpenF1Provider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str, query: &str) -> Result<Vec<T>> {
        let url = format!("{}/{}?{}", self.base_url, endpoint, query);
        debug!("GET {}", url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ReplayError::Provider(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(ReplayError::Provider(format!("{}: HTTP {}", endpoint, resp.status())));
        }
        resp.json().await.map_err(|e| ReplayError::Provider(format!("{}: {}", endpoint, e)))
    }

    async fn resolve(&self, request: &SessionRequest) -> Result<ResolvedSession> {
        if let Some(session) = self.cached_session(request) {
            return Ok(session);
        }

        let mut meetings: Vec<Meeting> = self.get("meetings", &format!("year={}", request.year)).await?;
        meetings.retain(|m| !m.meeting_name.to_ascii_lowercase().contains("testing"));
        meetings.sort_by(|a, b| a.date_start.cmp(&b.date_start));
        let meeting = (request.round as usize)
            .checked_sub(1)
            .and_then(|index| meetings.get(index))
            .ok_or_else(|| {
                ReplayError::Provider(format!(
                    "no round {} in {} ({} rounds found)",
                    request.round,
                    request.year,
                    meetings.len()
                ))
            })?;

        let sessions: Vec<Session> = self
            .get("sessions", &format!("meeting_key={}", meeting.meeting_key))
            .await?;
        let session = sessions
            .iter()
            .find(|s| s.session_name.eq_ignore_ascii_case(request.kind.name()))
            .ok_or_else(|| {
                ReplayError::Provider(format!("{} has no {} session", meeting.meeting_name, request.kind.name()))
            })?;
        info!("{}: {} (session {})", request, meeting.meeting_name, session.session_key);

        let drivers: Vec<Driver> = self
            .get("drivers", &format!("session_key={}", session.session_key))
            .await?;
        let drivers = drivers
            .into_iter()
            .filter_map(|d| {
                let acronym = d.name_acronym?;
                Some((acronym, (d.driver_number, d.team_name.unwrap_or_default())))
            })
            .collect();

        let resolved = ResolvedSession {
            session_key: session.session_key,
            drivers,
        };
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.insert(*request, resolved.clone());
        }
        Ok(resolved)
    }

    fn cached_session(&self, request: &SessionRequest) -> Option<ResolvedSession> {
        self.sessions.lock().ok()?.get(request).cloned()
    }
}

#[async_trait]
impl TelemetryProvider for OpenF1Provider {
    async fn session_results(&self, request: &SessionRequest) -> Result<Vec<SessionResult>> {
        let session = self.resolve(request).await?;
        let by_number: HashMap<u32, (&String, &String)> = session
            .drivers
            .iter()
            .map(|(abbr, (number, team))| (*number, (abbr, team)))
            .collect();

        let mut rows: Vec<ResultRow> = self
            .get("session_result", &format!("session_key={}", session.session_key))
            .await
            .unwrap_or_else(|err| {
                warn!("no classification available ({}), using driver list", err);
                Vec::new()
            });
        if rows.is_empty() {
            let mut numbers: Vec<u32> = by_number.keys().copied().collect();
            numbers.sort_unstable();
            rows = numbers
                .into_iter()
                .map(|driver_number| ResultRow {
                    driver_number,
                    position: None,
                })
                .collect();
        }
        rows.sort_by_key(|r| r.position.unwrap_or(u32::MAX));

        Ok(rows
            .iter()
            .enumerate()
            .filter_map(|(i, row)| {
                let (abbr, team) = by_number.get(&row.driver_number)?;
                Some(SessionResult {
                    abbreviation: abbr.to_string(),
                    team: team.to_string(),
                    position: row.position.unwrap_or(i as u32 + 1),
                })
            })
            .collect())
    }

    async fn fastest_lap(&self, request: &SessionRequest, driver: &str) -> Result<Option<FastestLap>> {
        let session = self.resolve(request).await?;
        let number = match session.drivers.get(&driver.to_ascii_uppercase()) {
            Some((number, _)) => *number,
            None => return Ok(None),
        };
        let driver_query = format!("session_key={}&driver_number={}", session.session_key, number);

        let laps: Vec<Lap> = self.get("laps", &driver_query).await?;
        let fastest = laps
            .iter()
            .filter_map(|lap| {
                let duration = lap.lap_duration.filter(|d| d.is_finite() && *d > 0.0)?;
                let start = parse_date(lap.date_start.as_deref()?)?;
                Some((duration, start))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0));
        let (lap_time, lap_start) = match fastest {
            Some(fastest) => fastest,
            None if laps.is_empty() => return Ok(None),
            None => {
                return Ok(Some(FastestLap {
                    lap_time: None,
                    telemetry: Vec::new(),
                }))
            }
        };
        let lap_end = lap_start + ChronoDuration::milliseconds((lap_time * 1000.0).round() as i64);
        let window = format!(
            "{}&date>={}&date<={}",
            driver_query,
            lap_start.to_rfc3339_opts(SecondsFormat::Millis, true),
            lap_end.to_rfc3339_opts(SecondsFormat::Millis, true)
        );

        let car: Vec<CarData> = self.get("car_data", &window).await?;
        let location: Vec<LocationData> = self.get("location", &window).await.unwrap_or_else(|err| {
            warn!("{}: no position data ({})", driver, err);
            Vec::new()
        });

        let telemetry = build_telemetry(lap_start, &car, &location);
        debug!("{}: {} samples for lap of {:.3}s", driver, telemetry.len(), lap_time);
        Ok(Some(FastestLap {
            lap_time: Some(lap_time),
            telemetry,
        }))
    }
}

fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value).ok().map(|d| d.with_timezone(&Utc))
}

/// Car samples relative to `lap_start`, distance integrated from speed and
/// positions matched by nearest timestamp.
fn build_telemetry(lap_start: DateTime<Utc>, car: &[CarData], location: &[LocationData]) -> Vec<TelemetrySample> {
    let seconds_since = |date: DateTime<Utc>| (date - lap_start).num_milliseconds() as f64 / 1000.0;

    let mut positions: Vec<(f64, Point)> = location
        .iter()
        .filter_map(|l| Some((seconds_since(parse_date(&l.date)?), Point::new(l.x, l.y))))
        .collect();
    positions.sort_by(|a, b| a.0.total_cmp(&b.0));
    let position_times: Vec<f64> = positions.iter().map(|(t, _)| *t).collect();

    let mut samples: Vec<(f64, &CarData)> = car
        .iter()
        .filter_map(|c| Some((seconds_since(parse_date(&c.date)?), c)))
        .collect();
    samples.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut telemetry = Vec::with_capacity(samples.len());
    let mut distance = 0.0;
    let mut previous: Option<(f64, f64)> = None;
    for (time, data) in samples {
        if let Some((prev_time, prev_speed)) = previous {
            // km/h to m/s, trapezoidal
            distance += (prev_speed + data.speed) / 2.0 / 3.6 * (time - prev_time);
        }
        previous = Some((time, data.speed));

        telemetry.push(TelemetrySample {
            distance,
            time,
            speed: data.speed,
            throttle: data.throttle,
            brake: if data.brake > 0.0 { 1.0 } else { 0.0 },
            position: nearest_index(&position_times, time).map(|i| positions[i].1),
        });
    }
    telemetry
}

#[cfg(test)]
mod tests {
    use super::*;

    fn car(date: &str, speed: f64, brake: f64) -> CarData {
        CarData {
            date: date.to_string(),
            speed,
            throttle: 50.0,
            brake,
        }
    }

    #[test]
    fn test_parses_openf1_dates() {
        let date = parse_date("2023-09-16T13:03:35.292000+00:00").unwrap();
        assert_eq!(date.timestamp_millis() % 1000, 292);
        assert!(parse_date("2023-09-16T13:03:35Z").is_some());
        assert!(parse_date("yesterday").is_none());
    }

    #[test]
    fn test_build_telemetry_integrates_distance() {
        let start = parse_date("2024-01-01T00:00:00Z").unwrap();
        let car = vec![
            car("2024-01-01T00:00:01Z", 36.0, 0.0),
            car("2024-01-01T00:00:00Z", 36.0, 100.0),
            car("2024-01-01T00:00:02Z", 72.0, 0.0),
        ];
        let location = vec![
            LocationData {
                date: "2024-01-01T00:00:00.100Z".into(),
                x: 1.0,
                y: 2.0,
            },
            LocationData {
                date: "2024-01-01T00:00:01.900Z".into(),
                x: 3.0,
                y: 4.0,
            },
        ];
        let telemetry = build_telemetry(start, &car, &location);

        let times: Vec<f64> = telemetry.iter().map(|s| s.time).collect();
        assert_eq!(times, vec![0.0, 1.0, 2.0]);
        // 10 m/s for 1s, then 10 -> 20 m/s for 1s
        assert!((telemetry[1].distance - 10.0).abs() < 1e-9);
        assert!((telemetry[2].distance - 25.0).abs() < 1e-9);
        assert_eq!(telemetry[0].brake, 1.0);
        assert_eq!(telemetry[1].brake, 0.0);
        assert_eq!(telemetry[0].position, Some(Point::new(1.0, 2.0)));
        assert_eq!(telemetry[2].position, Some(Point::new(3.0, 4.0)));
    }

    #[test]
    fn test_missing_locations_leave_positions_empty() {
        let start = parse_date("2024-01-01T00:00:00Z").unwrap();
        let telemetry = build_telemetry(start, &[car("2024-01-01T00:00:00Z", 100.0, 0.0)], &[]);
        assert_eq!(telemetry.len(), 1);
        assert!(telemetry[0].position.is_none());
    }

    #[test]
    fn test_decodes_api_payloads() {
        let laps: Vec<Lap> = serde_json::from_str(
            r#"[{"date_start": null, "lap_duration": null, "lap_number": 1},
                {"date_start": "2023-09-16T13:05:02.045000+00:00", "lap_duration": 91.743, "lap_number": 2}]"#,
        )
        .unwrap();
        assert_eq!(laps.len(), 2);
        assert_eq!(laps[1].lap_duration, Some(91.743));

        let car: Vec<CarData> = serde_json::from_str(
            r#"[{"date": "2023-09-16T13:05:02.100000+00:00", "speed": 287, "throttle": 99, "brake": 0,
                 "n_gear": 7, "rpm": 11141, "drs": 12, "driver_number": 55}]"#,
        )
        .unwrap();
        assert_eq!(car[0].speed, 287.0);

        let drivers: Vec<Driver> = serde_json::from_str(
            r#"[{"driver_number": 55, "name_acronym": "SAI", "team_name": "Ferrari"},
                {"driver_number": 99, "name_acronym": null, "team_name": null}]"#,
        )
        .unwrap();
        assert_eq!(drivers[0].name_acronym.as_deref(), Some("SAI"));
        assert!(drivers[1].team_name.is_none());
    }

    #[test]
    fn test_positions_match_nearest_location() {
        let start = parse_date("2024-01-01T00:00:00Z").unwrap();
        let car = vec![
            car("2024-01-01T00:00:00Z", 100.0, 0.0),
            car("2024-01-01T00:00:01.500Z", 100.0, 0.0),
            car("2024-01-01T00:00:01.600Z", 100.0, 0.0),
            car("2024-01-01T00:00:09Z", 100.0, 0.0),
        ];
        let location: Vec<LocationData> = [("01", 1.0), ("02", 2.0), ("03", 3.0)]
            .iter()
            .map(|(second, x)| LocationData {
                date: format!("2024-01-01T00:00:{second}Z"),
                x: *x,
                y: 0.0,
            })
            .collect();
        let xs: Vec<f64> = build_telemetry(start, &car, &location)
            .iter()
            .map(|s| s.position.map_or(f64::NAN, |p| p.x))
            .collect();
        // A timestamp halfway between two locations takes the earlier one.
        assert_eq!(xs, vec![1.0, 1.0, 2.0, 3.0]);
    }
}
