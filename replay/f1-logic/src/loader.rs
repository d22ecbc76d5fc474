// Loads per-driver fastest-lap records from a telemetry provider.

use async_trait::async_trait;
use bincode::{Decode, Encode};
use futures::future::join_all;
use log::{info, warn};

use crate::error::{ReplayError, Result};
use crate::model::{format_lap_time, DriverRecord, FastestLap, SessionRequest, SessionResult};
use crate::palette::DriverPalette;

pub const MIN_DRIVERS: usize = 2;
pub const MAX_DRIVERS: usize = 3;

/// External source of session classifications and lap telemetry.
#[async_trait]
pub trait TelemetryProvider: Send + Sync {
    /// Classification of the session. Errors here abort the run.
    async fn session_results(&self, request: &SessionRequest) -> Result<Vec<SessionResult>>;

    /// Fastest lap of `driver`, `None` when the driver set no lap at all.
    async fn fastest_lap(&self, request: &SessionRequest, driver: &str) -> Result<Option<FastestLap>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverSelection {
    /// The three fastest drivers of the session by lap time.
    TopByLapTime,
    /// The first three rows of the classification, timed lap or not.
    TopByClassification,
    /// Specific abbreviations, matched case-insensitively.
    Explicit(Vec<String>),
}

/// A loaded comparison: the chosen drivers in presentation order.
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct Comparison {
    pub request: SessionRequest,
    pub drivers: Vec<DriverRecord>,
}

pub async fn load_comparison(
    provider: &dyn TelemetryProvider,
    request: &SessionRequest,
    selection: &DriverSelection,
    palette: &DriverPalette,
) -> Result<Comparison> {
    info!("Loading {} data...", request);
    let results = provider.session_results(request).await?;

    let chosen = match selection {
        DriverSelection::Explicit(requested) => match select_explicit(&results, requested) {
            Some(chosen) => chosen,
            None => select_fastest(provider, request, &results).await?,
        },
        DriverSelection::TopByLapTime => select_fastest(provider, request, &results).await?,
        DriverSelection::TopByClassification => select_classified(&results),
    };
    let keep_untimed = *selection == DriverSelection::TopByClassification;

    let mut drivers = Vec::with_capacity(chosen.len());
    for (index, result) in chosen.iter().enumerate() {
        let driver = &result.abbreviation;
        let lap = match provider.fastest_lap(request, driver).await? {
            Some(lap) => lap,
            None => {
                warn!("{} has no laps, skipping...", driver);
                continue;
            }
        };
        let lap_time = match lap.lap_time {
            Some(lap_time) if lap_time.is_finite() => Some(lap_time),
            _ if keep_untimed => {
                warn!("{} has no valid lap time, keeping it untimed", driver);
                None
            }
            _ => {
                warn!("{} has no valid laps, skipping...", driver);
                continue;
            }
        };
        if lap.telemetry.is_empty() {
            warn!("{} has no telemetry, skipping...", driver);
            continue;
        }

        info!("{}: Using lap with time {}", driver, format_lap_time(lap_time));
        drivers.push(DriverRecord {
            id: driver.clone(),
            color: palette.color_for(driver, index),
            team: result.team.clone(),
            lap_time,
            position: index as u32 + 1,
            telemetry: lap.telemetry,
        });
        if drivers.len() == MAX_DRIVERS {
            break;
        }
    }

    if drivers.len() < MIN_DRIVERS {
        return Err(ReplayError::TooFewDrivers { found: drivers.len() });
    }
    info!(
        "Loaded data for: {:?}",
        drivers.iter().map(|d| d.id.as_str()).collect::<Vec<_>>()
    );

    Ok(Comparison {
        request: *request,
        drivers,
    })
}

/// Rows of `results` for the requested drivers, in classification order.
/// `None` when fewer than two requested drivers exist in the session.
pub fn select_explicit(results: &[SessionResult], requested: &[String]) -> Option<Vec<SessionResult>> {
    let available: Vec<&str> = results.iter().map(|r| r.abbreviation.as_str()).collect();
    info!("Available drivers: {:?}", available);

    let mut valid: Vec<String> = Vec::new();
    for driver in requested {
        let driver = driver.trim().to_ascii_uppercase();
        if available.contains(&driver.as_str()) {
            if !valid.contains(&driver) {
                valid.push(driver);
            }
        } else {
            warn!("Driver '{}' not found.", driver);
        }
    }
    valid.truncate(MAX_DRIVERS);

    if valid.len() < MIN_DRIVERS {
        warn!("Need at least {} valid drivers. Using top {} instead.", MIN_DRIVERS, MAX_DRIVERS);
        return None;
    }
    info!("Selected drivers: {:?}", valid);
    Some(
        results
            .iter()
            .filter(|r| valid.contains(&r.abbreviation))
            .cloned()
            .collect(),
    )
}

/// The first `MAX_DRIVERS` classified drivers.
fn select_classified(results: &[SessionResult]) -> Vec<SessionResult> {
    let mut classified = results.to_vec();
    classified.sort_by_key(|result| result.position);
    classified.truncate(MAX_DRIVERS);
    info!(
        "Top {} in the classification: {:?}",
        classified.len(),
        classified.iter().map(|r| r.abbreviation.as_str()).collect::<Vec<_>>()
    );
    classified
}

/// The fastest `MAX_DRIVERS` drivers with a valid lap time, fastest first.
async fn select_fastest(
    provider: &dyn TelemetryProvider,
    request: &SessionRequest,
    results: &[SessionResult],
) -> Result<Vec<SessionResult>> {
    let laps = join_all(
        results
            .iter()
            .map(|result| provider.fastest_lap(request, &result.abbreviation)),
    )
    .await;

    let mut timed: Vec<(f64, &SessionResult)> = Vec::new();
    for (result, lap) in results.iter().zip(laps) {
        let lap_time = match lap {
            Ok(Some(FastestLap {
                lap_time: Some(lap_time),
                ..
            })) if lap_time.is_finite() => lap_time,
            Ok(_) => continue,
            Err(err) => {
                warn!("{}: fastest lap unavailable: {}", result.abbreviation, err);
                continue;
            }
        };
        timed.push((lap_time, result));
    }
    timed.sort_by(|a, b| a.0.total_cmp(&b.0));
    timed.truncate(MAX_DRIVERS);

    info!("Top {} fastest drivers in session:", timed.len());
    for (i, (lap_time, result)) in timed.iter().enumerate() {
        info!("  {}. {}: {}", i + 1, result.abbreviation, format_lap_time(Some(*lap_time)));
    }
    Ok(timed.into_iter().map(|(_, result)| result.clone()).collect())
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::model::{SessionKind, TelemetrySample};

    /// In-memory provider keyed by abbreviation.
    #[derive(Default)]
    pub(crate) struct MemoryProvider {
        pub results: Vec<SessionResult>,
        pub laps: HashMap<String, FastestLap>,
        pub lap_calls: AtomicUsize,
    }

    impl MemoryProvider {
        pub fn with_driver(mut self, abbreviation: &str, lap_time: Option<f64>, samples: usize) -> Self {
            let position = self.results.len() as u32 + 1;
            self.results.push(SessionResult {
                abbreviation: abbreviation.to_string(),
                team: format!("{abbreviation} Racing"),
                position,
            });
            let telemetry = (0..samples)
                .map(|i| TelemetrySample {
                    distance: i as f64 * 5.0,
                    time: i as f64 * 0.1,
                    speed: 250.0,
                    throttle: 100.0,
                    brake: 0.0,
                    position: None,
                })
                .collect();
            self.laps
                .insert(abbreviation.to_string(), FastestLap { lap_time, telemetry });
            self
        }
    }

    #[async_trait]
    impl TelemetryProvider for MemoryProvider {
        async fn session_results(&self, _request: &SessionRequest) -> Result<Vec<SessionResult>> {
            Ok(self.results.clone())
        }

        async fn fastest_lap(&self, _request: &SessionRequest, driver: &str) -> Result<Option<FastestLap>> {
            self.lap_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.laps.get(driver).cloned())
        }
    }

    pub(crate) fn request() -> SessionRequest {
        SessionRequest {
            year: 2025,
            round: 16,
            kind: SessionKind::Qualifying,
        }
    }

    fn ids(comparison: &Comparison) -> Vec<&str> {
        comparison.drivers.iter().map(|d| d.id.as_str()).collect()
    }

    fn grid() -> MemoryProvider {
        MemoryProvider::default()
            .with_driver("NOR", Some(80.3), 100)
            .with_driver("PIA", Some(80.1), 100)
            .with_driver("LEC", Some(80.5), 100)
            .with_driver("HAM", None, 100)
            .with_driver("VER", Some(80.2), 90)
    }

    #[tokio::test]
    async fn test_top_three_by_lap_time() {
        let provider = grid();
        let comparison = load_comparison(&provider, &request(), &DriverSelection::TopByLapTime, &DriverPalette::builtin())
            .await
            .unwrap();
        assert_eq!(ids(&comparison), vec!["PIA", "VER", "NOR"]);
        let positions: Vec<u32> = comparison.drivers.iter().map(|d| d.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
        assert_eq!(comparison.drivers[1].color, DriverPalette::builtin().get("VER").unwrap());
        assert_eq!(comparison.drivers[0].team, "PIA Racing");
    }

    #[tokio::test]
    async fn test_explicit_selection_is_case_insensitive() {
        let provider = grid();
        let selection = DriverSelection::Explicit(vec!["lec".into(), " Nor".into()]);
        let comparison = load_comparison(&provider, &request(), &selection, &DriverPalette::builtin())
            .await
            .unwrap();
        // Classification order, not request order.
        assert_eq!(ids(&comparison), vec!["NOR", "LEC"]);
    }

    #[tokio::test]
    async fn test_unknown_driver_is_dropped() {
        let provider = grid();
        let selection = DriverSelection::Explicit(vec!["NOR".into(), "XYZ".into(), "LEC".into()]);
        let comparison = load_comparison(&provider, &request(), &selection, &DriverPalette::builtin())
            .await
            .unwrap();
        assert_eq!(ids(&comparison), vec!["NOR", "LEC"]);
    }

    #[tokio::test]
    async fn test_too_few_valid_drivers_falls_back_to_top_three() {
        let provider = grid();
        let selection = DriverSelection::Explicit(vec!["NOR".into(), "XYZ".into()]);
        let comparison = load_comparison(&provider, &request(), &selection, &DriverPalette::builtin())
            .await
            .unwrap();
        assert_eq!(ids(&comparison), vec!["PIA", "VER", "NOR"]);
    }

    #[tokio::test]
    async fn test_driver_without_valid_time_is_skipped() {
        let provider = grid();
        let selection = DriverSelection::Explicit(vec!["HAM".into(), "NOR".into(), "PIA".into()]);
        let comparison = load_comparison(&provider, &request(), &selection, &DriverPalette::builtin())
            .await
            .unwrap();
        assert_eq!(ids(&comparison), vec!["NOR", "PIA"]);
        let positions: Vec<u32> = comparison.drivers.iter().map(|d| d.position).collect();
        assert_eq!(positions, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_fewer_than_two_drivers_is_an_error() {
        let provider = MemoryProvider::default()
            .with_driver("NOR", Some(80.3), 100)
            .with_driver("PIA", Some(80.1), 0)
            .with_driver("HAM", None, 100);
        let result = load_comparison(&provider, &request(), &DriverSelection::TopByLapTime, &DriverPalette::builtin()).await;
        assert!(matches!(result, Err(ReplayError::TooFewDrivers { found: 1 })));
    }

    #[tokio::test]
    async fn test_classification_order_ignores_faster_eliminated_driver() {
        let provider = MemoryProvider::default()
            .with_driver("LEC", Some(80.1), 100)
            .with_driver("NOR", Some(80.6), 100)
            .with_driver("PIA", None, 100)
            .with_driver("VER", Some(80.3), 100);

        let by_lap_time = load_comparison(&provider, &request(), &DriverSelection::TopByLapTime, &DriverPalette::builtin())
            .await
            .unwrap();
        assert_eq!(ids(&by_lap_time), vec!["LEC", "VER", "NOR"]);

        let classified = load_comparison(
            &provider,
            &request(),
            &DriverSelection::TopByClassification,
            &DriverPalette::builtin(),
        )
        .await
        .unwrap();
        assert_eq!(ids(&classified), vec!["LEC", "NOR", "PIA"]);
        assert_eq!(classified.drivers[2].lap_time, None);
        let positions: Vec<u32> = classified.drivers.iter().map(|d| d.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
    }

    #[test]
    fn test_select_explicit_caps_at_three() {
        let results = grid().results;
        let requested: Vec<String> = ["VER", "HAM", "NOR", "PIA"].iter().map(|s| s.to_string()).collect();
        let chosen = select_explicit(&results, &requested).unwrap();
        let chosen: Vec<&str> = chosen.iter().map(|r| r.abbreviation.as_str()).collect();
        assert_eq!(chosen, vec!["NOR", "HAM", "VER"]);
        assert!(select_explicit(&results, &["VER".to_string(), "VER".to_string()]).is_none());
    }
}
