// On-disk bincode cache in front of a telemetry provider, plus the snapshot
// format used to hand a loaded comparison to offline tools.

use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bincode::{Decode, Encode};
use log::{debug, info, warn};

use crate::error::{ReplayError, Result};
use crate::loader::{Comparison, TelemetryProvider};
use crate::model::{FastestLap, SessionRequest, SessionResult};

pub struct CachedProvider<P> {
    inner: P,
    dir: PathBuf,
}

impl<P: TelemetryProvider> CachedProvider<P> {
    /// Wraps `inner`, creating `dir` if it does not exist yet.
    pub fn new(inner: P, dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|err| cache_error(&dir, err))?;
        info!("Caching session data in {}", dir.display());
        Ok(Self { inner, dir })
    }

    fn results_path(&self, request: &SessionRequest) -> PathBuf {
        self.dir.join(format!("{}_results.bin", session_key(request)))
    }

    fn lap_path(&self, request: &SessionRequest, driver: &str) -> PathBuf {
        self.dir.join(format!(
            "{}_{}.bin",
            session_key(request),
            driver.to_ascii_uppercase()
        ))
    }
}

#[async_trait]
impl<P: TelemetryProvider> TelemetryProvider for CachedProvider<P> {
    async fn session_results(&self, request: &SessionRequest) -> Result<Vec<SessionResult>> {
        let path = self.results_path(request);
        if let Some(results) = read_cached(&path) {
            return Ok(results);
        }
        let results = self.inner.session_results(request).await?;
        write_cached(&path, &results);
        Ok(results)
    }

    async fn fastest_lap(&self, request: &SessionRequest, driver: &str) -> Result<Option<FastestLap>> {
        let path = self.lap_path(request, driver);
        if let Some(lap) = read_cached(&path) {
            return Ok(lap);
        }
        let lap = self.inner.fastest_lap(request, driver).await?;
        write_cached(&path, &lap);
        Ok(lap)
    }
}

fn session_key(request: &SessionRequest) -> String {
    format!("{}_{:02}_{}", request.year, request.round, request.kind.code())
}

/// A corrupt or unreadable entry counts as a miss.
fn read_cached<T: Decode<()>>(path: &Path) -> Option<T> {
    if !path.exists() {
        return None;
    }
    match decode_file(path) {
        Ok(value) => {
            debug!("cache hit {}", path.display());
            Some(value)
        }
        Err(err) => {
            warn!("ignoring cache entry: {}", err);
            None
        }
    }
}

/// Failing to write only costs a refetch next time.
fn write_cached<T: Encode>(path: &Path, value: &T) {
    if let Err(err) = encode_file(path, value) {
        warn!("could not write cache entry: {}", err);
    }
}

fn encode_file<T: Encode>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).map_err(|err| cache_error(path, err))?;
    let mut writer = BufWriter::new(file);
    bincode::encode_into_std_write(value, &mut writer, bincode::config::standard())
        .map_err(|err| cache_error(path, err))?;
    writer.flush().map_err(|err| cache_error(path, err))?;
    Ok(())
}

fn decode_file<T: Decode<()>>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|err| cache_error(path, err))?;
    let mut reader = BufReader::new(file);
    bincode::decode_from_std_read(&mut reader, bincode::config::standard()).map_err(|err| cache_error(path, err))
}

fn cache_error(path: &Path, err: impl fmt::Display) -> ReplayError {
    ReplayError::Cache(format!("{}: {}", path.display(), err))
}

/// Writes a loaded comparison so it can be replayed or exported without a provider.
pub fn save_comparison(path: &Path, comparison: &Comparison) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| cache_error(parent, err))?;
    }
    encode_file(path, comparison)?;
    info!(
        "Saved {} comparison of {} drivers to {}",
        comparison.request,
        comparison.drivers.len(),
        path.display()
    );
    Ok(())
}

pub fn load_comparison_snapshot(path: &Path) -> Result<Comparison> {
    decode_file(path)
}
