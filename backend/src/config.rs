use std::{fs::File, io, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub fetcher: FetcherConfig,
    pub replay: ReplayConfig,
    pub sequencer: SequencerConfig,
}

impl EngineConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    pub debounce_ms: u64,
    pub timeout_ms: u64,
    /// Per-request coordinate cap of the directions service.
    pub max_waypoints_per_request: usize,
    /// Snap offsets above this raise an accessibility warning. Applies to every mode.
    pub snap_warning_threshold_m: f64,
}

impl FetcherConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            timeout_ms: 15_000,
            max_waypoints_per_request: 25,
            snap_warning_threshold_m: 1_000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    pub base_zoom: f64,
    /// Largest zoom-out applied mid-transition on long hops.
    pub max_zoom_dip: f64,
    /// Segment length at which the zoom dip reaches its maximum.
    pub dip_full_km: f64,
    pub min_frames: usize,
    pub max_frames: usize,
    pub km_per_frame: f64,
    pub min_duration_ms: u64,
    pub max_duration_ms: u64,
    pub ms_per_km: f64,
    pub direct_duration_ms: u64,
    pub settle_duration_ms: u64,
    /// Degrees; a marker this close to a stop is the stop's marker.
    pub highlight_epsilon: f64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            base_zoom: 12.0,
            max_zoom_dip: 3.0,
            dip_full_km: 200.0,
            min_frames: 8,
            max_frames: 60,
            km_per_frame: 2.0,
            min_duration_ms: 1_500,
            max_duration_ms: 8_000,
            ms_per_km: 40.0,
            direct_duration_ms: 1_200,
            settle_duration_ms: 400,
            highlight_epsilon: 1e-5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    pub notice_ttl_ms: u64,
}

impl SequencerConfig {
    pub fn notice_ttl(&self) -> Duration {
        Duration::from_millis(self.notice_ttl_ms)
    }
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self { notice_ttl_ms: 3_000 }
    }
}
