use serde::Deserialize;
use std::path::{Path, PathBuf};

use spectra::analysis::settings::{AnalyzerConfig, DetectorConfig};

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analyzer: AnalyzerSection,
    #[serde(default)]
    pub beat: BeatSection,
    #[serde(default)]
    pub output: OutputSection,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzerSection {
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
    #[serde(default = "default_smoothing")]
    pub smoothing: f32,
    #[serde(default = "default_bins")]
    pub bins: usize,
}

#[derive(Debug, Deserialize)]
pub struct BeatSection {
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: f64,
    #[serde(default = "default_decay")]
    pub decay: f32,
}

#[derive(Debug, Deserialize)]
pub struct OutputSection {
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default)]
    pub compact: bool,
    #[serde(default)]
    pub realtime: bool,
}

impl Default for AnalyzerSection {
    fn default() -> Self {
        Self {
            fft_size: default_fft_size(),
            smoothing: default_smoothing(),
            bins: default_bins(),
        }
    }
}

impl Default for BeatSection {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            min_interval_ms: default_min_interval_ms(),
            decay: default_decay(),
        }
    }
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            compact: false,
            realtime: false,
        }
    }
}

fn default_fft_size() -> usize { AnalyzerConfig::default().fft_size }
fn default_smoothing() -> f32 { AnalyzerConfig::default().smoothing }
fn default_bins() -> usize { AnalyzerConfig::default().bin_count }
fn default_threshold() -> f32 { DetectorConfig::default().threshold }
fn default_min_interval_ms() -> f64 { DetectorConfig::default().min_interval_ms }
fn default_decay() -> f32 { DetectorConfig::default().decay }
fn default_fps() -> u32 { 60 }

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(err) => {
            log::warn!("Invalid config {}: {}", path.display(), err);
            None
        }
    }
}

/// `--config` path, then `./spectra.toml`, then the per-user config file.
pub fn discover_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("spectra.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("spectra").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("spectra").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}
