use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::filter::ClassNameMapping;

pub const CONFIG_ENV: &str = "VISION_RELAY_CONFIG";

const DEFAULT_RESULTS_PATH: &str = "/tmp/results.json";
const DEFAULT_DECORATED_PATH: &str = "/tmp/output.jpg";
const DEFAULT_UDP_HOST: &str = "127.0.0.1";
const DEFAULT_UDP_JSON_PORT: u16 = 5002;
const DEFAULT_UDP_FLAT_PORT: u16 = 5000;
const DEFAULT_PUBLISH_RATE: u32 = 1;
const DEFAULT_TARGET_FPS: u32 = 30;
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
const DEFAULT_QUEUE_CAPACITY: usize = 1;
const DEFAULT_CAPTURE_RETRY_MS: u64 = 1000;

#[derive(Debug, Deserialize, Default)]
struct RelayConfigFile {
    outputs: Option<OutputsConfigFile>,
    udp: Option<UdpConfigFile>,
    publish_rate: Option<u32>,
    inference: Option<InferenceConfigFile>,
    class_name_mapping: Option<ClassNameMapping>,
}

#[derive(Debug, Deserialize, Default)]
struct OutputsConfigFile {
    results_path: Option<PathBuf>,
    decorated_path: Option<PathBuf>,
    file_format: Option<FileFormat>,
}

#[derive(Debug, Deserialize, Default)]
struct UdpConfigFile {
    host: Option<String>,
    json_port: Option<u16>,
    flat_port: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
struct InferenceConfigFile {
    target_fps: Option<u32>,
    confidence_threshold: Option<f32>,
    queue_capacity: Option<usize>,
    capture_retry_ms: Option<u64>,
}

/// Document written by the file publisher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    /// Per-class counts plus timestamp.
    #[default]
    Count,
    /// Every selected detection with its box.
    Full,
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub results_path: PathBuf,
    pub decorated_path: PathBuf,
    pub file_format: FileFormat,
    pub udp: UdpSettings,
    /// Messages per second, per publisher.
    pub publish_rate: u32,
    pub target_fps: u32,
    pub confidence_threshold: f32,
    pub queue_capacity: usize,
    pub capture_retry: Duration,
    pub class_name_mapping: ClassNameMapping,
}

#[derive(Debug, Clone)]
pub struct UdpSettings {
    pub host: String,
    pub json_port: u16,
    pub flat_port: u16,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self::from_file(RelayConfigFile::default())
    }
}

impl RelayConfig {
    /// Load from the file named by `VISION_RELAY_CONFIG` (if any), then apply
    /// environment overrides and validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var(CONFIG_ENV).ok().map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    /// Same as [`RelayConfig::load`] with an explicit file path.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => RelayConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: RelayConfigFile) -> Self {
        let outputs = file.outputs.unwrap_or_default();
        let udp = file.udp.unwrap_or_default();
        let inference = file.inference.unwrap_or_default();
        Self {
            results_path: outputs
                .results_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_RESULTS_PATH)),
            decorated_path: outputs
                .decorated_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DECORATED_PATH)),
            file_format: outputs.file_format.unwrap_or_default(),
            udp: UdpSettings {
                host: udp.host.unwrap_or_else(|| DEFAULT_UDP_HOST.to_string()),
                json_port: udp.json_port.unwrap_or(DEFAULT_UDP_JSON_PORT),
                flat_port: udp.flat_port.unwrap_or(DEFAULT_UDP_FLAT_PORT),
            },
            publish_rate: file.publish_rate.unwrap_or(DEFAULT_PUBLISH_RATE),
            target_fps: inference.target_fps.unwrap_or(DEFAULT_TARGET_FPS),
            confidence_threshold: inference
                .confidence_threshold
                .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
            queue_capacity: inference.queue_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY),
            capture_retry: Duration::from_millis(
                inference
                    .capture_retry_ms
                    .unwrap_or(DEFAULT_CAPTURE_RETRY_MS),
            ),
            class_name_mapping: file.class_name_mapping.unwrap_or_default(),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("VISION_RELAY_RESULTS_PATH") {
            if !path.trim().is_empty() {
                self.results_path = PathBuf::from(path);
            }
        }
        if let Ok(path) = std::env::var("VISION_RELAY_DECORATED_PATH") {
            if !path.trim().is_empty() {
                self.decorated_path = PathBuf::from(path);
            }
        }
        if let Ok(host) = std::env::var("VISION_RELAY_UDP_HOST") {
            if !host.trim().is_empty() {
                self.udp.host = host.trim().to_string();
            }
        }
        if let Ok(port) = std::env::var("VISION_RELAY_UDP_JSON_PORT") {
            self.udp.json_port = port
                .trim()
                .parse()
                .map_err(|_| anyhow!("VISION_RELAY_UDP_JSON_PORT must be a port number"))?;
        }
        if let Ok(port) = std::env::var("VISION_RELAY_UDP_FLAT_PORT") {
            self.udp.flat_port = port
                .trim()
                .parse()
                .map_err(|_| anyhow!("VISION_RELAY_UDP_FLAT_PORT must be a port number"))?;
        }
        if let Ok(rate) = std::env::var("VISION_RELAY_PUBLISH_RATE") {
            self.publish_rate = rate.trim().parse().map_err(|_| {
                anyhow!("VISION_RELAY_PUBLISH_RATE must be an integer number of messages per second")
            })?;
        }
        Ok(())
    }

    /// Checks every field; also used after CLI overrides.
    pub fn validate(&self) -> Result<()> {
        if self.results_path.as_os_str().is_empty() {
            return Err(anyhow!("results path must not be empty"));
        }
        if self.decorated_path.as_os_str().is_empty() {
            return Err(anyhow!("decorated image path must not be empty"));
        }
        if self.udp.host.is_empty() {
            return Err(anyhow!("udp host must not be empty"));
        }
        if self.udp.json_port == 0 || self.udp.flat_port == 0 {
            return Err(anyhow!("udp ports must be greater than zero"));
        }
        if self.publish_rate == 0 {
            return Err(anyhow!("publish rate must be greater than zero"));
        }
        if self.target_fps == 0 {
            return Err(anyhow!("target fps must be greater than zero"));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(anyhow!(
                "confidence threshold must be within [0, 1], got {}",
                self.confidence_threshold
            ));
        }
        if self.queue_capacity == 0 {
            return Err(anyhow!("queue capacity must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<RelayConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
