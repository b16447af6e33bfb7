use anyhow::{Context, Result};
use facevault_core::StoreTarget;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Process configuration, built once at startup and passed down.
///
/// Sources, lowest to highest precedence: built-in defaults, a TOML file,
/// `FACEVAULT_*` environment variables, then command-line flags.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// V4L2 device path for the recognition loop.
    pub camera_device: String,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// SCRFD detector file name inside `model_dir`.
    pub detector_model: String,
    /// 128-d encoder file name inside `model_dir`.
    pub encoder_model: String,
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Maximum Euclidean distance for a recognition match.
    pub match_tolerance: f32,
    /// Frames discarded after opening the camera (auto-exposure settling).
    pub warmup_frames: usize,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = data_dir();
        Self {
            camera_device: "/dev/video0".to_string(),
            model_dir: data_dir.join("models"),
            detector_model: "det_500m.onnx".to_string(),
            encoder_model: "face_encoder_128.onnx".to_string(),
            db_path: data_dir.join("faces.db"),
            match_tolerance: 0.6,
            warmup_frames: 4,
        }
    }
}

impl Config {
    /// Load configuration from `explicit` (must exist) or the default config
    /// file (if present), then apply environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = default_config_path();
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Config = toml::from_str(&text)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        tracing::debug!(path = %path.display(), "config file loaded");
        Ok(config)
    }

    /// Override fields from `FACEVAULT_*` variables. Unparseable numbers are
    /// ignored with a warning.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("FACEVAULT_CAMERA_DEVICE") {
            self.camera_device = v;
        }
        if let Some(v) = lookup("FACEVAULT_MODEL_DIR") {
            self.model_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("FACEVAULT_DB_PATH") {
            self.db_path = PathBuf::from(v);
        }
        if let Some(v) = parse_env(&lookup, "FACEVAULT_MATCH_TOLERANCE") {
            self.match_tolerance = v;
        }
        if let Some(v) = parse_env(&lookup, "FACEVAULT_WARMUP_FRAMES") {
            self.warmup_frames = v;
        }
    }

    pub fn detector_model_path(&self) -> String {
        self.model_dir
            .join(&self.detector_model)
            .to_string_lossy()
            .into_owned()
    }

    pub fn encoder_model_path(&self) -> String {
        self.model_dir
            .join(&self.encoder_model)
            .to_string_lossy()
            .into_owned()
    }

    pub fn store_target(&self) -> StoreTarget {
        StoreTarget::new(&self.db_path)
    }
}

fn parse_env<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(
                key,
                value = %raw,
                "ignoring unparseable environment override"
            );
            None
        }
    }
}

fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
        .join("facevault")
}

fn default_config_path() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
        .join("facevault/config.toml")
}

fn home_dir() -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string()))
}
