use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub const PRIMARY_CONFIG_PATH: &str = "/etc/irisid/config.toml";
pub const SECONDARY_CONFIG_PATH: &str = "/usr/local/etc/irisid/config.toml";
pub const DEFAULT_DATASET_PATH: &str = "/var/lib/irisid/templates.csv";
pub const DEFAULT_MAX_RANK: usize = 1;
pub const DEFAULT_SEGMENTER_BINARY: &str = "SegmentatorApp";
pub const DEFAULT_SEGMENTATION_METHOD: &str = "hough";
pub const DEFAULT_SEGMENTATION_MODE: &str = "segmentation";
pub const DEFAULT_SEGMENTATION_SIZE: u32 = 250;
pub const DEFAULT_WORK_DIR_NAME: &str = "irisid";
pub const DEFAULT_LBP_ZONES: usize = 8;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub dataset_path: Option<PathBuf>,
    pub verification_threshold: Option<f64>,
    pub identification_threshold: Option<f64>,
    pub max_rank: Option<usize>,
    pub segmenter_binary: Option<PathBuf>,
    pub segmentation_method: Option<String>,
    pub segmentation_mode: Option<String>,
    pub segmentation_size: Option<u32>,
    pub work_dir: Option<PathBuf>,
    pub lbp_zones: Option<usize>,
    pub debug: Option<bool>,
}

/// Config values with defaults applied. Thresholds stay optional: the
/// verification threshold has no built-in value and identification without
/// one is a closed-set search.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub dataset_path: PathBuf,
    pub verification_threshold: Option<f64>,
    pub identification_threshold: Option<f64>,
    pub max_rank: usize,
    pub segmenter_binary: PathBuf,
    pub segmentation_method: String,
    /// `segmentation` or `debug`; checked where segmentation options are built.
    pub segmentation_mode: String,
    pub segmentation_size: u32,
    pub work_dir: PathBuf,
    pub lbp_zones: usize,
    pub debug: bool,
}

impl ResolvedConfig {
    pub fn from_raw(raw: ConfigFile) -> Self {
        Self {
            dataset_path: raw
                .dataset_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATASET_PATH)),
            verification_threshold: raw.verification_threshold,
            identification_threshold: raw.identification_threshold,
            max_rank: raw.max_rank.unwrap_or(DEFAULT_MAX_RANK),
            segmenter_binary: raw
                .segmenter_binary
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SEGMENTER_BINARY)),
            segmentation_method: raw
                .segmentation_method
                .unwrap_or_else(|| DEFAULT_SEGMENTATION_METHOD.to_string()),
            segmentation_mode: raw
                .segmentation_mode
                .unwrap_or_else(|| DEFAULT_SEGMENTATION_MODE.to_string()),
            segmentation_size: raw.segmentation_size.unwrap_or(DEFAULT_SEGMENTATION_SIZE),
            work_dir: raw.work_dir.unwrap_or_else(default_work_dir),
            lbp_zones: raw.lbp_zones.unwrap_or(DEFAULT_LBP_ZONES),
            debug: raw.debug.unwrap_or(false),
        }
    }
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self::from_raw(ConfigFile::default())
    }
}

pub fn default_work_dir() -> PathBuf {
    env::temp_dir().join(DEFAULT_WORK_DIR_NAME)
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub contents: ConfigFile,
    pub source: PathBuf,
}

impl LoadedConfig {
    pub fn new(contents: ConfigFile, source: PathBuf) -> Self {
        Self { contents, source }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfigWithSource {
    pub resolved: ResolvedConfig,
    pub source: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

pub fn default_sources() -> [PathBuf; 2] {
    [
        PathBuf::from(PRIMARY_CONFIG_PATH),
        PathBuf::from(SECONDARY_CONFIG_PATH),
    ]
}

pub fn load_config() -> Result<Option<LoadedConfig>, ConfigError> {
    load_from_paths(&default_sources())
}

pub fn load_resolved_config() -> Result<ResolvedConfigWithSource, ConfigError> {
    load_resolved_from_paths(&default_sources())
}

/// First readable file wins; missing files are skipped.
pub fn load_from_paths(paths: &[PathBuf]) -> Result<Option<LoadedConfig>, ConfigError> {
    for path in paths {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let parsed =
                    toml::from_str::<ConfigFile>(&contents).map_err(|err| ConfigError::Parse {
                        path: path.clone(),
                        message: err.to_string(),
                    })?;
                return Ok(Some(LoadedConfig::new(parsed, path.clone())));
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => {
                return Err(ConfigError::Read {
                    path: path.clone(),
                    source: err,
                })
            }
        }
    }

    Ok(None)
}

pub fn load_resolved_from_paths(
    paths: &[PathBuf],
) -> Result<ResolvedConfigWithSource, ConfigError> {
    match load_from_paths(paths)? {
        Some(entry) => Ok(ResolvedConfigWithSource {
            resolved: ResolvedConfig::from_raw(entry.contents),
            source: Some(entry.source),
        }),
        None => Ok(ResolvedConfigWithSource {
            resolved: ResolvedConfig::default(),
            source: None,
        }),
    }
}
