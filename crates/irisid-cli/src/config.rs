use std::env;
use std::path::{Path, PathBuf};

use irisid_config::{default_sources, load_resolved_from_paths, ResolvedConfig};
use irisid_core::recognition::{validate_max_rank, validate_threshold};
use irisid_core::segmentation::{SegmentationMode, SegmentationOptions};
use tracing::{debug, info};

use crate::errors::{from_config_error, AppError, AppResult};

pub const DATASET_ENV: &str = "IRISID_DATASET";

pub trait DatasetPathResolver {
    fn resolve(&self, override_path: Option<&Path>, configured: &Path) -> PathBuf;
}

/// Flag, then `$IRISID_DATASET`, then the configured path.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvDatasetResolver;

impl DatasetPathResolver for EnvDatasetResolver {
    fn resolve(&self, override_path: Option<&Path>, configured: &Path) -> PathBuf {
        let env_value = env::var_os(DATASET_ENV).map(PathBuf::from);
        pick_dataset_path(override_path, env_value, configured)
    }
}

fn pick_dataset_path(
    override_path: Option<&Path>,
    env_value: Option<PathBuf>,
    configured: &Path,
) -> PathBuf {
    if let Some(path) = override_path {
        path.to_path_buf()
    } else if let Some(path) = env_value.filter(|path| !path.as_os_str().is_empty()) {
        path
    } else {
        configured.to_path_buf()
    }
}

/// Loads the first config file found in the standard locations, or the
/// built-in defaults when there is none.
pub fn load_config() -> AppResult<ResolvedConfig> {
    load_config_from(&default_sources())
}

pub fn load_config_from(sources: &[PathBuf]) -> AppResult<ResolvedConfig> {
    let loaded = load_resolved_from_paths(sources).map_err(from_config_error)?;
    match &loaded.source {
        Some(path) => debug!("Loaded configuration from {}", path.display()),
        None => debug!("No configuration file found; using defaults"),
    }
    Ok(loaded.resolved)
}

pub fn resolve_dataset(flag: Option<&Path>, config: &ResolvedConfig) -> PathBuf {
    resolve_dataset_with(flag, config, &EnvDatasetResolver)
}

pub fn resolve_dataset_with<R>(
    flag: Option<&Path>,
    config: &ResolvedConfig,
    resolver: &R,
) -> PathBuf
where
    R: DatasetPathResolver + ?Sized,
{
    resolver.resolve(flag, &config.dataset_path)
}

pub fn resolve_verification_threshold(
    flag: Option<f64>,
    config: &ResolvedConfig,
) -> AppResult<f64> {
    let value = flag
        .or(config.verification_threshold)
        .ok_or(AppError::MissingSetting {
            setting: "verification threshold",
            flag: "--threshold",
        })?;
    validate_threshold("verification threshold", value)
}

pub fn resolve_identification_threshold(
    flag: Option<f64>,
    config: &ResolvedConfig,
) -> AppResult<Option<f64>> {
    flag.or(config.identification_threshold)
        .map(|value| validate_threshold("identification threshold", value))
        .transpose()
}

pub fn resolve_max_rank(flag: Option<usize>, config: &ResolvedConfig) -> AppResult<usize> {
    if flag.is_none() {
        info!(
            "No --max-rank flag given; reporting {} candidate(s)",
            config.max_rank
        );
    }
    validate_max_rank(flag.unwrap_or(config.max_rank))
}

/// `segmentation_mode = "debug"` runs the segmenter for inspection only, so
/// every command then reports a negative outcome.
pub fn segmentation_options(config: &ResolvedConfig) -> AppResult<SegmentationOptions> {
    let mode: SegmentationMode = config.segmentation_mode.parse()?;
    if mode == SegmentationMode::Debug {
        info!("Segmenter runs in debug mode; no templates will be produced");
    }
    Ok(SegmentationOptions {
        mode,
        method: config.segmentation_method.clone(),
        size: config.segmentation_size,
        output_dir: config.work_dir.clone(),
        debug: config.debug,
    })
}
