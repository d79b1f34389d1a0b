use std::fmt;
use std::str::FromStr;
use std::path::{Path, PathBuf};

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};

pub const DEFAULT_SEGMENTATION_METHOD: &str = "hough";
pub const DEFAULT_SEGMENTATION_SIZE: u32 = 250;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentationMode {
    /// Persist the segmented artifacts for the caller to consume.
    Segmentation,
    /// Interactive inspection only; nothing is written.
    Debug,
}

impl SegmentationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentationMode::Segmentation => "segmentation",
            SegmentationMode::Debug => "debug",
        }
    }
}

impl FromStr for SegmentationMode {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "segmentation" => Ok(SegmentationMode::Segmentation),
            "debug" => Ok(SegmentationMode::Debug),
            other => Err(AppError::InvalidSetting {
                setting: "segmentation mode",
                message: format!("expected 'segmentation' or 'debug', found '{other}'"),
            }),
        }
    }
}

impl fmt::Display for SegmentationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationOptions {
    pub mode: SegmentationMode,
    pub method: String,
    pub size: u32,
    pub output_dir: PathBuf,
    pub debug: bool,
}

impl SegmentationOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            mode: SegmentationMode::Segmentation,
            method: DEFAULT_SEGMENTATION_METHOD.to_string(),
            size: DEFAULT_SEGMENTATION_SIZE,
            output_dir: output_dir.into(),
            debug: false,
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.method.trim().is_empty() {
            return Err(AppError::InvalidSetting {
                setting: "segmentation method",
                message: "method name cannot be empty".into(),
            });
        }
        if self.size == 0 {
            return Err(AppError::InvalidSetting {
                setting: "segmentation size",
                message: "size must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

/// Normalized iris strip plus the occlusion mask, when the segmenter wrote
/// one. Non-zero mask pixels mark usable iris texture.
#[derive(Debug, Clone)]
pub struct SegmentedIris {
    pub normalized: DynamicImage,
    pub normalized_mask: Option<DynamicImage>,
}

impl SegmentedIris {
    pub fn from_normalized(normalized: DynamicImage) -> Self {
        Self {
            normalized,
            normalized_mask: None,
        }
    }
}

pub trait Segmenter {
    /// `Ok(None)` when no normalized crop was produced; that is an expected
    /// outcome, not a fault.
    fn segment(
        &self,
        image: &Path,
        options: &SegmentationOptions,
    ) -> AppResult<Option<SegmentedIris>>;
}
