use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use image::DynamicImage;
use irisid_core::segmentation::{SegmentationMode, SegmentationOptions, SegmentedIris, Segmenter};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

const NORMALIZED_SUFFIX: &str = "_eyeNorm";
const NORMALIZED_MASK_SUFFIX: &str = "_eyeNormMask";

/// Runs the external segmentation binary once per call.
///
/// Each call gets its own working directory under `options.output_dir`,
/// removed again once the artifacts are decoded.
#[derive(Debug, Clone)]
pub struct ProcessSegmenter {
    binary: PathBuf,
}

impl ProcessSegmenter {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn launch(&self, args: &[OsString], options: &SegmentationOptions) -> AppResult<()> {
        if options.debug {
            info!(
                "Launching segmenter: {} {}",
                self.binary.display(),
                args.iter()
                    .map(|arg| arg.to_string_lossy())
                    .collect::<Vec<_>>()
                    .join(" ")
            );
        }

        let status = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .status()
            .map_err(|source| AppError::SegmenterLaunch {
                binary: self.binary.clone(),
                source,
            })?;
        debug!(binary = %self.binary.display(), %status, "segmenter exited");
        Ok(())
    }
}

impl Segmenter for ProcessSegmenter {
    fn segment(
        &self,
        image: &Path,
        options: &SegmentationOptions,
    ) -> AppResult<Option<SegmentedIris>> {
        options.validate()?;
        let input = image
            .canonicalize()
            .map_err(|_| AppError::MissingInput {
                path: image.to_path_buf(),
            })?;

        let mut args = segmenter_args(&input, options);
        if options.mode == SegmentationMode::Debug {
            self.launch(&args, options)?;
            return Ok(None);
        }

        let work_dir = options.output_dir.join(Uuid::new_v4().to_string());
        fs::create_dir_all(&work_dir)?;
        args.push("--out".into());
        args.push(work_dir.clone().into_os_string());

        let result = self
            .launch(&args, options)
            .and_then(|()| collect_artifacts(&input, &work_dir));

        if let Err(err) = fs::remove_dir_all(&work_dir) {
            warn!(
                "Failed to remove segmenter work dir {}: {err}",
                work_dir.display()
            );
        }
        result
    }
}

fn segmenter_args(input: &Path, options: &SegmentationOptions) -> Vec<OsString> {
    vec![
        "--in".into(),
        input.as_os_str().to_os_string(),
        "--method".into(),
        options.method.clone().into(),
        "--size".into(),
        options.size.to_string().into(),
        "--mode".into(),
        options.mode.as_str().into(),
    ]
}

/// `<stem><suffix><.ext>` inside `dir`, mirroring the input file name.
pub fn artifact_path(dir: &Path, input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match input.extension() {
        Some(ext) => format!("{stem}{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}{suffix}"),
    };
    dir.join(name)
}

fn collect_artifacts(input: &Path, work_dir: &Path) -> AppResult<Option<SegmentedIris>> {
    let normalized_path = artifact_path(work_dir, input, NORMALIZED_SUFFIX);
    if !normalized_path.is_file() {
        debug!(
            path = %normalized_path.display(),
            "segmenter produced no normalized iris"
        );
        return Ok(None);
    }

    let normalized = image::open(&normalized_path).map_err(|source| AppError::ImageDecode {
        path: normalized_path.clone(),
        source,
    })?;

    Ok(Some(SegmentedIris {
        normalized,
        normalized_mask: open_optional(&artifact_path(work_dir, input, NORMALIZED_MASK_SUFFIX)),
    }))
}

fn open_optional(path: &Path) -> Option<DynamicImage> {
    if !path.is_file() {
        return None;
    }
    match image::open(path) {
        Ok(image) => Some(image),
        Err(err) => {
            debug!(path = %path.display(), "ignoring unreadable artifact: {err}");
            None
        }
    }
}
