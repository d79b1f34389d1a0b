use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::debug;

use crate::errors::AppResult;
use crate::extractor::FeatureExtractor;
use crate::recognition::probe_features;
use crate::segmentation::{SegmentationOptions, Segmenter};
use crate::templates::model::SubjectId;
use crate::templates::store::TemplateStore;

#[derive(Debug, Clone)]
pub struct EnrollmentConfig {
    pub image: PathBuf,
    pub subject: String,
    pub dataset_path: PathBuf,
    pub options: SegmentationOptions,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentOutcome {
    pub subject: SubjectId,
    pub dataset_path: PathBuf,
    pub enrolled: bool,
    pub feature_len: Option<usize>,
    pub enrolled_at: Option<String>,
    #[serde(skip)]
    pub logs: Vec<String>,
}

/// Segments `image`, extracts its features and appends them under `subject`.
///
/// Returns `false` when segmentation yields no normalized crop; the store is
/// not touched in that case. Dimension and store faults propagate.
pub fn enroll<G, E, S>(
    segmenter: &G,
    extractor: &E,
    store: &S,
    image: &Path,
    subject: &SubjectId,
    options: &SegmentationOptions,
) -> AppResult<bool>
where
    G: Segmenter + ?Sized,
    E: FeatureExtractor + ?Sized,
    S: TemplateStore + ?Sized,
{
    let Some(features) = probe_features(segmenter, extractor, image, options)? else {
        debug!(image = %image.display(), "segmentation produced no crop; nothing enrolled");
        return Ok(false);
    };
    store.append(&features, subject)?;
    Ok(true)
}

pub fn run_enrollment_with<G, E, S>(
    config: &EnrollmentConfig,
    segmenter: &G,
    extractor: &E,
    store: &S,
) -> AppResult<EnrollmentOutcome>
where
    G: Segmenter + ?Sized,
    E: FeatureExtractor + ?Sized,
    S: TemplateStore + ?Sized,
{
    let subject = SubjectId::parse(&config.subject)?;
    config.options.validate()?;

    let mut logs = Vec::new();
    logs.push(format!(
        "Segmenting {} (method {}, size {})",
        config.image.display(),
        config.options.method,
        config.options.size
    ));

    let Some(features) = probe_features(segmenter, extractor, &config.image, &config.options)?
    else {
        logs.push(format!(
            "Segmentation produced no normalized iris for {}",
            config.image.display()
        ));
        logs.push(format!("Nothing enrolled for subject {subject}"));
        return Ok(EnrollmentOutcome {
            subject,
            dataset_path: config.dataset_path.clone(),
            enrolled: false,
            feature_len: None,
            enrolled_at: None,
            logs,
        });
    };
    logs.push(format!("Extracted {} feature value(s)", features.len()));

    store.append(&features, &subject)?;
    let enrolled_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    logs.push(format!("Enrolled template for subject {subject}"));
    logs.push(format!("Template store: {}", config.dataset_path.display()));

    Ok(EnrollmentOutcome {
        subject,
        dataset_path: config.dataset_path.clone(),
        enrolled: true,
        feature_len: Some(features.len()),
        enrolled_at: Some(enrolled_at),
        logs,
    })
}
