use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::errors::{AppError, AppResult};
use crate::extractor::FeatureExtractor;
use crate::segmentation::{SegmentationOptions, Segmenter};
use crate::templates::matcher::{identify, verify_detailed, MatchResult, VerificationDecision};
use crate::templates::model::{ensure_valid_features, SubjectId};
use crate::templates::store::TemplateStore;

#[derive(Debug, Clone)]
pub struct VerificationConfig {
    pub image: PathBuf,
    pub subject: String,
    pub dataset_path: PathBuf,
    pub threshold: f64,
    pub options: SegmentationOptions,
}

#[derive(Debug, Clone)]
pub struct IdentificationConfig {
    pub image: PathBuf,
    pub dataset_path: PathBuf,
    pub max_rank: usize,
    /// Open-set acceptance threshold; `None` runs a closed-set search.
    pub threshold: Option<f64>,
    pub options: SegmentationOptions,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerificationOutcome {
    pub subject: SubjectId,
    pub dataset_path: PathBuf,
    pub accepted: bool,
    pub segmented: bool,
    pub decision: Option<VerificationDecision>,
    #[serde(skip)]
    pub logs: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IdentificationOutcome {
    pub dataset_path: PathBuf,
    pub segmented: bool,
    pub templates_compared: usize,
    pub max_rank: usize,
    pub threshold: Option<f64>,
    pub matches: Vec<MatchResult>,
    #[serde(skip)]
    pub logs: Vec<String>,
}

/// Runs segmentation and extraction on a probe image.
///
/// `Ok(None)` when the segmenter produced no normalized crop.
pub fn probe_features<G, E>(
    segmenter: &G,
    extractor: &E,
    image: &Path,
    options: &SegmentationOptions,
) -> AppResult<Option<Vec<f64>>>
where
    G: Segmenter + ?Sized,
    E: FeatureExtractor + ?Sized,
{
    if !image.is_file() {
        return Err(AppError::MissingInput {
            path: image.to_path_buf(),
        });
    }

    let Some(segmented) = segmenter.segment(image, options)? else {
        return Ok(None);
    };
    let features = extractor.extract(&segmented)?;
    ensure_valid_features(&features)?;
    debug!(image = %image.display(), dimension = features.len(), "probe features ready");
    Ok(Some(features))
}

pub fn validate_threshold(setting: &'static str, value: f64) -> AppResult<f64> {
    if !value.is_finite() || value <= 0.0 {
        return Err(AppError::InvalidSetting {
            setting,
            message: format!("expected a finite value greater than zero, found {value}"),
        });
    }
    Ok(value)
}

pub fn validate_max_rank(value: usize) -> AppResult<usize> {
    if value == 0 {
        return Err(AppError::InvalidSetting {
            setting: "max rank",
            message: "at least one candidate must be requested".into(),
        });
    }
    Ok(value)
}

pub fn run_verification_with<G, E, S>(
    config: &VerificationConfig,
    segmenter: &G,
    extractor: &E,
    store: &S,
) -> AppResult<VerificationOutcome>
where
    G: Segmenter + ?Sized,
    E: FeatureExtractor + ?Sized,
    S: TemplateStore + ?Sized,
{
    let subject = SubjectId::parse(&config.subject)?;
    let threshold = validate_threshold("verification threshold", config.threshold)?;
    config.options.validate()?;

    let mut logs = vec![format!(
        "Verifying {} as subject {subject}",
        config.image.display()
    )];

    let Some(probe) = probe_features(segmenter, extractor, &config.image, &config.options)? else {
        logs.push(format!(
            "Segmentation produced no normalized iris for {}; access denied",
            config.image.display()
        ));
        return Ok(VerificationOutcome {
            subject,
            dataset_path: config.dataset_path.clone(),
            accepted: false,
            segmented: false,
            decision: None,
            logs,
        });
    };

    let own = store.filter_by_identity(&subject)?;
    logs.push(format!(
        "Loaded {} template(s) for subject {subject}",
        own.len()
    ));
    let decision = verify_detailed(&probe, &subject, &own, threshold)?;
    match decision.min_distance {
        Some(distance) => logs.push(format!(
            "Nearest template distance {distance:.4} (threshold {threshold})"
        )),
        None => logs.push(format!("Subject {subject} has no enrolled templates")),
    }
    logs.push(if decision.accepted {
        "Access granted".to_string()
    } else {
        "Access denied".to_string()
    });

    Ok(VerificationOutcome {
        subject,
        dataset_path: config.dataset_path.clone(),
        accepted: decision.accepted,
        segmented: true,
        decision: Some(decision),
        logs,
    })
}

pub fn run_identification_with<G, E, S>(
    config: &IdentificationConfig,
    segmenter: &G,
    extractor: &E,
    store: &S,
) -> AppResult<IdentificationOutcome>
where
    G: Segmenter + ?Sized,
    E: FeatureExtractor + ?Sized,
    S: TemplateStore + ?Sized,
{
    let max_rank = validate_max_rank(config.max_rank)?;
    let threshold = config
        .threshold
        .map(|value| validate_threshold("identification threshold", value))
        .transpose()?;
    config.options.validate()?;

    let mut logs = vec![format!(
        "Identifying {} ({})",
        config.image.display(),
        match threshold {
            Some(value) => format!("open set, threshold {value}"),
            None => "closed set".to_string(),
        }
    )];

    let Some(probe) = probe_features(segmenter, extractor, &config.image, &config.options)? else {
        logs.push(format!(
            "Segmentation produced no normalized iris for {}; no match",
            config.image.display()
        ));
        return Ok(IdentificationOutcome {
            dataset_path: config.dataset_path.clone(),
            segmented: false,
            templates_compared: 0,
            max_rank,
            threshold,
            matches: Vec::new(),
            logs,
        });
    };

    let gallery = store.load_all()?;
    logs.push(format!("Compared against {} template(s)", gallery.len()));
    let matches = identify(&probe, &gallery, max_rank, threshold)?;
    match matches.first() {
        Some(best) => logs.push(format!(
            "Best candidate {} at distance {:.4}",
            best.subject, best.distance
        )),
        None => logs.push("No candidate matched".to_string()),
    }

    Ok(IdentificationOutcome {
        dataset_path: config.dataset_path.clone(),
        segmented: true,
        templates_compared: gallery.len(),
        max_rank,
        threshold,
        matches,
        logs,
    })
}
