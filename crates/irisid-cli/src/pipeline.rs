use std::collections::BTreeMap;
use std::path::PathBuf;

use irisid_config::ResolvedConfig;
use irisid_core::enrollment::{run_enrollment_with, EnrollmentConfig, EnrollmentOutcome};
use irisid_core::extractor::LbpExtractor;
use irisid_core::recognition::{
    run_identification_with, run_verification_with, IdentificationConfig, IdentificationOutcome,
    VerificationConfig, VerificationOutcome,
};
use irisid_core::templates::{CsvTemplateStore, SubjectId, TemplateStore};
use serde::Serialize;

use crate::cli::{EnrollArgs, IdentifyArgs, TemplatesListArgs, VerifyArgs};
use crate::config::{
    self as config_loader, resolve_dataset, resolve_identification_threshold, resolve_max_rank,
    resolve_verification_threshold, segmentation_options,
};
use crate::errors::AppResult;
use crate::segmenter::ProcessSegmenter;

#[derive(Debug, Clone, Serialize)]
pub struct SubjectSummary {
    pub subject: SubjectId,
    pub templates: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplatesListOutcome {
    pub dataset_path: PathBuf,
    pub dimension: Option<usize>,
    pub total: usize,
    pub subjects: Vec<SubjectSummary>,
}

/// Collaborators every recognition command needs, built from the config.
struct Toolchain {
    segmenter: ProcessSegmenter,
    extractor: LbpExtractor,
}

impl Toolchain {
    fn from_config(config: &ResolvedConfig) -> AppResult<Self> {
        Ok(Self {
            segmenter: ProcessSegmenter::new(&config.segmenter_binary),
            extractor: LbpExtractor::new(config.lbp_zones)?,
        })
    }
}

pub fn run_enroll(args: &EnrollArgs) -> AppResult<EnrollmentOutcome> {
    let config = config_loader::load_config()?;
    run_enroll_with_config(args, &config)
}

pub fn run_enroll_with_config(
    args: &EnrollArgs,
    config: &ResolvedConfig,
) -> AppResult<EnrollmentOutcome> {
    let tools = Toolchain::from_config(config)?;
    let enrollment = EnrollmentConfig {
        image: args.image.clone(),
        subject: args.id.clone(),
        dataset_path: resolve_dataset(args.dataset.as_deref(), config),
        options: segmentation_options(config)?,
    };
    let store = CsvTemplateStore::new(&enrollment.dataset_path);
    run_enrollment_with(&enrollment, &tools.segmenter, &tools.extractor, &store)
}

pub fn run_verify(args: &VerifyArgs) -> AppResult<VerificationOutcome> {
    let config = config_loader::load_config()?;
    run_verify_with_config(args, &config)
}

pub fn run_verify_with_config(
    args: &VerifyArgs,
    config: &ResolvedConfig,
) -> AppResult<VerificationOutcome> {
    let threshold = resolve_verification_threshold(args.threshold, config)?;
    let tools = Toolchain::from_config(config)?;
    let verification = VerificationConfig {
        image: args.image.clone(),
        subject: args.id.clone(),
        dataset_path: resolve_dataset(args.dataset.as_deref(), config),
        threshold,
        options: segmentation_options(config)?,
    };
    let store = CsvTemplateStore::new(&verification.dataset_path);
    run_verification_with(&verification, &tools.segmenter, &tools.extractor, &store)
}

pub fn run_identify(args: &IdentifyArgs) -> AppResult<IdentificationOutcome> {
    let config = config_loader::load_config()?;
    run_identify_with_config(args, &config)
}

pub fn run_identify_with_config(
    args: &IdentifyArgs,
    config: &ResolvedConfig,
) -> AppResult<IdentificationOutcome> {
    let threshold = resolve_identification_threshold(args.threshold, config)?;
    let max_rank = resolve_max_rank(args.max_rank, config)?;
    let tools = Toolchain::from_config(config)?;
    let identification = IdentificationConfig {
        image: args.image.clone(),
        dataset_path: resolve_dataset(args.dataset.as_deref(), config),
        max_rank,
        threshold,
        options: segmentation_options(config)?,
    };
    let store = CsvTemplateStore::new(&identification.dataset_path);
    run_identification_with(&identification, &tools.segmenter, &tools.extractor, &store)
}

pub fn run_templates_list(args: &TemplatesListArgs) -> AppResult<TemplatesListOutcome> {
    let config = config_loader::load_config()?;
    let dataset_path = resolve_dataset(args.dataset.as_deref(), &config);
    let filter = args.id.as_deref().map(SubjectId::parse).transpose()?;
    list_templates(&CsvTemplateStore::new(&dataset_path), dataset_path, filter)
}

pub fn list_templates<S>(
    store: &S,
    dataset_path: PathBuf,
    filter: Option<SubjectId>,
) -> AppResult<TemplatesListOutcome>
where
    S: TemplateStore + ?Sized,
{
    let templates = match &filter {
        Some(subject) => store.filter_by_identity(subject)?,
        None => store.load_all()?,
    };

    let mut counts: BTreeMap<SubjectId, usize> = BTreeMap::new();
    for template in &templates {
        *counts.entry(template.subject.clone()).or_default() += 1;
    }

    Ok(TemplatesListOutcome {
        dataset_path,
        dimension: templates.first().map(|template| template.dimension()),
        total: templates.len(),
        subjects: counts
            .into_iter()
            .map(|(subject, templates)| SubjectSummary { subject, templates })
            .collect(),
    })
}
