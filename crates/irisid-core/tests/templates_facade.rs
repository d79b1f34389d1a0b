use std::cell::RefCell;
use std::path::{Path, PathBuf};

use image::{GrayImage, Luma};
use irisid_core::enrollment::{enroll, run_enrollment_with, EnrollmentConfig};
use irisid_core::errors::{AppError, AppResult};
use irisid_core::extractor::FeatureExtractor;
use irisid_core::recognition::{
    run_identification_with, run_verification_with, IdentificationConfig, VerificationConfig,
};
use irisid_core::segmentation::{SegmentationOptions, SegmentedIris, Segmenter};
use irisid_core::templates::{identify, verify, CsvTemplateStore, SubjectId, TemplateStore};
use tempfile::TempDir;

#[test]
fn integration_enroll_verify_identify_against_csv_store() {
    let tmp = TempDir::new().unwrap();
    let image = write_probe(&tmp);
    let dataset = tmp.path().join("db").join("templates.csv");
    let store = CsvTemplateStore::new(&dataset);
    let segmenter = AlwaysSegments;
    let options = SegmentationOptions::new(tmp.path().join("work"));

    for (features, subject) in [
        (vec![1.0, 0.0], "A"),
        (vec![0.0, 1.0], "B"),
        (vec![1.0, 1.0], "A"),
    ] {
        let extractor = QueuedExtractor::new(vec![features]);
        let enrolled = enroll(
            &segmenter,
            &extractor,
            &store,
            &image,
            &SubjectId::from(subject),
            &options,
        )
        .expect("enroll works");
        assert!(enrolled);
    }

    let gallery = store.load_all().unwrap();
    assert_eq!(gallery.len(), 3);
    let probe = [0.9, 0.1];

    let top = identify(&probe, &gallery, 1, None).unwrap();
    assert_eq!(top[0].subject, SubjectId::from("A"));
    assert!((top[0].distance - 0.02f64.sqrt()).abs() < 1e-6);

    assert!(verify(&probe, &SubjectId::from("A"), &gallery, 0.5).unwrap());
    assert!(!verify(&probe, &SubjectId::from("B"), &gallery, 0.5).unwrap());
    assert!(identify(&probe, &gallery, 3, Some(0.1)).unwrap().is_empty());

    let verification = run_verification_with(
        &VerificationConfig {
            image: image.clone(),
            subject: "A".into(),
            dataset_path: dataset.clone(),
            threshold: 0.5,
            options: options.clone(),
        },
        &segmenter,
        &QueuedExtractor::new(vec![probe.to_vec()]),
        &store,
    )
    .expect("verify works");
    assert!(verification.accepted);

    let identification = run_identification_with(
        &IdentificationConfig {
            image,
            dataset_path: dataset,
            max_rank: 2,
            threshold: None,
            options,
        },
        &segmenter,
        &QueuedExtractor::new(vec![probe.to_vec()]),
        &store,
    )
    .expect("identify works");
    let subjects: Vec<&str> = identification
        .matches
        .iter()
        .map(|candidate| candidate.subject.as_str())
        .collect();
    assert_eq!(subjects, vec!["A", "A"]);
}

#[test]
fn integration_other_subject_with_new_dimension_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let image = write_probe(&tmp);
    let dataset = tmp.path().join("templates.csv");
    let store = CsvTemplateStore::new(&dataset);
    let extractor = QueuedExtractor::new(vec![vec![0.25; 128], vec![0.5; 64]]);

    let config = EnrollmentConfig {
        image,
        subject: "7".into(),
        dataset_path: dataset.clone(),
        options: SegmentationOptions::new(tmp.path().join("work")),
    };

    let first = run_enrollment_with(&config, &AlwaysSegments, &extractor, &store).unwrap();
    assert_eq!(first.feature_len, Some(128));
    let before = std::fs::read(&dataset).unwrap();

    let other = EnrollmentConfig {
        subject: "8".into(),
        ..config
    };
    let err = run_enrollment_with(&other, &AlwaysSegments, &extractor, &store).unwrap_err();
    assert!(matches!(
        err,
        AppError::DimensionMismatch {
            expected: 128,
            found: 64
        }
    ));

    let rows = store.load_all().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].subject, SubjectId::from(7u64));
    assert!(store.filter_by_identity(&SubjectId::from("8")).unwrap().is_empty());
    assert_eq!(store.dimension().unwrap(), Some(128));
    assert_eq!(std::fs::read(&dataset).unwrap(), before);
}

fn write_probe(tmp: &TempDir) -> PathBuf {
    let path = tmp.path().join("probe.png");
    GrayImage::from_pixel(16, 16, Luma([80])).save(&path).unwrap();
    path
}

struct AlwaysSegments;

impl Segmenter for AlwaysSegments {
    fn segment(
        &self,
        image: &Path,
        _options: &SegmentationOptions,
    ) -> AppResult<Option<SegmentedIris>> {
        let normalized = image::open(image).map_err(|source| AppError::ImageDecode {
            path: image.to_path_buf(),
            source,
        })?;
        Ok(Some(SegmentedIris::from_normalized(normalized)))
    }
}

/// Hands out the queued vectors in order, one per extraction.
struct QueuedExtractor {
    queue: RefCell<Vec<Vec<f64>>>,
}

impl QueuedExtractor {
    fn new(mut vectors: Vec<Vec<f64>>) -> Self {
        vectors.reverse();
        Self {
            queue: RefCell::new(vectors),
        }
    }
}

impl FeatureExtractor for QueuedExtractor {
    fn extract(&self, _iris: &SegmentedIris) -> AppResult<Vec<f64>> {
        self.queue
            .borrow_mut()
            .pop()
            .ok_or_else(|| AppError::InvalidFeatures {
                message: "extractor queue exhausted".into(),
            })
    }
}
