use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};

/// Caller-supplied identity a template is enrolled under.
///
/// Integer and string identities are both carried in their textual form, so
/// `SubjectId::from(7)` and `SubjectId::from("7")` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Builds an id after checking it can be stored as a table label.
    pub fn parse(value: &str) -> AppResult<Self> {
        validate_subject_id(value)?;
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubjectId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SubjectId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<u64> for SubjectId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl From<i64> for SubjectId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

/// One enrolled biometric sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub features: Vec<f64>,
    pub subject: SubjectId,
}

impl Template {
    pub fn new(features: Vec<f64>, subject: impl Into<SubjectId>) -> Self {
        Self {
            features,
            subject: subject.into(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.features.len()
    }
}

pub fn validate_subject_id(subject: &str) -> AppResult<()> {
    if subject.is_empty() {
        return Err(AppError::InvalidSubject {
            subject: subject.to_string(),
            message: "subject id cannot be empty".into(),
        });
    }

    if subject.trim() != subject {
        return Err(AppError::InvalidSubject {
            subject: subject.to_string(),
            message: "subject id cannot start or end with whitespace".into(),
        });
    }

    if subject.chars().any(char::is_control) {
        return Err(AppError::InvalidSubject {
            subject: subject.to_string(),
            message: "subject id cannot contain control characters".into(),
        });
    }

    Ok(())
}

/// Checks an extractor output before it reaches the store or the engine and
/// returns its dimensionality.
pub fn ensure_valid_features(features: &[f64]) -> AppResult<usize> {
    if features.is_empty() {
        return Err(AppError::InvalidFeatures {
            message: "feature vector is empty".into(),
        });
    }

    if let Some(idx) = features.iter().position(|value| !value.is_finite()) {
        return Err(AppError::InvalidFeatures {
            message: format!("value at index {idx} is not finite"),
        });
    }

    Ok(features.len())
}
