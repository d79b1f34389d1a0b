use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use image::ImageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("input file not found or unreadable: {path}")]
    MissingInput { path: PathBuf },

    #[error("failed to decode image {path}: {source}")]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: ImageError,
    },

    #[error("feature dimension mismatch: store holds {expected}-value vectors, got {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("template store {path} is unreadable: {message}")]
    StoreUnreadable { path: PathBuf, message: String },

    #[error("failed to write template store {path}: {source}")]
    StoreWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("feature vector rejected: {message}")]
    InvalidFeatures { message: String },

    #[error("invalid subject id '{subject}': {message}")]
    InvalidSubject { subject: String, message: String },

    #[error("invalid {setting}: {message}")]
    InvalidSetting {
        setting: &'static str,
        message: String,
    },

    #[error("missing {setting}; provide {flag} or set it in the configuration file")]
    MissingSetting {
        setting: &'static str,
        flag: &'static str,
    },

    #[error("failed to launch segmenter {binary}: {source}")]
    SegmenterLaunch {
        binary: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to read configuration file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration file {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },
}

impl AppError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            AppError::MissingInput { .. } => ExitCode::from(2),
            AppError::ImageDecode { .. } => ExitCode::from(2),
            AppError::DimensionMismatch { .. } => ExitCode::from(3),
            AppError::StoreUnreadable { .. } => ExitCode::from(2),
            AppError::StoreWrite { .. } => ExitCode::from(2),
            AppError::InvalidFeatures { .. } => ExitCode::from(3),
            AppError::InvalidSubject { .. } => ExitCode::from(2),
            AppError::InvalidSetting { .. } => ExitCode::from(2),
            AppError::MissingSetting { .. } => ExitCode::from(2),
            AppError::SegmenterLaunch { .. } => ExitCode::from(4),
            AppError::Io(_) => ExitCode::from(2),
            AppError::Serialization(_) => ExitCode::from(2),
            AppError::ConfigRead { .. } => ExitCode::from(2),
            AppError::ConfigParse { .. } => ExitCode::from(2),
        }
    }

    pub fn human_message(&self) -> String {
        self.to_string()
    }
}

pub type AppResult<T> = Result<T, AppError>;
