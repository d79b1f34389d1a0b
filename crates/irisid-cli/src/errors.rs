use irisid_config::ConfigError;

pub use irisid_core::errors::{AppError, AppResult};

pub fn from_config_error(err: ConfigError) -> AppError {
    match err {
        ConfigError::Read { path, source } => AppError::ConfigRead { path, source },
        ConfigError::Parse { path, message } => AppError::ConfigParse { path, message },
    }
}
