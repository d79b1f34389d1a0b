use std::any::Any;
use std::process::ExitCode;

use crate::cli::{Commands, OutputMode};
use crate::errors::AppResult;

pub trait CommandHandler: Send + Sync {
    fn execute(&self, mode: OutputMode, verbose: bool) -> AppResult<ExitCode>;
    fn as_any(&self) -> &dyn Any;
}

mod enroll;
mod identify;
mod templates;
mod verify;

pub use enroll::EnrollHandler;
pub use identify::IdentifyHandler;
pub use templates::TemplatesHandler;
pub use verify::VerifyHandler;

/// Exit status for a command that ran but produced a negative answer.
pub fn negative_outcome() -> ExitCode {
    ExitCode::from(1)
}

impl From<Commands> for Box<dyn CommandHandler> {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Enroll(args) => Box::new(EnrollHandler::new(args)),
            Commands::Verify(args) => Box::new(VerifyHandler::new(args)),
            Commands::Identify(args) => Box::new(IdentifyHandler::new(args)),
            Commands::Templates(cmd) => Box::new(TemplatesHandler::new(cmd)),
        }
    }
}
