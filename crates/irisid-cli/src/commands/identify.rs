use std::any::Any;
use std::process::ExitCode;

use irisid_core::recognition::IdentificationOutcome;

use crate::cli::{IdentifyArgs, OutputMode};
use crate::commands::{negative_outcome, CommandHandler};
use crate::errors::AppResult;
use crate::output::render_identify;
use crate::pipeline;

pub struct IdentifyHandler {
    args: IdentifyArgs,
    run: Box<dyn Fn(&IdentifyArgs) -> AppResult<IdentificationOutcome> + Send + Sync>,
    render: Box<dyn Fn(&IdentificationOutcome, OutputMode, bool) -> AppResult<()> + Send + Sync>,
}

impl IdentifyHandler {
    pub fn new(args: IdentifyArgs) -> Self {
        Self::with_dependencies(args, pipeline::run_identify, render_identify)
    }

    pub fn with_dependencies(
        args: IdentifyArgs,
        run: impl Fn(&IdentifyArgs) -> AppResult<IdentificationOutcome> + Send + Sync + 'static,
        render: impl Fn(&IdentificationOutcome, OutputMode, bool) -> AppResult<()>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            args,
            run: Box::new(run),
            render: Box::new(render),
        }
    }
}

impl CommandHandler for IdentifyHandler {
    fn execute(&self, mode: OutputMode, verbose: bool) -> AppResult<ExitCode> {
        let outcome = (self.run)(&self.args)?;
        (self.render)(&outcome, mode, verbose)?;
        if outcome.matches.is_empty() {
            Ok(negative_outcome())
        } else {
            Ok(ExitCode::SUCCESS)
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
