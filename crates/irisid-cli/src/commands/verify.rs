use std::any::Any;
use std::process::ExitCode;

use irisid_core::recognition::VerificationOutcome;

use crate::cli::{OutputMode, VerifyArgs};
use crate::commands::{negative_outcome, CommandHandler};
use crate::errors::AppResult;
use crate::output::render_verify;
use crate::pipeline;

pub struct VerifyHandler {
    args: VerifyArgs,
    run: Box<dyn Fn(&VerifyArgs) -> AppResult<VerificationOutcome> + Send + Sync>,
    render: Box<dyn Fn(&VerificationOutcome, OutputMode, bool) -> AppResult<()> + Send + Sync>,
}

impl VerifyHandler {
    pub fn new(args: VerifyArgs) -> Self {
        Self::with_dependencies(args, pipeline::run_verify, render_verify)
    }

    pub fn with_dependencies(
        args: VerifyArgs,
        run: impl Fn(&VerifyArgs) -> AppResult<VerificationOutcome> + Send + Sync + 'static,
        render: impl Fn(&VerificationOutcome, OutputMode, bool) -> AppResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            args,
            run: Box::new(run),
            render: Box::new(render),
        }
    }
}

impl CommandHandler for VerifyHandler {
    fn execute(&self, mode: OutputMode, verbose: bool) -> AppResult<ExitCode> {
        let outcome = (self.run)(&self.args)?;
        (self.render)(&outcome, mode, verbose)?;
        if outcome.accepted {
            Ok(ExitCode::SUCCESS)
        } else {
            Ok(negative_outcome())
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
