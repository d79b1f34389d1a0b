use std::any::Any;
use std::process::ExitCode;

use crate::cli::{OutputMode, TemplatesCommands, TemplatesListArgs};
use crate::commands::CommandHandler;
use crate::errors::AppResult;
use crate::output::render_templates_list;
use crate::pipeline::{self, TemplatesListOutcome};

pub struct TemplatesHandler {
    command: TemplatesCommands,
    list: Box<dyn Fn(&TemplatesListArgs) -> AppResult<TemplatesListOutcome> + Send + Sync>,
    render: Box<dyn Fn(&TemplatesListOutcome, OutputMode) -> AppResult<()> + Send + Sync>,
}

impl TemplatesHandler {
    pub fn new(command: TemplatesCommands) -> Self {
        Self::with_dependencies(command, pipeline::run_templates_list, render_templates_list)
    }

    pub fn with_dependencies(
        command: TemplatesCommands,
        list: impl Fn(&TemplatesListArgs) -> AppResult<TemplatesListOutcome> + Send + Sync + 'static,
        render: impl Fn(&TemplatesListOutcome, OutputMode) -> AppResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            command,
            list: Box::new(list),
            render: Box::new(render),
        }
    }
}

impl CommandHandler for TemplatesHandler {
    fn execute(&self, mode: OutputMode, _verbose: bool) -> AppResult<ExitCode> {
        match &self.command {
            TemplatesCommands::List(args) => {
                let outcome = (self.list)(args)?;
                (self.render)(&outcome, mode)?;
            }
        }
        Ok(ExitCode::SUCCESS)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
