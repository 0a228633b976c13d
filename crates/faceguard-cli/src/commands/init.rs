use std::any::Any;
use std::process::ExitCode;

use crate::cli::{InitArgs, OutputMode};
use crate::commands::{CommandHandler, REJECTED_EXIT};
use crate::errors::AppResult;
use crate::faceset::{self, InitOutcome};
use crate::output::render_init;

pub struct InitHandler {
    args: InitArgs,
    run: Box<dyn Fn(&InitArgs) -> AppResult<InitOutcome> + Send + Sync>,
    render: Box<dyn Fn(&InitOutcome, OutputMode) -> AppResult<()> + Send + Sync>,
}

impl InitHandler {
    pub fn new(args: InitArgs) -> Self {
        Self::with_dependencies(args, faceset::run_init, render_init)
    }

    pub fn with_dependencies(
        args: InitArgs,
        run: impl Fn(&InitArgs) -> AppResult<InitOutcome> + Send + Sync + 'static,
        render: impl Fn(&InitOutcome, OutputMode) -> AppResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            args,
            run: Box::new(run),
            render: Box::new(render),
        }
    }
}

impl CommandHandler for InitHandler {
    fn execute(&self, mode: OutputMode, _verbose: bool) -> AppResult<ExitCode> {
        let outcome = (self.run)(&self.args)?;
        (self.render)(&outcome, mode)?;
        let exit = if outcome.is_ready() {
            ExitCode::SUCCESS
        } else {
            ExitCode::from(REJECTED_EXIT)
        };
        Ok(exit)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
