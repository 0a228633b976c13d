use std::any::Any;
use std::process::ExitCode;

use crate::cli::{OutputMode, StatusArgs};
use crate::commands::CommandHandler;
use crate::errors::AppResult;
use crate::faceset::{self, StatusOutcome};
use crate::output::render_status;

pub struct StatusHandler {
    args: StatusArgs,
    run: Box<dyn Fn(&StatusArgs) -> AppResult<StatusOutcome> + Send + Sync>,
    render: Box<dyn Fn(&StatusOutcome, OutputMode) -> AppResult<()> + Send + Sync>,
}

impl StatusHandler {
    pub fn new(args: StatusArgs) -> Self {
        Self::with_dependencies(args, faceset::run_status, render_status)
    }

    pub fn with_dependencies(
        args: StatusArgs,
        run: impl Fn(&StatusArgs) -> AppResult<StatusOutcome> + Send + Sync + 'static,
        render: impl Fn(&StatusOutcome, OutputMode) -> AppResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            args,
            run: Box::new(run),
            render: Box::new(render),
        }
    }
}

impl CommandHandler for StatusHandler {
    fn execute(&self, mode: OutputMode, _verbose: bool) -> AppResult<ExitCode> {
        let outcome = (self.run)(&self.args)?;
        (self.render)(&outcome, mode)?;
        Ok(ExitCode::SUCCESS)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
