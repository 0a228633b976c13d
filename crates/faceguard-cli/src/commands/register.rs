use std::any::Any;
use std::process::ExitCode;

use crate::cli::{OutputMode, RegisterArgs};
use crate::commands::{CommandHandler, REJECTED_EXIT};
use crate::errors::AppResult;
use crate::faceset::{self, RegisterOutcome};
use crate::output::render_register;

pub struct RegisterHandler {
    args: RegisterArgs,
    run: Box<dyn Fn(&RegisterArgs) -> AppResult<RegisterOutcome> + Send + Sync>,
    render: Box<dyn Fn(&RegisterOutcome, OutputMode, bool) -> AppResult<()> + Send + Sync>,
}

impl RegisterHandler {
    pub fn new(args: RegisterArgs) -> Self {
        Self::with_dependencies(args, faceset::run_register, render_register)
    }

    pub fn with_dependencies(
        args: RegisterArgs,
        run: impl Fn(&RegisterArgs) -> AppResult<RegisterOutcome> + Send + Sync + 'static,
        render: impl Fn(&RegisterOutcome, OutputMode, bool) -> AppResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            args,
            run: Box::new(run),
            render: Box::new(render),
        }
    }
}

impl CommandHandler for RegisterHandler {
    fn execute(&self, mode: OutputMode, verbose: bool) -> AppResult<ExitCode> {
        let outcome = (self.run)(&self.args)?;
        (self.render)(&outcome, mode, verbose)?;
        if outcome.outcome.is_success() {
            Ok(ExitCode::SUCCESS)
        } else {
            Ok(ExitCode::from(REJECTED_EXIT))
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
