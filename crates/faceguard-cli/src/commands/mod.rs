use std::any::Any;
use std::process::ExitCode;

use crate::cli::{Commands, OutputMode};
use crate::errors::AppResult;

/// Exit status for a request the workflow refused.
pub const REJECTED_EXIT: u8 = 3;

pub trait CommandHandler: Send + Sync {
    fn execute(&self, mode: OutputMode, verbose: bool) -> AppResult<ExitCode>;
    fn as_any(&self) -> &dyn Any;
}

mod init;
mod register;
mod status;

pub use init::InitHandler;
pub use register::RegisterHandler;
pub use status::StatusHandler;

impl From<Commands> for Box<dyn CommandHandler> {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Init(args) => Box::new(InitHandler::new(args)),
            Commands::Register(args) => Box::new(RegisterHandler::new(args)),
            Commands::Status(args) => Box::new(StatusHandler::new(args)),
        }
    }
}
