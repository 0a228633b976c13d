use std::path::PathBuf;

use faceguard_cli::cli::{Commands, InitArgs, RegisterArgs, StatusArgs};
use faceguard_cli::commands::{CommandHandler, InitHandler, RegisterHandler, StatusHandler};

fn assert_dispatch<T: 'static>(command: Commands)
where
    T: CommandHandler,
{
    let handler: Box<dyn CommandHandler> = command.into();
    assert!(handler.as_any().is::<T>());
}

#[test]
fn init_command_dispatches_init_handler() {
    assert_dispatch::<InitHandler>(Commands::Init(InitArgs { state_file: None }));
}

#[test]
fn register_command_dispatches_register_handler() {
    assert_dispatch::<RegisterHandler>(Commands::Register(RegisterArgs {
        image: PathBuf::from("face.jpg"),
        state_file: None,
    }));
}

#[test]
fn status_command_dispatches_status_handler() {
    assert_dispatch::<StatusHandler>(Commands::Status(StatusArgs { state_file: None }));
}
