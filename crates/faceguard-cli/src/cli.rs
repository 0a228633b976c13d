use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "faceguard",
    version,
    about = "Register users into a shared face-set, refusing duplicate faces"
)]
pub struct Cli {
    /// Emit structured JSON to stdout instead of human-readable logs
    #[arg(long)]
    pub json: bool,

    /// Increase verbosity (may be used multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create the remote face-set if the state file does not name one yet
    Init(InitArgs),
    /// Register the single face found in an image
    Register(RegisterArgs),
    /// Show the locally recorded face-set state without contacting the provider
    Status(StatusArgs),
}

#[derive(Debug, Clone, Args)]
pub struct InitArgs {
    /// Override the face-set state file (defaults to config `state_file`)
    #[arg(long)]
    pub state_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct RegisterArgs {
    /// Image containing exactly one face
    pub image: PathBuf,

    /// Override the face-set state file (defaults to config `state_file`)
    #[arg(long)]
    pub state_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct StatusArgs {
    #[arg(long)]
    pub state_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl From<bool> for OutputMode {
    fn from(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}

impl Cli {
    pub fn output_mode(&self) -> OutputMode {
        OutputMode::from(self.json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_parses_image_and_state_override() {
        let cli = Cli::try_parse_from([
            "faceguard",
            "--json",
            "-vv",
            "register",
            "face.jpg",
            "--state-file",
            "/tmp/state.json",
        ])
        .unwrap();
        assert_eq!(cli.output_mode(), OutputMode::Json);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Register(args) => {
                assert_eq!(args.image, PathBuf::from("face.jpg"));
                assert_eq!(args.state_file, Some(PathBuf::from("/tmp/state.json")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn register_requires_an_image() {
        assert!(Cli::try_parse_from(["faceguard", "register"]).is_err());
    }
}
