//! Command dispatch: bridges CLI args -> core engine -> output formatting.

pub mod config_cmd;
pub mod installations;
pub mod sensors;
pub mod snapshot;
pub mod watch;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a command that talks to VRM (or describes what it would fetch).
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Sensors => sensors::handle(global),
        Command::Installations => installations::handle(global).await,
        Command::Snapshot(args) => snapshot::handle(args, global).await,
        Command::Watch(args) => watch::handle(args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
