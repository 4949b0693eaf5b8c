pub mod commands;
pub mod database;
pub mod host;
pub mod reconcile;
pub mod snapshot;
pub mod task;

use poise::command;

/// 📊 Live server stat counters in voice channels
#[command(
    slash_command,
    subcommands("commands::setup", "commands::view", "commands::delete", "commands::clear")
)]
pub async fn serverstats(_ctx: crate::Context<'_>) -> Result<(), crate::Error> {
    Ok(())
}
