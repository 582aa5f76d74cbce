//! Bot initialization and command definitions

use teloxide::utils::command::BotCommands;
use teloxide::Bot;

use crate::core::config;

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "Доступные команды:")]
pub enum Command {
    #[command(description = "показать главное меню")]
    Start,
}

/// Creates the Bot instance from the configured token.
pub fn create_bot() -> anyhow::Result<Bot> {
    let token = config::BOT_TOKEN.as_str();
    if token.is_empty() {
        anyhow::bail!("BOT_TOKEN (or TELOXIDE_TOKEN) is not set");
    }
    Ok(Bot::new(token))
}
