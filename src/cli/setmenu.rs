use colored::Colorize;

use crate::error::{DompetError, Result};
use crate::notify::Telegram;
use crate::settings::load_settings;

const BOT_COMMANDS: &[(&str, &str)] = &[
    ("start", "Show the main menu"),
    ("report", "Income and expenses for the current period"),
    ("budget", "Set or review budgets"),
    ("pending", "Transactions awaiting confirmation"),
    ("help", "How to use this bot"),
];

pub fn run() -> Result<()> {
    let settings = load_settings();
    if settings.telegram_bot_token.is_empty() {
        return Err(DompetError::Settings(
            "telegram_bot_token is not configured".to_string(),
        ));
    }

    let telegram = Telegram::new(settings.telegram_bot_token.clone());
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        telegram.set_my_commands(BOT_COMMANDS).await?;
        if !settings.telegram_chat_id.is_empty() {
            telegram
                .set_chat_menu_button(&settings.telegram_chat_id, None)
                .await?;
        }
        Ok::<(), DompetError>(())
    })?;

    println!("{} bot commands and menu button", "Registered".green().bold());
    Ok(())
}
