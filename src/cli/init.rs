use colored::Colorize;

use crate::db::{get_connection, init_db};
use crate::error::Result;
use crate::settings::{load_settings, save_settings};

pub fn run(data_dir: Option<String>) -> Result<()> {
    let mut settings = load_settings();
    if let Some(dir) = data_dir {
        settings.data_dir = dir;
    }
    std::fs::create_dir_all(&settings.data_dir)?;
    save_settings(&settings)?;

    let db_path = std::path::Path::new(&settings.data_dir).join("dompet.db");
    let conn = get_connection(&db_path)?;
    init_db(&conn)?;

    println!("{} {}", "Initialized".green().bold(), db_path.display());
    println!("Set DOMPET_INGEST_API_KEY, TELEGRAM_BOT_TOKEN, and TELEGRAM_CHAT_ID");
    println!("(or edit ~/.config/dompet/settings.json), then run `dompet serve`.");
    Ok(())
}
