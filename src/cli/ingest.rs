use std::io::Read;

use colored::Colorize;

use crate::db::get_connection;
use crate::error::{DompetError, Result};
use crate::fmt::rupiah;
use crate::ingest::ingest_email;
use crate::models::EmailPayload;
use crate::settings::db_path;

/// Offline ingestion of one JSON email payload, same path the HTTP
/// endpoint takes minus the notification.
pub fn run(file: &str) -> Result<()> {
    let raw = if file == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(file)?
    };
    let payload: EmailPayload = serde_json::from_str(&raw)
        .map_err(|e| DompetError::Validation(format!("bad email payload: {e}")))?;

    let conn = get_connection(&db_path())?;
    let result = ingest_email(&conn, &payload)?;

    if result.outcome.deduped {
        println!(
            "{} message {} already ingested (raw email #{})",
            "Skipped:".yellow(),
            payload.gmail_message_id,
            result.outcome.raw_email_id
        );
        return Ok(());
    }

    match &result.notification {
        Some(n) => println!(
            "{} transaction #{}: {} at {} ({})",
            "Ingested".green().bold(),
            n.transaction_id,
            rupiah(n.amount),
            n.merchant,
            n.direction.as_str()
        ),
        None => println!(
            "{} raw email #{} stored, no transaction created",
            "Ingested".green().bold(),
            result.outcome.raw_email_id
        ),
    }
    Ok(())
}
