use colored::Colorize;

use crate::aggregate::{previous_period_amount, save_budget};
use crate::db::get_connection;
use crate::error::Result;
use crate::fmt::rupiah;
use crate::period::current_period;
use crate::settings::{db_path, load_settings};

pub fn set(subcategory: &str, amount: i64, user: Option<&str>) -> Result<()> {
    let settings = load_settings();
    let owner = user.unwrap_or(&settings.owner_user_id);
    let conn = get_connection(&db_path())?;
    let period = current_period();

    save_budget(&conn, &period, subcategory, amount, owner)?;
    println!(
        "{} {} for {} ({} to {})",
        "Budgeted".green().bold(),
        rupiah(amount),
        subcategory,
        period.start_iso(),
        period.end_iso()
    );
    Ok(())
}

pub fn prev(subcategory: &str) -> Result<()> {
    let conn = get_connection(&db_path())?;
    let period = current_period();
    let amount = previous_period_amount(&conn, subcategory, &period.start_iso())?;
    if amount == 0 {
        println!("No earlier budget found for {subcategory}");
    } else {
        println!("Last budget for {}: {}", subcategory, rupiah(amount));
    }
    Ok(())
}
