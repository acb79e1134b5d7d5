use colored::Colorize;

use crate::aggregate::recalculate_all_summaries;
use crate::db::get_connection;
use crate::error::Result;
use crate::settings::db_path;

pub fn run() -> Result<()> {
    let conn = get_connection(&db_path())?;
    let processed = recalculate_all_summaries(&conn)?;
    println!("{} {} period summaries", "Recalculated".green().bold(), processed);
    Ok(())
}
