use chrono::{NaiveDate, Utc};
use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::compat::Flow;
use crate::db::get_connection;
use crate::error::{DompetError, Result};
use crate::fmt::{rupiah, short_date};
use crate::period::{current_period, jakarta_offset, period_containing, Period};
use crate::reports;
use crate::settings::db_path;

fn resolve_period(start: Option<&str>) -> Result<Period> {
    match start {
        Some(s) => {
            let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|e| DompetError::Validation(format!("bad date {s}: {e}")))?;
            Ok(period_containing(date))
        }
        None => Ok(current_period()),
    }
}

pub fn periods() -> Result<()> {
    let conn = get_connection(&db_path())?;
    let periods = reports::available_periods(&conn, 5)?;
    if periods.is_empty() {
        println!("No summarized periods yet; run `dompet recalculate`.");
        return Ok(());
    }
    for (start, end) in &periods {
        println!("{} to {}", short_date(start), short_date(end));
    }
    Ok(())
}

pub fn today() -> Result<()> {
    let conn = get_connection(&db_path())?;
    let today = Utc::now()
        .with_timezone(&jakarta_offset())
        .date_naive()
        .format("%Y-%m-%d")
        .to_string();
    let summary = reports::today_spending(&conn, &today)?;

    if summary.items.is_empty() {
        println!("Nothing spent today.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Description", "Source", "Amount"]);
    for tx in &summary.items {
        table.add_row(vec![
            Cell::new(&tx.text),
            Cell::new(tx.source_name.as_deref().unwrap_or("-")),
            Cell::new(rupiah(tx.amount)),
        ]);
    }
    println!(
        "Spending for {}\n{table}\n{} {}",
        short_date(&summary.date),
        "Total:".bold(),
        rupiah(summary.total)
    );
    Ok(())
}

pub fn period(start: Option<String>) -> Result<()> {
    let conn = get_connection(&db_path())?;
    let p = resolve_period(start.as_deref())?;
    let stats = reports::period_stats(&conn, &p.start_iso(), &p.end_iso())?;

    let mut table = Table::new();
    table.set_header(vec!["", "Actual", "Budgeted"]);
    table.add_row(vec![
        Cell::new("Income".green().bold()),
        Cell::new(rupiah(stats.total_income)),
        Cell::new(rupiah(stats.budgeted_income)),
    ]);
    table.add_row(vec![
        Cell::new("Expenses".red().bold()),
        Cell::new(rupiah(stats.total_expense)),
        Cell::new(rupiah(stats.budgeted_expense)),
    ]);
    let net_label = if stats.net >= 0 {
        "Net".green().bold()
    } else {
        "Net".red().bold()
    };
    table.add_row(vec![Cell::new(net_label), Cell::new(rupiah(stats.net)), Cell::new("")]);

    println!(
        "Period {} to {}{}\n{table}",
        short_date(&stats.start),
        short_date(&stats.end),
        if stats.from_summary { "" } else { " (live)" }
    );
    Ok(())
}

pub fn breakdown(start: Option<String>) -> Result<()> {
    let conn = get_connection(&db_path())?;
    let p = resolve_period(start.as_deref())?;
    let items = reports::budget_breakdown(&conn, &p.start_iso(), &p.end_iso())?;

    if items.is_empty() {
        println!("No budgets or spending recorded for this period.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Category", "Subcategory", "Budgeted", "Actual", "Variance"]);
    for item in &items {
        let variance = crate::aggregate::variance(item.actual, item.budgeted);
        let variance_cell = if variance > 0 {
            Cell::new(rupiah(variance).red())
        } else {
            Cell::new(rupiah(variance))
        };
        table.add_row(vec![
            Cell::new(&item.category),
            Cell::new(&item.subcategory),
            Cell::new(rupiah(item.budgeted)),
            Cell::new(rupiah(item.actual)),
            variance_cell,
        ]);
    }
    println!("Budget vs actual, {} to {}\n{table}", p.start_iso(), p.end_iso());
    Ok(())
}

pub fn transactions(flow: &str, page: usize, start: Option<String>) -> Result<()> {
    let flow = Flow::parse(flow)
        .ok_or_else(|| DompetError::Validation(format!("unknown flow: {flow}")))?;
    let conn = get_connection(&db_path())?;
    let p = resolve_period(start.as_deref())?;
    let result = reports::transactions_page(&conn, &p.start_iso(), &p.end_iso(), flow, page)?;

    if result.items.is_empty() {
        println!("No settled transactions on this page.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Date", "Description", "Source", "Amount"]);
    for tx in &result.items {
        table.add_row(vec![
            Cell::new(tx.date.as_deref().map(short_date).unwrap_or_else(|| "-".to_string())),
            Cell::new(&tx.text),
            Cell::new(tx.source_name.as_deref().unwrap_or("-")),
            Cell::new(rupiah(tx.amount)),
        ]);
    }
    println!(
        "{table}\nPage {} of {} ({} transactions)",
        result.page + 1,
        result.page_count(),
        result.total
    );
    Ok(())
}

pub fn pending() -> Result<()> {
    let conn = get_connection(&db_path())?;
    let rows = reports::pending_transactions(&conn, reports::PAGE_SIZE)?;

    if rows.is_empty() {
        println!("Nothing pending.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Merchant", "Amount"]);
    for tx in &rows {
        table.add_row(vec![
            Cell::new(tx.id),
            Cell::new(
                tx.happened_at
                    .as_deref()
                    .map(|s| short_date(s.get(..10).unwrap_or(s)))
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(tx.merchant.as_deref().unwrap_or("Unknown Merchant")),
            Cell::new(format!("{} {}", tx.currency, rupiah(tx.amount).trim_start_matches("Rp "))),
        ]);
    }
    println!("Pending transactions\n{table}");
    Ok(())
}
