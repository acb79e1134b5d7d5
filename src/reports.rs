use rusqlite::Connection;

use crate::compat::{self, CanonicalTx, Flow};
use crate::error::Result;

pub const PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct PeriodStats {
    pub start: String,
    pub end: String,
    pub total_expense: i64,
    pub total_income: i64,
    pub net: i64,
    pub budgeted_expense: i64,
    pub budgeted_income: i64,
    /// Whether the precomputed summary answered, or aggregation ran live.
    pub from_summary: bool,
}

/// Distinct known periods, newest first.
pub fn available_periods(conn: &Connection, limit: usize) -> Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT period_start, period_end FROM budget_summaries \
         ORDER BY period_start DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map([limit], |row| Ok((row.get(0)?, row.get(1)?)))?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

/// Totals for one period, preferring the summary cache and falling back
/// to live aggregation when no summary row exists.
pub fn period_stats(conn: &Connection, start: &str, end: &str) -> Result<PeriodStats> {
    let cached: (i64, Option<i64>, Option<i64>, Option<i64>, Option<i64>) = conn.query_row(
        "SELECT count(*), SUM(total_budgeted_expense), SUM(total_budgeted_income), \
                SUM(total_actual_expense), SUM(total_actual_income) \
         FROM budget_summaries WHERE period_start = ?1 AND period_end = ?2",
        rusqlite::params![start, end],
        |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
            ))
        },
    )?;

    if cached.0 > 0 {
        let (be, bi, ae, ai) = (
            cached.1.unwrap_or(0),
            cached.2.unwrap_or(0),
            cached.3.unwrap_or(0),
            cached.4.unwrap_or(0),
        );
        return Ok(PeriodStats {
            start: start.to_string(),
            end: end.to_string(),
            total_expense: ae,
            total_income: ai,
            net: ai - ae,
            budgeted_expense: be,
            budgeted_income: bi,
            from_summary: true,
        });
    }

    let (budgeted_expense, budgeted_income): (Option<i64>, Option<i64>) = conn.query_row(
        "SELECT SUM(CASE WHEN category_type = 'income' THEN 0 ELSE amount END), \
                SUM(CASE WHEN category_type = 'income' THEN amount ELSE 0 END) \
         FROM budgets WHERE period_start = ?1 AND period_end = ?2",
        rusqlite::params![start, end],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let txs = compat::settled_in_window(conn, start, end)?;
    let mut total_expense = 0i64;
    let mut total_income = 0i64;
    for tx in &txs {
        if tx.is_expense {
            total_expense += tx.amount;
        }
        if tx.is_income && !tx.is_internal_transfer() {
            total_income += tx.amount;
        }
    }

    Ok(PeriodStats {
        start: start.to_string(),
        end: end.to_string(),
        total_expense,
        total_income,
        net: total_income - total_expense,
        budgeted_expense: budgeted_expense.unwrap_or(0),
        budgeted_income: budgeted_income.unwrap_or(0),
        from_summary: false,
    })
}

#[derive(Debug, Clone)]
pub struct TodaySummary {
    pub date: String,
    pub total: i64,
    pub items: Vec<CanonicalTx>,
}

/// Settled spending on a single day, with per-transaction detail.
pub fn today_spending(conn: &Connection, date: &str) -> Result<TodaySummary> {
    let items: Vec<CanonicalTx> = compat::settled_in_window(conn, date, date)?
        .into_iter()
        .filter(|tx| tx.is_expense)
        .collect();
    let total = items.iter().map(|tx| tx.amount).sum();
    Ok(TodaySummary {
        date: date.to_string(),
        total,
        items,
    })
}

#[derive(Debug, Clone)]
pub struct BreakdownItem {
    pub category: String,
    pub subcategory: String,
    pub budgeted: i64,
    pub actual: i64,
}

/// Category → subcategory budget-vs-actual for one period, sorted by
/// actual spend descending.
pub fn budget_breakdown(conn: &Connection, start: &str, end: &str) -> Result<Vec<BreakdownItem>> {
    // Subcategory id → (category name, subcategory name), across
    // whichever generation holds the tree.
    let mut names: std::collections::HashMap<String, (String, String)> =
        std::collections::HashMap::new();
    for (cat_id, cat_name, _) in compat::categories_all(conn)? {
        for (sub_id, sub_name) in compat::subcategories_of(conn, &cat_id)? {
            names.insert(sub_id, (cat_name.clone(), sub_name));
        }
    }
    let resolve = |sub_id: &str| {
        names
            .get(sub_id)
            .cloned()
            .unwrap_or_else(|| ("Uncategorized".to_string(), sub_id.to_string()))
    };

    let mut items: std::collections::HashMap<String, BreakdownItem> =
        std::collections::HashMap::new();

    let mut stmt = conn.prepare(
        "SELECT subcategory_id, amount FROM budgets WHERE period_start = ?1 AND period_end = ?2",
    )?;
    let budget_rows = stmt.query_map(rusqlite::params![start, end], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;
    for row in budget_rows {
        let (sub_id, amount) = row?;
        let (category, subcategory) = resolve(&sub_id);
        let entry = items
            .entry(sub_id)
            .or_insert(BreakdownItem { category, subcategory, budgeted: 0, actual: 0 });
        entry.budgeted += amount;
    }

    for tx in compat::settled_in_window(conn, start, end)? {
        let Some(sub_id) = tx.subcategory.clone() else { continue };
        let counts = tx.is_expense || (tx.is_income && !tx.is_internal_transfer());
        if !counts {
            continue;
        }
        let (category, subcategory) = resolve(&sub_id);
        let entry = items
            .entry(sub_id)
            .or_insert(BreakdownItem { category, subcategory, budgeted: 0, actual: 0 });
        entry.actual += tx.amount;
    }

    let mut out: Vec<BreakdownItem> = items.into_values().collect();
    out.sort_by(|a, b| b.actual.cmp(&a.actual).then(a.subcategory.cmp(&b.subcategory)));
    Ok(out)
}

#[derive(Debug, Clone)]
pub struct TransactionPage {
    pub items: Vec<CanonicalTx>,
    pub total: usize,
    pub page: usize,
}

impl TransactionPage {
    pub fn page_count(&self) -> usize {
        self.total.div_ceil(PAGE_SIZE)
    }
}

/// Settled transactions of one flow in a period, pages of 10, newest
/// first. Income pages exclude internal transfers.
pub fn transactions_page(
    conn: &Connection,
    start: &str,
    end: &str,
    flow: Flow,
    page: usize,
) -> Result<TransactionPage> {
    let filtered: Vec<CanonicalTx> = compat::settled_in_window(conn, start, end)?
        .into_iter()
        .filter(|tx| match flow {
            Flow::Expense => tx.is_expense,
            Flow::Income => tx.is_income && !tx.is_internal_transfer(),
        })
        .collect();
    let total = filtered.len();
    let items = filtered
        .into_iter()
        .skip(page * PAGE_SIZE)
        .take(PAGE_SIZE)
        .collect();
    Ok(TransactionPage { items, total, page })
}

#[derive(Debug, Clone)]
pub struct PendingTx {
    pub id: i64,
    pub amount: i64,
    pub currency: String,
    pub merchant: Option<String>,
    pub happened_at: Option<String>,
}

/// Newest pending transactions awaiting confirmation or review.
pub fn pending_transactions(conn: &Connection, limit: usize) -> Result<Vec<PendingTx>> {
    let mut stmt = conn.prepare(
        "SELECT id, amount, currency, merchant, happened_at FROM transactions \
         WHERE status = 'pending' ORDER BY happened_at DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map([limit], |row| {
        Ok(PendingTx {
            id: row.get(0)?,
            amount: row.get(1)?,
            currency: row.get(2)?,
            merchant: row.get(3)?,
            happened_at: row.get(4)?,
        })
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}
