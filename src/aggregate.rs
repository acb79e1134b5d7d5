use std::collections::BTreeMap;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use tracing::warn;
use uuid::Uuid;

use crate::compat::{self, Flow};
use crate::error::{DompetError, Result};
use crate::period::Period;

/// Budget-vs-actual variance. The sign convention is deliberate and
/// load-bearing: `actual - budgeted`, matching the rows the original
/// summary table carried (budget 57M, actual 0, variance -57M).
/// Negative means under-spent against an expense budget.
pub fn variance(actual: i64, budgeted: i64) -> i64 {
    actual - budgeted
}

/// Full recalculation: rebuild one summary row per (user, period_start,
/// period_end) from budgets and settled transactions.
///
/// Safe to re-run at any time; every upsert is a whole-row overwrite
/// keyed by the composite key. A failed upsert leaves that period's
/// summary stale for the next run; a failed read aborts.
pub fn recalculate_all_summaries(conn: &Connection) -> Result<usize> {
    // 1. Group budget rows, splitting budgeted totals by category type.
    // NULL owners group under '' so the upsert key stays total.
    let mut stmt = conn.prepare(
        "SELECT COALESCE(user_id, ''), period_start, period_end, category_type, amount FROM budgets",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, i64>(4)?,
        ))
    })?;

    let mut groups: BTreeMap<(String, String, String), (i64, i64)> = BTreeMap::new();
    for row in rows {
        let (user, start, end, category_type, amount) = row?;
        let entry = groups.entry((user, start, end)).or_insert((0, 0));
        match Flow::parse(&category_type) {
            Some(Flow::Income) => entry.1 += amount,
            // Unknown types historically meant expense.
            Some(Flow::Expense) | None => entry.0 += amount,
        }
    }

    let now = Utc::now().to_rfc3339();
    let mut processed = 0usize;

    for ((user, start, end), (budgeted_expense, budgeted_income)) in &groups {
        // 2-5. Actuals over settled transactions in the window.
        let txs = compat::settled_in_window(conn, start, end)?;
        let mut actual_expense = 0i64;
        let mut actual_income = 0i64;
        for tx in &txs {
            if tx.is_expense {
                actual_expense += tx.amount;
            }
            // The internal-transfer filter applies to the income leg
            // only; the same row still counts as expense above.
            if tx.is_income && !tx.is_internal_transfer() {
                actual_income += tx.amount;
            }
        }

        // 6. Whole-row upsert keyed by (user, period_start, period_end).
        let upserted = conn.execute(
            "INSERT INTO budget_summaries \
                 (user_id, period_start, period_end, \
                  total_budgeted_expense, total_budgeted_income, \
                  total_actual_expense, total_actual_income, last_recalculated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
             ON CONFLICT(user_id, period_start, period_end) DO UPDATE SET \
                 total_budgeted_expense = excluded.total_budgeted_expense, \
                 total_budgeted_income = excluded.total_budgeted_income, \
                 total_actual_expense = excluded.total_actual_expense, \
                 total_actual_income = excluded.total_actual_income, \
                 last_recalculated_at = excluded.last_recalculated_at",
            rusqlite::params![
                user,
                start,
                end,
                budgeted_expense,
                budgeted_income,
                actual_expense,
                actual_income,
                now,
            ],
        );
        match upserted {
            Ok(_) => processed += 1,
            Err(e) => {
                warn!(period_start = %start, period_end = %end, error = %e,
                      "summary upsert failed; period left stale");
            }
        }
    }

    Ok(processed)
}

/// Save one budget figure for (period, subcategory), then rebuild all
/// summaries so the aggregate view is immediately consistent.
///
/// `user_id` is only written when it is itself a UUID identity;
/// numeric chat identifiers never land in that column.
pub fn save_budget(
    conn: &Connection,
    period: &Period,
    subcategory_id: &str,
    amount: i64,
    user_id: &str,
) -> Result<()> {
    if Uuid::parse_str(subcategory_id).is_err() {
        return Err(DompetError::Validation(format!(
            "invalid subcategory id: {subcategory_id}"
        )));
    }
    let owner: Option<&str> = Uuid::parse_str(user_id).ok().map(|_| user_id);
    let flow = compat::subcategory_flow(conn, subcategory_id)?;
    let start = period.start_iso();
    let end = period.end_iso();

    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM budgets WHERE period_start = ?1 AND subcategory_id = ?2",
            rusqlite::params![start, subcategory_id],
            |row| row.get(0),
        )
        .optional()?;

    match existing {
        Some(id) => {
            conn.execute(
                "UPDATE budgets SET amount = ?1, category_type = ?2, \
                     user_id = COALESCE(?3, user_id) \
                 WHERE id = ?4",
                rusqlite::params![amount, flow.as_str(), owner, id],
            )?;
        }
        None => {
            conn.execute(
                "INSERT INTO budgets (user_id, subcategory_id, category_type, amount, period_start, period_end) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![owner, subcategory_id, flow.as_str(), amount, start, end],
            )?;
        }
    }

    // Synchronous by design: every budget edit pays for a full
    // recompute so reads never see a stale aggregate.
    recalculate_all_summaries(conn)?;
    Ok(())
}

/// Most recent budgeted amount for `subcategory_id` from any period
/// strictly before `reference_start`; 0 when none exists. Pre-fills
/// repeat-budget entry.
pub fn previous_period_amount(
    conn: &Connection,
    subcategory_id: &str,
    reference_start: &str,
) -> Result<i64> {
    let amount: Option<i64> = conn
        .query_row(
            "SELECT amount FROM budgets \
             WHERE subcategory_id = ?1 AND period_start < ?2 \
             ORDER BY period_start DESC LIMIT 1",
            rusqlite::params![subcategory_id, reference_start],
            |row| row.get(0),
        )
        .optional()?;
    Ok(amount.unwrap_or(0))
}
