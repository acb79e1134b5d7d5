//! Canonical view over the two storage generations.
//!
//! The first deployment wrote `type`/`date`/status `paid` and the text
//! category columns; the current one writes `direction`/`happened_at`/
//! status `completed` and the uuid reference columns. Every read path
//! goes through this module so the dual-field reconciliation lives in
//! exactly one place.

use rusqlite::Connection;

use crate::error::Result;

/// Statuses counted by aggregation, one per generation.
pub const SETTLED_STATUSES: [&str; 2] = ["completed", "paid"];

pub const SETTLED_SQL: &str = "status IN ('completed', 'paid')";

/// Canonical transaction date: legacy `date` wins, otherwise the date
/// part of `happened_at`.
pub const CANONICAL_DATE_SQL: &str = "COALESCE(date, substr(happened_at, 1, 10))";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Expense,
    Income,
}

impl Flow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expense => "expense",
            Self::Income => "income",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "expense" => Some(Self::Expense),
            "income" => Some(Self::Income),
            _ => None,
        }
    }
}

/// A transaction row normalized across both generations.
#[derive(Debug, Clone)]
pub struct CanonicalTx {
    pub id: i64,
    pub user_id: Option<String>,
    pub amount: i64,
    pub date: Option<String>,
    /// Display text: `description` (legacy) falling back to `merchant`.
    pub text: String,
    /// Kept separately from `text`: the transfer check must see the
    /// merchant even when a description is also present.
    pub merchant: Option<String>,
    pub source_name: Option<String>,
    pub subcategory: Option<String>,
    pub is_expense: bool,
    pub is_income: bool,
}

impl CanonicalTx {
    pub fn is_internal_transfer(&self) -> bool {
        is_internal_transfer(&self.text)
            || self.merchant.as_deref().is_some_and(is_internal_transfer)
    }
}

pub fn is_settled(status: &str) -> bool {
    SETTLED_STATUSES.contains(&status)
}

/// The sole filter keeping inter-account transfers out of income
/// figures. Applies to the income leg only.
pub fn is_internal_transfer(text: &str) -> bool {
    text.to_lowercase().contains("internal transfer")
}

/// OR-reconciled classification across both signal fields. A row
/// carrying contradictory generations counts on both sides; that is
/// the historical semantics, not an accident of this port.
pub fn classify(direction: Option<&str>, tx_type: Option<&str>) -> (bool, bool) {
    let is_expense = direction == Some("debit") || tx_type == Some("expense");
    let is_income = direction == Some("credit") || tx_type == Some("income");
    (is_expense, is_income)
}

/// All settled transactions with a canonical date inside `[start, end]`.
pub fn settled_in_window(conn: &Connection, start: &str, end: &str) -> Result<Vec<CanonicalTx>> {
    let sql = format!(
        "SELECT t.id, t.user_id, t.amount, t.direction, t.type, \
                {CANONICAL_DATE_SQL} AS tx_date, \
                COALESCE(t.description, t.merchant, '') AS tx_text, \
                t.merchant, \
                s.name, \
                COALESCE(t.subcategory_id, t.subcategory) \
         FROM transactions t \
         LEFT JOIN source_of_funds s ON t.source_of_fund_id = s.id \
         WHERE {SETTLED_SQL} AND {CANONICAL_DATE_SQL} BETWEEN ?1 AND ?2 \
         ORDER BY {CANONICAL_DATE_SQL} DESC, t.id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params![start, end], |row| {
        let direction: Option<String> = row.get(3)?;
        let tx_type: Option<String> = row.get(4)?;
        let (is_expense, is_income) = classify(direction.as_deref(), tx_type.as_deref());
        Ok(CanonicalTx {
            id: row.get(0)?,
            user_id: row.get(1)?,
            amount: row.get(2)?,
            date: row.get(5)?,
            text: row.get(6)?,
            merchant: row.get(7)?,
            source_name: row.get(8)?,
            subcategory: row.get(9)?,
            is_expense,
            is_income,
        })
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

/// Categories with legacy fallback: the current table wins when it has
/// rows, otherwise `main_categories` is read as-is.
pub fn categories_all(conn: &Connection) -> Result<Vec<(String, String, String)>> {
    let mut out = query_categories(conn, "SELECT id, name, category_type FROM categories ORDER BY name")?;
    if out.is_empty() {
        out = query_categories(
            conn,
            "SELECT id, name, COALESCE(category_type, 'expense') FROM main_categories ORDER BY name",
        )?;
    }
    Ok(out)
}

fn query_categories(conn: &Connection, sql: &str) -> Result<Vec<(String, String, String)>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

/// Subcategories of one category, falling back to the legacy
/// parent/child hierarchy table.
pub fn subcategories_of(conn: &Connection, category_id: &str) -> Result<Vec<(String, String)>> {
    let mut stmt =
        conn.prepare("SELECT id, name FROM subcategories WHERE category_id = ?1 ORDER BY name")?;
    let mut out: Vec<(String, String)> = stmt
        .query_map([category_id], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    if out.is_empty() {
        let mut legacy = conn.prepare(
            "SELECT id, name FROM categories_with_hierarchy WHERE parent_id = ?1 ORDER BY name",
        )?;
        out = legacy
            .query_map([category_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
    }
    Ok(out)
}

/// Resolve a subcategory's owning category type ('expense'/'income'),
/// across either generation. Unknown subcategories default to expense.
pub fn subcategory_flow(conn: &Connection, subcategory_id: &str) -> Result<Flow> {
    let current: Option<String> = conn
        .query_row(
            "SELECT c.category_type FROM subcategories sc \
             JOIN categories c ON sc.category_id = c.id \
             WHERE sc.id = ?1",
            [subcategory_id],
            |row| row.get(0),
        )
        .ok();
    let resolved = match current {
        Some(t) => Some(t),
        None => conn
            .query_row(
                "SELECT COALESCE(mc.category_type, 'expense') \
                 FROM categories_with_hierarchy ch \
                 JOIN main_categories mc ON ch.parent_id = mc.id \
                 WHERE ch.id = ?1",
                [subcategory_id],
                |row| row.get(0),
            )
            .ok(),
    };
    Ok(resolved
        .as_deref()
        .and_then(Flow::parse)
        .unwrap_or(Flow::Expense))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_connection, init_db};

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    #[test]
    fn test_classify_or_logic() {
        assert_eq!(classify(Some("debit"), None), (true, false));
        assert_eq!(classify(None, Some("expense")), (true, false));
        assert_eq!(classify(Some("credit"), None), (false, true));
        assert_eq!(classify(None, Some("income")), (false, true));
        // Contradictory generations count on both sides.
        assert_eq!(classify(Some("debit"), Some("income")), (true, true));
        assert_eq!(classify(None, None), (false, false));
    }

    #[test]
    fn test_settled_statuses() {
        assert!(is_settled("completed"));
        assert!(is_settled("paid"));
        assert!(!is_settled("pending"));
        assert!(!is_settled("rejected"));
    }

    #[test]
    fn test_internal_transfer_case_insensitive() {
        assert!(is_internal_transfer("Internal Transfer to BCA"));
        assert!(is_internal_transfer("monthly INTERNAL TRANSFER"));
        assert!(!is_internal_transfer("transfer to mom"));
    }

    #[test]
    fn test_window_spans_both_generations() {
        let (_dir, conn) = test_db();
        // Current generation: direction + happened_at + completed.
        conn.execute(
            "INSERT INTO transactions (amount, direction, status, merchant, happened_at) \
             VALUES (10000, 'debit', 'completed', 'Warung', '2025-08-10T09:00:00Z')",
            [],
        )
        .unwrap();
        // Legacy generation: type + date + paid.
        conn.execute(
            "INSERT INTO transactions (amount, type, status, description, date) \
             VALUES (20000, 'income', 'paid', 'Salary', '2025-08-11')",
            [],
        )
        .unwrap();
        // Pending rows never show up.
        conn.execute(
            "INSERT INTO transactions (amount, direction, status, merchant, happened_at) \
             VALUES (99999, 'debit', 'pending', 'Ignore', '2025-08-12T00:00:00Z')",
            [],
        )
        .unwrap();

        let txs = settled_in_window(&conn, "2025-08-03", "2025-09-02").unwrap();
        assert_eq!(txs.len(), 2);
        let salary = txs.iter().find(|t| t.text == "Salary").unwrap();
        assert!(salary.is_income);
        assert_eq!(salary.date.as_deref(), Some("2025-08-11"));
        let warung = txs.iter().find(|t| t.text == "Warung").unwrap();
        assert!(warung.is_expense);
        assert_eq!(warung.date.as_deref(), Some("2025-08-10"));
    }

    #[test]
    fn test_transfer_marker_in_merchant_seen_past_description() {
        let (_dir, conn) = test_db();
        conn.execute(
            "INSERT INTO transactions (amount, direction, status, description, merchant, happened_at) \
             VALUES (500000, 'credit', 'completed', 'monthly move', 'Internal Transfer BCA', '2025-08-08T00:00:00Z')",
            [],
        )
        .unwrap();

        let txs = settled_in_window(&conn, "2025-08-03", "2025-09-02").unwrap();
        assert_eq!(txs.len(), 1);
        // Display text prefers the description, the transfer check
        // still catches the marker hiding in the merchant column.
        assert_eq!(txs[0].text, "monthly move");
        assert!(txs[0].is_internal_transfer());
    }

    #[test]
    fn test_legacy_category_fallback() {
        let (_dir, conn) = test_db();
        conn.execute("DELETE FROM subcategories", []).unwrap();
        conn.execute("DELETE FROM categories", []).unwrap();
        conn.execute(
            "INSERT INTO main_categories (id, name, category_type) VALUES ('mc-1', 'Makanan', NULL)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO categories_with_hierarchy (id, parent_id, name) VALUES ('sub-1', 'mc-1', 'Warteg')",
            [],
        )
        .unwrap();

        let cats = categories_all(&conn).unwrap();
        assert_eq!(cats.len(), 1);
        assert_eq!(cats[0].1, "Makanan");
        assert_eq!(cats[0].2, "expense");

        let subs = subcategories_of(&conn, "mc-1").unwrap();
        assert_eq!(subs, vec![("sub-1".to_string(), "Warteg".to_string())]);

        assert_eq!(subcategory_flow(&conn, "sub-1").unwrap(), Flow::Expense);
    }

    #[test]
    fn test_subcategory_flow_current_generation() {
        let (_dir, conn) = test_db();
        let income_sub: String = conn
            .query_row(
                "SELECT sc.id FROM subcategories sc JOIN categories c ON sc.category_id = c.id \
                 WHERE c.category_type = 'income' LIMIT 1",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(subcategory_flow(&conn, &income_sub).unwrap(), Flow::Income);
        assert_eq!(subcategory_flow(&conn, "no-such-id").unwrap(), Flow::Expense);
    }
}
