use std::path::Path;

use rusqlite::Connection;
use uuid::Uuid;

use crate::error::Result;

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS raw_emails (
    id INTEGER PRIMARY KEY,
    received_at TEXT,
    from_email TEXT,
    to_email TEXT,
    subject TEXT,
    date_header TEXT,
    gmail_message_id TEXT NOT NULL UNIQUE,
    thread_id TEXT,
    email_label TEXT,
    text_body TEXT,
    html_body TEXT,
    raw_payload TEXT,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS source_of_funds (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    type TEXT NOT NULL DEFAULT 'other',
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS categories (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    category_type TEXT NOT NULL DEFAULT 'expense'
);

CREATE TABLE IF NOT EXISTS subcategories (
    id TEXT PRIMARY KEY,
    category_id TEXT NOT NULL,
    name TEXT NOT NULL,
    FOREIGN KEY (category_id) REFERENCES categories(id)
);

CREATE TABLE IF NOT EXISTS main_categories (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    category_type TEXT
);

CREATE TABLE IF NOT EXISTS categories_with_hierarchy (
    id TEXT PRIMARY KEY,
    parent_id TEXT,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY,
    user_id TEXT,
    amount INTEGER NOT NULL DEFAULT 0,
    currency TEXT NOT NULL DEFAULT 'IDR',
    direction TEXT,
    type TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    merchant TEXT,
    description TEXT,
    note TEXT,
    category_id TEXT,
    subcategory_id TEXT,
    category TEXT,
    subcategory TEXT,
    happened_at TEXT,
    date TEXT,
    source TEXT NOT NULL DEFAULT 'manual',
    source_ref INTEGER,
    source_of_fund_id INTEGER,
    parse_meta TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (source_ref) REFERENCES raw_emails(id),
    FOREIGN KEY (source_of_fund_id) REFERENCES source_of_funds(id)
);

CREATE TABLE IF NOT EXISTS budgets (
    id INTEGER PRIMARY KEY,
    user_id TEXT,
    subcategory_id TEXT NOT NULL,
    category_type TEXT NOT NULL DEFAULT 'expense',
    amount INTEGER NOT NULL DEFAULT 0,
    period_start TEXT NOT NULL,
    period_end TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),
    UNIQUE (period_start, subcategory_id)
);

CREATE TABLE IF NOT EXISTS budget_summaries (
    user_id TEXT NOT NULL DEFAULT '',
    period_start TEXT NOT NULL,
    period_end TEXT NOT NULL,
    total_budgeted_expense INTEGER NOT NULL DEFAULT 0,
    total_budgeted_income INTEGER NOT NULL DEFAULT 0,
    total_actual_expense INTEGER NOT NULL DEFAULT 0,
    total_actual_income INTEGER NOT NULL DEFAULT 0,
    last_recalculated_at TEXT,
    PRIMARY KEY (user_id, period_start, period_end)
);

CREATE INDEX IF NOT EXISTS idx_transactions_status ON transactions(status);
CREATE INDEX IF NOT EXISTS idx_transactions_source_ref ON transactions(source_ref);
CREATE INDEX IF NOT EXISTS idx_budgets_subcategory ON budgets(subcategory_id, period_start);
";

// (category name, category_type, subcategory names)
const DEFAULT_CATEGORIES: &[(&str, &str, &[&str])] = &[
    ("Food & Drink", "expense", &["Meals", "Coffee & Snacks", "Groceries"]),
    ("Transport", "expense", &["Ride Hailing", "Fuel", "Parking & Toll", "Train & Bus"]),
    ("Shopping", "expense", &["Online Shopping", "Household", "Clothing"]),
    ("Bills & Utilities", "expense", &["Electricity", "Internet", "Phone Credit", "Water"]),
    ("Health", "expense", &["Pharmacy", "Doctor"]),
    ("Entertainment", "expense", &["Streaming", "Events"]),
    ("Transfers", "expense", &["Internal Transfer", "Family Support"]),
    ("Income", "income", &["Salary", "Bonus", "Cashback & Refunds", "Interest"]),
];

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;

    let count: i64 = conn.query_row("SELECT count(*) FROM categories", [], |row| row.get(0))?;
    if count == 0 {
        for (name, category_type, subs) in DEFAULT_CATEGORIES {
            let cat_id = Uuid::new_v4().to_string();
            conn.execute(
                "INSERT INTO categories (id, name, category_type) VALUES (?1, ?2, ?3)",
                rusqlite::params![cat_id, name, category_type],
            )?;
            for sub in *subs {
                conn.execute(
                    "INSERT INTO subcategories (id, category_id, name) VALUES (?1, ?2, ?3)",
                    rusqlite::params![Uuid::new_v4().to_string(), cat_id, sub],
                )?;
            }
        }
    }
    Ok(())
}
