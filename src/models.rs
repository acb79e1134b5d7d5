use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Inbound email payload, as forwarded by the Gmail relay.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailPayload {
    pub received_at: Option<String>,
    pub from_email: Option<String>,
    pub to_email: Option<String>,
    pub subject: Option<String>,
    pub date_header: Option<String>,
    pub gmail_message_id: String,
    pub thread_id: Option<String>,
    pub text_body: Option<String>,
    pub html_body: Option<String>,
    pub email_label: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Debit,
    Credit,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debit => "debit",
            Self::Credit => "credit",
        }
    }
}

/// Output of the heuristic extractor. Never persisted as-is; the
/// confidence/evidence/rules travel with the transaction as audit
/// metadata.
#[derive(Debug, Clone, Serialize)]
pub struct ParseResult {
    pub amount: i64,
    pub direction: Direction,
    pub merchant: String,
    pub source_of_fund: Option<String>,
    pub note: Option<String>,
    pub happened_at: Option<String>,
    pub confidence: f64,
    pub evidence: BTreeMap<String, String>,
    pub rules_triggered: Vec<&'static str>,
}

/// Outcome of one ingestion call; the dedup short-circuit returns the
/// identifiers of the first sighting.
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub raw_email_id: i64,
    pub transaction_id: Option<i64>,
    pub deduped: bool,
}

/// What the notification sink needs to render a pending-transaction
/// message, captured at insert time.
#[derive(Debug, Clone)]
pub struct PendingNotification {
    pub transaction_id: i64,
    pub amount: i64,
    pub currency: String,
    pub direction: Direction,
    pub merchant: String,
    pub happened_at: String,
    pub source_of_fund: Option<String>,
    pub note: Option<String>,
}

/// One cached summary row per (user, period_start, period_end).
/// Always re-derivable from budgets + transactions; never source of truth.
#[allow(dead_code)]
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodSummary {
    pub user_id: String,
    pub period_start: String,
    pub period_end: String,
    pub total_budgeted_expense: i64,
    pub total_budgeted_income: i64,
    pub total_actual_expense: i64,
    pub total_actual_income: i64,
}
