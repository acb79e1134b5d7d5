use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use tracing::warn;

use crate::error::{DompetError, Result};
use crate::extractor::parse_email;
use crate::models::{EmailPayload, IngestOutcome, PendingNotification};

pub const DEFAULT_EMAIL_LABEL: &str = "dompet";

/// Result of one ingestion call; `notification` is populated only when
/// a new pending transaction was created.
#[derive(Debug)]
pub struct IngestResult {
    pub outcome: IngestOutcome,
    pub notification: Option<PendingNotification>,
}

/// Store-side ingestion: dedupe by gmail_message_id, persist the raw
/// email, run the extractor, resolve the funding source and insert a
/// pending transaction.
///
/// Raw-email and transaction insert failures abort the call; funding
/// source resolution is best-effort and degrades to a null reference.
/// Retried deliveries of the same message id short-circuit to the
/// first call's identifiers.
pub fn ingest_email(conn: &Connection, payload: &EmailPayload) -> Result<IngestResult> {
    if let Some(existing) = find_existing(conn, &payload.gmail_message_id)? {
        return Ok(IngestResult {
            outcome: existing,
            notification: None,
        });
    }

    let now = Utc::now().to_rfc3339();
    let raw_email_id = match persist_raw(conn, payload, &now)? {
        Some(id) => id,
        // Lost a race with a concurrent delivery of the same message;
        // the winner's identifiers are the answer.
        None => {
            let existing = find_existing(conn, &payload.gmail_message_id)?.ok_or_else(|| {
                DompetError::Other(format!(
                    "duplicate insert for {} but no stored row",
                    payload.gmail_message_id
                ))
            })?;
            return Ok(IngestResult {
                outcome: existing,
                notification: None,
            });
        }
    };

    // Parse from the original payload, not the persisted row.
    let parsed = parse_email(payload);

    let source_of_fund_id = parsed
        .source_of_fund
        .as_deref()
        .and_then(|label| resolve_funding_source(conn, label));

    let happened_at = parsed
        .happened_at
        .clone()
        .or_else(|| payload.date_header.clone())
        .unwrap_or_else(|| now.clone());

    let parse_meta = serde_json::json!({
        "confidence": parsed.confidence,
        "evidence": parsed.evidence,
        "rules_triggered": parsed.rules_triggered,
    })
    .to_string();

    conn.execute(
        "INSERT INTO transactions (status, happened_at, amount, direction, merchant, note, \
                                   source, source_ref, source_of_fund_id, parse_meta) \
         VALUES ('pending', ?1, ?2, ?3, ?4, ?5, 'email', ?6, ?7, ?8)",
        rusqlite::params![
            happened_at,
            parsed.amount,
            parsed.direction.as_str(),
            parsed.merchant,
            parsed.note,
            raw_email_id,
            source_of_fund_id,
            parse_meta,
        ],
    )?;
    let transaction_id = conn.last_insert_rowid();

    Ok(IngestResult {
        outcome: IngestOutcome {
            raw_email_id,
            transaction_id: Some(transaction_id),
            deduped: false,
        },
        notification: Some(PendingNotification {
            transaction_id,
            amount: parsed.amount,
            currency: "IDR".to_string(),
            direction: parsed.direction,
            merchant: parsed.merchant,
            happened_at,
            source_of_fund: parsed.source_of_fund,
            note: parsed.note,
        }),
    })
}

/// Insert the immutable raw-email record. Returns `None` when another
/// delivery of the same `gmail_message_id` won the insert first.
fn persist_raw(conn: &Connection, payload: &EmailPayload, now: &str) -> Result<Option<i64>> {
    let raw_payload = serde_json::to_string(payload)?;
    let inserted = conn.execute(
        "INSERT INTO raw_emails (received_at, from_email, to_email, subject, date_header, \
                                 gmail_message_id, thread_id, email_label, text_body, html_body, raw_payload) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        rusqlite::params![
            payload.received_at.as_deref().unwrap_or(now),
            payload.from_email,
            payload.to_email,
            payload.subject,
            payload.date_header,
            payload.gmail_message_id,
            payload.thread_id,
            payload.email_label.as_deref().unwrap_or(DEFAULT_EMAIL_LABEL),
            payload.text_body,
            payload.html_body,
            raw_payload,
        ],
    );
    match inserted {
        Ok(_) => Ok(Some(conn.last_insert_rowid())),
        Err(e) if is_unique_violation(&e) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn find_existing(conn: &Connection, gmail_message_id: &str) -> Result<Option<IngestOutcome>> {
    let raw_email_id: Option<i64> = conn
        .query_row(
            "SELECT id FROM raw_emails WHERE gmail_message_id = ?1",
            [gmail_message_id],
            |row| row.get(0),
        )
        .optional()?;
    let Some(raw_email_id) = raw_email_id else {
        return Ok(None);
    };
    let transaction_id: Option<i64> = conn
        .query_row(
            "SELECT id FROM transactions WHERE source_ref = ?1 ORDER BY id LIMIT 1",
            [raw_email_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(Some(IngestOutcome {
        raw_email_id,
        transaction_id,
        deduped: true,
    }))
}

/// Case-insensitive lookup, creating the source with type 'other' on
/// first encounter. Failures are logged and never block the
/// transaction insert.
fn resolve_funding_source(conn: &Connection, label: &str) -> Option<i64> {
    let found: rusqlite::Result<Option<i64>> = conn
        .query_row(
            "SELECT id FROM source_of_funds WHERE name = ?1 COLLATE NOCASE",
            [label],
            |row| row.get(0),
        )
        .optional();
    match found {
        Ok(Some(id)) => Some(id),
        Ok(None) => {
            match conn.execute(
                "INSERT INTO source_of_funds (name, type) VALUES (?1, 'other')",
                [label],
            ) {
                Ok(_) => Some(conn.last_insert_rowid()),
                Err(e) => {
                    warn!(label, error = %e, "failed to create funding source");
                    None
                }
            }
        }
        Err(e) => {
            warn!(label, error = %e, "funding source lookup failed");
            None
        }
    }
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

    fn payload(message_id: &str) -> EmailPayload {
        EmailPayload {
            gmail_message_id: message_id.to_string(),
            subject: Some("Receipt from Gojek".to_string()),
            text_body: Some("Pembayaran Rp 25.000 via OVO".to_string()),
            from_email: Some("no-reply@gojek.com".to_string()),
            date_header: Some("2025-08-10T09:30:00+07:00".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_creates_raw_email_and_pending_transaction() {
        let (_dir, conn) = test_db();
        let result = ingest_email(&conn, &payload("m-1")).unwrap();

        assert!(!result.outcome.deduped);
        let tx_id = result.outcome.transaction_id.unwrap();

        let (status, amount, direction, merchant, source): (String, i64, String, String, String) =
            conn.query_row(
                "SELECT status, amount, direction, merchant, source FROM transactions WHERE id = ?1",
                [tx_id],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?)),
            )
            .unwrap();
        assert_eq!(status, "pending");
        assert_eq!(amount, 25000);
        assert_eq!(direction, "debit");
        assert_eq!(merchant, "Gojek");
        assert_eq!(source, "email");

        let notif = result.notification.unwrap();
        assert_eq!(notif.transaction_id, tx_id);
        assert_eq!(notif.source_of_fund.as_deref(), Some("OVO"));
    }

    #[test]
    fn test_idempotent_under_retried_delivery() {
        let (_dir, conn) = test_db();
        let first = ingest_email(&conn, &payload("m-dup")).unwrap();
        let second = ingest_email(&conn, &payload("m-dup")).unwrap();

        assert!(!first.outcome.deduped);
        assert!(second.outcome.deduped);
        assert_eq!(second.outcome.raw_email_id, first.outcome.raw_email_id);
        assert_eq!(second.outcome.transaction_id, first.outcome.transaction_id);
        assert!(second.notification.is_none());

        let raw_count: i64 = conn
            .query_row("SELECT count(*) FROM raw_emails", [], |r| r.get(0))
            .unwrap();
        let tx_count: i64 = conn
            .query_row("SELECT count(*) FROM transactions", [], |r| r.get(0))
            .unwrap();
        assert_eq!(raw_count, 1);
        assert_eq!(tx_count, 1);
    }

    #[test]
    fn test_racing_raw_insert_resolves_to_existing_row() {
        let (_dir, conn) = test_db();
        let p = payload("m-race");
        let now = "2025-08-10T00:00:00Z";

        let first = persist_raw(&conn, &p, now).unwrap();
        assert!(first.is_some());
        // Second insert hits the UNIQUE constraint instead of erroring.
        let second = persist_raw(&conn, &p, now).unwrap();
        assert!(second.is_none());

        // The orchestration maps that loss to a dedup outcome.
        let result = ingest_email(&conn, &p).unwrap();
        assert!(result.outcome.deduped);
        assert_eq!(result.outcome.raw_email_id, first.unwrap());
    }

    #[test]
    fn test_funding_source_created_once_case_insensitive() {
        let (_dir, conn) = test_db();
        conn.execute(
            "INSERT INTO source_of_funds (name, type) VALUES ('ovo', 'wallet')",
            [],
        )
        .unwrap();

        ingest_email(&conn, &payload("m-sof")).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM source_of_funds WHERE name = 'ovo' COLLATE NOCASE",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(count, 1, "existing source reused, not duplicated");

        let linked: i64 = conn
            .query_row(
                "SELECT s.id FROM transactions t JOIN source_of_funds s ON t.source_of_fund_id = s.id",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert!(linked > 0);
    }

    #[test]
    fn test_unknown_source_leaves_null_reference() {
        let (_dir, conn) = test_db();
        let mut p = payload("m-null");
        p.text_body = Some("Pembayaran Rp 10.000 via GoPay".to_string());
        let result = ingest_email(&conn, &p).unwrap();

        let sof: Option<i64> = conn
            .query_row(
                "SELECT source_of_fund_id FROM transactions WHERE id = ?1",
                [result.outcome.transaction_id.unwrap()],
                |r| r.get(0),
            )
            .unwrap();
        assert!(sof.is_none());
    }

    #[test]
    fn test_parse_meta_travels_with_transaction() {
        let (_dir, conn) = test_db();
        let result = ingest_email(&conn, &payload("m-meta")).unwrap();
        let meta: String = conn
            .query_row(
                "SELECT parse_meta FROM transactions WHERE id = ?1",
                [result.outcome.transaction_id.unwrap()],
                |r| r.get(0),
            )
            .unwrap();
        let meta: serde_json::Value = serde_json::from_str(&meta).unwrap();
        assert_eq!(meta["confidence"], 0.8);
        assert!(meta["rules_triggered"]
            .as_array()
            .unwrap()
            .iter()
            .any(|r| r == "amount_regex_match"));
    }

    #[test]
    fn test_zero_amount_parse_still_ingested() {
        let (_dir, conn) = test_db();
        let mut p = payload("m-zero");
        p.text_body = Some("no currency marker at all".to_string());
        p.subject = Some("FYI".to_string());
        p.from_email = None;
        let result = ingest_email(&conn, &p).unwrap();

        let (amount, merchant): (i64, String) = conn
            .query_row(
                "SELECT amount, merchant FROM transactions WHERE id = ?1",
                [result.outcome.transaction_id.unwrap()],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(amount, 0);
        assert_eq!(merchant, "FYI");
    }

    #[test]
    fn test_email_label_defaults() {
        let (_dir, conn) = test_db();
        ingest_email(&conn, &payload("m-label")).unwrap();
        let label: String = conn
            .query_row("SELECT email_label FROM raw_emails", [], |r| r.get(0))
            .unwrap();
        assert_eq!(label, DEFAULT_EMAIL_LABEL);
    }
}
