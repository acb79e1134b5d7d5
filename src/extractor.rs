use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::models::{Direction, EmailPayload, ParseResult};
use crate::normalize::clean_text;

pub const UNKNOWN_MERCHANT: &str = "Unknown Merchant";

/// Confidence is a binary flag derived from the amount match, not a
/// calibrated probability; it only routes low-quality parses to manual
/// review.
pub const CONFIDENCE_AMOUNT_MATCHED: f64 = 0.8;
pub const CONFIDENCE_NO_AMOUNT: f64 = 0.3;

const DEBIT_KEYWORDS: &[&str] = &[
    "Pembayaran",
    "Berhasil dibayar",
    "Total Tagihan",
    "Total Pembayaran",
    "Purchase",
    "Payment",
];

const CREDIT_KEYWORDS: &[&str] = &[
    "Refund",
    "Pengembalian",
    "Dana masuk",
    "Cashback",
    "Top Up",
    "Topup",
];

// Exact-case substrings, first match in order wins. "DANA" is the
// wallet's cased brand name so the credit phrase "Dana masuk" cannot
// false-match it. GoPay is deliberately absent; downstream review
// flows were written against parses that leave it null.
const SOURCE_KEYWORDS: &[&str] = &["OVO", "DANA", "BCA", "Mandiri", "Jenius", "Credit Card"];

// Sender-domain overrides, checked in order; a later match overwrites
// an earlier one.
const MERCHANT_DOMAINS: &[(&str, &str)] = &[
    ("gojek", "Gojek"),
    ("grab", "Grab"),
    ("tokopedia", "Tokopedia"),
    ("shopee", "Shopee"),
];

fn amount_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(?:Rp|IDR)\s?\.?([0-9.,]+)").unwrap())
}

/// Apply the ordered heuristic rules to an email payload.
///
/// Pure text-in/struct-out: no I/O, deterministic for the same input,
/// and every field defaults safely so malformed payloads never error.
pub fn parse_email(payload: &EmailPayload) -> ParseResult {
    let subject = payload.subject.clone().unwrap_or_default();
    let body = format!(
        "{} {}",
        payload.text_body.as_deref().unwrap_or(""),
        payload.html_body.as_deref().unwrap_or("")
    );
    let content = clean_text(&body);
    // Issuers often put the instrument in the subject ("Top Up
    // Berhasil via BCA"), so keyword scans cover both.
    let scan_text = clean_text(&format!("{subject} {content}"));

    let mut rules_triggered: Vec<&'static str> = Vec::new();
    let mut evidence: BTreeMap<String, String> = BTreeMap::new();

    // 1. Amount
    let mut amount: i64 = 0;
    if let Some(caps) = amount_re().captures(&content) {
        let digits: String = caps[1].chars().filter(|c| c.is_ascii_digit()).collect();
        if let Ok(parsed) = digits.parse::<i64>() {
            amount = parsed;
            evidence.insert("amount_line".to_string(), caps[0].to_string());
            rules_triggered.push("amount_regex_match");
        }
    }

    // 2. Direction — credit keywords take priority over debit ones.
    let lower_scan = scan_text.to_lowercase();
    let mut direction = Direction::Debit;
    if CREDIT_KEYWORDS.iter().any(|k| lower_scan.contains(&k.to_lowercase())) {
        direction = Direction::Credit;
        rules_triggered.push("direction_keyword_credit");
    } else if DEBIT_KEYWORDS.iter().any(|k| lower_scan.contains(&k.to_lowercase())) {
        rules_triggered.push("direction_keyword_debit");
    }

    // 3. Merchant
    let mut merchant = if subject.is_empty() {
        UNKNOWN_MERCHANT.to_string()
    } else {
        subject.clone()
    };
    if let Some(rest) = strip_prefix_ci(&merchant, "receipt from ") {
        merchant = rest.trim().to_string();
    }
    if let Some(from) = payload.from_email.as_deref() {
        for (domain, name) in MERCHANT_DOMAINS {
            if from.contains(domain) {
                merchant = (*name).to_string();
                if !rules_triggered.contains(&"merchant_domain_match") {
                    rules_triggered.push("merchant_domain_match");
                }
            }
        }
    }

    // 4. Source of fund — first keyword found in list order.
    let mut source_of_fund = None;
    for keyword in SOURCE_KEYWORDS {
        if scan_text.contains(keyword) {
            source_of_fund = Some((*keyword).to_string());
            evidence.insert("method_line".to_string(), (*keyword).to_string());
            rules_triggered.push("source_keyword_match");
            break;
        }
    }

    // 5. Confidence
    let confidence = if amount > 0 {
        CONFIDENCE_AMOUNT_MATCHED
    } else {
        CONFIDENCE_NO_AMOUNT
    };

    ParseResult {
        amount,
        direction,
        merchant,
        source_of_fund,
        note: payload.subject.clone(),
        happened_at: payload.date_header.clone(),
        confidence,
        evidence,
        rules_triggered,
    }
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    // `get` refuses a split inside a multibyte character, so subjects
    // opening with emoji fall through instead of panicking.
    let head = s.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}
