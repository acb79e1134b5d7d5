use std::sync::OnceLock;

use regex::Regex;

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>?").unwrap())
}

fn ws_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// Strip markup and collapse whitespace from a raw email body.
///
/// Pure and idempotent: already-clean text comes back unchanged, and
/// empty input yields an empty string.
pub fn clean_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let stripped = tag_re().replace_all(text, " ");
    ws_re().replace_all(&stripped, " ").trim().to_string()
}
