use serde_json::{json, Value};
use tracing::warn;

use crate::error::Result;
use crate::fmt::rupiah;
use crate::models::PendingNotification;

/// Outbound-only Telegram Bot API client. Every call here is advisory:
/// callers log failures and move on, nothing retries and nothing is
/// surfaced to the ingestion caller.
#[derive(Clone)]
pub struct Telegram {
    client: reqwest::Client,
    token: String,
}

impl Telegram {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            token: token.into(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.token.is_empty()
    }

    fn url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{}", self.token, method)
    }

    async fn call(&self, method: &str, body: Value) -> Result<()> {
        let response = self
            .client
            .post(self.url(method))
            .json(&body)
            .send()
            .await?;
        let payload: Value = response.json().await?;
        if payload.get("ok").and_then(Value::as_bool) != Some(true) {
            warn!(method, %payload, "telegram api rejected call");
        }
        Ok(())
    }

    pub async fn send_message(&self, chat_id: &str, text: &str, reply_markup: Option<Value>) -> Result<()> {
        let mut body = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML",
        });
        if let Some(markup) = reply_markup {
            body["reply_markup"] = markup;
        }
        self.call("sendMessage", body).await
    }

    #[allow(dead_code)]
    pub async fn edit_message_text(&self, chat_id: &str, message_id: i64, text: &str) -> Result<()> {
        self.call(
            "editMessageText",
            json!({
                "chat_id": chat_id,
                "message_id": message_id,
                "text": text,
                "parse_mode": "HTML",
            }),
        )
        .await
    }

    #[allow(dead_code)]
    pub async fn answer_callback_query(&self, callback_query_id: &str, text: Option<&str>) -> Result<()> {
        self.call(
            "answerCallbackQuery",
            json!({
                "callback_query_id": callback_query_id,
                "text": text,
            }),
        )
        .await
    }

    pub async fn set_my_commands(&self, commands: &[(&str, &str)]) -> Result<()> {
        let commands: Vec<Value> = commands
            .iter()
            .map(|(command, description)| json!({ "command": command, "description": description }))
            .collect();
        self.call("setMyCommands", json!({ "commands": commands })).await
    }

    /// Reset the chat menu button to the standard commands list, or
    /// point it at a web app when a URL is given.
    pub async fn set_chat_menu_button(&self, chat_id: &str, web_app_url: Option<&str>) -> Result<()> {
        let menu_button = match web_app_url {
            Some(url) => json!({
                "type": "web_app",
                "text": "Open App",
                "web_app": { "url": url },
            }),
            None => json!({ "type": "commands" }),
        };
        self.call(
            "setChatMenuButton",
            json!({ "chat_id": chat_id, "menu_button": menu_button }),
        )
        .await
    }
}

/// Message body + inline keyboard for a freshly ingested pending
/// transaction.
pub fn pending_message(n: &PendingNotification) -> (String, Value) {
    let text = format!(
        "🆕 <b>Pending Transaction</b>\n\n\
         💰 <b>{} {}</b>\n\
         🏪 {}\n\
         📅 {}\n\
         🔄 {}\n\
         💳 {}\n\
         📝 {}\n\n\
         Please categorize or edit this transaction.",
        n.currency,
        rupiah(n.amount).trim_start_matches("Rp "),
        n.merchant,
        n.happened_at,
        n.direction.as_str().to_uppercase(),
        n.source_of_fund.as_deref().unwrap_or("Unknown Source"),
        n.note.as_deref().unwrap_or("-"),
    );

    let id = n.transaction_id;
    let keyboard = json!({
        "inline_keyboard": [
            [{ "text": "✅ Confirm & Categorize", "callback_data": format!("tx_confirm:{id}") }],
            [
                { "text": "🏷️ Set Category", "callback_data": format!("tx_cat:{id}") },
                { "text": "🏦 Set Source", "callback_data": format!("tx_src:{id}") },
            ],
            [
                { "text": "✏️ Edit Amount", "callback_data": format!("tx_amt:{id}") },
                { "text": "🕒 Edit Date", "callback_data": format!("tx_date:{id}") },
            ],
            [{ "text": "❌ Reject", "callback_data": format!("tx_reject:{id}") }],
        ]
    });

    (text, keyboard)
}

/// Fire-and-forget notification for one pending transaction; failures
/// are logged and swallowed.
pub async fn notify_pending(telegram: &Telegram, chat_id: &str, notification: &PendingNotification) {
    if !telegram.is_configured() || chat_id.is_empty() {
        return;
    }
    let (text, keyboard) = pending_message(notification);
    if let Err(e) = telegram.send_message(chat_id, &text, Some(keyboard)).await {
        warn!(transaction_id = notification.transaction_id, error = %e,
              "pending-transaction notification failed");
    }
}
