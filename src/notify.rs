//! Telegram notification sink
//!
//! Fire and forget: callers ignore the result or log it at warn level. An
//! unconfigured notifier is a silent no-op so every call site stays
//! unconditional.

use crate::error::Result;
use crate::types::Outcome;
use rust_decimal::Decimal;
use serde_json::json;

#[derive(Clone)]
pub struct Notifier {
    inner: Option<NotifierInner>,
}

#[derive(Clone)]
struct NotifierInner {
    client: reqwest::Client,
    url: String,
    chat_id: String,
}

impl Notifier {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            inner: Some(NotifierInner {
                client: reqwest::Client::new(),
                url: format!(
                    "https://api.telegram.org/bot{}/sendMessage",
                    bot_token.into()
                ),
                chat_id: chat_id.into(),
            }),
        }
    }

    pub fn disabled() -> Self {
        Self { inner: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    pub async fn send(&self, text: &str) -> Result<()> {
        let Some(inner) = &self.inner else {
            return Ok(());
        };
        inner
            .client
            .post(&inner.url)
            .json(&json!({
                "chat_id": inner.chat_id,
                "text": text,
                "parse_mode": "HTML",
            }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub async fn startup(&self) -> Result<()> {
        self.send("🤖 <b>High/Low bot started</b>").await
    }

    pub async fn prediction(&self, draw_id: &str, outcome: Outcome, score: f64) -> Result<()> {
        self.send(&format!(
            "🎯 Draw {}: predicting <b>{}</b> (score {:.2})",
            draw_id, outcome, score
        ))
        .await
    }

    pub async fn wagering_disabled(&self, reason: &str) -> Result<()> {
        self.send(&format!("🛑 <b>Wagering disabled</b>\n{}", reason))
            .await
    }

    pub async fn breaker(&self, kind: &str, balance: Decimal) -> Result<()> {
        self.send(&format!(
            "⚠️ <b>{} triggered</b> at balance {}",
            kind, balance
        ))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_notifier_is_noop() {
        let notifier = Notifier::disabled();
        assert!(!notifier.is_enabled());
        // no HTTP call is made, so this resolves immediately
        notifier.send("hello").await.unwrap();
        notifier.startup().await.unwrap();
    }

    #[test]
    fn test_enabled_notifier_builds_url() {
        let notifier = Notifier::new("123:abc", "42");
        assert!(notifier.is_enabled());
    }
}
