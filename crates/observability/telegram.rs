use super::notifier::{NotificationEvent, NotificationProvider};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::Client;
use serde_json::json;

const MESSAGE_LIMIT: usize = 4096;

pub(crate) struct TelegramAlertProvider {
    bot_token: String,
    chat_id: String,
    client: Client,
}

impl TelegramAlertProvider {
    pub(crate) fn new(bot_token: String, chat_id: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()?;

        Ok(Self {
            bot_token,
            chat_id,
            client,
        })
    }
}

pub(crate) fn format_alert(event: &NotificationEvent) -> String {
    let mut lines = vec![
        format!(
            "[{}] {} ({}/{})",
            event.level.as_str(),
            event.service_name,
            event.environment,
            event.component
        ),
        format!(
            "{} {}",
            event.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            event.target
        ),
    ];

    if let (Some(file), Some(line)) = (&event.file, event.line) {
        lines.push(format!("at {file}:{line}"));
    }

    if let Some(message) = event.message.as_ref().filter(|m| !m.trim().is_empty()) {
        lines.push(String::new());
        lines.push(message.trim().to_string());
    }

    if !event.fields.is_empty() {
        lines.push(String::new());
        for (key, value) in &event.fields {
            lines.push(format!("{key} = {value}"));
        }
    }

    for span in event.spans.iter().filter(|span| !span.fields.is_empty()) {
        lines.push(format!("span {}:", span.name));
        for (key, value) in &span.fields {
            lines.push(format!("  {key} = {value}"));
        }
    }

    truncate(lines.join("\n"))
}

fn truncate(content: String) -> String {
    const SUFFIX: &str = "\n... (truncated)";

    if content.chars().count() <= MESSAGE_LIMIT {
        return content;
    }

    let allowed = MESSAGE_LIMIT - SUFFIX.chars().count();
    let mut truncated: String = content.chars().take(allowed).collect();
    truncated.push_str(SUFFIX);
    truncated
}

#[async_trait]
impl NotificationProvider for TelegramAlertProvider {
    async fn send(&self, event: &NotificationEvent) -> Result<()> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);

        let response = self
            .client
            .post(url)
            .json(&json!({
                "chat_id": self.chat_id,
                "text": format_alert(event),
                "disable_web_page_preview": true,
            }))
            .send()
            .await
            .map_err(sanitize_reqwest_error)?;

        if response.status().is_success() {
            return Ok(());
        }

        Err(anyhow!(
            "telegram sendMessage returned non-success status: {}",
            response.status()
        ))
    }

    fn provider_name(&self) -> &'static str {
        "telegram"
    }
}

// The request URL embeds the bot token, so reqwest's own message must not be surfaced.
fn sanitize_reqwest_error(error: reqwest::Error) -> anyhow::Error {
    if error.is_timeout() {
        return anyhow!("telegram request timed out");
    }
    if error.is_connect() {
        return anyhow!("telegram connection failed");
    }
    anyhow!("telegram request failed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::notifier::SpanSummary;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use tracing::Level;

    fn event(message: &str) -> NotificationEvent {
        NotificationEvent {
            level: Level::ERROR,
            timestamp: Utc::now(),
            service_name: "iptv".to_string(),
            environment: "production".to_string(),
            component: "backend".to_string(),
            target: "backend::usecases::settlement".to_string(),
            file: Some("backend/src/usecases/settlement.rs".to_string()),
            line: Some(42),
            message: Some(message.to_string()),
            fields: BTreeMap::from([("payment_id".to_string(), "pay-1".to_string())]),
            spans: vec![SpanSummary {
                name: "request".to_string(),
                fields: BTreeMap::from([("uri".to_string(), "/api/yookassa/webhook".to_string())]),
            }],
        }
    }

    #[test]
    fn alert_contains_context_and_fields() {
        let text = format_alert(&event("settlement failed"));

        assert!(text.starts_with("[ERROR] iptv (production/backend)"));
        assert!(text.contains("settlement failed"));
        assert!(text.contains("payment_id = pay-1"));
        assert!(text.contains("span request:"));
    }

    #[test]
    fn long_alerts_are_truncated_to_telegram_limit() {
        let text = format_alert(&event(&"x".repeat(10_000)));

        assert_eq!(text.chars().count(), MESSAGE_LIMIT);
        assert!(text.ends_with("(truncated)"));
    }
}
