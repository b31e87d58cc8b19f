use std::env;
use tracing::Level;

#[derive(Clone)]
pub(crate) struct ServiceContext {
    pub(crate) service_name: String,
    pub(crate) environment: String,
    pub(crate) component: String,
}

#[derive(Clone)]
pub(crate) struct TelegramConfig {
    pub(crate) bot_token: String,
    pub(crate) chat_id: String,
    pub(crate) min_level: Level,
}

#[derive(Clone)]
pub(crate) struct ObservabilityConfig {
    pub(crate) service_context: ServiceContext,
    pub(crate) telegram: Option<TelegramConfig>,
    /// Logged once tracing is up.
    pub(crate) warnings: Vec<String>,
}

impl ObservabilityConfig {
    pub(crate) fn from_env(component: &str) -> Self {
        let component = component.trim().to_string();

        let service_name = env_string("SERVICE_NAME").unwrap_or_else(|| component.clone());
        let environment = env_string("STAGE").unwrap_or_else(|| "unknown".to_string());

        let (telegram, warnings) = telegram_from_env();

        Self {
            service_context: ServiceContext {
                service_name,
                environment,
                component,
            },
            telegram,
            warnings,
        }
    }
}

fn telegram_from_env() -> (Option<TelegramConfig>, Vec<String>) {
    let mut warnings = Vec::new();

    let bot_token = env_string("TELEGRAM_ALERT_BOT_TOKEN");
    let chat_id = env_string("TELEGRAM_ALERT_CHAT_ID");

    let (bot_token, chat_id) = match (bot_token, chat_id) {
        (Some(bot_token), Some(chat_id)) => (bot_token, chat_id),
        (None, None) => return (None, warnings),
        _ => {
            warnings.push(
                "only one of TELEGRAM_ALERT_BOT_TOKEN and TELEGRAM_ALERT_CHAT_ID is set; Telegram alerts disabled"
                    .to_string(),
            );
            return (None, warnings);
        }
    };

    let min_level = match env_string("ALERT_LEVEL") {
        Some(raw) => parse_level(&raw).unwrap_or_else(|| {
            warnings.push(format!("ALERT_LEVEL is invalid (value: {raw}); defaulting to ERROR"));
            Level::ERROR
        }),
        None => Level::ERROR,
    };

    (
        Some(TelegramConfig {
            bot_token,
            chat_id,
            min_level,
        }),
        warnings,
    )
}

pub(crate) fn parse_level(input: &str) -> Option<Level> {
    match input.trim().to_ascii_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_levels_case_insensitively() {
        assert_eq!(parse_level("WARN"), Some(Level::WARN));
        assert_eq!(parse_level(" warning "), Some(Level::WARN));
        assert_eq!(parse_level("error"), Some(Level::ERROR));
        assert_eq!(parse_level("loud"), None);
    }
}
