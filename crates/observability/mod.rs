mod config;
mod layer;
mod notifier;
mod telegram;

use anyhow::Result;
use config::ObservabilityConfig;
use layer::AlertLayer;
use notifier::Notifier;
use std::sync::Arc;
use telegram::TelegramAlertProvider;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs the fmt subscriber (RUST_LOG, default `info`) and, when
/// configured, forwards events at or above `ALERT_LEVEL` to Telegram.
/// Must be called inside a tokio runtime.
pub fn init_observability(component: &str) -> Result<()> {
    let config = ObservabilityConfig::from_env(component);
    let mut warnings = config.warnings.clone();

    let alert_layer = match config.telegram.as_ref() {
        Some(telegram) => {
            match TelegramAlertProvider::new(telegram.bot_token.clone(), telegram.chat_id.clone()) {
                Ok(provider) => {
                    let notifier = Notifier::new(vec![Arc::new(provider)]);
                    Some(
                        AlertLayer::new(notifier, config.service_context.clone(), telegram.min_level)
                            .with_filter(LevelFilter::from_level(telegram.min_level)),
                    )
                }
                Err(err) => {
                    warnings.push(format!("telegram client could not be built: {err}"));
                    None
                }
            }
        }
        None => None,
    };
    let alerts_enabled = alert_layer.is_some();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339());

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(alert_layer)
        .with(env_filter)
        .try_init()?;

    for warning in &warnings {
        warn!(
            service = %config.service_context.service_name,
            component = %config.service_context.component,
            warning = %warning,
            "observability config warning"
        );
    }

    info!(
        service = %config.service_context.service_name,
        environment = %config.service_context.environment,
        component = %config.service_context.component,
        alerts_enabled,
        "observability initialised"
    );

    Ok(())
}
