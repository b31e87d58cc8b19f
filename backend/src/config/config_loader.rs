use std::str::FromStr;

use anyhow::{Context, Result};

use super::{
    config_model::{
        BackendServer, Cors, Database, DotEnvyConfig, Jwt, PaymentPolling, Playlist, Trial,
        YooKassa,
    },
    stage::Stage,
};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let backend_server = BackendServer {
        port: parse_or("SERVER_PORT_BACKEND", 3000)?,
        body_limit: parse_or("SERVER_BODY_LIMIT", 10)?,
        timeout: parse_or("SERVER_TIMEOUT", 60)?,
    };

    let database = load_database()?;

    let jwt = Jwt {
        secret: required("JWT_SECRET")?,
        expires_in_secs: parse_or("JWT_EXPIRES_IN_SECS", 7 * 24 * 60 * 60)?,
    };

    let trial = Trial {
        duration_days: parse_or("TRIAL_DURATION_DAYS", 7)?,
        device_limit: parse_or("TRIAL_DEVICE_LIMIT", 2)?,
    };

    let playlist = Playlist {
        url: required("PLAYLIST_URL")?,
        fetch_timeout_secs: parse_or("PLAYLIST_FETCH_TIMEOUT_SECS", 30)?,
    };

    let yookassa = load_yookassa()?;
    let payment_polling = load_payment_polling()?;

    let cors = Cors {
        allowed_origin: optional("CORS_ORIGIN").filter(|origin| origin != "*"),
    };

    Ok(DotEnvyConfig {
        backend_server,
        database,
        jwt,
        trial,
        playlist,
        yookassa,
        payment_polling,
        cors,
    })
}

pub fn load_database() -> Result<Database> {
    Ok(Database {
        url: required("DATABASE_URL")?,
        max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 20)?,
    })
}

pub fn load_yookassa() -> Result<YooKassa> {
    Ok(YooKassa {
        shop_id: required("YOOKASSA_SHOP_ID")?,
        secret_key: required("YOOKASSA_SECRET_KEY")?,
        api_base: optional("YOOKASSA_API_BASE")
            .unwrap_or_else(|| "https://api.yookassa.ru/v3".to_string()),
        return_url: optional("YOOKASSA_RETURN_URL")
            .or_else(|| optional("FRONTEND_URL"))
            .unwrap_or_else(|| "http://localhost:5173/subscription".to_string()),
    })
}

pub fn load_payment_polling() -> Result<PaymentPolling> {
    Ok(PaymentPolling {
        initial_delay_ms: parse_or("POLL_INITIAL_DELAY_MS", 2000)?,
        interval_ms: parse_or("POLL_INTERVAL_MS", 1500)?,
        max_attempts: parse_or("POLL_MAX_ATTEMPTS", 3)?,
    })
}

pub fn get_stage() -> Stage {
    dotenvy::dotenv().ok();

    let stage_str = std::env::var("STAGE").unwrap_or_default();
    Stage::try_from(&stage_str).unwrap_or_default()
}

pub fn optional(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn required(key: &str) -> Result<String> {
    optional(key).with_context(|| format!("{key} is invalid"))
}

pub fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional(key) {
        Some(raw) => raw.parse().with_context(|| format!("{key} is invalid")),
        None => Ok(default),
    }
}
