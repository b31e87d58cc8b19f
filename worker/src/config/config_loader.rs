use super::config_model::{AutoRenewal, DotEnvyConfig, WorkerServer};
use anyhow::{Result, ensure};
use backend::config::config_loader::{
    load_database, load_payment_polling, load_yookassa, parse_or,
};

/// Six hours.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 6 * 60 * 60;

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let worker_server = WorkerServer {
        port: parse_or("SERVER_PORT_WORKER", 3001)?,
        body_limit: parse_or("SERVER_BODY_LIMIT", 10)?,
        timeout: parse_or("SERVER_TIMEOUT", 60)?,
    };

    let auto_renewal = AutoRenewal {
        interval_secs: parse_or("AUTO_RENEWAL_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS)?,
    };
    ensure!(
        auto_renewal.interval_secs > 0,
        "AUTO_RENEWAL_INTERVAL_SECS must be positive"
    );

    Ok(DotEnvyConfig {
        worker_server,
        database: load_database()?,
        yookassa: load_yookassa()?,
        payment_polling: load_payment_polling()?,
        auto_renewal,
    })
}
