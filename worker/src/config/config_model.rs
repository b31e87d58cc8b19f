use backend::config::config_model::{Database, PaymentPolling, YooKassa};

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub worker_server: WorkerServer,
    pub database: Database,
    pub yookassa: YooKassa,
    pub payment_polling: PaymentPolling,
    pub auto_renewal: AutoRenewal,
}

#[derive(Debug, Clone)]
pub struct WorkerServer {
    pub port: u16,
    pub timeout: u64,
    pub body_limit: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct AutoRenewal {
    /// Seconds between sweeps; the first sweep runs at startup.
    pub interval_secs: u64,
}
