#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub backend_server: BackendServer,
    pub database: Database,
    pub jwt: Jwt,
    pub trial: Trial,
    pub playlist: Playlist,
    pub yookassa: YooKassa,
    pub payment_polling: PaymentPolling,
    pub cors: Cors,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    /// Megabytes.
    pub body_limit: u64,
    /// Seconds.
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct Jwt {
    pub secret: String,
    pub expires_in_secs: i64,
}

#[derive(Debug, Clone)]
pub struct Trial {
    pub duration_days: i64,
    pub device_limit: i32,
}

#[derive(Debug, Clone)]
pub struct Playlist {
    pub url: String,
    pub fetch_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct YooKassa {
    pub shop_id: String,
    pub secret_key: String,
    pub api_base: String,
    /// Frontend page the payer lands on after confirmation.
    pub return_url: String,
}

#[derive(Debug, Clone, Copy)]
pub struct PaymentPolling {
    pub initial_delay_ms: u64,
    pub interval_ms: u64,
    pub max_attempts: u32,
}

#[derive(Debug, Clone)]
pub struct Cors {
    /// `None` allows any origin.
    pub allowed_origin: Option<String>,
}
