use anyhow::Result;
use backend::usecases::auto_renewal::AutoRenewalUseCase;
use crates::{
    infra::db::{
        postgres::postgres_connection,
        repositories::{
            payments::PaymentPostgres, plans::PlanPostgres, subscriptions::SubscriptionPostgres,
        },
    },
    payments::yookassa_client::YooKassaClient,
};
use std::{sync::Arc, time::Duration};
use tracing::{error, info};
use worker::{axum_http, config, services::worker_loop};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        error!("Worker exited with error: {}", error);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    crates::observability::init_observability("worker")?;

    let dotenvy_env = Arc::new(config::config_loader::load()?);
    info!("ENV has been loaded");

    let postgres_pool = postgres_connection::establish_connection(
        &dotenvy_env.database.url,
        dotenvy_env.database.max_connections,
    )?;
    info!("Postgres connection has been established");

    let db_pool_arc = Arc::new(postgres_pool);

    let yookassa = &dotenvy_env.yookassa;
    let gateway = Arc::new(YooKassaClient::with_api_base(
        yookassa.shop_id.clone(),
        yookassa.secret_key.clone(),
        yookassa.api_base.clone(),
    ));

    let auto_renewal_usecase = Arc::new(AutoRenewalUseCase::new(
        Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool_arc))),
        Arc::new(PaymentPostgres::new(Arc::clone(&db_pool_arc))),
        Arc::new(PlanPostgres::new(Arc::clone(&db_pool_arc))),
        gateway,
        yookassa.return_url.clone(),
        dotenvy_env.payment_polling,
    ));

    let auto_renewal_loop = tokio::spawn(worker_loop::run_auto_renewal_loop(
        auto_renewal_usecase,
        Duration::from_secs(dotenvy_env.auto_renewal.interval_secs),
    ));

    let server_config = Arc::clone(&dotenvy_env);
    let health_server = tokio::spawn(async move { axum_http::http_serve::start(server_config).await });

    tokio::select! {
        result = auto_renewal_loop => result??,
        result = health_server => result??,
    };
    Ok(())
}
