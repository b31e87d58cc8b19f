use crate::{
    auth::AuthState,
    axum_http::{default_routers, routers},
    config::config_model::DotEnvyConfig,
};
use anyhow::{Context, Result};
use axum::{
    Extension, Router,
    http::{
        HeaderValue, Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::get,
};
use crates::{
    infra::{
        db::{
            postgres::postgres_connection::PgPoolSquad,
            repositories::{
                devices::DevicePostgres, subscriptions::SubscriptionPostgres, users::UserPostgres,
            },
        },
        upstream::http_client::UpstreamHttpClient,
    },
    payments::yookassa_client::YooKassaClient,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};

pub async fn start(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Result<()> {
    let app = app(Arc::clone(&config), db_pool)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.backend_server.port));
    let listener = TcpListener::bind(addr).await?;

    info!("Server is running on port {}", config.backend_server.port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

pub fn app(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Result<Router> {
    let upstream = Arc::new(UpstreamHttpClient::new(Duration::from_secs(
        config.playlist.fetch_timeout_secs,
    ))?);
    let gateway = Arc::new(YooKassaClient::with_api_base(
        config.yookassa.shop_id.clone(),
        config.yookassa.secret_key.clone(),
        config.yookassa.api_base.clone(),
    ));

    let auth_state = Arc::new(AuthState {
        jwt_secret: config.jwt.secret.clone(),
        users: Arc::new(UserPostgres::new(Arc::clone(&db_pool))),
        devices: Arc::new(DevicePostgres::new(Arc::clone(&db_pool))),
        subscriptions: Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool))),
    });

    let router = Router::new()
        .fallback(default_routers::not_found)
        .nest(
            "/api/auth",
            routers::auth::routes(Arc::clone(&db_pool), Arc::clone(&config)),
        )
        .nest("/api/users", routers::users::routes(Arc::clone(&db_pool)))
        .nest(
            "/api/channels",
            routers::channels::routes(Arc::clone(&db_pool)),
        )
        .nest(
            "/api/playlist",
            routers::playlist::routes(Arc::clone(&db_pool), Arc::clone(&config), upstream),
        )
        .nest(
            "/api/subscriptions",
            routers::subscriptions::routes(Arc::clone(&db_pool)),
        )
        .nest(
            "/api/yookassa",
            routers::yookassa::routes(Arc::clone(&db_pool), Arc::clone(&config), gateway),
        )
        .nest("/api/admin", routers::admin::routes(Arc::clone(&db_pool)))
        .route("/api/health-check", get(default_routers::health_check))
        .layer(Extension(auth_state))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.backend_server.timeout,
        )))
        .layer(RequestBodyLimitLayer::new(
            (config.backend_server.body_limit * 1024 * 1024).try_into()?,
        ))
        .layer(cors_layer(&config)?)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}

fn cors_layer(config: &DotEnvyConfig) -> Result<CorsLayer> {
    let origin = match config.cors.allowed_origin.as_deref() {
        Some(origin) => AllowOrigin::exact(
            HeaderValue::from_str(origin).context("CORS_ORIGIN is not a valid header value")?,
        ),
        None => AllowOrigin::from(Any),
    };

    Ok(CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::PUT,
            Method::DELETE,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_origin(origin))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = ?err, "failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = ?err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
