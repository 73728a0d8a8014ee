use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use auth_service::{
    config::Config,
    db::{
        postgres_user_repository::PostgresUserRepository,
        seeder::{seed_roles, seed_super_admin},
        user_repository::UserRepository,
    },
    responses::JsonResponse,
    routes::router,
    state::AppState,
    utils::jwt::JwtKeys,
};
use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    response::IntoResponse,
};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "tls")]
use axum_server::tls_rustls::RustlsConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing()?;

    let config = Arc::new(Config::from_env().context("failed to load configuration")?);
    let jwt_keys = Arc::new(JwtKeys::from_env().context("JWT_SECRET is not usable")?);
    info!(?config, "configuration loaded");

    let pool = establish_connection(&config).await?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("failed to run migrations")?;

    let db = Arc::new(PostgresUserRepository { pool }) as Arc<dyn UserRepository>;
    seed_roles(db.as_ref(), &config.roles).await?;
    seed_super_admin(
        db.as_ref(),
        &config.super_admin_email,
        &config.super_admin_password,
        config.privileged_role(),
    )
    .await?;

    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(config.rate_limit_ms)
            .burst_size(config.rate_limit_burst)
            .use_headers()
            .error_handler(|_err| {
                JsonResponse::too_many_requests(
                    "too many requests, please wait a moment and try again",
                )
                .into_response()
            })
            .finish()
            .context("invalid rate limiter configuration")?,
    );

    // Drop rate-limit entries for clients that have gone quiet.
    let governor_limiter = governor_conf.limiter().clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            governor_limiter.retain_recent();
        }
    });

    let state = AppState {
        db,
        config: config.clone(),
        jwt_keys,
    };

    let mut app = router(state)
        .layer(TraceLayer::new_for_http())
        .layer(GovernorLayer {
            config: governor_conf,
        });

    if let Some(origin) = &config.cors_allowed_origin {
        let origin = origin
            .parse::<HeaderValue>()
            .context("CORS_ALLOWED_ORIGIN is not a valid header value")?;
        app = app.layer(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::PATCH,
                    Method::DELETE,
                ])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE]),
        );
    }

    // The governor keys on the peer address, so connect info is required.
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    let addr = SocketAddr::new(config.server_host, config.server_port);

    #[cfg(feature = "tls")]
    {
        let cert = std::env::var("DEV_CERT_LOCATION").context("DEV_CERT_LOCATION must be set")?;
        let key = std::env::var("DEV_KEY_LOCATION").context("DEV_KEY_LOCATION must be set")?;
        let tls_config = RustlsConfig::from_pem_file(cert, key)
            .await
            .context("failed to load TLS certs")?;

        info!(%addr, "listening with TLS");
        axum_server::bind_rustls(addr, tls_config)
            .serve(make_service)
            .await
            .context("server error")?;
    }

    #[cfg(not(feature = "tls"))]
    {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        info!(%addr, "listening");
        axum::serve(listener, make_service)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("server error")?;
    }

    Ok(())
}

/// `RUST_LOG` selects the filter (default `info`); `LOG_FORMAT=json` emits JSON lines.
fn init_tracing() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

async fn establish_connection(config: &Config) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to the database")?;

    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .context("failed to verify database connection")?;

    info!(max_connections = config.db_max_connections, "connected to the database");
    Ok(pool)
}

#[cfg(not(feature = "tls"))]
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
