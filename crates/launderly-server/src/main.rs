mod config;

use std::sync::Arc;

use axum::http::{Method, header::{AUTHORIZATION, CONTENT_TYPE}};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use launderly_api::auth::hash_password;
use launderly_api::{AppStateInner, router};
use launderly_db::{Database, NewUser};
use launderly_types::Role;

use crate::config::{AdminSeed, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "launderly=debug,launderly_api=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = Arc::new(Database::open(&config.db_path)?);
    if let Some(seed) = &config.admin {
        bootstrap_admin(&db, seed)?;
    }

    let state = AppStateInner::new(
        db,
        config.jwt_secret.clone(),
        chrono::Duration::hours(config.token_ttl_hours),
    );

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(false);

    let app = router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    info!("Launderly server listening on {}", config.addr);
    info!("Tokens expire after {} hours", config.token_ttl_hours);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Creates the configured admin account unless the email already exists.
fn bootstrap_admin(db: &Database, seed: &AdminSeed) -> anyhow::Result<()> {
    if let Some(existing) = db.get_user_by_email(&seed.email)? {
        if existing.user.role != Role::Admin {
            tracing::warn!(
                "Bootstrap admin {} already exists as {}; leaving it unchanged",
                seed.email,
                existing.user.role
            );
        }
        return Ok(());
    }

    let user = db.create_user(&NewUser {
        id: Uuid::new_v4(),
        email: seed.email.clone(),
        password_hash: hash_password(&seed.password)?,
        name: "Administrator".into(),
        role: Role::Admin,
        hostel_id: None,
        room_number: None,
        phone: None,
    })?;
    info!("Bootstrap admin {} created ({})", user.email, user.id);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
