use std::sync::Arc;

use route_session::api;
use route_session::client::HttpRouteService;
use route_session::config::{Config, LogFormat};
use route_session::engine::controller::RouteSessionController;
use route_session::engine::poller::run_poll_loop;
use route_session::error::AppError;
use route_session::location;
use route_session::state::AppState;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false);
    match config.log_format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Compact => subscriber.compact().init(),
    }

    let state = Arc::new(AppState::new(config.event_buffer_size));
    let service = HttpRouteService::new(
        config.api_base_url.clone(),
        config.api_token.clone(),
        config.request_timeout,
    )?;
    let controller = Arc::new(RouteSessionController::new(
        state.clone(),
        Arc::new(service),
        location::provider_for(config.device_location),
    ));

    if let Some(transporter_id) = &config.transporter_id {
        state.set_transporter_id(Some(transporter_id.clone())).await;
    }

    tokio::spawn(run_poll_loop(controller.clone(), config.poll_interval));

    let app = api::rest::router(controller);

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(
        http_port = config.http_port,
        api_base_url = %config.api_base_url,
        "route session service started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
