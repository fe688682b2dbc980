use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::Request,
    http::Method,
    middleware,
    response::{IntoResponse, Response},
};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::Span;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use retouch::models::config::AppConfig;
use retouch::models::error::AppError;
use retouch::services::generative::GenerativeService;
use retouch::{AppState, handlers};

async fn request_id_middleware(request: Request<Body>, next: axum::middleware::Next) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert("X-Request-Id", request_id.parse().unwrap());
    response
}

/// Last-resort boundary: a panicking handler becomes a generic 500, with the
/// panic payload kept server-side.
fn handle_panic(err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(%detail, "handler panicked");
    AppError::Internal(detail).into_response()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    handlers::health::init_start_time();

    let config = Arc::new(config);
    let generative = GenerativeService::new(config.clone());

    let state = Arc::new(AppState {
        config: config.clone(),
        generative,
    });

    // Only the designated web origin is answered; everything else is
    // rejected by the CORS layer before handler logic runs.
    let allowed_origin: axum::http::HeaderValue = config.allowed_origin.parse()?;
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
            )
        })
        .on_response(
            |response: &Response, latency: std::time::Duration, _span: &Span| {
                tracing::info!(
                    status = response.status().as_u16(),
                    latency_ms = latency.as_millis() as u64,
                    "response",
                );
            },
        );

    let app = Router::new()
        .route("/api/process", axum::routing::post(handlers::process::process_edit))
        .route("/api/health", axum::routing::get(handlers::health::health_check))
        .route("/api/version", axum::routing::get(handlers::health::version))
        .layer(axum::extract::DefaultBodyLimit::max(config.max_body_bytes as usize))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(trace_layer)
        .layer(cors)
        .with_state(state);

    let addr = config.listen_addr.clone();
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C handler");
    tracing::info!("Shutdown signal received, draining connections...");
}
