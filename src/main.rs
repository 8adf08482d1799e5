use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
mod middleware;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use axum::body::Body;
use http::{HeaderValue, StatusCode};
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::SmartIpKeyExtractor;
use tower_governor::{GovernorError, GovernorLayer};

mod config;
mod db;
mod error;
mod routes;
mod services;

use config::Config;
use services::{init, notifications::NotificationService, payments::PaymentGateway};

pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub config: Config,
    /// `None` when no gateway access token is configured; paid services
    /// then fail with a precondition error instead of a broken checkout.
    pub gateway: Option<PaymentGateway>,
    pub notifications: NotificationService,
}

fn rate_limit_error_handler(error: GovernorError) -> http::Response<Body> {
    match error {
        GovernorError::TooManyRequests { wait_time, headers } => {
            // `wait_time` is provided as seconds
            let retry_after = wait_time;

            // Use the same JSON error shape as `AppError -> IntoResponse`
            let body = serde_json::json!({
                "error": {
                    "code": "RATE_LIMITED",
                    "message": "Rate limit exceeded",
                    "details": { "retry_after_seconds": retry_after }
                }
            })
            .to_string();

            let mut resp = http::Response::new(Body::from(body));
            *resp.status_mut() = StatusCode::TOO_MANY_REQUESTS;

            // Ensure clients see JSON
            resp.headers_mut().insert(
                http::header::CONTENT_TYPE,
                http::HeaderValue::from_static("application/json"),
            );

            // Include any headers provided by the governor (e.g., X-RateLimit-* if enabled)
            if let Some(hmap) = headers {
                for (name, value) in hmap.iter() {
                    resp.headers_mut().append(name.clone(), value.clone());
                }
            }

            // Retry-After (seconds)
            resp.headers_mut().insert(
                http::header::RETRY_AFTER,
                http::HeaderValue::from_str(&retry_after.to_string()).unwrap(),
            );

            resp
        }
        GovernorError::UnableToExtractKey => {
            let body = serde_json::json!({
                "error": {
                    "code": "INVALID_REQUEST",
                    "message": "Unable to determine client IP for rate limiting"
                }
            })
            .to_string();

            let mut resp = http::Response::new(Body::from(body));
            *resp.status_mut() = StatusCode::BAD_REQUEST;
            resp.headers_mut().insert(
                http::header::CONTENT_TYPE,
                http::HeaderValue::from_static("application/json"),
            );
            resp
        }
        GovernorError::Other { code, msg, headers } => {
            let body = msg.unwrap_or_else(|| "Rate limiting error".to_string());
            let mut resp = http::Response::new(Body::from(body));
            let status =
                StatusCode::from_u16(code.as_u16()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            *resp.status_mut() = status;
            if let Some(hmap) = headers {
                for (name, value) in hmap.iter() {
                    resp.headers_mut().append(name.clone(), value.clone());
                }
            }
            resp
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "booking_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting Booking Engine");

    // Initialize database
    let pool = init::init_db(&config).await?;

    // Initialize the payment gateway client (optional) and notifications
    let gateway = PaymentGateway::from_config(&config.gateway)
        .map_err(|e| anyhow::anyhow!("Failed to build payment gateway client: {}", e))?;
    if gateway.is_none() {
        tracing::warn!("No GATEWAY_ACCESS_TOKEN configured; paid services are unavailable");
    }
    let notifications = NotificationService::from_config(&config.notifications)
        .map_err(|e| anyhow::anyhow!("Failed to build notification sink: {}", e))?;

    let app_state = Arc::new(AppState {
        db: pool,
        config: config.clone(),
        gateway,
        notifications,
    });

    // Shutdown flag for the rate limiter cleanup threads
    let thread_shutdown = Arc::new(AtomicBool::new(false));

    // Build rate limiters for public endpoints (booking, webhooks).
    // The error handler returns a proper 429 status and Retry-After header
    // when limits are exceeded.
    let mut booking_builder = GovernorConfigBuilder::default();
    booking_builder.per_second(config.rate_limit.booking_per_second.into());
    booking_builder.burst_size(config.rate_limit.booking_burst);
    booking_builder.key_extractor(SmartIpKeyExtractor);
    booking_builder.error_handler(rate_limit_error_handler);

    let booking_gov_conf = Arc::new(
        booking_builder
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Failed to build booking governor config"))?,
    );

    // Background cleanup for booking limiter storage
    let booking_cleaner = {
        let limiter = booking_gov_conf.limiter().clone();
        let interval = Duration::from_secs(60);
        let flag = thread_shutdown.clone();
        std::thread::spawn(move || {
            // Use smaller sleep granularity to allow quick shutdown.
            let tick = Duration::from_secs(1);
            loop {
                for _ in 0..interval.as_secs() {
                    if flag.load(Ordering::SeqCst) {
                        tracing::info!("Booking rate limiter cleanup thread exiting");
                        return;
                    }
                    std::thread::sleep(tick);
                }
                tracing::debug!("booking rate limiter size: {}", limiter.len());
                limiter.retain_recent();
            }
        })
    };

    let booking_rate_layer = GovernorLayer {
        config: booking_gov_conf.clone(),
    };

    // Webhooks limiter
    let mut webhooks_builder = GovernorConfigBuilder::default();
    webhooks_builder.per_second(config.rate_limit.webhook_per_second.into());
    webhooks_builder.burst_size(config.rate_limit.webhook_burst);
    webhooks_builder.key_extractor(SmartIpKeyExtractor);
    webhooks_builder.error_handler(rate_limit_error_handler);

    let webhooks_gov_conf = Arc::new(
        webhooks_builder
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Failed to build webhooks governor config"))?,
    );

    // Background cleanup for webhooks limiter storage
    let webhooks_cleaner = {
        let limiter = webhooks_gov_conf.limiter().clone();
        let interval = Duration::from_secs(60);
        let flag = thread_shutdown.clone();
        std::thread::spawn(move || {
            let tick = Duration::from_secs(1);
            loop {
                for _ in 0..interval.as_secs() {
                    if flag.load(Ordering::SeqCst) {
                        tracing::info!("Webhooks rate limiter cleanup thread exiting");
                        return;
                    }
                    std::thread::sleep(tick);
                }
                tracing::debug!("webhooks rate limiter size: {}", limiter.len());
                limiter.retain_recent();
            }
        })
    };

    let webhooks_rate_layer = GovernorLayer {
        config: webhooks_gov_conf.clone(),
    };

    // Build router
    let app = Router::new()
        // Health check
        .route("/health", get(routes::health::health_check))
        // Professional-facing setup and client-facing booking endpoints.
        // Reservation creation is the write-heavy public surface and gets
        // the rate limiter.
        .nest(
            "/api/professionals",
            routes::professionals::router()
                .merge(routes::profile::router())
                .merge(routes::availability::router())
                .merge(routes::reservations::router().layer(booking_rate_layer)),
        )
        // Payment gateway webhooks (apply rate limiting)
        .nest(
            "/webhooks",
            routes::webhooks::router().layer(webhooks_rate_layer),
        )
        // Add shared state
        .with_state(app_state.clone())
        // Defensive response headers
        .layer(axum::middleware::from_fn(
            middleware::security_headers::security_headers_middleware,
        ))
        // Add middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(
                    config
                        .server
                        .frontend_url
                        .parse::<HeaderValue>()
                        .expect("Invalid FRONTEND_URL for CORS"),
                )
                .allow_methods([
                    http::Method::GET,
                    http::Method::POST,
                    http::Method::PUT,
                    http::Method::DELETE,
                    http::Method::OPTIONS,
                    http::Method::PATCH,
                ])
                .allow_headers([http::header::CONTENT_TYPE, http::header::ACCEPT]),
        );

    // Start server
    let host = config.server.host.clone();
    let port = config.server.port;
    let addr = format!("{}:{}", host, port);

    tracing::info!("Server listening on {}", addr);

    // Start server using axum `serve` helper. We also spawn a signal
    // listener and select between the server future and the signal future.
    // When a shutdown signal is received the cleanup threads are notified
    // and the server future is dropped (which stops accepting new
    // connections).
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let server_fut = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    );

    let thread_shutdown_clone = thread_shutdown.clone();

    let signal_fut = async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            let mut term =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("Failed to bind SIGTERM");
            tokio::select! {
                _ = ctrl_c => {},
                _ = term.recv() => {},
            }
        }

        #[cfg(not(unix))]
        {
            ctrl_c.await.expect("Failed to bind Ctrl+C");
        }

        tracing::info!("Shutdown signal received, notifying cleanup threads");
        thread_shutdown_clone.store(true, Ordering::SeqCst);
    };

    tokio::select! {
        res = server_fut => {
            if let Err(e) = res {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = signal_fut => {
            tracing::info!("Signal handler completed; server future dropped to stop accepting new connections");
        }
    }

    // Join std threads; they check `thread_shutdown` and should exit quickly.
    thread_shutdown.store(true, Ordering::SeqCst);
    if let Err(e) = booking_cleaner.join() {
        tracing::warn!("Booking cleanup thread join failed: {:?}", e);
    }
    if let Err(e) = webhooks_cleaner.join() {
        tracing::warn!("Webhooks cleanup thread join failed: {:?}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
