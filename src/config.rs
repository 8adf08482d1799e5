use std::env;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub gateway: GatewayConfig,
    pub rate_limit: RateLimitConfig,
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub frontend_url: String,
    /// Externally reachable base URL of this service. Used to build the
    /// payment gateway's return URLs and webhook callback.
    pub public_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Access token for the payment gateway API. When unset, checkout
    /// creation fails with a precondition error for paid services.
    pub access_token: Option<String>,
    pub api_url: String,
    /// Shared secret for verifying webhook signatures. When unset,
    /// notifications are accepted without signature verification.
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Allowed requests per second (per IP) for booking endpoints
    /// (e.g. POST /api/professionals/:id/reservations)
    pub booking_per_second: u32,
    /// Burst size for booking endpoints
    pub booking_burst: u32,
    /// Allowed requests per second (per IP) for webhook endpoints
    /// (e.g. /webhooks/payments)
    pub webhook_per_second: u32,
    /// Burst size for webhook endpoints
    pub webhook_burst: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    /// Optional endpoint that receives booking event notifications.
    /// Delivery is fire-and-forget; failures are logged, never retried.
    pub webhook_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("PORT".to_string()))?,
                frontend_url: env::var("FRONTEND_URL")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string()),
                public_url: env::var("PUBLIC_URL")
                    .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://data/bookings.db".to_string()),
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
            },
            gateway: GatewayConfig {
                access_token: env::var("GATEWAY_ACCESS_TOKEN").ok(),
                api_url: env::var("GATEWAY_API_URL")
                    .unwrap_or_else(|_| "https://api.mercadopago.com".to_string()),
                webhook_secret: env::var("GATEWAY_WEBHOOK_SECRET").ok(),
            },
            rate_limit: RateLimitConfig {
                booking_per_second: env::var("RATE_LIMIT_BOOKING_PER_SECOND")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
                booking_burst: env::var("RATE_LIMIT_BOOKING_BURST")
                    .unwrap_or_else(|_| "20".to_string())
                    .parse()
                    .unwrap_or(20),
                webhook_per_second: env::var("RATE_LIMIT_WEBHOOKS_PER_SECOND")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
                webhook_burst: env::var("RATE_LIMIT_WEBHOOKS_BURST")
                    .unwrap_or_else(|_| "50".to_string())
                    .parse()
                    .unwrap_or(50),
            },
            notifications: NotificationConfig {
                webhook_url: env::var("NOTIFY_WEBHOOK_URL").ok(),
            },
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                frontend_url: "http://localhost:3000".to_string(),
                public_url: "http://localhost:8080".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://data/bookings.db".to_string(),
                max_connections: 5,
            },
            gateway: GatewayConfig {
                access_token: None,
                api_url: "https://api.mercadopago.com".to_string(),
                webhook_secret: None,
            },
            rate_limit: RateLimitConfig {
                booking_per_second: 5,
                booking_burst: 20,
                webhook_per_second: 10,
                webhook_burst: 50,
            },
            notifications: NotificationConfig { webhook_url: None },
        }
    }
}
