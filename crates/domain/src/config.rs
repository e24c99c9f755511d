//! Configuration management

use serde::{Deserialize, Serialize};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub google: GoogleConfig,
    pub webhook: WebhookConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Public base URL used to build webhook callback and redirect URIs.
    pub public_url: String,
    pub login_url: String,
    pub dashboard_url: String,
}

/// Google Calendar provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    pub client_id: String,
    #[serde(skip_serializing, default)]
    pub client_secret: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub api_base: String,
    pub scopes: Vec<String>,
}

/// Webhook ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Optional shared secret; when set, POST notifications must carry it.
    #[serde(skip_serializing, default)]
    pub shared_secret: Option<String>,
    /// Cron expression for the periodic reconciliation poll.
    pub poll_cron: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig { path: "amity.db".to_string(), pool_size: 8 },
            server: ServerConfig {
                bind_addr: "127.0.0.1:8080".to_string(),
                public_url: "http://localhost:8080".to_string(),
                login_url: "http://localhost:8080/login".to_string(),
                dashboard_url: "http://localhost:8080/dashboard".to_string(),
            },
            google: GoogleConfig {
                client_id: String::new(),
                client_secret: String::new(),
                authorization_endpoint: "https://accounts.google.com/o/oauth2/v2/auth"
                    .to_string(),
                token_endpoint: "https://oauth2.googleapis.com/token".to_string(),
                api_base: "https://www.googleapis.com/calendar/v3".to_string(),
                scopes: vec![
                    "https://www.googleapis.com/auth/calendar.readonly".to_string(),
                    "openid".to_string(),
                    "email".to_string(),
                ],
            },
            webhook: WebhookConfig {
                shared_secret: None,
                poll_cron: "0 */15 * * * *".to_string(), // every 15 minutes
            },
        }
    }
}
