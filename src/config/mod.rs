use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub gateway: GatewayConfig,
    pub webhook: WebhookConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub base_url: String,
    pub access_token: String,
    /// Deadline applied to every outbound gateway call.
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    /// Shared secret for the gateway's HMAC signature. Verification is
    /// refused outright when this is empty.
    pub secret: String,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("database.max_connections", 10)?
            .set_default("gateway.timeout_secs", 15)?
            .add_source(config::Environment::default().separator("_").try_parsing(true))
            .build()?;

        // Manual construction due to environment variable naming
        Ok(Config {
            server: ServerConfig {
                host: config.get_string("host").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: config.get_int("port").unwrap_or(8080) as u16,
            },
            database: DatabaseConfig {
                url: config.get_string("database.url")?,
                max_connections: config.get_int("database.max_connections").unwrap_or(10) as u32,
            },
            gateway: GatewayConfig {
                base_url: config
                    .get_string("gateway.base.url")
                    .unwrap_or_else(|_| "https://api.mercadopago.com".to_string()),
                access_token: config.get_string("gateway.access.token")?,
                timeout_secs: config.get_int("gateway.timeout.secs").unwrap_or(15) as u64,
            },
            webhook: WebhookConfig {
                secret: config.get_string("webhook.secret")?,
            },
        })
    }
}

pub type SharedConfig = Arc<Config>;
