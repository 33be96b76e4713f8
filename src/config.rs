use dotenvy::dotenv;
use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// PEM-encoded RSA public key used to validate bearer tokens.
    pub jwt_public_key_pem: Option<String>,
    /// Handshake authentication deadline for realtime connections.
    pub ws_auth_timeout_secs: u64,
    /// Base URL prefixed to synthesized attachment storage paths.
    pub uploads_base_url: String,
    pub max_attachments_per_message: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| AppError::Config("DATABASE_URL missing".into()))?;
        let port = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);

        let jwt_public_key_pem = match env::var("JWT_PUBLIC_KEY_PEM") {
            Ok(pem) => Some(pem),
            Err(_) => match env::var("JWT_PUBLIC_KEY_FILE") {
                Ok(path) => Some(std::fs::read_to_string(&path).map_err(|e| {
                    AppError::Config(format!("read jwt pubkey file {path}: {e}"))
                })?),
                Err(_) => None,
            },
        };

        let ws_auth_timeout_secs = env::var("WS_AUTH_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);

        let uploads_base_url =
            env::var("UPLOADS_BASE_URL").unwrap_or_else(|_| "/uploads".into());

        let max_attachments_per_message = env::var("MAX_ATTACHMENTS_PER_MESSAGE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);

        Ok(Self {
            database_url,
            port,
            jwt_public_key_pem,
            ws_auth_timeout_secs,
            uploads_base_url,
            max_attachments_per_message,
        })
    }

    pub fn test_defaults() -> Self {
        Self {
            database_url: "postgres://localhost/test".into(),
            port: 3000,
            jwt_public_key_pem: None,
            ws_auth_timeout_secs: 5,
            uploads_base_url: "/uploads".into(),
            max_attachments_per_message: 5,
        }
    }
}
