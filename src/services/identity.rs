//! Collaborator interfaces owned by the external identity/profile
//! subsystem: credential verification and user-directory lookups.

use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::UserSummary;

/// The authenticated principal behind a bearer credential.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: String,
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Resolve a bearer credential to an identity, or fail with
    /// `AppError::Unauthorized` for invalid/expired credentials.
    async fn verify(&self, credential: &str) -> Result<Identity, AppError>;
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[allow(dead_code)]
    exp: i64,
    #[serde(default)]
    role: String,
}

/// RS256 JWT validation against the identity service's public key.
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn from_rsa_pem(pem: &str) -> Result<Self, AppError> {
        let decoding_key = DecodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| AppError::Config(format!("invalid JWT public key: {e}")))?;
        Ok(Self {
            decoding_key,
            validation: Validation::new(Algorithm::RS256),
        })
    }
}

#[async_trait]
impl IdentityVerifier for JwtVerifier {
    async fn verify(&self, credential: &str) -> Result<Identity, AppError> {
        let data = decode::<Claims>(credential, &self.decoding_key, &self.validation)
            .map_err(|_| AppError::Unauthorized)?;
        let user_id = Uuid::parse_str(&data.claims.sub).map_err(|_| AppError::Unauthorized)?;
        Ok(Identity {
            user_id,
            role: data.claims.role,
        })
    }
}

/// Fixed token -> identity map. Stands in for the identity service in local
/// development and in the integration tests.
#[derive(Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, Identity>,
}

impl StaticTokenVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, token: impl Into<String>, user_id: Uuid, role: &str) {
        self.tokens.insert(
            token.into(),
            Identity {
                user_id,
                role: role.to_string(),
            },
        );
    }
}

#[async_trait]
impl IdentityVerifier for StaticTokenVerifier {
    async fn verify(&self, credential: &str) -> Result<Identity, AppError> {
        self.tokens
            .get(credential)
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn exists(&self, user_id: Uuid) -> Result<bool, AppError>;
    async fn summary(&self, user_id: Uuid) -> Result<Option<UserSummary>, AppError>;
}

/// Directory lookups against the replicated `users` table.
pub struct PgUserDirectory {
    db: PgPool,
}

impl PgUserDirectory {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn exists(&self, user_id: Uuid) -> Result<bool, AppError> {
        let rec = sqlx::query("SELECT 1 FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(rec.is_some())
    }

    async fn summary(&self, user_id: Uuid) -> Result<Option<UserSummary>, AppError> {
        let row = sqlx::query("SELECT id, display_name, avatar_url FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(|r| UserSummary {
            id: r.get("id"),
            display_name: r.get("display_name"),
            avatar_url: r.get("avatar_url"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_verifier_rejects_unknown_token() {
        let mut verifier = StaticTokenVerifier::new();
        let user = Uuid::new_v4();
        verifier.insert("good-token", user, "mentor");

        let id = verifier.verify("good-token").await.unwrap();
        assert_eq!(id.user_id, user);
        assert_eq!(id.role, "mentor");

        let err = verifier.verify("bad-token").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
    }

    #[tokio::test]
    async fn jwt_verifier_rejects_garbage() {
        // 512-bit test key is fine here; we only check the rejection path.
        let pem = "-----BEGIN PUBLIC KEY-----\nMFwwDQYJKoZIhvcNAQEBBQADSwAwSAJBAKj34GkxFhD90vcNLYLInFEX6Ppy1tPf\n9Cnzj4p4WGeKLs1Pt8QuKUpRKfFLfRYC9AIKjbJTWit+CqvjWYzvQwECAwEAAQ==\n-----END PUBLIC KEY-----\n";
        let verifier = JwtVerifier::from_rsa_pem(pem).unwrap();
        let err = verifier.verify("not.a.jwt").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
    }
}
