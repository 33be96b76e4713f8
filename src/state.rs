use crate::{
    config::Config,
    services::identity::{IdentityVerifier, UserDirectory},
    websocket::ChatGateway,
};
use sqlx::{Pool, Postgres};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: Pool<Postgres>,
    pub gateway: ChatGateway,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub users: Arc<dyn UserDirectory>,
    pub config: Arc<Config>,
}
