use mentor_messaging::services::identity::{JwtVerifier, PgUserDirectory};
use mentor_messaging::websocket::ChatGateway;
use mentor_messaging::{config, db, error, logging, routes, state::AppState};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    logging::init_tracing();
    let cfg = Arc::new(config::Config::from_env()?);

    let db = db::init_pool(&cfg.database_url)
        .await
        .map_err(|e| error::AppError::StartServer(format!("db: {e}")))?;

    // Schema must be in sync before serving; a failed migration is fatal.
    db::MIGRATOR
        .run(&db)
        .await
        .map_err(|e| error::AppError::StartServer(format!("database migrations failed: {e}")))?;

    let pem = cfg
        .jwt_public_key_pem
        .as_deref()
        .ok_or_else(|| error::AppError::Config("JWT_PUBLIC_KEY_PEM or JWT_PUBLIC_KEY_FILE missing".into()))?;
    let verifier = Arc::new(JwtVerifier::from_rsa_pem(pem)?);
    let users = Arc::new(PgUserDirectory::new(db.clone()));

    // The gateway is built once here and handed to the services through
    // AppState; nothing reaches for a global registry.
    let gateway = ChatGateway::new();

    let state = AppState {
        db,
        gateway,
        verifier,
        users,
        config: cfg.clone(),
    };

    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    tracing::info!(%bind_addr, "starting mentor-messaging");

    let app = routes::build_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| error::AppError::StartServer(e.to_string()))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| error::AppError::StartServer(e.to_string()))?;

    Ok(())
}
