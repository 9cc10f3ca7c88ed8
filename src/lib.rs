pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod http;
pub mod service;
pub mod storage;

use std::{error::Error, sync::Arc};

use axum::Router;

pub use self::config::Config;

/// Wires the configured stores into the HTTP router.
pub async fn app(config: Config) -> Result<Router, Box<dyn Error>> {
    let db = db::open(config.db).await?;
    let attachments = storage::Blobs::new(config.attachments)?;

    let state = http::AppState {
        db,
        attachments: Arc::new(attachments),
        credentials: Arc::new(auth::Argon2Verifier),
        tokens: auth::Tokens::new(
            &config.jwt.secret,
            config.jwt.expiration_time,
        ),
    };

    Ok(http::router(state, &config.http)?)
}
