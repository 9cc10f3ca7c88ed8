//! HTTP surface: routing, shared state and the error envelope.

mod auth;
mod comment;
mod file;
mod form;
mod ticket;

use std::{sync::Arc, time::Instant};

use async_trait::async_trait;
use axum::{
    extract::{DefaultBodyLimit, FromRequestParts, Request},
    http::{
        header::{InvalidHeaderValue, AUTHORIZATION, CONTENT_TYPE},
        request,
        HeaderValue, Method, StatusCode,
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, RequestPartsExt as _, Router,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use tower_http::cors::CorsLayer;

use crate::{
    api,
    auth::{Claims, CredentialVerifier, Tokens},
    config,
    db::Database,
    service::Error,
    storage::AttachmentStore,
};

pub struct AppState {
    pub db: Arc<dyn Database>,

    pub attachments: Arc<dyn AttachmentStore>,

    pub credentials: Arc<dyn CredentialVerifier>,

    pub tokens: Tokens,
}

pub type SharedAppState = Arc<AppState>;

pub fn router(
    state: AppState,
    config: &config::Http,
) -> Result<Router, InvalidHeaderValue> {
    let origins = config
        .cors
        .allowed_origins
        .iter()
        .map(|origin| origin.parse::<HeaderValue>())
        .collect::<Result<Vec<_>, _>>()?;
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_origin(origins);

    Ok(Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/register", post(auth::register))
        .route(
            "/auth/profile",
            get(auth::profile).put(auth::update_profile),
        )
        .route("/tickets", get(ticket::list).post(ticket::create))
        .route("/tickets/:id", get(ticket::detail).put(ticket::update))
        .route("/tickets/:id/comments", post(comment::add))
        .route("/files/:key", get(file::download))
        .layer(DefaultBodyLimit::max(config.server.body_limit))
        .layer(middleware::from_fn(log_request))
        .layer(cors)
        .with_state(Arc::new(state)))
}

async fn log_request(req: Request, next: Next) -> Response {
    if req.method() == Method::OPTIONS {
        return next.run(req).await;
    }

    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let started = Instant::now();
    let res = next.run(req).await;
    tracing::info!(
        %method,
        path = %path,
        status = res.status().as_u16(),
        elapsed = ?started.elapsed(),
        "request handled"
    );
    res
}

/// Status code and client-facing message of an error. Internal failures
/// are logged here and hidden from the client.
fn describe(error: Error) -> (StatusCode, String) {
    use Error as E;

    match error {
        E::Validation(m) => (StatusCode::BAD_REQUEST, m),
        E::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m),
        E::NotFound(m) => (StatusCode::NOT_FOUND, m),
        E::Conflict(m) => (StatusCode::CONFLICT, m),
        e @ (E::Db(_)
        | E::Storage(_)
        | E::Credentials(_)
        | E::Token(_)
        | E::MissingUser(_)) => {
            tracing::error!(error = ?e, "request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_owned(),
            )
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, message) = describe(self);
        (status, Json(api::Envelope::failure(message))).into_response()
    }
}

#[async_trait]
impl FromRequestParts<SharedAppState> for Claims {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut request::Parts,
        state: &SharedAppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| Error::unauthorized("login required"))?;
        state
            .tokens
            .verify(bearer.token())
            .ok_or_else(|| Error::unauthorized("invalid token"))
    }
}
