use axum::{
    extract::{rejection::JsonRejection, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use crate::{
    api::{self, Envelope},
    auth::Claims,
    service::{user, Error},
};

use super::{describe, SharedAppState};

#[derive(Deserialize)]
pub struct LoginInput {
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
}

pub async fn login(
    State(state): State<SharedAppState>,
    input: Result<Json<LoginInput>, JsonRejection>,
) -> Result<Json<api::user::LoggedIn>, LoginError> {
    let Json(LoginInput {
        username,
        email,
        password,
    }) = input.map_err(|e| Error::Validation(e.body_text()))?;

    let (user, token) = user::login(
        &*state.db,
        &*state.credentials,
        &state.tokens,
        user::Credentials {
            username,
            email,
            password,
        },
    )
    .await?;

    Ok(Json(api::user::LoggedIn {
        success: true,
        user,
        token,
    }))
}

/// Login keeps its own `{ success, message }` failure shape.
#[derive(Debug)]
pub struct LoginError(Error);

impl From<Error> for LoginError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for LoginError {
    fn into_response(self) -> Response {
        let (status, message) = describe(self.0);
        let body = api::user::LoginFailure {
            success: false,
            message,
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Deserialize)]
pub struct RegisterInput {
    username: Option<String>,
    email: Option<String>,
    name: Option<String>,
    phone: Option<String>,
    password: Option<String>,
    department: Option<String>,
    position: Option<String>,
}

pub async fn register(
    State(state): State<SharedAppState>,
    input: Result<Json<RegisterInput>, JsonRejection>,
) -> Result<Json<Envelope<api::user::Registered>>, Error> {
    let Json(input) = input.map_err(|e| Error::Validation(e.body_text()))?;

    let user_id = user::register(
        &*state.db,
        &*state.credentials,
        user::Registration {
            username: input.username,
            email: input.email,
            name: input.name,
            phone: input.phone,
            password: input.password,
            department: input.department,
            position: input.position,
        },
    )
    .await?;

    Ok(Json(Envelope::ok(api::user::Registered { user_id })))
}

#[derive(Deserialize)]
pub struct ProfileQuery {
    id: Option<String>,
}

pub async fn profile(
    State(state): State<SharedAppState>,
    Query(ProfileQuery { id }): Query<ProfileQuery>,
) -> Result<Json<Envelope<api::user::Profile>>, Error> {
    let user =
        user::profile(&*state.db, id.as_deref().unwrap_or_default()).await?;
    Ok(Json(Envelope::ok(api::user::Profile { user })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileInput {
    name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    department: Option<String>,
    position: Option<String>,
    current_password: Option<String>,
    new_password: Option<String>,
}

pub async fn update_profile(
    State(state): State<SharedAppState>,
    claims: Claims,
    input: Result<Json<ProfileInput>, JsonRejection>,
) -> Result<Json<Envelope<api::user::Profile>>, Error> {
    let Json(input) = input.map_err(|e| Error::Validation(e.body_text()))?;

    let user = user::update_profile(
        &*state.db,
        &*state.credentials,
        claims.user_id,
        user::ProfileChanges {
            name: input.name,
            email: input.email,
            phone: input.phone,
            department: input.department,
            position: input.position,
            current_password: input.current_password,
            new_password: input.new_password,
        },
    )
    .await?;

    Ok(Json(Envelope::ok(api::user::Profile { user })))
}
