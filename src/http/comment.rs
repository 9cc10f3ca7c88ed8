use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::Deserialize;

use crate::{
    api::{self, Envelope},
    auth::Claims,
    service::{comment, Error},
};

use super::SharedAppState;

#[derive(Deserialize)]
pub struct AddInput {
    #[serde(default)]
    content: String,
}

pub async fn add(
    State(state): State<SharedAppState>,
    claims: Option<Claims>,
    Path(ticket_id): Path<String>,
    input: Result<Json<AddInput>, JsonRejection>,
) -> Result<Json<Envelope<api::Data<api::Comment>>>, Error> {
    let Json(AddInput { content }) =
        input.map_err(|e| Error::Validation(e.body_text()))?;

    let comment = comment::add(
        &*state.db,
        &ticket_id,
        claims.as_ref().map(|c| c.username.as_str()),
        &content,
    )
    .await?;

    Ok(Json(Envelope::ok(api::Data { data: comment })))
}
