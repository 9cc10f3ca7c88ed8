use axum::{
    extract::{multipart::MultipartRejection, Multipart, Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::{
    api::{self, Envelope},
    auth::Claims,
    service::{
        ticket::{self, Pagination},
        Error,
    },
};

use super::{form::TicketForm, SharedAppState};

#[derive(Deserialize)]
pub struct ListQuery {
    page: Option<String>,
    size: Option<String>,
    status: Option<String>,
}

pub async fn list(
    State(state): State<SharedAppState>,
    Query(ListQuery { page, size, status }): Query<ListQuery>,
) -> Result<Json<Envelope<api::ticket::List>>, Error> {
    let number = |raw: Option<String>| raw?.trim().parse::<i64>().ok();
    let pagination = Pagination::new(number(page), number(size));
    let filter = ticket::parse_filter(status.as_deref())?;

    let list = ticket::list(&*state.db, filter, pagination).await?;

    Ok(Json(Envelope::ok(list)))
}

pub async fn create(
    State(state): State<SharedAppState>,
    claims: Option<Claims>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Envelope<api::ticket::Created>>, Error> {
    let submission = TicketForm::read(multipart).await?.into_submission();

    let ticket = ticket::create(
        &*state.db,
        &*state.attachments,
        claims.as_ref().map(|c| c.username.as_str()),
        submission,
    )
    .await?;

    Ok(Json(Envelope::ok(api::ticket::Created { ticket })))
}

pub async fn detail(
    State(state): State<SharedAppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<api::Data<api::ticket::Detail>>>, Error> {
    let id = ticket::parse_id(&id)?;
    let detail = ticket::detail(&*state.db, id).await?;
    Ok(Json(Envelope::ok(api::Data { data: detail })))
}

pub async fn update(
    State(state): State<SharedAppState>,
    claims: Option<Claims>,
    Path(id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Envelope<api::Data<api::ticket::Detail>>>, Error> {
    let id = ticket::parse_id(&id)?;
    let form = TicketForm::read(multipart).await?;
    let deleted = form.deleted_attachments();

    let detail = ticket::update(
        &*state.db,
        &*state.attachments,
        id,
        claims.as_ref().map(|c| c.username.as_str()),
        form.into_submission(),
        deleted,
    )
    .await?;

    Ok(Json(Envelope::ok(api::Data { data: detail })))
}
