use axum::{
    extract::{Path, State},
    http::header::CONTENT_TYPE,
    response::{IntoResponse as _, Response},
};

use crate::service::Error;

use super::SharedAppState;

/// Serves a stored attachment with a content type guessed from its key.
pub async fn download(
    State(state): State<SharedAppState>,
    Path(key): Path<String>,
) -> Result<Response, Error> {
    let bytes = state
        .attachments
        .read(&key)
        .await?
        .ok_or_else(|| Error::not_found("file not found"))?;
    let mime = mime_guess::from_path(&key).first_or_octet_stream();

    Ok(([(CONTENT_TYPE, mime.essence_str().to_owned())], bytes).into_response())
}
