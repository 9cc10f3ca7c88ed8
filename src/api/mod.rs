//! Wire types of the HTTP interface.

pub mod comment;
pub mod ticket;
pub mod user;

use serde::{Deserialize, Serialize};

pub use self::{comment::Comment, ticket::Ticket, user::User};

/// Uniform response wrapper: `{ "ok": bool, ...body }`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Envelope<T> {
    pub ok: bool,
    #[serde(flatten)]
    pub body: T,
}

impl<T> Envelope<T> {
    pub fn ok(body: T) -> Self {
        Self { ok: true, body }
    }
}

impl Envelope<Failure> {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            body: Failure {
                message: message.into(),
            },
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Data<T> {
    pub data: T,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Failure {
    pub message: String,
}
