use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::api::{ticket, user::Author};

pub use crate::db::comment::Id;

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Id,
    pub ticket_id: ticket::Id,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub author: Author,
}
