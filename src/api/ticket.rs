use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::api::{self, user::Author};

pub use crate::db::ticket::{AttachmentId, Id, Status};

/// Ticket as shown in lists.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: Id,
    pub title: String,
    pub category: String,
    pub content: String,
    pub status: Status,
    pub views: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub author: Author,
    pub assignee: Option<Author>,
}

/// Ticket with its attachments and, on the detail page, its comments.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Detail {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<api::Comment>>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: AttachmentId,
    pub ticket_id: Id,
    pub name: String,
    pub url: String,
    pub size: i64,
    pub mimetype: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct List {
    pub items: Vec<Ticket>,
    pub page: usize,
    pub size: usize,
    pub total: usize,
    pub summary: Summary,
}

/// Ticket count per status over all tickets.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Summary {
    pub new: usize,
    pub in_progress: usize,
    pub done: usize,
    pub canceled: usize,
}

impl Summary {
    pub fn get_mut(&mut self, status: Status) -> &mut usize {
        match status {
            Status::New => &mut self.new,
            Status::InProgress => &mut self.in_progress,
            Status::Done => &mut self.done,
            Status::Canceled => &mut self.canceled,
        }
    }

    pub fn total(&self) -> usize {
        self.new + self.in_progress + self.done + self.canceled
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Created {
    pub ticket: Detail,
}
