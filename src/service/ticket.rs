//! Listing, submission, detail and editing of tickets.

use std::collections::HashMap;

use futures::{future::OptionFuture, FutureExt as _};
use itertools::Itertools as _;

use crate::{
    api,
    db::{
        self,
        ticket::{AttachmentId, Fields, NewAttachment, Status},
        Database,
    },
    storage::AttachmentStore,
};

use super::Error;

/// Page of a ticket list, always within bounds.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Pagination {
    pub page: usize,
    pub size: usize,
}

impl Pagination {
    pub const DEFAULT_SIZE: usize = 10;
    pub const MAX_SIZE: usize = 50;

    /// Clamps the page to at least 1 and the size into `1..=MAX_SIZE`.
    /// Missing values take the defaults.
    pub fn new(page: Option<i64>, size: Option<i64>) -> Self {
        let page = page.unwrap_or(1).max(1);
        let size = size
            .unwrap_or(Self::DEFAULT_SIZE as i64)
            .clamp(1, Self::MAX_SIZE as i64);
        Self {
            page: usize::try_from(page).unwrap_or(usize::MAX),
            size: size as usize,
        }
    }

    pub fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.size)
    }
}

/// Reads a list filter: `ALL` or nothing selects every ticket.
pub fn parse_filter(raw: Option<&str>) -> Result<Option<Status>, Error> {
    match raw.map(str::trim) {
        None | Some("") | Some("ALL") => Ok(None),
        Some(code) => code
            .parse()
            .map(Some)
            .map_err(|_| Error::Validation(format!("unknown status {code}"))),
    }
}

pub fn parse_id(raw: &str) -> Result<api::ticket::Id, Error> {
    api::ticket::Id::parse(raw).ok_or_else(|| Error::validation("invalid id"))
}

/// File received with a submission, not stored yet.
#[derive(Clone, Debug)]
pub struct Upload {
    pub name: String,
    pub mimetype: String,
    pub bytes: Vec<u8>,
}

/// Ticket form as submitted on creation or edit, already trimmed.
#[derive(Clone, Debug, Default)]
pub struct Submission {
    pub title: String,
    pub category: String,
    pub content: String,
    pub status: String,

    /// Username of the assignee, empty for none.
    pub assignee: String,

    /// Files already stored by the client.
    pub attachments: Vec<NewAttachment>,

    /// Files to store before the ticket is written.
    pub files: Vec<Upload>,
}

impl Submission {
    fn validate(&self) -> Result<(), Error> {
        if self.title.is_empty() {
            return Err(Error::validation("title required"));
        }
        if self.category.is_empty() {
            return Err(Error::validation("category required"));
        }
        if self.content.is_empty() {
            return Err(Error::validation("content required"));
        }
        Ok(())
    }
}

pub async fn list(
    db: &dyn Database,
    filter: Option<Status>,
    pagination: Pagination,
) -> Result<api::ticket::List, Error> {
    let page_fut =
        db.get_tickets_page(filter, pagination.offset(), pagination.size);
    let total_fut = db.get_tickets_count(filter);
    let summary_fut = db.get_tickets_count_by_status();
    let (page, total, counts) =
        tokio::try_join!(page_fut, total_fut, summary_fut)?;

    let mut summary = api::ticket::Summary::default();
    for (status, count) in counts {
        *summary.get_mut(status) = count;
    }

    let user_ids = page
        .iter()
        .map(|ticket| ticket.author)
        .chain(page.iter().filter_map(|ticket| ticket.assignee))
        .unique()
        .collect::<Vec<_>>();
    let users = db.get_users_by_ids(&user_ids).await?;

    let items = page
        .into_iter()
        .map(|ticket| project(ticket, &users, api::user::Author::new))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(api::ticket::List {
        items,
        page: pagination.page,
        size: pagination.size,
        total,
        summary,
    })
}

pub async fn create(
    db: &dyn Database,
    store: &dyn AttachmentStore,
    author: Option<&str>,
    submission: Submission,
) -> Result<api::ticket::Detail, Error> {
    submission.validate()?;
    let author = author
        .filter(|username| !username.is_empty())
        .ok_or_else(|| Error::unauthorized("login required"))?;
    let author = db
        .get_user_by_username(author)
        .await?
        .ok_or_else(|| Error::not_found("author not found"))?;

    let fields = fields(db, &submission).await?;
    let attachments = store_files(store, submission).await?;

    let id = db.insert_ticket(author.id, &fields, &attachments).await?;
    tracing::info!(
        ticket = %id,
        author = %author.username,
        attachments = attachments.len(),
        "ticket created"
    );

    let ticket = db
        .get_ticket_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("ticket not found"))?;
    assemble(db, ticket, false).await
}

/// Ticket with attachments and comments. Counts as a view.
pub async fn detail(
    db: &dyn Database,
    id: api::ticket::Id,
) -> Result<api::ticket::Detail, Error> {
    // A lost view must never fail the read.
    if let Err(e) = db.increment_ticket_views(id).await {
        tracing::warn!(ticket = %id, error = ?e, "failed to count ticket view");
    }

    let ticket = db
        .get_ticket_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("ticket not found"))?;
    assemble(db, ticket, true).await
}

/// Overwrites the ticket fields and applies both attachment deltas.
///
/// Any logged in user may edit any ticket.
pub async fn update(
    db: &dyn Database,
    store: &dyn AttachmentStore,
    id: api::ticket::Id,
    editor: Option<&str>,
    submission: Submission,
    deleted: Vec<AttachmentId>,
) -> Result<api::ticket::Detail, Error> {
    submission.validate()?;
    let editor = editor
        .filter(|username| !username.is_empty())
        .ok_or_else(|| Error::unauthorized("login required"))?;
    if db.get_ticket_by_id(id).await?.is_none() {
        return Err(Error::not_found("ticket not found"));
    }

    let fields = fields(db, &submission).await?;
    let created = store_files(store, submission).await?;

    if !db.update_ticket(id, &fields, &deleted, &created).await? {
        return Err(Error::not_found("ticket not found"));
    }
    tracing::info!(
        ticket = %id,
        editor,
        deleted = deleted.len(),
        created = created.len(),
        "ticket updated"
    );

    let ticket = db
        .get_ticket_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("ticket not found"))?;
    assemble(db, ticket, false).await
}

/// Resolves the assignee and normalizes the status.
async fn fields(
    db: &dyn Database,
    submission: &Submission,
) -> Result<Fields, Error> {
    let assignee = if submission.assignee.is_empty() {
        None
    } else {
        let user = db
            .get_user_by_username(&submission.assignee)
            .await?
            .ok_or_else(|| Error::not_found("assignee not found"))?;
        Some(user.id)
    };
    Ok(Fields {
        title: submission.title.clone(),
        category: submission.category.clone(),
        content: submission.content.clone(),
        status: Status::normalize(&submission.status),
        assignee,
    })
}

/// Uploads the submitted files once all of them pass the store's checks.
/// The result lists the client supplied descriptors first, then the freshly
/// stored files in submission order.
async fn store_files(
    store: &dyn AttachmentStore,
    submission: Submission,
) -> Result<Vec<NewAttachment>, Error> {
    for file in &submission.files {
        store.check(&file.mimetype, file.bytes.len())?;
    }

    let mut attachments = submission.attachments;
    for file in submission.files {
        let size = i64::try_from(file.bytes.len())
            .map_err(|_| Error::validation("file too large"))?;
        let url = store.upload(&file.name, &file.mimetype, file.bytes).await?;
        attachments.push(NewAttachment {
            name: file.name,
            url,
            size,
            mimetype: file.mimetype,
        });
    }
    Ok(attachments)
}

fn project(
    ticket: db::Ticket,
    users: &HashMap<api::user::Id, db::User>,
    author: fn(&db::User) -> api::user::Author,
) -> Result<api::Ticket, Error> {
    let user =
        |id: api::user::Id| users.get(&id).ok_or(Error::MissingUser(id));
    Ok(api::Ticket {
        id: ticket.id,
        title: ticket.title,
        category: ticket.category,
        content: ticket.content,
        status: ticket.status,
        views: ticket.views,
        created_at: ticket.created_at,
        author: author(user(ticket.author)?),
        assignee: ticket
            .assignee
            .map(|id| user(id).map(api::user::Author::new))
            .transpose()?,
    })
}

async fn assemble(
    db: &dyn Database,
    ticket: db::Ticket,
    with_comments: bool,
) -> Result<api::ticket::Detail, Error> {
    let attachments_fut = db.get_attachments_by_ticket(ticket.id);
    let comments_fut = OptionFuture::from(
        with_comments.then(|| db.get_comments_by_ticket(ticket.id)),
    )
    .map(Option::transpose);
    let (attachments, comments) =
        tokio::try_join!(attachments_fut, comments_fut)?;

    let user_ids = std::iter::once(ticket.author)
        .chain(ticket.assignee)
        .chain(comments.iter().flatten().map(|c| c.author))
        .unique()
        .collect::<Vec<_>>();
    let users = db.get_users_by_ids(&user_ids).await?;

    let comments = comments
        .map(|comments| {
            comments
                .into_iter()
                .map(|c| {
                    let author = users
                        .get(&c.author)
                        .ok_or(Error::MissingUser(c.author))?;
                    Ok::<_, Error>(api::Comment {
                        id: c.id,
                        ticket_id: c.ticket,
                        content: c.content,
                        created_at: c.created_at,
                        author: api::user::Author::new(author),
                    })
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?;

    Ok(api::ticket::Detail {
        ticket: project(ticket, &users, api::user::Author::with_phone)?,
        attachments: attachments
            .into_iter()
            .map(|a| api::ticket::Attachment {
                id: a.id,
                ticket_id: a.ticket,
                name: a.name,
                url: a.url,
                size: a.size,
                mimetype: a.mimetype,
                created_at: a.created_at,
            })
            .collect(),
        comments,
    })
}
