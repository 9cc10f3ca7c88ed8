use std::{collections::HashMap, error::Error as StdError, str::FromStr};

use async_trait::async_trait;
use derive_more::Display;
use enum_utils::TryFromRepr;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio_postgres::{
    types::{
        accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql,
        Type,
    },
    Row,
};

use super::{user, Client, Error};

#[derive(Clone, Debug)]
pub struct Ticket {
    pub id: Id,
    pub title: String,
    pub category: String,
    pub content: String,
    pub status: Status,
    pub author: user::Id,
    pub assignee: Option<user::Id>,
    pub views: i64,
    pub created_at: OffsetDateTime,
}

/// Ticket fields that are editable after submission.
#[derive(Clone, Debug)]
pub struct Fields {
    pub title: String,
    pub category: String,
    pub content: String,
    pub status: Status,
    pub assignee: Option<user::Id>,
}

#[derive(Clone, Debug)]
pub struct Attachment {
    pub id: AttachmentId,
    pub ticket: Id,
    pub name: String,
    pub url: String,
    pub size: i64,
    pub mimetype: String,
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewAttachment {
    pub name: String,
    pub url: String,
    pub size: i64,
    pub mimetype: String,
}

#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub struct Id(i64);

impl Id {
    /// Parses a positive decimal identifier.
    pub fn parse(raw: &str) -> Option<Self> {
        raw.trim().parse::<i64>().ok().filter(|id| *id > 0).map(Self)
    }
}

impl From<i64> for Id {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl FromSql<'_> for Id {
    accepts!(INT8);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        i64::from_sql(ty, raw).map(Self)
    }
}

impl ToSql for Id {
    accepts!(INT8);

    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        self.0.to_sql(ty, out)
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub struct AttachmentId(i64);

impl From<i64> for AttachmentId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl FromSql<'_> for AttachmentId {
    accepts!(INT8);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        i64::from_sql(ty, raw).map(Self)
    }
}

impl ToSql for AttachmentId {
    accepts!(INT8);

    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        self.0.to_sql(ty, out)
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Eq,
    Hash,
    PartialEq,
    Serialize,
    TryFromRepr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Status {
    /// Just submitted, nobody has picked it up.
    #[default]
    New = 1,

    /// Somebody is working on it.
    InProgress = 2,

    /// Work is finished.
    Done = 3,

    /// Dropped without being finished.
    Canceled = 4,
}

impl Status {
    pub const ALL: [Self; 4] =
        [Self::New, Self::InProgress, Self::Done, Self::Canceled];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::InProgress => "IN_PROGRESS",
            Self::Done => "DONE",
            Self::Canceled => "CANCELED",
        }
    }

    /// Maps a submitted status onto the allow-list. Anything unknown,
    /// including an empty value, becomes [`Status::New`].
    pub fn normalize(raw: &str) -> Self {
        raw.trim().parse().unwrap_or_default()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct UnknownStatus;

impl FromStr for Status {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or(UnknownStatus)
    }
}

impl FromSql<'_> for Status {
    accepts!(INT2);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        let repr = i16::from_sql(ty, raw)?;
        let repr = u8::try_from(repr)?;
        let status = Self::try_from(repr).map_err(|_| "invalid status")?;
        Ok(status)
    }
}

impl ToSql for Status {
    accepts!(INT2);

    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        let repr = i16::from((*self) as u8);
        repr.to_sql(ty, out)
    }
}

#[async_trait]
pub trait Tickets {
    /// Newest tickets first, optionally restricted to one status.
    async fn get_tickets_page(
        &self,
        status: Option<Status>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Ticket>, Error>;

    async fn get_tickets_count(
        &self,
        status: Option<Status>,
    ) -> Result<usize, Error>;

    /// Number of tickets per status over the whole table. Rows carrying a
    /// status outside of [`Status::ALL`] are skipped.
    async fn get_tickets_count_by_status(
        &self,
    ) -> Result<HashMap<Status, usize>, Error>;

    async fn get_ticket_by_id(&self, id: Id) -> Result<Option<Ticket>, Error>;

    /// Inserts the ticket together with its attachments atomically.
    async fn insert_ticket(
        &self,
        author: user::Id,
        fields: &Fields,
        attachments: &[NewAttachment],
    ) -> Result<Id, Error>;

    /// Overwrites the editable fields, removes the listed attachments of
    /// this ticket and adds the new ones, atomically. A removal never
    /// touches an attachment created by the same call.
    ///
    /// Returns `false` if there is no such ticket.
    async fn update_ticket(
        &self,
        id: Id,
        fields: &Fields,
        deleted: &[AttachmentId],
        created: &[NewAttachment],
    ) -> Result<bool, Error>;

    async fn increment_ticket_views(&self, id: Id) -> Result<(), Error>;

    /// Attachments of the ticket in ascending id order.
    async fn get_attachments_by_ticket(
        &self,
        id: Id,
    ) -> Result<Vec<Attachment>, Error>;
}

const COLUMNS: &str = "id, title, category, content, status, author_id, \
                       assignee_id, views, created_at";

fn from_row(row: &Row) -> Ticket {
    Ticket {
        id: row.get("id"),
        title: row.get("title"),
        category: row.get("category"),
        content: row.get("content"),
        status: row.get("status"),
        author: row.get("author_id"),
        assignee: row.get("assignee_id"),
        views: row.get("views"),
        created_at: row.get("created_at"),
    }
}

/// Splits attachments into the column arrays consumed by `UNNEST`.
fn columns(
    attachments: &[NewAttachment],
) -> (Vec<&str>, Vec<&str>, Vec<i64>, Vec<&str>) {
    let mut names = Vec::with_capacity(attachments.len());
    let mut urls = Vec::with_capacity(attachments.len());
    let mut sizes = Vec::with_capacity(attachments.len());
    let mut mimetypes = Vec::with_capacity(attachments.len());
    for a in attachments {
        names.push(a.name.as_str());
        urls.push(a.url.as_str());
        sizes.push(a.size);
        mimetypes.push(a.mimetype.as_str());
    }
    (names, urls, sizes, mimetypes)
}

#[async_trait]
impl Tickets for Client {
    async fn get_tickets_page(
        &self,
        status: Option<Status>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Ticket>, Error> {
        // Past the last row either way.
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM tickets \
             WHERE ($1::INT2 IS NULL OR status = $1) \
             ORDER BY id DESC \
             OFFSET $2 LIMIT $3"
        );
        Ok(self
            .0
            .query(&sql, &[&status, &offset, &limit])
            .await?
            .iter()
            .map(from_row)
            .collect())
    }

    async fn get_tickets_count(
        &self,
        status: Option<Status>,
    ) -> Result<usize, Error> {
        const SQL: &str = "\
            SELECT COUNT(*) \
            FROM tickets \
            WHERE ($1::INT2 IS NULL OR status = $1)";
        let count = self.0.query_one(SQL, &[&status]).await?.get::<_, i64>(0);
        Ok(usize::try_from(count)?)
    }

    async fn get_tickets_count_by_status(
        &self,
    ) -> Result<HashMap<Status, usize>, Error> {
        const SQL: &str = "\
            SELECT status, COUNT(*) AS count \
            FROM tickets \
            GROUP BY status";

        let mut summary = HashMap::new();
        for row in self.0.query(SQL, &[]).await? {
            let repr = row.get::<_, i16>("status");
            let Some(status) = u8::try_from(repr)
                .ok()
                .and_then(|repr| Status::try_from(repr).ok())
            else {
                continue;
            };
            let count = usize::try_from(row.get::<_, i64>("count"))?;
            summary.insert(status, count);
        }
        Ok(summary)
    }

    async fn get_ticket_by_id(&self, id: Id) -> Result<Option<Ticket>, Error> {
        let sql = format!("SELECT {COLUMNS} FROM tickets WHERE id = $1");
        Ok(self.0.query_opt(&sql, &[&id]).await?.as_ref().map(from_row))
    }

    async fn insert_ticket(
        &self,
        author: user::Id,
        fields: &Fields,
        attachments: &[NewAttachment],
    ) -> Result<Id, Error> {
        const SQL: &str = "\
            WITH ticket AS ( \
                INSERT INTO tickets (title, category, content, status, \
                                     author_id, assignee_id) \
                VALUES ($1, $2, $3, $4, $5, $6) \
                RETURNING id \
            ), attachments AS ( \
                INSERT INTO attachments (ticket_id, name, url, size, mimetype) \
                SELECT ticket.id, a.name, a.url, a.size, a.mimetype \
                FROM ticket, \
                     UNNEST($7::TEXT[], $8::TEXT[], $9::INT8[], $10::TEXT[]) \
                     WITH ORDINALITY AS a(name, url, size, mimetype, n) \
                ORDER BY a.n \
            ) \
            SELECT id FROM ticket";

        let (names, urls, sizes, mimetypes) = columns(attachments);
        let row = self
            .0
            .query_one(
                SQL,
                &[
                    &fields.title,
                    &fields.category,
                    &fields.content,
                    &fields.status,
                    &author,
                    &fields.assignee,
                    &names,
                    &urls,
                    &sizes,
                    &mimetypes,
                ],
            )
            .await?;
        Ok(row.get("id"))
    }

    async fn update_ticket(
        &self,
        id: Id,
        fields: &Fields,
        deleted: &[AttachmentId],
        created: &[NewAttachment],
    ) -> Result<bool, Error> {
        // Sub-statements of one WITH see the same snapshot, so the DELETE
        // cannot observe rows added by the INSERT next to it.
        const SQL: &str = "\
            WITH ticket AS ( \
                UPDATE tickets \
                SET title = $2, \
                    category = $3, \
                    content = $4, \
                    status = $5, \
                    assignee_id = $6 \
                WHERE id = $1 \
                RETURNING id \
            ), deleted AS ( \
                DELETE FROM attachments \
                WHERE ticket_id IN (SELECT id FROM ticket) \
                  AND id = ANY($7::INT8[]) \
            ), created AS ( \
                INSERT INTO attachments (ticket_id, name, url, size, mimetype) \
                SELECT ticket.id, a.name, a.url, a.size, a.mimetype \
                FROM ticket, \
                     UNNEST($8::TEXT[], $9::TEXT[], $10::INT8[], $11::TEXT[]) \
                     WITH ORDINALITY AS a(name, url, size, mimetype, n) \
                ORDER BY a.n \
            ) \
            SELECT id FROM ticket";

        let (names, urls, sizes, mimetypes) = columns(created);
        let row = self
            .0
            .query_opt(
                SQL,
                &[
                    &id,
                    &fields.title,
                    &fields.category,
                    &fields.content,
                    &fields.status,
                    &fields.assignee,
                    &deleted,
                    &names,
                    &urls,
                    &sizes,
                    &mimetypes,
                ],
            )
            .await?;
        Ok(row.is_some())
    }

    async fn increment_ticket_views(&self, id: Id) -> Result<(), Error> {
        const SQL: &str = "UPDATE tickets SET views = views + 1 WHERE id = $1";
        self.0.execute(SQL, &[&id]).await.map(drop).map_err(Error::from)
    }

    async fn get_attachments_by_ticket(
        &self,
        id: Id,
    ) -> Result<Vec<Attachment>, Error> {
        const SQL: &str = "\
            SELECT id, ticket_id, name, url, size, mimetype, created_at \
            FROM attachments \
            WHERE ticket_id = $1 \
            ORDER BY id ASC";
        Ok(self
            .0
            .query(SQL, &[&id])
            .await?
            .into_iter()
            .map(|row| Attachment {
                id: row.get("id"),
                ticket: row.get("ticket_id"),
                name: row.get("name"),
                url: row.get("url"),
                size: row.get("size"),
                mimetype: row.get("mimetype"),
                created_at: row.get("created_at"),
            })
            .collect())
    }
}
