use std::error::Error as StdError;

use async_trait::async_trait;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio_postgres::{
    types::{
        accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql,
        Type,
    },
    Row,
};

use super::{ticket, user, Client, Error};

#[derive(Clone, Debug)]
pub struct Comment {
    pub id: Id,
    pub ticket: ticket::Id,
    pub author: user::Id,
    pub content: String,
    pub created_at: OffsetDateTime,
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

#[async_trait]
pub trait Comments {
    /// Appends a comment. The ticket is not looked up beforehand.
    async fn insert_comment(
        &self,
        ticket: ticket::Id,
        author: user::Id,
        content: &str,
    ) -> Result<Comment, Error>;

    /// Comments of the ticket in ascending id order.
    async fn get_comments_by_ticket(
        &self,
        ticket: ticket::Id,
    ) -> Result<Vec<Comment>, Error>;
}

fn from_row(row: &Row) -> Comment {
    Comment {
        id: row.get("id"),
        ticket: row.get("ticket_id"),
        author: row.get("author_id"),
        content: row.get("content"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl Comments for Client {
    async fn insert_comment(
        &self,
        ticket: ticket::Id,
        author: user::Id,
        content: &str,
    ) -> Result<Comment, Error> {
        const SQL: &str = "\
            INSERT INTO comments (ticket_id, author_id, content) \
            VALUES ($1, $2, $3) \
            RETURNING id, ticket_id, author_id, content, created_at";
        let row = self.0.query_one(SQL, &[&ticket, &author, &content]).await?;
        Ok(from_row(&row))
    }

    async fn get_comments_by_ticket(
        &self,
        ticket: ticket::Id,
    ) -> Result<Vec<Comment>, Error> {
        const SQL: &str = "\
            SELECT id, ticket_id, author_id, content, created_at \
            FROM comments \
            WHERE ticket_id = $1 \
            ORDER BY id ASC";
        Ok(self
            .0
            .query(SQL, &[&ticket])
            .await?
            .iter()
            .map(from_row)
            .collect())
    }
}
