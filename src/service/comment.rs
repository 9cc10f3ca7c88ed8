use crate::{api, db::Database};

use super::{ticket, Error};

/// Appends a comment to the ticket.
///
/// The ticket is not looked up first: a comment racing a ticket removal
/// fails in the store, not here.
pub async fn add(
    db: &dyn Database,
    ticket_id: &str,
    author: Option<&str>,
    content: &str,
) -> Result<api::Comment, Error> {
    let ticket_id = ticket::parse_id(ticket_id)?;
    let content = content.trim();
    if content.is_empty() {
        return Err(Error::validation("content required"));
    }
    let author = author
        .filter(|username| !username.is_empty())
        .ok_or_else(|| Error::unauthorized("login required"))?;
    let author = db
        .get_user_by_username(author)
        .await?
        .ok_or_else(|| Error::not_found("user not found"))?;

    let comment = db.insert_comment(ticket_id, author.id, content).await?;
    tracing::info!(
        ticket = %ticket_id,
        comment = %comment.id,
        author = %author.username,
        "comment added"
    );

    Ok(api::Comment {
        id: comment.id,
        ticket_id: comment.ticket,
        content: comment.content,
        created_at: comment.created_at,
        author: api::user::Author::new(&author),
    })
}
