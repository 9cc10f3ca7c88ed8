//! In-process storage with the same observable semantics as the PostgreSQL
//! schema. Backs the test suite and `kind = "memory"` deployments.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use super::{
    comment::{self, Comment, Comments},
    ticket::{
        self, Attachment, AttachmentId, Fields, NewAttachment, Status, Ticket,
        Tickets,
    },
    user::{self, NewUser, User, Users},
    Error,
};

#[derive(Default)]
pub struct Memory(RwLock<Tables>);

#[derive(Default)]
struct Tables {
    users: BTreeMap<user::Id, User>,
    tickets: BTreeMap<ticket::Id, Ticket>,
    attachments: BTreeMap<AttachmentId, Attachment>,
    comments: BTreeMap<comment::Id, Comment>,
    sequences: Sequences,
}

#[derive(Default)]
struct Sequences {
    users: i64,
    tickets: i64,
    attachments: i64,
    comments: i64,
}

fn next(sequence: &mut i64) -> i64 {
    *sequence += 1;
    *sequence
}

impl Tables {
    fn attach(&mut self, ticket: ticket::Id, attachments: &[NewAttachment]) {
        for a in attachments {
            let id = AttachmentId::from(next(&mut self.sequences.attachments));
            self.attachments.insert(
                id,
                Attachment {
                    id,
                    ticket,
                    name: a.name.clone(),
                    url: a.url.clone(),
                    size: a.size,
                    mimetype: a.mimetype.clone(),
                    created_at: OffsetDateTime::now_utc(),
                },
            );
        }
    }
}

#[async_trait]
impl Users for Memory {
    async fn get_user_by_id(&self, id: user::Id) -> Result<Option<User>, Error> {
        Ok(self.0.read().await.users.get(&id).cloned())
    }

    async fn get_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<User>, Error> {
        Ok(self
            .0
            .read()
            .await
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn get_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<User>, Error> {
        Ok(self
            .0
            .read()
            .await
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn get_user_by_login(
        &self,
        login: &str,
    ) -> Result<Option<User>, Error> {
        let tables = self.0.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.username == login)
            .or_else(|| tables.users.values().find(|u| u.email == login))
            .cloned())
    }

    async fn get_users_by_ids(
        &self,
        ids: &[user::Id],
    ) -> Result<HashMap<user::Id, User>, Error> {
        let tables = self.0.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.users.get(id))
            .map(|u| (u.id, u.clone()))
            .collect())
    }

    async fn insert_user(&self, new: &NewUser) -> Result<User, Error> {
        let mut tables = self.0.write().await;
        if tables
            .users
            .values()
            .any(|u| u.username == new.username || u.email == new.email)
        {
            return Err(Error::UniqueViolation);
        }

        let user = User {
            id: user::Id::from(next(&mut tables.sequences.users)),
            username: new.username.clone(),
            email: new.email.clone(),
            name: new.name.clone(),
            phone: new.phone.clone(),
            department: new.department.clone(),
            position: new.position.clone(),
            password_hash: new.password_hash.clone(),
            created_at: OffsetDateTime::now_utc(),
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn write_user(&self, user: &User) -> Result<(), Error> {
        let mut tables = self.0.write().await;
        if tables
            .users
            .values()
            .any(|u| u.id != user.id && u.email == user.email)
        {
            return Err(Error::UniqueViolation);
        }
        if let Some(stored) = tables.users.get_mut(&user.id) {
            // Username and creation time are immutable.
            stored.email = user.email.clone();
            stored.name = user.name.clone();
            stored.phone = user.phone.clone();
            stored.department = user.department.clone();
            stored.position = user.position.clone();
            stored.password_hash = user.password_hash.clone();
        }
        Ok(())
    }
}

#[async_trait]
impl Tickets for Memory {
    async fn get_tickets_page(
        &self,
        status: Option<Status>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Ticket>, Error> {
        Ok(self
            .0
            .read()
            .await
            .tickets
            .values()
            .rev()
            .filter(|t| status.map_or(true, |s| t.status == s))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_tickets_count(
        &self,
        status: Option<Status>,
    ) -> Result<usize, Error> {
        Ok(self
            .0
            .read()
            .await
            .tickets
            .values()
            .filter(|t| status.map_or(true, |s| t.status == s))
            .count())
    }

    async fn get_tickets_count_by_status(
        &self,
    ) -> Result<HashMap<Status, usize>, Error> {
        let mut summary = HashMap::new();
        for ticket in self.0.read().await.tickets.values() {
            *summary.entry(ticket.status).or_insert(0) += 1;
        }
        Ok(summary)
    }

    async fn get_ticket_by_id(
        &self,
        id: ticket::Id,
    ) -> Result<Option<Ticket>, Error> {
        Ok(self.0.read().await.tickets.get(&id).cloned())
    }

    async fn insert_ticket(
        &self,
        author: user::Id,
        fields: &Fields,
        attachments: &[NewAttachment],
    ) -> Result<ticket::Id, Error> {
        let mut tables = self.0.write().await;
        let id = ticket::Id::from(next(&mut tables.sequences.tickets));
        tables.tickets.insert(
            id,
            Ticket {
                id,
                title: fields.title.clone(),
                category: fields.category.clone(),
                content: fields.content.clone(),
                status: fields.status,
                author,
                assignee: fields.assignee,
                views: 0,
                created_at: OffsetDateTime::now_utc(),
            },
        );
        tables.attach(id, attachments);
        Ok(id)
    }

    async fn update_ticket(
        &self,
        id: ticket::Id,
        fields: &Fields,
        deleted: &[AttachmentId],
        created: &[NewAttachment],
    ) -> Result<bool, Error> {
        let mut tables = self.0.write().await;
        let Some(ticket) = tables.tickets.get_mut(&id) else {
            return Ok(false);
        };
        ticket.title = fields.title.clone();
        ticket.category = fields.category.clone();
        ticket.content = fields.content.clone();
        ticket.status = fields.status;
        ticket.assignee = fields.assignee;

        tables
            .attachments
            .retain(|aid, a| a.ticket != id || !deleted.contains(aid));
        tables.attach(id, created);
        Ok(true)
    }

    async fn increment_ticket_views(&self, id: ticket::Id) -> Result<(), Error> {
        if let Some(ticket) = self.0.write().await.tickets.get_mut(&id) {
            ticket.views += 1;
        }
        Ok(())
    }

    async fn get_attachments_by_ticket(
        &self,
        id: ticket::Id,
    ) -> Result<Vec<Attachment>, Error> {
        Ok(self
            .0
            .read()
            .await
            .attachments
            .values()
            .filter(|a| a.ticket == id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl Comments for Memory {
    async fn insert_comment(
        &self,
        ticket: ticket::Id,
        author: user::Id,
        content: &str,
    ) -> Result<Comment, Error> {
        let mut tables = self.0.write().await;
        if !tables.tickets.contains_key(&ticket) {
            return Err(Error::ForeignKeyViolation);
        }
        let comment = Comment {
            id: comment::Id::from(next(&mut tables.sequences.comments)),
            ticket,
            author,
            content: content.to_owned(),
            created_at: OffsetDateTime::now_utc(),
        };
        tables.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn get_comments_by_ticket(
        &self,
        ticket: ticket::Id,
    ) -> Result<Vec<Comment>, Error> {
        Ok(self
            .0
            .read()
            .await
            .comments
            .values()
            .filter(|c| c.ticket == ticket)
            .cloned()
            .collect())
    }
}
