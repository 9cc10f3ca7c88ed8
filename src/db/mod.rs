pub mod comment;
pub mod memory;
pub mod ticket;
pub mod user;

use std::{error::Error as StdError, num::TryFromIntError, sync::Arc};

use derive_more::{Display, From};
use tokio::task;
use tokio_postgres::{error::SqlState, NoTls};

use crate::config;

pub use self::{
    comment::{Comment, Comments},
    memory::Memory,
    ticket::{Attachment, Ticket, Tickets},
    user::{User, Users},
};

/// Everything the services need from persistent storage.
pub trait Database: Users + Tickets + Comments + Send + Sync {}

impl<T: Users + Tickets + Comments + Send + Sync> Database for T {}

#[derive(Debug, Display, From)]
pub enum Error {
    #[from]
    Postgres(tokio_postgres::Error),
    #[from]
    OutOfRange(TryFromIntError),
    #[display("unique constraint violated")]
    UniqueViolation,
    #[display("referenced row does not exist")]
    ForeignKeyViolation,
}

impl StdError for Error {}

impl Error {
    /// Whether the store refused a write because of a unique constraint.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Postgres(e) => e.code() == Some(&SqlState::UNIQUE_VIOLATION),
            Self::UniqueViolation => true,
            Self::OutOfRange(_) | Self::ForeignKeyViolation => false,
        }
    }
}

/// Opens the configured database. For PostgreSQL the connection is driven
/// by a background task.
pub async fn open(config: config::Db) -> Result<Arc<dyn Database>, Error> {
    match config {
        config::Db::Postgres { url } => {
            let (client, connection) = tokio_postgres::connect(&url, NoTls).await?;
            task::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::error!(error = %e, "database connection failed");
                }
            });
            Ok(Arc::new(Client(client)))
        }
        config::Db::Memory => Ok(Arc::new(Memory::default())),
    }
}

pub struct Client(tokio_postgres::Client);
