//! Business rules between the HTTP handlers and the stores.

pub mod comment;
pub mod ticket;
pub mod user;

use derive_more::From;

use crate::{api, auth, db, storage};

#[derive(Debug, From)]
pub enum Error {
    /// Missing or malformed input.
    Validation(String),

    /// No authenticated user accompanies the request.
    Unauthorized(String),

    NotFound(String),

    /// Unique username or email already taken.
    Conflict(String),

    #[from]
    Db(db::Error),

    Storage(opendal::Error),

    #[from]
    Credentials(auth::CredentialError),

    #[from]
    Token(jsonwebtoken::errors::Error),

    /// A row references a user that does not exist.
    MissingUser(api::user::Id),
}

impl Error {
    pub(crate) fn validation(message: &str) -> Self {
        Self::Validation(message.to_owned())
    }

    pub(crate) fn unauthorized(message: &str) -> Self {
        Self::Unauthorized(message.to_owned())
    }

    pub(crate) fn not_found(message: &str) -> Self {
        Self::NotFound(message.to_owned())
    }

    pub(crate) fn conflict(message: &str) -> Self {
        Self::Conflict(message.to_owned())
    }
}

impl From<storage::Error> for Error {
    fn from(e: storage::Error) -> Self {
        match e {
            storage::Error::Backend(e) => Self::Storage(e),
            storage::Error::TooLarge { limit, .. } => {
                Self::Validation(format!("file is larger than {limit} bytes"))
            }
            storage::Error::ContentType(mimetype) => {
                Self::Validation(format!("file type {mimetype} is not allowed"))
            }
        }
    }
}

/// Trims the value and drops it if nothing is left.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}
