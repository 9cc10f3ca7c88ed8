use serde::{Deserialize, Serialize};

use crate::db;

pub use crate::db::user::Id;

/// Profile of a user.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct User {
    pub id: Id,
    pub username: String,
    pub email: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
}

impl From<&db::User> for User {
    fn from(user: &db::User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            phone: user.phone.clone(),
            department: user.department.clone(),
            position: user.position.clone(),
        }
    }
}

/// What a client keeps about the logged in user.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Account {
    pub id: Id,
    pub username: String,
    pub email: String,
    pub name: Option<String>,
    pub phone: Option<String>,
}

impl From<&db::User> for Account {
    fn from(user: &db::User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            phone: user.phone.clone(),
        }
    }
}

/// User as shown next to tickets and comments.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Author {
    pub username: String,
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl Author {
    pub fn new(user: &db::User) -> Self {
        Self {
            username: user.username.clone(),
            name: user.name.clone(),
            phone: None,
        }
    }

    pub fn with_phone(user: &db::User) -> Self {
        Self {
            phone: user.phone.clone(),
            ..Self::new(user)
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LoggedIn {
    pub success: bool,
    pub user: Account,
    pub token: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LoginFailure {
    pub success: bool,
    pub message: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registered {
    pub user_id: Id,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Profile {
    pub user: User,
}
