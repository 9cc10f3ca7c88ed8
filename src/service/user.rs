//! Accounts: login, registration and profile maintenance.

use crate::{
    api,
    auth::{self, CredentialVerifier, Tokens},
    db::{self, user::NewUser, Database},
};

use super::{non_empty, Error};

const WEAK_PASSWORD: &str = "password must be 8 to 16 characters long and \
                             contain a letter, a digit and a symbol";

#[derive(Clone, Debug, Default)]
pub struct Credentials {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

pub async fn login(
    db: &dyn Database,
    verifier: &dyn CredentialVerifier,
    tokens: &Tokens,
    credentials: Credentials,
) -> Result<(api::user::Account, String), Error> {
    let login =
        non_empty(credentials.username).or(non_empty(credentials.email));
    let password = credentials.password.filter(|p| !p.is_empty());
    let (Some(login), Some(password)) = (login, password) else {
        return Err(Error::validation(
            "username or email and password are required",
        ));
    };

    let user = match db.get_user_by_login(&login).await? {
        Some(user)
            if verifier.verify(&password, &user.password_hash).await? =>
        {
            user
        }
        _ => return Err(Error::validation("invalid username or password")),
    };

    let token = tokens.issue(user.id, &user.username)?;
    tracing::info!(user = %user.username, "logged in");

    Ok((api::user::Account::from(&user), token))
}

#[derive(Clone, Debug, Default)]
pub struct Registration {
    pub username: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
}

pub async fn register(
    db: &dyn Database,
    verifier: &dyn CredentialVerifier,
    registration: Registration,
) -> Result<api::user::Id, Error> {
    let (Some(username), Some(email)) = (
        non_empty(registration.username),
        non_empty(registration.email),
    ) else {
        return Err(Error::validation("username and email are required"));
    };
    let password = registration.password.unwrap_or_default();
    if !auth::is_strong_password(&password) {
        return Err(Error::validation(WEAK_PASSWORD));
    }

    if db.get_user_by_username(&username).await?.is_some()
        || db.get_user_by_email(&email).await?.is_some()
    {
        return Err(Error::conflict("username or email already in use"));
    }

    let password_hash = verifier.hash(&password).await?;
    let user = db
        .insert_user(&NewUser {
            username,
            email,
            name: non_empty(registration.name),
            phone: non_empty(registration.phone),
            department: non_empty(registration.department),
            position: non_empty(registration.position),
            password_hash,
        })
        .await
        .map_err(conflict_on_unique)?;
    tracing::info!(user = %user.username, id = %user.id, "user registered");

    Ok(user.id)
}

pub async fn profile(db: &dyn Database, id: &str) -> Result<api::User, Error> {
    let id = api::user::Id::parse(id)
        .ok_or_else(|| Error::validation("invalid id"))?;
    let user = db
        .get_user_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("user not found"))?;
    Ok(api::User::from(&user))
}

/// Profile edit. Absent fields stay as they are, blank optional fields
/// are cleared.
#[derive(Clone, Debug, Default)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

pub async fn update_profile(
    db: &dyn Database,
    verifier: &dyn CredentialVerifier,
    id: api::user::Id,
    changes: ProfileChanges,
) -> Result<api::User, Error> {
    let mut user = db
        .get_user_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("user not found"))?;

    if let Some(name) = changes.name {
        user.name = non_empty(Some(name));
    }
    if let Some(phone) = changes.phone {
        user.phone = non_empty(Some(phone));
    }
    if let Some(department) = changes.department {
        user.department = non_empty(Some(department));
    }
    if let Some(position) = changes.position {
        user.position = non_empty(Some(position));
    }
    if let Some(email) = changes.email {
        let email = non_empty(Some(email))
            .ok_or_else(|| Error::validation("email required"))?;
        if email != user.email {
            if db.get_user_by_email(&email).await?.is_some() {
                return Err(Error::conflict("email already in use"));
            }
            user.email = email;
        }
    }

    if let Some(new_password) = non_empty(changes.new_password) {
        let current = changes
            .current_password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| Error::validation("current password required"))?;
        if !verifier.verify(&current, &user.password_hash).await? {
            return Err(Error::validation("current password is incorrect"));
        }
        if !auth::is_strong_password(&new_password) {
            return Err(Error::validation(WEAK_PASSWORD));
        }
        user.password_hash = verifier.hash(&new_password).await?;
    }

    db.write_user(&user).await.map_err(conflict_on_unique)?;
    tracing::info!(user = %user.username, "profile updated");

    Ok(api::User::from(&user))
}

fn conflict_on_unique(e: db::Error) -> Error {
    if e.is_unique_violation() {
        Error::conflict("username or email already in use")
    } else {
        Error::Db(e)
    }
}
