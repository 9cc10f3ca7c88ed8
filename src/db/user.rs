use std::{collections::HashMap, error::Error as StdError};

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

use super::{Client, Error};

#[derive(Clone, Debug)]
pub struct User {
    pub id: Id,
    pub username: String,
    pub email: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub password_hash: PasswordHash,
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Debug)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub password_hash: PasswordHash,
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

/// Argon2 hash of a password in PHC string format.
#[derive(Clone, Debug, PartialEq)]
pub struct PasswordHash(String);

impl PasswordHash {
    pub fn from_phc(phc: String) -> Self {
        Self(phc)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromSql<'_> for PasswordHash {
    accepts!(TEXT);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        String::from_sql(ty, raw).map(Self)
    }
}

impl ToSql for PasswordHash {
    accepts!(TEXT);

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
pub trait Users {
    async fn get_user_by_id(&self, id: Id) -> Result<Option<User>, Error>;

    async fn get_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<User>, Error>;

    async fn get_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<User>, Error>;

    /// Looks a user up by username or email, preferring a username match.
    async fn get_user_by_login(
        &self,
        login: &str,
    ) -> Result<Option<User>, Error>;

    async fn get_users_by_ids(
        &self,
        ids: &[Id],
    ) -> Result<HashMap<Id, User>, Error>;

    async fn insert_user(&self, user: &NewUser) -> Result<User, Error>;

    async fn write_user(&self, user: &User) -> Result<(), Error>;
}

const COLUMNS: &str = "id, username, email, name, phone, department, \
                       position, password_hash, created_at";

fn from_row(row: &Row) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        name: row.get("name"),
        phone: row.get("phone"),
        department: row.get("department"),
        position: row.get("position"),
        password_hash: row.get("password_hash"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl Users for Client {
    async fn get_user_by_id(&self, id: Id) -> Result<Option<User>, Error> {
        let sql = format!("SELECT {COLUMNS} FROM users WHERE id = $1 LIMIT 1");
        Ok(self.0.query_opt(&sql, &[&id]).await?.as_ref().map(from_row))
    }

    async fn get_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<User>, Error> {
        let sql = format!(
            "SELECT {COLUMNS} FROM users WHERE username = $1 LIMIT 1"
        );
        Ok(self
            .0
            .query_opt(&sql, &[&username])
            .await?
            .as_ref()
            .map(from_row))
    }

    async fn get_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<User>, Error> {
        let sql =
            format!("SELECT {COLUMNS} FROM users WHERE email = $1 LIMIT 1");
        Ok(self.0.query_opt(&sql, &[&email]).await?.as_ref().map(from_row))
    }

    async fn get_user_by_login(
        &self,
        login: &str,
    ) -> Result<Option<User>, Error> {
        let sql = format!(
            "SELECT {COLUMNS} \
             FROM users \
             WHERE username = $1 OR email = $1 \
             ORDER BY (username = $1) DESC \
             LIMIT 1"
        );
        Ok(self.0.query_opt(&sql, &[&login]).await?.as_ref().map(from_row))
    }

    async fn get_users_by_ids(
        &self,
        ids: &[Id],
    ) -> Result<HashMap<Id, User>, Error> {
        let sql = format!(
            "SELECT {COLUMNS} \
             FROM users \
             WHERE id IN (SELECT unnest($1::INT8[]))"
        );
        Ok(self
            .0
            .query(&sql, &[&ids])
            .await?
            .iter()
            .map(|row| {
                let user = from_row(row);
                (user.id, user)
            })
            .collect())
    }

    async fn insert_user(&self, user: &NewUser) -> Result<User, Error> {
        let sql = format!(
            "INSERT INTO users (username, email, name, phone, \
                                department, position, password_hash) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        let row = self
            .0
            .query_one(
                &sql,
                &[
                    &user.username,
                    &user.email,
                    &user.name,
                    &user.phone,
                    &user.department,
                    &user.position,
                    &user.password_hash,
                ],
            )
            .await?;
        Ok(from_row(&row))
    }

    async fn write_user(&self, user: &User) -> Result<(), Error> {
        const SQL: &str = "\
            UPDATE users \
            SET email = $2, \
                name = $3, \
                phone = $4, \
                department = $5, \
                position = $6, \
                password_hash = $7 \
            WHERE id = $1";

        self.0
            .execute(
                SQL,
                &[
                    &user.id,
                    &user.email,
                    &user.name,
                    &user.phone,
                    &user.department,
                    &user.position,
                    &user.password_hash,
                ],
            )
            .await
            .map(drop)
            .map_err(Error::from)
    }
}
