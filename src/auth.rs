use std::time::Duration;

use argon2::{
    password_hash::{
        self, PasswordHash as Phc, PasswordHasher, PasswordVerifier,
        SaltString,
    },
    Argon2,
};
use async_trait::async_trait;
use derive_more::{Display, From};
use jsonwebtoken::{
    decode, encode, DecodingKey, EncodingKey, Header, Validation,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::task;

use crate::{api, db::user::PasswordHash};

#[derive(Debug, Display, From)]
pub enum CredentialError {
    #[from]
    Hash(password_hash::Error),
    #[display("hashing task failed: {_0}")]
    #[from]
    Blocking(task::JoinError),
}

impl std::error::Error for CredentialError {}

/// Turns secrets into stored hashes and checks secrets against them.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn hash(
        &self,
        secret: &str,
    ) -> Result<PasswordHash, CredentialError>;

    async fn verify(
        &self,
        secret: &str,
        hash: &PasswordHash,
    ) -> Result<bool, CredentialError>;
}

/// Argon2 with default parameters. Both operations run on the blocking
/// pool.
#[derive(Clone, Copy, Debug, Default)]
pub struct Argon2Verifier;

#[async_trait]
impl CredentialVerifier for Argon2Verifier {
    async fn hash(
        &self,
        secret: &str,
    ) -> Result<PasswordHash, CredentialError> {
        let secret = secret.to_owned();
        let phc = task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            Argon2::default()
                .hash_password(secret.as_bytes(), &salt)
                .map(|phc| phc.to_string())
        })
        .await??;
        Ok(PasswordHash::from_phc(phc))
    }

    async fn verify(
        &self,
        secret: &str,
        hash: &PasswordHash,
    ) -> Result<bool, CredentialError> {
        let secret = secret.to_owned();
        let hash = hash.as_str().to_owned();
        let verified = task::spawn_blocking(move || {
            let Ok(parsed) = Phc::new(&hash) else {
                return false;
            };
            Argon2::default()
                .verify_password(secret.as_bytes(), &parsed)
                .is_ok()
        })
        .await?;
        Ok(verified)
    }
}

/// 8 to 16 characters with at least one ASCII letter, one digit and one
/// character that is neither.
pub fn is_strong_password(password: &str) -> bool {
    let len = password.chars().count();
    (8..=16).contains(&len)
        && password.chars().any(|c| c.is_ascii_alphabetic())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| !c.is_ascii_alphanumeric())
}

/// Payload of a session token.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Claims {
    pub user_id: api::user::Id,
    pub username: String,
    pub exp: i64,
}

/// Issues and checks signed session tokens.
pub struct Tokens {
    expiration_time: Duration,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl Tokens {
    pub fn new(secret: &str, expiration_time: Duration) -> Self {
        Self {
            expiration_time,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn issue(
        &self,
        user_id: api::user::Id,
        username: &str,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let expires_at = OffsetDateTime::now_utc() + self.expiration_time;
        encode(
            &Header::default(),
            &Claims {
                user_id,
                username: username.to_owned(),
                exp: expires_at.unix_timestamp(),
            },
            &self.encoding_key,
        )
    }

    pub fn verify(&self, token: &str) -> Option<Claims> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .ok()
            .map(|data| data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_policy() {
        assert!(is_strong_password("abcd123!"));
        assert!(is_strong_password("Pa$$w0rd12345678"));
        assert!(!is_strong_password("ab1!"));
        assert!(!is_strong_password("Pa$$w0rd123456789"));
        assert!(!is_strong_password("password123"));
        assert!(!is_strong_password("password!!"));
        assert!(!is_strong_password("12345678!"));
        assert!(!is_strong_password(""));
    }

    #[tokio::test]
    async fn verifies_hashed_secret() {
        let verifier = Argon2Verifier;
        let hash = verifier.hash("s3cret!pw").await.unwrap();
        assert_ne!(hash.as_str(), "s3cret!pw");
        assert!(verifier.verify("s3cret!pw", &hash).await.unwrap());
        assert!(!verifier.verify("s3cret!pW", &hash).await.unwrap());
        let plain = PasswordHash::from_phc("s3cret!pw".to_owned());
        assert!(!verifier.verify("s3cret!pw", &plain).await.unwrap());
    }

    #[tokio::test]
    async fn hashing_leaves_the_runtime_thread_free() {
        let verifier = Argon2Verifier;

        // Single-threaded runtime: this only runs while hashing yields.
        let other = tokio::spawn(async {});
        let hash = verifier.hash("s3cret!pw").await.unwrap();
        assert!(other.is_finished());

        let other = tokio::spawn(async {});
        assert!(verifier.verify("s3cret!pw", &hash).await.unwrap());
        assert!(other.is_finished());
    }

    #[test]
    fn tokens_round_trip_and_reject_foreign_signatures() {
        let tokens = Tokens::new("secret", Duration::from_secs(60));
        let token = tokens.issue(api::user::Id::from(7), "alice").unwrap();

        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims.user_id, api::user::Id::from(7));
        assert_eq!(claims.username, "alice");

        let other = Tokens::new("other", Duration::from_secs(60));
        assert!(other.verify(&token).is_none());
        assert!(tokens.verify("garbage").is_none());
    }
}
