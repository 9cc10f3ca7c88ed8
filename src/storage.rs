use std::path::Path;

use async_trait::async_trait;
use derive_more::{Display, From};
use opendal::{
    services::{Fs, Memory, S3},
    ErrorKind, Operator,
};
use uuid::Uuid;

use crate::config;

#[derive(Debug, Display, From)]
pub enum Error {
    #[from]
    Backend(opendal::Error),
    #[display("file of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },
    #[display("content type {_0} is not allowed")]
    ContentType(String),
}

impl std::error::Error for Error {}

/// Durable storage for attachment bytes.
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Whether a file of this type and size would be accepted by
    /// [`upload`](Self::upload).
    fn check(&self, mimetype: &str, size: usize) -> Result<(), Error>;

    /// Stores the file and returns the public URL it is reachable under.
    async fn upload(
        &self,
        name: &str,
        mimetype: &str,
        bytes: Vec<u8>,
    ) -> Result<String, Error>;

    /// Reads a stored object back. `None` if the key is unknown.
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, Error>;
}

/// [`AttachmentStore`] over an `opendal` operator.
pub struct Blobs {
    operator: Operator,
    public_url: String,
    max_size: usize,
    allowed_content_types: Vec<String>,
}

impl Blobs {
    pub fn new(config: config::Attachments) -> Result<Self, Error> {
        let public_url =
            config.storage.public_url().trim_end_matches('/').to_owned();
        let operator = match config.storage {
            config::Storage::Fs { root, .. } => {
                let mut builder = Fs::default();
                builder.root(&root);
                Operator::new(builder)?.finish()
            }
            config::Storage::S3 {
                endpoint,
                region,
                bucket,
                access_key_id,
                secret_access_key,
                ..
            } => {
                let mut builder = S3::default();
                builder
                    .endpoint(&endpoint)
                    .region(&region)
                    .bucket(&bucket)
                    .access_key_id(&access_key_id)
                    .secret_access_key(&secret_access_key);
                Operator::new(builder)?.finish()
            }
            config::Storage::Memory { .. } => {
                Operator::new(Memory::default())?.finish()
            }
        };
        Ok(Self {
            operator,
            public_url,
            max_size: config.max_size,
            allowed_content_types: config.allowed_content_types,
        })
    }
}

#[async_trait]
impl AttachmentStore for Blobs {
    fn check(&self, mimetype: &str, size: usize) -> Result<(), Error> {
        if size > self.max_size {
            return Err(Error::TooLarge {
                size,
                limit: self.max_size,
            });
        }
        if !self
            .allowed_content_types
            .iter()
            .any(|pattern| content_type_matches(pattern, mimetype))
        {
            return Err(Error::ContentType(mimetype.to_owned()));
        }
        Ok(())
    }

    async fn upload(
        &self,
        name: &str,
        mimetype: &str,
        bytes: Vec<u8>,
    ) -> Result<String, Error> {
        self.check(mimetype, bytes.len())?;

        let key = object_key(name);
        self.operator.write(&key, bytes).await?;
        tracing::debug!(%key, name, mimetype, "attachment stored");

        Ok(format!("{}/{key}", self.public_url))
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        if !is_object_key(key) {
            return Ok(None);
        }
        match self.operator.read(key).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Random key keeping the original extension, so that downloads get a
/// sensible content type.
fn object_key(name: &str) -> String {
    let id = Uuid::new_v4();
    match Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= 16
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        }) {
        Some(ext) => format!("{id}.{}", ext.to_ascii_lowercase()),
        None => id.to_string(),
    }
}

fn is_object_key(key: &str) -> bool {
    let (id, ext) = key.split_once('.').unwrap_or((key, ""));
    Uuid::parse_str(id).is_ok()
        && ext.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Matches a MIME type against an exact type or a `type/*` pattern.
fn content_type_matches(pattern: &str, mimetype: &str) -> bool {
    let mimetype = mimetype.split(';').next().unwrap_or("").trim();
    match pattern.strip_suffix("/*") {
        Some(kind) => mimetype.split_once('/').is_some_and(|(k, sub)| {
            k.eq_ignore_ascii_case(kind) && !sub.is_empty()
        }),
        None => pattern.eq_ignore_ascii_case(mimetype),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs(max_size: usize) -> Blobs {
        Blobs::new(config::Attachments {
            storage: config::Storage::Memory {
                public_url: "http://localhost/files/".to_owned(),
            },
            max_size,
            allowed_content_types: vec![
                "image/*".to_owned(),
                "application/pdf".to_owned(),
            ],
        })
        .unwrap()
    }

    #[test]
    fn matches_content_types() {
        assert!(content_type_matches("image/*", "image/png"));
        assert!(content_type_matches("image/*", "IMAGE/jpeg"));
        assert!(!content_type_matches("image/*", "image/"));
        assert!(!content_type_matches("image/*", "text/plain"));
        assert!(content_type_matches("application/pdf", "application/pdf"));
        assert!(content_type_matches(
            "application/pdf",
            "application/pdf; charset=binary"
        ));
        assert!(!content_type_matches("application/pdf", "application/zip"));
    }

    #[test]
    fn keys_keep_simple_extensions_only() {
        assert!(object_key("report.PDF").ends_with(".pdf"));
        assert!(!object_key("archive.tar.g z").contains('.'));
        assert!(!object_key("noext").contains('.'));
        assert!(is_object_key(&object_key("photo.png")));
        assert!(!is_object_key("../etc/passwd"));
        assert!(!is_object_key("not-a-uuid.png"));
    }

    #[tokio::test]
    async fn stores_and_reads_back() {
        let blobs = blobs(1024);
        let url = blobs
            .upload("scan.pdf", "application/pdf", b"%PDF".to_vec())
            .await
            .unwrap();
        let key = url.strip_prefix("http://localhost/files/").unwrap();
        assert_eq!(blobs.read(key).await.unwrap(), Some(b"%PDF".to_vec()));

        let missing = object_key("other.pdf");
        assert_eq!(blobs.read(&missing).await.unwrap(), None);
    }

    #[tokio::test]
    async fn rejects_oversized_and_disallowed_files() {
        let blobs = blobs(3);
        let err = blobs
            .upload("big.pdf", "application/pdf", vec![0; 4])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TooLarge { size: 4, limit: 3 }));

        let err = blobs
            .upload("notes.txt", "text/plain", vec![0; 1])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ContentType(t) if t == "text/plain"));
    }
}
