use std::{net, time};

use serde::Deserialize;

#[derive(Deserialize)]
pub struct Config {
    pub db: Db,
    pub http: Http,
    pub jwt: Jwt,
    pub attachments: Attachments,
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum Db {
    Postgres { url: String },
    Memory,
}

#[derive(Deserialize)]
pub struct Http {
    pub server: Server,
    pub cors: Cors,
}

#[derive(Deserialize)]
pub struct Server {
    pub addr: net::SocketAddr,

    /// Upper bound for a whole request body, multipart uploads included.
    #[serde(default = "default_body_limit")]
    pub body_limit: usize,
}

#[derive(Deserialize)]
pub struct Cors {
    pub allowed_origins: Vec<String>,
}

#[derive(Deserialize)]
pub struct Jwt {
    pub secret: String,
    #[serde(with = "humantime_serde")]
    pub expiration_time: time::Duration,
}

#[derive(Deserialize)]
pub struct Attachments {
    pub storage: Storage,

    /// Largest accepted size of a single file, in bytes.
    #[serde(default = "default_max_size")]
    pub max_size: usize,

    /// MIME types accepted for upload. `type/*` matches any subtype.
    #[serde(default = "default_allowed_content_types")]
    pub allowed_content_types: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum Storage {
    Fs {
        root: String,
        public_url: String,
    },
    S3 {
        endpoint: String,
        region: String,
        bucket: String,
        access_key_id: String,
        secret_access_key: String,
        public_url: String,
    },
    Memory {
        public_url: String,
    },
}

impl Storage {
    pub fn public_url(&self) -> &str {
        match self {
            Self::Fs { public_url, .. }
            | Self::S3 { public_url, .. }
            | Self::Memory { public_url } => public_url,
        }
    }
}

fn default_body_limit() -> usize {
    100 * 1024 * 1024
}

fn default_max_size() -> usize {
    50 * 1024 * 1024
}

fn default_allowed_content_types() -> Vec<String> {
    [
        "image/*",
        "application/pdf",
        "application/zip",
        "application/msword",
        "application/vnd.ms-excel",
        "application/vnd.ms-powerpoint",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_memory_config_with_defaults() {
        let config = toml::from_str::<Config>(
            r#"
            [db]
            kind = "memory"

            [http.server]
            addr = "127.0.0.1:3000"

            [http.cors]
            allowed_origins = ["http://localhost:5173"]

            [jwt]
            secret = "secret"
            expiration_time = "12h"

            [attachments.storage]
            kind = "memory"
            public_url = "http://localhost:3000/files"
            "#,
        )
        .unwrap();

        assert!(matches!(config.db, Db::Memory));
        assert_eq!(config.http.server.body_limit, default_body_limit());
        assert_eq!(config.jwt.expiration_time.as_secs(), 12 * 60 * 60);
        assert_eq!(config.attachments.max_size, 50 * 1024 * 1024);
        assert!(config
            .attachments
            .allowed_content_types
            .iter()
            .any(|t| t == "application/pdf"));
        assert_eq!(
            config.attachments.storage.public_url(),
            "http://localhost:3000/files"
        );
    }

    #[test]
    fn parses_postgres_and_s3_sections() {
        let config = toml::from_str::<Config>(
            r#"
            [db]
            kind = "postgres"
            url = "postgres://helpdesk@localhost/helpdesk"

            [http.server]
            addr = "0.0.0.0:8080"
            body_limit = 1024

            [http.cors]
            allowed_origins = []

            [jwt]
            secret = "secret"
            expiration_time = "30m"

            [attachments]
            max_size = 10
            allowed_content_types = ["application/pdf"]

            [attachments.storage]
            kind = "s3"
            endpoint = "http://minio:9000"
            region = "us-east-1"
            bucket = "attachments"
            access_key_id = "key"
            secret_access_key = "secret"
            public_url = "http://minio:9000/attachments"
            "#,
        )
        .unwrap();

        match config.db {
            Db::Postgres { url } => {
                assert_eq!(url, "postgres://helpdesk@localhost/helpdesk")
            }
            Db::Memory => panic!("expected postgres"),
        }
        assert_eq!(config.http.server.body_limit, 1024);
        assert_eq!(config.attachments.max_size, 10);
        assert!(matches!(config.attachments.storage, Storage::S3 { .. }));
    }
}
