use std::{env, fmt::Display};

use helpdesk::{api, Config};
use reqwest::{
    multipart::{Form, Part},
    RequestBuilder, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::net;
use tokio_postgres::NoTls;
use uuid::Uuid;

pub const PASSWORD: &str = "passw0rd!";

/// PostgreSQL connection string. When set, every server gets a fresh schema
/// in this database instead of the memory store.
pub const DATABASE_URL_VAR: &str = "HELPDESK_TEST_DATABASE_URL";

const SCHEMA: &str = include_str!("../../schema.sql");

/// Helpdesk server running in the background on an ephemeral port, backed
/// by the memory attachment store and either the memory database or a
/// private PostgreSQL schema (see [`DATABASE_URL_VAR`]).
pub struct Server {
    pub base_url: String,
}

pub async fn spawn() -> Server {
    let listener = net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind");
    let addr = listener.local_addr().expect("no local address");
    let db = database().await;

    let config = toml::from_str::<Config>(&format!(
        r#"
        [db]
        {db}

        [http.server]
        addr = "{addr}"

        [http.cors]
        allowed_origins = []

        [jwt]
        secret = "test-secret"
        expiration_time = "1h"

        [attachments]
        max_size = 1024

        [attachments.storage]
        kind = "memory"
        public_url = "http://{addr}/files"
        "#
    ))
    .expect("invalid config");
    let app = helpdesk::app(config).await.expect("failed to build app");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server failed");
    });

    Server {
        base_url: format!("http://{addr}"),
    }
}

/// `[db]` table body for a new server.
async fn database() -> String {
    let Ok(url) = env::var(DATABASE_URL_VAR) else {
        return r#"kind = "memory""#.to_owned();
    };

    let schema = format!("test_{}", Uuid::new_v4().simple());
    let (client, connection) = tokio_postgres::connect(&url, NoTls)
        .await
        .expect("failed to connect to the test database");
    tokio::spawn(connection);
    client
        .batch_execute(&format!(
            "CREATE SCHEMA {schema}; SET search_path TO {schema}; {SCHEMA}"
        ))
        .await
        .expect("failed to create the test schema");

    let separator = if url.contains('?') { '&' } else { '?' };
    let url = format!("{url}{separator}options=-csearch_path%3D{schema}");
    format!("kind = \"postgres\"\nurl = {}", toml::Value::String(url))
}

impl Server {
    pub fn client(&self) -> Client {
        Client {
            inner: reqwest::Client::new(),
            base_url: self.base_url.clone(),
            auth_token: None,
        }
    }

    /// Registers `username` with [`PASSWORD`] and logs in.
    pub async fn user(&self, username: &str) -> Client {
        let client = self.client();
        client
            .register(json!({
                "username": username,
                "email": format!("{username}@example.com"),
                "name": username.to_uppercase(),
                "phone": "010-0000-0000",
                "password": PASSWORD,
            }))
            .await
            .expect("failed to register");
        client.login(username, PASSWORD).await
    }
}

/// Non-2xx answer of the server.
#[derive(Debug)]
pub struct Rejection {
    pub status: StatusCode,
    pub message: String,
}

/// Fields of a multipart ticket form.
#[derive(Clone, Debug, Default)]
pub struct TicketForm {
    pub title: String,
    pub category: String,
    pub content: String,
    pub status: Option<String>,
    pub assignee: Option<String>,
    pub attachments: Option<Value>,
    pub deleted: Option<Value>,
    pub files: Vec<(String, String, Vec<u8>)>,
}

impl TicketForm {
    pub fn new(title: &str, category: &str, content: &str) -> Self {
        Self {
            title: title.to_owned(),
            category: category.to_owned(),
            content: content.to_owned(),
            ..Self::default()
        }
    }

    fn into_multipart(self) -> Form {
        let mut form = Form::new()
            .text("title", self.title)
            .text("category", self.category)
            .text("content", self.content);
        if let Some(status) = self.status {
            form = form.text("status", status);
        }
        if let Some(assignee) = self.assignee {
            form = form.text("assigneeUsername", assignee);
        }
        if let Some(attachments) = self.attachments {
            form = form.text("attachments", attachments.to_string());
        }
        if let Some(deleted) = self.deleted {
            form = form.text("deletedAttachmentIds", deleted.to_string());
        }
        for (name, mimetype, bytes) in self.files {
            let part = Part::bytes(bytes)
                .file_name(name)
                .mime_str(&mimetype)
                .expect("invalid mime type");
            form = form.part("files", part);
        }
        form
    }
}

pub struct Client {
    inner: reqwest::Client,
    base_url: String,
    pub auth_token: Option<String>,
}

impl Client {
    async fn send<T: DeserializeOwned>(
        &self,
        mut req: RequestBuilder,
    ) -> Result<T, Rejection> {
        if let Some(token) = &self.auth_token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        let res = req.send().await.expect("failed to send a request");
        let status = res.status();
        if status.is_success() {
            return Ok(res.json::<T>().await.expect("failed to get a response"));
        }
        let body = res
            .json::<Value>()
            .await
            .expect("failed to get a response");
        Err(Rejection {
            status,
            message: body["message"].as_str().unwrap_or_default().to_owned(),
        })
    }

    pub async fn try_login(
        &self,
        input: Value,
    ) -> Result<api::user::LoggedIn, Rejection> {
        let url = format!("{}/auth/login", self.base_url);
        self.send(self.inner.post(url).json(&input)).await
    }

    pub async fn login(mut self, login: &str, password: &str) -> Self {
        let logged_in = self
            .try_login(json!({ "username": login, "password": password }))
            .await
            .expect("failed to log in");
        assert!(logged_in.success);
        self.auth_token = Some(logged_in.token);
        self
    }

    pub async fn register(
        &self,
        input: Value,
    ) -> Result<api::user::Id, Rejection> {
        let url = format!("{}/auth/register", self.base_url);
        let res = self
            .send::<api::Envelope<api::user::Registered>>(
                self.inner.post(url).json(&input),
            )
            .await?;
        assert!(res.ok);
        Ok(res.body.user_id)
    }

    pub async fn profile(&self, id: &str) -> Result<api::User, Rejection> {
        let url = format!("{}/auth/profile?id={id}", self.base_url);
        let res = self
            .send::<api::Envelope<api::user::Profile>>(self.inner.get(url))
            .await?;
        Ok(res.body.user)
    }

    pub async fn update_profile(
        &self,
        input: Value,
    ) -> Result<api::User, Rejection> {
        let url = format!("{}/auth/profile", self.base_url);
        let res = self
            .send::<api::Envelope<api::user::Profile>>(
                self.inner.put(url).json(&input),
            )
            .await?;
        Ok(res.body.user)
    }

    pub async fn list_tickets(
        &self,
        query: &str,
    ) -> Result<api::ticket::List, Rejection> {
        let url = format!("{}/tickets?{query}", self.base_url);
        let res = self
            .send::<api::Envelope<api::ticket::List>>(self.inner.get(url))
            .await?;
        assert!(res.ok);
        Ok(res.body)
    }

    pub async fn create_ticket(
        &self,
        form: TicketForm,
    ) -> Result<api::ticket::Detail, Rejection> {
        let url = format!("{}/tickets", self.base_url);
        let res = self
            .send::<api::Envelope<api::ticket::Created>>(
                self.inner.post(url).multipart(form.into_multipart()),
            )
            .await?;
        assert!(res.ok);
        Ok(res.body.ticket)
    }

    pub async fn ticket(
        &self,
        id: impl Display,
    ) -> Result<api::ticket::Detail, Rejection> {
        let url = format!("{}/tickets/{id}", self.base_url);
        let res = self
            .send::<api::Envelope<api::Data<api::ticket::Detail>>>(
                self.inner.get(url),
            )
            .await?;
        Ok(res.body.data)
    }

    pub async fn update_ticket(
        &self,
        id: impl Display,
        form: TicketForm,
    ) -> Result<api::ticket::Detail, Rejection> {
        let url = format!("{}/tickets/{id}", self.base_url);
        let res = self
            .send::<api::Envelope<api::Data<api::ticket::Detail>>>(
                self.inner.put(url).multipart(form.into_multipart()),
            )
            .await?;
        Ok(res.body.data)
    }

    pub async fn comment(
        &self,
        id: impl Display,
        content: &str,
    ) -> Result<api::Comment, Rejection> {
        let url = format!("{}/tickets/{id}/comments", self.base_url);
        let res = self
            .send::<api::Envelope<api::Data<api::Comment>>>(
                self.inner.post(url).json(&json!({ "content": content })),
            )
            .await?;
        Ok(res.body.data)
    }

    /// Fetches a raw URL, as a browser following an attachment link would.
    pub async fn download(
        &self,
        url: &str,
    ) -> (StatusCode, Option<String>, Vec<u8>) {
        let res = self
            .inner
            .get(url)
            .send()
            .await
            .expect("failed to send a request");
        let status = res.status();
        let content_type = res
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let bytes = res.bytes().await.expect("failed to get a response");
        (status, content_type, bytes.to_vec())
    }
}
