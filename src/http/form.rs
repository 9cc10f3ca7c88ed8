//! Multipart ticket forms.

use std::collections::HashMap;

use axum::extract::{
    multipart::{MultipartError, MultipartRejection},
    Multipart,
};
use serde_json::Value;

use crate::{
    db::ticket::{AttachmentId, NewAttachment},
    service::{
        ticket::{Submission, Upload},
        Error,
    },
};

const OCTET_STREAM: &str = "application/octet-stream";

/// Text fields and files of a submitted ticket form.
#[derive(Debug, Default)]
pub struct TicketForm {
    fields: HashMap<String, String>,
    files: Vec<Upload>,
}

impl TicketForm {
    pub async fn read(
        multipart: Result<Multipart, MultipartRejection>,
    ) -> Result<Self, Error> {
        let mut multipart =
            multipart.map_err(|e| Error::Validation(e.body_text()))?;
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(malformed)?
        {
            let name = field.name().unwrap_or_default().to_owned();
            match field.file_name().map(str::to_owned) {
                Some(file_name) => {
                    let mimetype = field
                        .content_type()
                        .unwrap_or(OCTET_STREAM)
                        .to_owned();
                    let bytes = field.bytes().await.map_err(malformed)?;
                    // Browsers send an unnamed empty part for an untouched
                    // file input.
                    if file_name.is_empty() && bytes.is_empty() {
                        continue;
                    }
                    form.files.push(Upload {
                        name: if file_name.is_empty() {
                            "file".to_owned()
                        } else {
                            file_name
                        },
                        mimetype,
                        bytes: bytes.to_vec(),
                    });
                }
                None => {
                    let text = field.text().await.map_err(malformed)?;
                    form.fields.insert(name, text);
                }
            }
        }
        Ok(form)
    }

    fn text(&self, name: &str) -> String {
        self.fields
            .get(name)
            .map(|v| v.trim().to_owned())
            .unwrap_or_default()
    }

    pub fn deleted_attachments(&self) -> Vec<AttachmentId> {
        parse_ids(self.fields.get("deletedAttachmentIds").map(String::as_str))
    }

    pub fn into_submission(self) -> Submission {
        Submission {
            title: self.text("title"),
            category: self.text("category"),
            content: self.text("content"),
            status: self.text("status"),
            assignee: self.text("assigneeUsername"),
            attachments: parse_attachments(
                self.fields.get("attachments").map(String::as_str),
            ),
            files: self.files,
        }
    }
}

fn malformed(e: MultipartError) -> Error {
    Error::Validation(e.body_text())
}

/// Reads the JSON list of already stored files. Entries without a URL are
/// dropped, anything unparsable yields nothing.
pub fn parse_attachments(raw: Option<&str>) -> Vec<NewAttachment> {
    let Some(Value::Array(entries)) =
        raw.and_then(|raw| serde_json::from_str(raw).ok())
    else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| {
            let url = entry.get("url")?.as_str()?;
            if url.is_empty() {
                return None;
            }
            Some(NewAttachment {
                name: string_or(entry.get("name"), "file"),
                url: url.to_owned(),
                size: entry.get("size").and_then(integer).unwrap_or(0).max(0),
                mimetype: string_or(entry.get("mimetype"), OCTET_STREAM),
            })
        })
        .collect()
}

/// Reads the JSON list of attachment ids to delete. Ids may be numbers or
/// numeric strings; anything else is skipped.
pub fn parse_ids(raw: Option<&str>) -> Vec<AttachmentId> {
    let Some(Value::Array(entries)) =
        raw.and_then(|raw| serde_json::from_str(raw).ok())
    else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(integer)
        .filter(|id| *id > 0)
        .map(AttachmentId::from)
        .collect()
}

fn string_or(value: Option<&Value>, default: &str) -> String {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or(default)
        .to_owned()
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
