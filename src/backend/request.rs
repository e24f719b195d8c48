//! Backend request shapes.

use std::fmt;

use serde_json::Value;

use crate::cache::Params;

/// HTTP verbs the gateway issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// A binary attachment sent with a multipart write.
#[derive(Debug, Clone, PartialEq)]
pub struct FileUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl FileUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            bytes,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Request body encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Empty,
    Json(Value),
    /// JSON fields plus files, sent as multipart/form-data
    Multipart { fields: Value, files: Vec<FileUpload> },
}

impl Payload {
    /// Picks multipart when any file is attached, plain JSON otherwise.
    pub fn for_write(fields: Value, files: Vec<FileUpload>) -> Self {
        if files.is_empty() {
            Payload::Json(fields)
        } else {
            Payload::Multipart { fields, files }
        }
    }

    pub fn is_multipart(&self) -> bool {
        matches!(self, Payload::Multipart { .. })
    }
}

/// One request against the backend, relative to its base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendRequest {
    pub method: Method,
    pub path: String,
    pub query: Params,
    pub payload: Payload,
}

impl BackendRequest {
    pub fn get(path: impl Into<String>, query: Params) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            query,
            payload: Payload::Empty,
        }
    }

    pub fn write(method: Method, path: impl Into<String>, payload: Payload) -> Self {
        Self {
            method,
            path: path.into(),
            query: Params::new(),
            payload,
        }
    }
}
