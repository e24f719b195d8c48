//! HTTP transport for the REST backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use tracing::debug;

use super::{with_retry, Backend, BackendRequest, FileUpload, Method, Payload, RetryConfig};
use crate::config::Config;
use crate::error::{GatewayError, Result};

/// Multipart field that carries attached files.
const FILE_FIELD: &str = "images";

/// reqwest-based `Backend` with transport-level retry on busy responses.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    retry: RetryConfig,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration, retry: RetryConfig) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let retry = RetryConfig {
            max_retries: config.max_retries,
            initial_delay_ms: config.retry_delay_ms,
            ..Default::default()
        };
        Self::new(
            &config.backend_url,
            Duration::from_secs(config.request_timeout),
            retry,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn build(&self, request: &BackendRequest) -> Result<RequestBuilder> {
        let url = self.url(&request.path);
        let mut builder = match request.method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
            Method::Put => self.client.put(url),
            Method::Patch => self.client.patch(url),
            Method::Delete => self.client.delete(url),
        };

        if !request.query.is_empty() {
            builder = builder.query(&request.query.to_query_pairs());
        }

        builder = match &request.payload {
            Payload::Empty => builder,
            Payload::Json(body) => builder.json(body),
            Payload::Multipart { fields, files } => builder.multipart(multipart_form(fields, files)?),
        };
        Ok(builder)
    }

    async fn send_once(&self, request: &BackendRequest) -> Result<Value> {
        let response = self.build(request)?.send().await?;
        parse_json(response).await
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn execute(&self, request: BackendRequest) -> Result<Value> {
        debug!(method = %request.method, path = %request.path, "backend request");
        let operation = format!("{} {}", request.method, request.path);
        with_retry(&self.retry, &operation, || self.send_once(&request)).await
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        let operation = format!("GET {}", path);
        with_retry(&self.retry, &operation, || async move {
            let response = self.client.get(self.url(path)).send().await?;
            let status = response.status();
            if !status.is_success() {
                let text = response.text().await?;
                return Err(GatewayError::from_status(status.as_u16(), text));
            }
            Ok(response.bytes().await?.to_vec())
        })
        .await
    }
}

/// Top-level JSON fields become text parts; files share one repeated field.
fn multipart_form(fields: &Value, files: &[FileUpload]) -> Result<Form> {
    let mut form = Form::new();
    match fields {
        Value::Object(map) => {
            for (name, value) in map {
                let text = match value {
                    Value::String(s) => s.clone(),
                    Value::Null => continue,
                    other => other.to_string(),
                };
                form = form.text(name.clone(), text);
            }
        }
        Value::Null => {}
        other => form = form.text("data", other.to_string()),
    }

    for file in files {
        let mut part = Part::bytes(file.bytes.clone()).file_name(file.file_name.clone());
        if let Some(content_type) = &file.content_type {
            part = part.mime_str(content_type)?;
        }
        form = form.part(FILE_FIELD, part);
    }
    Ok(form)
}

async fn parse_json(response: Response) -> Result<Value> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await?;
        return Err(GatewayError::from_status(status.as_u16(), text));
    }

    let bytes = response.bytes().await?;
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(&bytes)?)
}
