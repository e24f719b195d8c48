//! Shared test backend
//!
//! In-memory stand-in for the rental backend. Reads are served from a path
//! map, writes are applied to it, and every request is recorded.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rental_cache::backend::{Backend, BackendRequest, Method, Payload};
use rental_cache::{GatewayError, Result};
use serde_json::{json, Value};

#[derive(Default)]
pub struct MemoryBackend {
    records: Mutex<HashMap<String, Value>>,
    requests: Mutex<Vec<BackendRequest>>,
    delay: Mutex<Duration>,
    fail_writes: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seeds the value served for GETs of `path`.
    pub fn seed(&self, path: &str, value: Value) {
        self.records.lock().unwrap().insert(path.to_string(), value);
    }

    /// Delays every read by `delay` before it answers.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<BackendRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of GETs that reached the backend for `path`.
    pub fn reads_of(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == Method::Get && r.path == path)
            .count()
    }

    pub fn total_reads(&self) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == Method::Get)
            .count()
    }

    fn body_of(payload: &Payload) -> Value {
        match payload {
            Payload::Empty => Value::Null,
            Payload::Json(value) => value.clone(),
            Payload::Multipart { fields, .. } => fields.clone(),
        }
    }

    fn apply_write(&self, request: &BackendRequest) -> Value {
        let body = Self::body_of(&request.payload);
        let path = request
            .path
            .trim_end_matches("/with-images")
            .to_string();
        let mut records = self.records.lock().unwrap();

        match request.method {
            Method::Post => {
                if let Some(Value::Array(items)) = records.get_mut(&path) {
                    items.push(body.clone());
                }
                body
            }
            Method::Put => {
                records.insert(path, body.clone());
                body
            }
            Method::Patch => {
                let merged = match (records.get(&path), &body) {
                    (Some(Value::Object(current)), Value::Object(changes)) => {
                        let mut merged = current.clone();
                        for (k, v) in changes {
                            merged.insert(k.clone(), v.clone());
                        }
                        Value::Object(merged)
                    }
                    _ => body.clone(),
                };
                records.insert(path, merged.clone());
                merged
            }
            Method::Delete => {
                records.remove(&path);
                Value::Null
            }
            Method::Get => Value::Null,
        }
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn execute(&self, request: BackendRequest) -> Result<Value> {
        self.requests.lock().unwrap().push(request.clone());

        if request.method == Method::Get {
            // Answers with the record as it was when the read arrived.
            let snapshot = self.records.lock().unwrap().get(&request.path).cloned();
            let delay = *self.delay.lock().unwrap();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            return snapshot.ok_or_else(|| GatewayError::NotFound(request.path.clone()));
        }

        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(GatewayError::from_status(500, "write rejected"));
        }
        Ok(self.apply_write(&request))
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        Ok(format!("pdf:{}", path).into_bytes())
    }
}

/// A small rental dataset.
pub fn seeded() -> Arc<MemoryBackend> {
    let backend = MemoryBackend::new();
    backend.seed(
        "apartments",
        json!([{ "id": 1, "name": "Flat 1" }, { "id": 2, "name": "Flat 2" }]),
    );
    backend.seed("apartments/1", json!({ "id": 1, "name": "Flat 1" }));
    backend.seed("apartments/1/meter-readings", json!([{ "value": 120 }]));
    backend.seed("tenants", json!([{ "id": 7, "name": "Ada" }]));
    backend.seed("tenants/7", json!({ "id": 7, "name": "Ada" }));
    backend.seed("leases", json!([{ "id": 3, "tenantId": 7, "status": "active" }]));
    backend.seed("leases/active", json!([{ "id": 3, "tenantId": 7 }]));
    backend
}
