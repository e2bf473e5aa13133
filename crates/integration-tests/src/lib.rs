//! Integration tests for Storynest.
//!
//! Tests drive the full router in-process with `tower::ServiceExt::oneshot`,
//! backed by a profile document in a temp dir and a recording email sender.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p storynest-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `profile_api` - `/api/updateUserData` and `/api/profiles/{pin}`
//! - `verification_api` - issuing and checking email codes
//! - `store_concurrency` - concurrent writers against one document

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use storynest_core::Email;
use storynest_server::config::ServerConfig;
use storynest_server::db::ProfileStore;
use storynest_server::services::{DeliveryError, EmailSender};
use storynest_server::state::AppState;

/// One delivered message.
#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
}

/// Email sender that records messages, or fails every send when told to.
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<SentEmail>>,
    fail: bool,
}

impl RecordingSender {
    /// A sender whose every delivery is rejected by the "provider".
    #[must_use]
    pub fn failing() -> Self {
        Self {
            sent: Mutex::default(),
            fail: true,
        }
    }

    /// Messages delivered so far.
    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }

    /// The 6-digit code in the most recent message body.
    pub fn last_code(&self) -> Option<String> {
        let sent = self.sent.lock().unwrap();
        let text = &sent.last()?.text;
        text.split(|c: char| !c.is_ascii_digit())
            .find(|word| word.len() == 6)
            .map(String::from)
    }
}

#[async_trait]
impl EmailSender for RecordingSender {
    async fn send(
        &self,
        to: &Email,
        subject: &str,
        _html_body: &str,
        text_body: &str,
    ) -> Result<(), DeliveryError> {
        if self.fail {
            return Err(DeliveryError::Provider {
                status: 422,
                error_code: 300,
                message: "Invalid email request".to_string(),
            });
        }

        self.sent.lock().unwrap().push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            text: text_body.to_string(),
        });
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// A router over a fresh profile document.
pub struct TestApp {
    pub router: Router,
    pub store: ProfileStore,
    pub sender: Arc<RecordingSender>,
    _dir: TempDir,
}

impl TestApp {
    /// App with a working email sender.
    pub async fn new() -> Self {
        Self::with_sender(RecordingSender::default(), |_| {}).await
    }

    /// App with a custom sender and configuration tweaks.
    pub async fn with_sender(sender: RecordingSender, tweak: impl FnOnce(&mut ServerConfig)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServerConfig::local(dir.path().join("user_profiles.json"));
        tweak(&mut config);

        let store = ProfileStore::open(&config.data_file).await.unwrap();
        let sender = Arc::new(sender);
        let state = AppState::new(config, store.clone(), sender.clone());

        Self {
            router: storynest_server::app(state),
            store,
            sender,
            _dir: dir,
        }
    }

    /// Path of the profile document.
    #[must_use]
    pub fn data_file(&self) -> PathBuf {
        self.store.path().to_path_buf()
    }

    /// POST a JSON body.
    pub async fn post_json(&self, uri: &str, body: &Value) -> (StatusCode, Value) {
        self.post_raw(uri, body.to_string()).await
    }

    /// POST a raw body labelled as JSON.
    pub async fn post_raw(&self, uri: &str, body: impl Into<Body>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.into())
            .unwrap();
        self.send(request).await
    }

    /// GET a path.
    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, body)
    }
}
