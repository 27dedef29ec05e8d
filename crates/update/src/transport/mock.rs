//! In-memory transport for testing.

use super::Transport;
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
enum Response {
    Body(Vec<u8>, Option<Duration>),
    Status(u16),
}

/// Serves canned responses by exact URL; anything else is unreachable.
#[derive(Debug, Default)]
pub struct MockTransport {
    responses: HashMap<String, Response>,
    requests: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.responses.insert(url.into(), Response::Body(body.into(), None));
        self
    }

    /// Respond only after `delay`, to control completion order.
    pub fn with_delay(mut self, url: impl Into<String>, delay: Duration, body: impl Into<Vec<u8>>) -> Self {
        self.responses.insert(url.into(), Response::Body(body.into(), Some(delay)));
        self
    }

    pub fn with_status(mut self, url: impl Into<String>, status: u16) -> Self {
        self.responses.insert(url.into(), Response::Status(status));
        self
    }

    /// Every URL fetched so far, in request order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().map(|requests| requests.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.to_string());
        }
        match self.responses.get(url).cloned() {
            Some(Response::Body(body, delay)) => {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                Ok(body)
            },
            Some(Response::Status(status)) => exn::bail!(ErrorKind::HttpStatus {
                url: url.to_string(),
                status,
            }),
            None => exn::bail!(ErrorKind::Transport(url.to_string())),
        }
    }
}
