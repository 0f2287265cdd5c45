//! HTTP-backed remote store session.
//!
//! Maps the hierarchical store onto a REST endpoint: `get` and `set` of a
//! node at `devices/...` become `GET`/`PUT` of `{base}/{path}.json`, with
//! an optional auth token appended as a query parameter. Writes are spawned
//! onto a current-thread runtime and only progress while the session is
//! pumped, matching the cooperative model the rest of the crate assumes.

/// Store endpoint configuration.
#[derive(Debug, Clone)]
pub struct HttpStoreConfig {
    /// Base URL of the store, e.g. `https://store.example.com`
    pub base_url: String,
    /// Auth token appended to every request, if any
    pub auth_token: Option<String>,
}

impl HttpStoreConfig {
    /// Create a configuration for an unauthenticated store.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth_token: None,
        }
    }

    /// Attach an auth token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Full URL of the JSON node at `path`.
    pub fn node_url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let node = path.trim_matches('/');
        let mut url = format!("{base}/{node}.json");
        if let Some(ref token) = self.auth_token {
            url.push_str("?auth=");
            url.push_str(token);
        }
        url
    }
}

#[cfg(feature = "http-store")]
pub use client::HttpSession;

#[cfg(feature = "http-store")]
mod client {
    use super::HttpStoreConfig;
    use crate::remote::session::{RemoteError, RemoteSession, SessionEvent, UploadTask};
    use serde_json::Value;
    use std::time::Duration;

    /// HTTP session driven by a current-thread runtime.
    ///
    /// Reads are bounded synchronous calls; writes are spawned tasks that
    /// progress during [`RemoteSession::advance`].
    pub struct HttpSession {
        config: HttpStoreConfig,
        client: reqwest::Client,
        runtime: tokio::runtime::Runtime,
        ready: bool,
        in_flight: Vec<(String, tokio::task::JoinHandle<Result<(), (i64, String)>>)>,
    }

    impl HttpSession {
        /// Create a session. It is not ready until [`Self::authenticate`]
        /// succeeds.
        pub fn new(config: HttpStoreConfig) -> Result<Self, RemoteError> {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| RemoteError::Network(format!("Failed to create runtime: {e}")))?;

            let client = reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .map_err(|e| RemoteError::Network(format!("Failed to create HTTP client: {e}")))?;

            Ok(Self {
                config,
                client,
                runtime,
                ready: false,
                in_flight: Vec::new(),
            })
        }

        /// Confirm the store answers at all; marks the session ready on
        /// success. The credential handshake itself belongs to bring-up;
        /// this only verifies the resulting token works.
        pub fn authenticate(&mut self) -> bool {
            let url = self.config.node_url(".settings/ping");
            let client = self.client.clone();
            let ok = self
                .runtime
                .block_on(async move { client.get(&url).send().await })
                .map(|response| {
                    // A missing node still proves the endpoint and token
                    // are usable; auth rejections and server errors do not.
                    response.status().is_success() || response.status().as_u16() == 404
                })
                .unwrap_or(false);
            self.ready = ok;
            ok
        }
    }

    impl RemoteSession for HttpSession {
        fn is_ready(&self) -> bool {
            self.ready
        }

        fn fetch_counter(&mut self, path: &str) -> Result<Option<u64>, RemoteError> {
            if !self.ready {
                return Err(RemoteError::NotReady);
            }
            let url = self.config.node_url(path);
            let client = self.client.clone();
            let value: Value = self.runtime.block_on(async move {
                let response = client
                    .get(&url)
                    .send()
                    .await
                    .map_err(|e| RemoteError::Network(e.to_string()))?;
                if !response.status().is_success() {
                    return Err(RemoteError::Protocol(format!(
                        "store answered {}",
                        response.status()
                    )));
                }
                response
                    .json()
                    .await
                    .map_err(|e| RemoteError::Protocol(e.to_string()))
            })?;

            match value {
                Value::Null => Ok(None),
                Value::Number(n) => n
                    .as_u64()
                    .map(Some)
                    .ok_or_else(|| RemoteError::Protocol("counter is not an integer".to_string())),
                other => Err(RemoteError::Protocol(format!(
                    "counter node holds {other}"
                ))),
            }
        }

        fn submit(&mut self, task: UploadTask) -> Result<(), RemoteError> {
            if !self.ready {
                return Err(RemoteError::NotReady);
            }
            let url = self.config.node_url(&task.path);
            let client = self.client.clone();
            let payload = task.payload.clone();
            let handle = self.runtime.spawn(async move {
                let response = client
                    .put(&url)
                    .json(&payload)
                    .send()
                    .await
                    .map_err(|e| (-1i64, e.to_string()))?;
                let status = response.status();
                if status.is_success() {
                    Ok(())
                } else {
                    let message = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    Err((i64::from(status.as_u16()), message))
                }
            });
            self.in_flight.push((task.correlation_id, handle));
            Ok(())
        }

        fn advance(&mut self) -> Vec<SessionEvent> {
            // A short block_on drives the current-thread executor so the
            // spawned writes actually make progress.
            self.runtime
                .block_on(tokio::time::sleep(Duration::from_millis(20)));

            let mut events = Vec::new();
            let mut pending = Vec::new();
            for (correlation_id, handle) in self.in_flight.drain(..) {
                if !handle.is_finished() {
                    pending.push((correlation_id, handle));
                    continue;
                }
                match self.runtime.block_on(handle) {
                    Ok(Ok(())) => events.push(SessionEvent::Completed { correlation_id }),
                    Ok(Err((code, message))) => events.push(SessionEvent::Error {
                        correlation_id,
                        code,
                        message,
                    }),
                    Err(join_error) => events.push(SessionEvent::Error {
                        correlation_id,
                        code: -1,
                        message: join_error.to_string(),
                    }),
                }
            }
            self.in_flight = pending;
            events
        }
    }
}
