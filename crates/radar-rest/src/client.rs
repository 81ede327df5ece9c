//! RPC client for the hosted backend

use async_trait::async_trait;
use parking_lot::RwLock;
use radar_core::{BackendError, BackendResult, CounterpartId, UnreadBackend, UnreadCountEntry};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use crate::config::RestConfig;
use crate::error::{RestError, map_status, map_transport};

/// Remote function names
pub mod rpc {
    /// Aggregate unread counts for the signed-in user
    pub const GET_UNREAD_COUNTS: &str = "get_unread_message_counts";
    /// Mark everything from one sender as delivered
    pub const MARK_DELIVERED: &str = "mark_messages_delivered";
    /// Mark everything from one sender as read
    pub const MARK_READ: &str = "mark_messages_read";
}

#[derive(Serialize)]
struct SenderArgs<'a> {
    p_sender_id: &'a str,
}

/// [`UnreadBackend`] backed by the hosted backend's RPC endpoints
pub struct RestBackend {
    client: reqwest::Client,
    rpc_base: Url,
    api_key: String,
    access_token: RwLock<Option<String>>,
}

impl RestBackend {
    /// Build the HTTP client for `config`
    pub fn new(config: RestConfig) -> Result<Self, RestError> {
        let mut headers = HeaderMap::new();
        let mut api_key = HeaderValue::from_str(&config.api_key)?;
        api_key.set_sensitive(true);
        headers.insert("apikey", api_key);

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        let mut base = config.base_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let rpc_base = base.join("rest/v1/rpc/")?;

        Ok(Self {
            client,
            rpc_base,
            api_key: config.api_key,
            access_token: RwLock::new(config.access_token),
        })
    }

    /// Replace the session token used for subsequent calls
    ///
    /// `None` falls back to the API key.
    pub fn set_access_token(&self, token: Option<String>) {
        *self.access_token.write() = token;
    }

    /// URL of a remote function
    pub fn rpc_url(&self, function: &str) -> BackendResult<Url> {
        self.rpc_base
            .join(function)
            .map_err(|e| BackendError::Network(format!("invalid RPC url: {e}")))
    }

    fn bearer(&self) -> String {
        self.access_token
            .read()
            .clone()
            .unwrap_or_else(|| self.api_key.clone())
    }

    async fn call(&self, function: &str, args: &impl Serialize) -> BackendResult<Vec<u8>> {
        let url = self.rpc_url(function)?;
        let response = self
            .client
            .post(url)
            .bearer_auth(self.bearer())
            .json(args)
            .send()
            .await
            .map_err(map_transport)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_transport)?;

        if !status.is_success() {
            let text = String::from_utf8_lossy(&body);
            return Err(map_status(function, status.as_u16(), &text));
        }

        debug!(function, status = status.as_u16(), "RPC call succeeded");
        Ok(body.to_vec())
    }

    async fn call_json<T: DeserializeOwned>(
        &self,
        function: &str,
        args: &impl Serialize,
    ) -> BackendResult<T> {
        let body = self.call(function, args).await?;
        serde_json::from_slice(&body).map_err(|e| BackendError::Decode(e.to_string()))
    }
}

impl std::fmt::Debug for RestBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestBackend")
            .field("rpc_base", &self.rpc_base.as_str())
            .field("has_access_token", &self.access_token.read().is_some())
            .finish()
    }
}

#[async_trait]
impl UnreadBackend for RestBackend {
    #[instrument(skip(self))]
    async fn fetch_unread_counts(&self) -> BackendResult<Vec<UnreadCountEntry>> {
        let rows: Option<Vec<UnreadCountEntry>> = self
            .call_json(rpc::GET_UNREAD_COUNTS, &serde_json::json!({}))
            .await?;
        Ok(rows.unwrap_or_default())
    }

    #[instrument(skip(self, counterpart), fields(counterpart = %counterpart.short_id()))]
    async fn mark_delivered(&self, counterpart: &CounterpartId) -> BackendResult<()> {
        let args = SenderArgs {
            p_sender_id: counterpart.as_str(),
        };
        self.call(rpc::MARK_DELIVERED, &args).await?;
        Ok(())
    }

    #[instrument(skip(self, counterpart), fields(counterpart = %counterpart.short_id()))]
    async fn mark_read(&self, counterpart: &CounterpartId) -> BackendResult<()> {
        let args = SenderArgs {
            p_sender_id: counterpart.as_str(),
        };
        self.call(rpc::MARK_READ, &args).await?;
        Ok(())
    }
}
