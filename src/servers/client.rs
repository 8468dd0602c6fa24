use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::{ConnectionAction, ServerError, ServerStatus, ServerStatusDocument, STATUS_ENDPOINT};

/// Anti-forgery token handed out by the host page. Forwarded as-is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Crumb {
    pub field_name: String,
    pub value: String,
}

#[derive(Clone, Debug)]
pub struct ClientOptions {
    pub base_url: String,
    pub crumb: Option<Crumb>,
    pub timeout: Duration,
    pub settle_delay: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            crumb: None,
            timeout: Duration::from_secs(10),
            settle_delay: Duration::from_millis(super::DEFAULT_SETTLE_DELAY_MS),
        }
    }
}

#[derive(Clone, Debug)]
pub struct StatusClient {
    client: reqwest::Client,
    base_url: String,
    settle_delay: Duration,
}

impl StatusClient {
    pub fn new(options: ClientOptions) -> Result<Self, ServerError> {
        let mut headers = HeaderMap::new();
        if let Some(crumb) = options.crumb.as_ref() {
            let name = HeaderName::from_bytes(crumb.field_name.as_bytes()).map_err(|_| {
                ServerError::InvalidCrumb {
                    name: crumb.field_name.clone(),
                }
            })?;
            let value =
                HeaderValue::from_str(&crumb.value).map_err(|_| ServerError::InvalidCrumb {
                    name: crumb.field_name.clone(),
                })?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(options.timeout)
            .build()
            .map_err(|source| ServerError::HttpClientBuild { source })?;

        Ok(Self {
            client,
            base_url: options.base_url.trim_end_matches('/').to_string(),
            settle_delay: options.settle_delay,
        })
    }

    pub fn status_url(&self) -> String {
        format!("{}/{STATUS_ENDPOINT}", self.base_url)
    }

    pub async fn fetch(&self) -> Result<ServerStatusDocument, ServerError> {
        let url = self.status_url();
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| ServerError::Request {
                url: url.clone(),
                source,
            })?;
        if !resp.status().is_success() {
            return Err(ServerError::Status {
                url,
                status: resp.status().as_u16(),
            });
        }
        let body = resp.text().await.map_err(|source| ServerError::Request {
            url: url.clone(),
            source,
        })?;
        ServerStatusDocument::parse(&body).map_err(|source| ServerError::Decode { url, source })
    }

    /// Asks the console to put an up server to sleep or wake a down one, then
    /// waits for the change to settle before the caller re-fetches.
    pub async fn toggle(&self, server: &ServerStatus) -> Result<ConnectionAction, ServerError> {
        let action = ConnectionAction::for_state(&server.status).ok_or_else(|| {
            ServerError::NotToggleable {
                name: server.name.clone(),
                status: server.status.as_str().to_string(),
            }
        })?;
        let url = action.target(&server.server_url);
        info!(server = %server.name, action = action.path(), "toggling connection");

        let resp = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|source| ServerError::Request {
                url: url.clone(),
                source,
            })?;
        if !resp.status().is_success() && !resp.status().is_redirection() {
            return Err(ServerError::Status {
                url,
                status: resp.status().as_u16(),
            });
        }

        sleep(self.settle_delay).await;
        Ok(action)
    }
}

/// Refreshes the status document every `every` until `sink` breaks.
/// The first refresh happens right away. A failed refresh is logged and the
/// loop carries on with the next tick. Returns the number of documents
/// delivered.
pub async fn poll<F, Fut, S>(mut fetch: F, every: Duration, mut sink: S) -> usize
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<ServerStatusDocument, ServerError>>,
    S: FnMut(&ServerStatusDocument) -> ControlFlow<()>,
{
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut delivered = 0usize;

    loop {
        ticker.tick().await;
        match fetch().await {
            Ok(doc) => {
                delivered += 1;
                debug!(servers = doc.servers.len(), "server status refreshed");
                if sink(&doc).is_break() {
                    return delivered;
                }
            }
            Err(e) => warn!("server status refresh failed: {e}"),
        }
    }
}
