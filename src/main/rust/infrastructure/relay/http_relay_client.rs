use std::time::Duration;

use url::Url;

use crate::domain::errors::{Result, WatchdogError};
use crate::domain::ports::{RelayClient, RelayHealth, WarmupStatus};

/// Control-plane request timeout; the data plane has its own deadlines
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Relay control-plane client over HTTP
pub struct HttpRelayClient {
    client: reqwest::Client,
    base: Url,
}

impl HttpRelayClient {
    /// `base` is the relay's control-plane root, e.g.
    /// `http://localhost:8443/relay/`.
    pub fn new(base: &str) -> Result<Self> {
        let mut base =
            Url::parse(base).map_err(|_| WatchdogError::InvalidRelayUrl(base.to_string()))?;

        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(WatchdogError::InvalidRelayUrl(base.to_string()));
        }

        // Url::join treats a base without a trailing slash as a file
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| WatchdogError::RelayRequestFailed(e.to_string()))?;

        Ok(Self { client, base })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|_| WatchdogError::InvalidRelayUrl(format!("{}{}", self.base, path)))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| WatchdogError::RelayRequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(WatchdogError::RelayStatus(response.status().as_u16()));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| WatchdogError::RelayRequestFailed(e.to_string()))
    }
}

#[async_trait::async_trait]
impl RelayClient for HttpRelayClient {
    async fn warm_up(&self, query: &str) -> Result<WarmupStatus> {
        let mut url = self.endpoint("warmup_relay")?;
        if !query.is_empty() {
            url.set_query(Some(query));
        }
        self.get_json(url).await
    }

    async fn health(&self) -> Result<RelayHealth> {
        let url = self.endpoint("relay_status")?;
        self.get_json(url).await
    }
}
