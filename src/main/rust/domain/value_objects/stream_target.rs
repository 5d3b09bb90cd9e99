use std::time::{SystemTime, UNIX_EPOCH};

use url::Url;

use crate::domain::errors::{Result, WatchdogError};

/// The stream endpoint this supervisor keeps alive.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamTarget {
    url: Url,
}

impl StreamTarget {
    pub fn new(url: &str) -> Result<Self> {
        let parsed =
            Url::parse(url).map_err(|_| WatchdogError::InvalidStreamUrl(url.to_string()))?;

        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(WatchdogError::InvalidStreamUrl(url.to_string()));
        }

        Ok(Self { url: parsed })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Query string of the target, forwarded to the relay warm-up call
    pub fn query(&self) -> &str {
        self.url.query().unwrap_or("")
    }

    /// Per-attempt start URL with a cache-defeating `t` parameter.
    ///
    /// The serial keeps two attempts within the same millisecond distinct,
    /// so an intermediary cache can never replay a previous failed attempt.
    pub fn start_url(&self, serial: u64) -> Url {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);

        let mut url = self.url.clone();
        url.query_pairs_mut()
            .append_pair("t", &format!("{}-{}", millis, serial));
        url
    }
}
