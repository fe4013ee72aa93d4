use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT_ENCODING;
use reqwest::Client;
use tracing::debug;

use crate::app::Result;
use crate::transport::{RawResponse, Transport};

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            // Don't keep idle sockets to the local endpoint between calls;
            // scripted callers fire many requests in a row.
            .pool_max_idle_per_host(0)
            .user_agent("feedctl/0.1.0")
            .build()
            .expect("Failed to build HTTP client");

        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, url: &str, payload: Option<Vec<u8>>) -> Result<RawResponse> {
        let request = match payload {
            Some(body) => self.client.post(url).body(body),
            None => self.client.get(url),
        };

        // The server compresses with raw deflate (no zlib wrapper), which we
        // inflate ourselves, so the header is set by hand rather than through
        // reqwest's automatic decompression.
        let response = request.header(ACCEPT_ENCODING, "deflate").send().await?;

        let status = response.status().as_u16();
        let mut headers = BTreeMap::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers.insert(name.as_str().to_string(), value.trim().to_string());
            }
        }

        let body = response.bytes().await?.to_vec();
        debug!(url, status, bytes = body.len(), "API round trip");

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}
