pub mod ops;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::app::{FeedctlError, Result};
use crate::transport::http::HttpTransport;
use crate::transport::{RawResponse, Transport};
use crate::wire::{self, ApiArgs, Body, ResponseFormat};

/// Where the reader listens when nothing else is configured.
pub const DEFAULT_API_URL: &str = "http://localhost:2604";

/// Client for the reader's HTTP automation API.
///
/// Holds only the endpoint URL and an optional access token; every call is an
/// independent round trip, so one client can be shared freely across tasks.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    token: Option<String>,
    transport: Arc<dyn Transport + Send + Sync>,
}

/// A decoded API response: HTTP status, header mapping, decoded body.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Body,
}

impl ApiResponse {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl ApiClient {
    /// Create a client for the given endpoint (default [`DEFAULT_API_URL`])
    /// with an optional access token.
    pub fn new(url: Option<&str>, token: Option<&str>) -> Result<Self> {
        Self::with_transport(url, token, Arc::new(HttpTransport::new()))
    }

    /// Create a client over a caller-supplied transport.
    pub fn with_transport(
        url: Option<&str>,
        token: Option<&str>,
        transport: Arc<dyn Transport + Send + Sync>,
    ) -> Result<Self> {
        Ok(Self {
            base_url: normalize_url(url.unwrap_or(DEFAULT_API_URL))?,
            token: token.map(String::from),
            transport,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Call a remote operation. This is the sole transport primitive; the
    /// convenience methods all come through here.
    ///
    /// The access token (if configured) is merged into the arguments, and the
    /// arguments travel inside the POST body rather than the URL. A response
    /// declaring `Content-Encoding: deflate` is raw-inflated before decoding.
    /// Unless `raw` is set, the body is decoded per the negotiated format.
    ///
    /// Any HTTP status is returned as-is in [`ApiResponse::status`]; this
    /// layer does not retry and does not fail on non-2xx. The body of a
    /// non-success response is returned raw: error pages don't follow the
    /// negotiated format.
    pub async fn call(
        &self,
        name: &str,
        args: &ApiArgs,
        post_data: Option<&str>,
        raw: bool,
    ) -> Result<ApiResponse> {
        let mut args = args.clone();
        if let Some(token) = &self.token {
            args.set("token", token.as_str());
        }

        let url = format!("{}/{}", self.base_url, name);
        let payload = wire::merge_args(&args, post_data)?;
        debug!(operation = name, has_payload = payload.is_some(), "calling API");

        let response = self.transport.send(&url, payload).await?;

        let deflated = response.header("Content-Encoding") == Some("deflate");
        let RawResponse {
            status,
            headers,
            body,
        } = response;
        let body = if deflated { wire::inflate(&body)? } else { body };
        let body = if raw || !(200..300).contains(&status) {
            Body::Raw(body)
        } else {
            wire::decode_body(args.response_format(), body)?
        };

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }

    /// Call a remote operation and fail on any error the server reports,
    /// whether as an HTTP status or embedded in the response body.
    ///
    /// A `quiet` flag is forced into the arguments so the server never stops
    /// to ask for interactive confirmation.
    pub async fn call_checked(
        &self,
        name: &str,
        mut args: ApiArgs,
        post_data: Option<&str>,
        raw: bool,
    ) -> Result<Body> {
        args.set("quiet", false);
        let format = args.response_format();

        let response = self.call(name, &args, post_data, raw).await?;
        if !response.is_success() {
            return Err(FeedctlError::Status {
                status: response.status,
            });
        }
        if raw {
            return Ok(response.body);
        }

        match format {
            ResponseFormat::Json => {
                if let Some(message) = response
                    .body
                    .as_mapping()
                    .and_then(|value| value.get("status"))
                    .and_then(|status| status.get("errorMsg"))
                    .and_then(Value::as_str)
                {
                    return Err(FeedctlError::Remote(message.to_string()));
                }
            }
            ResponseFormat::Xml => {
                if let Some(node) = response.body.as_tree().and_then(|tree| tree.find("errorMsg"))
                {
                    return Err(FeedctlError::Remote(node.text().to_string()));
                }
            }
            ResponseFormat::Html => {
                if let Some(message) = response.body.as_raw().and_then(find_html_error) {
                    return Err(FeedctlError::Remote(message));
                }
            }
            ResponseFormat::Other => {}
        }

        Ok(response.body)
    }
}

/// A few operations answer with a rendered HTML page; errors show up as a
/// marked table cell instead of a structured field.
fn find_html_error(body: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(body);
    let marker = "<td class=\"error-msg value\">";
    let start = text.find(marker)? + marker.len();
    let end = text[start..].find("</td>")? + start;
    Some(text[start..end].trim().to_string())
}

/// Default the scheme to plain HTTP when none is given, validate, and strip
/// any trailing slash so operation paths can be appended directly.
fn normalize_url(url: &str) -> Result<String> {
    let url = if url.contains("://") {
        url.to_string()
    } else {
        format!("http://{url}")
    };
    Url::parse(&url)?;
    Ok(url.trim_end_matches('/').to_string())
}

#[cfg(test)]
pub(crate) mod mock {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    /// Canned-response transport recording every request it sees.
    pub struct MockTransport {
        responses: Mutex<VecDeque<RawResponse>>,
        requests: Mutex<Vec<(String, Option<Vec<u8>>)>>,
    }

    impl MockTransport {
        pub fn new(responses: Vec<RawResponse>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        pub fn ok(body: &str) -> RawResponse {
            RawResponse {
                status: 200,
                headers: BTreeMap::new(),
                body: body.as_bytes().to_vec(),
            }
        }

        pub fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        pub fn request(&self, index: usize) -> (String, Option<Vec<u8>>) {
            self.requests.lock().unwrap()[index].clone()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&self, url: &str, payload: Option<Vec<u8>>) -> Result<RawResponse> {
            self.requests
                .lock()
                .unwrap()
                .push((url.to_string(), payload));
            Ok(self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("mock transport ran out of responses"))
        }
    }

    pub fn client_with(
        token: Option<&str>,
        responses: Vec<RawResponse>,
    ) -> (ApiClient, Arc<MockTransport>) {
        let transport = MockTransport::new(responses);
        let client = ApiClient::with_transport(None, token, transport.clone()).unwrap();
        (client, transport)
    }
}
