pub mod http;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::app::Result;

/// One HTTP exchange as seen on the wire: status, headers, undecoded body.
///
/// The status code is part of the contract so callers can tell "the server
/// refused the request" apart from "the server answered and the answer
/// describes an error".
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl RawResponse {
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

#[async_trait]
pub trait Transport {
    /// Perform one round trip: POST the payload if there is one, GET otherwise.
    async fn send(&self, url: &str, payload: Option<Vec<u8>>) -> Result<RawResponse>;
}
