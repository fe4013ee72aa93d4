//! Request/response marshaling for the automation API.
//!
//! Arguments travel as attributes of an `<apiArgs>` element embedded in the
//! POST body rather than in the URL, so the access token never shows up in
//! request logs. Responses come back deflate-compressed on request and are
//! decoded as an XML tree or a JSON mapping depending on the negotiated
//! `format` argument.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;

use flate2::read::DeflateDecoder;
use serde_json::Value;

use crate::app::{FeedctlError, Result};
use crate::xml::Element;

/// Wrapper element carrying the API arguments inside a request payload.
const API_ARGS_TAG: &str = "apiArgs";

/// A scalar argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Str(String),
    Bool(bool),
    Int(i64),
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Str(s) => f.write_str(s),
            ArgValue::Bool(true) => f.write_str("true"),
            ArgValue::Bool(false) => f.write_str("false"),
            ArgValue::Int(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        ArgValue::Str(value.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        ArgValue::Str(value)
    }
}

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        ArgValue::Bool(value)
    }
}

impl From<i64> for ArgValue {
    fn from(value: i64) -> Self {
        ArgValue::Int(value)
    }
}

impl From<i32> for ArgValue {
    fn from(value: i32) -> Self {
        ArgValue::Int(value.into())
    }
}

impl From<u32> for ArgValue {
    fn from(value: u32) -> Self {
        ArgValue::Int(value.into())
    }
}

/// One or more identifiers addressed by an operation.
///
/// Most operations accept a comma-separated list; a few accept exactly one id
/// and reject `Many` before any network access.
#[derive(Debug, Clone)]
pub enum Ids {
    One(ArgValue),
    Many(Vec<ArgValue>),
}

impl Ids {
    /// Collapse into a single argument value: scalars stay scalar, lists are
    /// comma-joined into a string.
    pub fn joined(&self) -> ArgValue {
        match self {
            Ids::One(value) => value.clone(),
            Ids::Many(values) => ArgValue::Str(
                values
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(","),
            ),
        }
    }

    pub fn is_many(&self) -> bool {
        matches!(self, Ids::Many(_))
    }
}

impl From<i64> for Ids {
    fn from(id: i64) -> Self {
        Ids::One(ArgValue::Int(id))
    }
}

impl From<&str> for Ids {
    fn from(id: &str) -> Self {
        Ids::One(ArgValue::Str(id.to_string()))
    }
}

impl From<String> for Ids {
    fn from(id: String) -> Self {
        Ids::One(ArgValue::Str(id))
    }
}

impl From<Vec<i64>> for Ids {
    fn from(ids: Vec<i64>) -> Self {
        Ids::Many(ids.into_iter().map(ArgValue::Int).collect())
    }
}

impl From<&[i64]> for Ids {
    fn from(ids: &[i64]) -> Self {
        Ids::Many(ids.iter().copied().map(ArgValue::Int).collect())
    }
}

impl From<Vec<&str>> for Ids {
    fn from(ids: Vec<&str>) -> Self {
        Ids::Many(ids.into_iter().map(ArgValue::from).collect())
    }
}

impl From<Vec<String>> for Ids {
    fn from(ids: Vec<String>) -> Self {
        Ids::Many(ids.into_iter().map(ArgValue::Str).collect())
    }
}

/// Arguments for one API call: a mapping from key to scalar value.
///
/// Built fresh per call and merged with the access token (if configured)
/// before the request goes out.
#[derive(Debug, Clone, Default)]
pub struct ApiArgs {
    entries: BTreeMap<String, ArgValue>,
}

impl ApiArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arguments preset with `format=json`, the shape most operations request.
    pub fn json() -> Self {
        Self::new().with("format", "json")
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ArgValue>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ArgValue> {
        self.entries.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Add an `id` entry for the addressed identifiers; a missing selection
    /// adds nothing.
    pub fn set_ids(&mut self, ids: Option<&Ids>) {
        if let Some(ids) = ids {
            self.set("id", ids.joined());
        }
    }

    pub fn with_ids(mut self, ids: Option<&Ids>) -> Self {
        self.set_ids(ids);
        self
    }

    /// The response format these arguments negotiate: the `format` value,
    /// else its one-letter alias `f`, defaulting to XML.
    pub fn response_format(&self) -> ResponseFormat {
        self.get("format")
            .or_else(|| self.get("f"))
            .map(|v| ResponseFormat::from_arg(&v.to_string()))
            .unwrap_or(ResponseFormat::Xml)
    }
}

/// Response decoding selected by the `format` argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Xml,
    Json,
    Html,
    Other,
}

impl ResponseFormat {
    fn from_arg(value: &str) -> Self {
        match value {
            "xml" => ResponseFormat::Xml,
            "json" => ResponseFormat::Json,
            "html" => ResponseFormat::Html,
            _ => ResponseFormat::Other,
        }
    }
}

/// A decoded response body, discriminated by the resolved format.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Parsed XML tree (`format=xml`, the default).
    Tree(Element),
    /// Parsed JSON mapping (`format=json`).
    Mapping(Value),
    /// Untouched bytes (raw mode, `format=html`, or any other format).
    Raw(Vec<u8>),
    /// The server sent nothing (or only whitespace) back.
    Empty,
}

impl Body {
    pub fn as_tree(&self) -> Option<&Element> {
        match self {
            Body::Tree(tree) => Some(tree),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Value> {
        match self {
            Body::Mapping(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_raw(&self) -> Option<&[u8]> {
        match self {
            Body::Raw(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn into_tree(self) -> Result<Element> {
        match self {
            Body::Tree(tree) => Ok(tree),
            _ => Err(FeedctlError::UnexpectedResponse("expected an XML response")),
        }
    }

    pub fn into_mapping(self) -> Result<Value> {
        match self {
            Body::Mapping(value) => Ok(value),
            _ => Err(FeedctlError::UnexpectedResponse("expected a JSON response")),
        }
    }

    pub fn into_raw(self) -> Result<Vec<u8>> {
        match self {
            Body::Raw(bytes) => Ok(bytes),
            Body::Empty => Ok(Vec::new()),
            _ => Err(FeedctlError::UnexpectedResponse("expected a raw response")),
        }
    }
}

/// Build the request payload for a call.
///
/// The arguments are injected as attributes of an `<apiArgs>` element placed
/// as the *first* child of the payload root: the server stops parsing once it
/// has seen that element, so putting it first saves it from walking the rest
/// of the document. With no arguments the supplied body passes through
/// verbatim, and with neither arguments nor body no payload is sent at all.
pub fn merge_args(args: &ApiArgs, post_data: Option<&str>) -> Result<Option<Vec<u8>>> {
    if args.is_empty() {
        return Ok(post_data.map(|data| data.as_bytes().to_vec()));
    }

    let mut args_node = Element::new(API_ARGS_TAG);
    for (key, value) in args.iter() {
        args_node.set_attr(key, value.to_string());
    }

    let payload = match post_data {
        None => args_node.to_xml(),
        Some(data) => {
            let mut root = Element::parse(data.as_bytes())?;
            root.children.insert(0, args_node);
            root.to_xml()
        }
    };
    Ok(Some(payload.into_bytes()))
}

/// Raw-deflate decompression (no zlib wrapper), per the server's
/// `Content-Encoding: deflate`.
pub fn inflate(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut decoded = Vec::new();
    DeflateDecoder::new(bytes).read_to_end(&mut decoded)?;
    Ok(decoded)
}

/// Decode a response body according to the negotiated format.
///
/// An empty (or whitespace-only) body decodes to [`Body::Empty`] rather than
/// a parse error; formats other than XML/JSON pass through untouched.
pub fn decode_body(format: ResponseFormat, bytes: Vec<u8>) -> Result<Body> {
    match format {
        ResponseFormat::Xml | ResponseFormat::Json
            if bytes.iter().all(u8::is_ascii_whitespace) =>
        {
            Ok(Body::Empty)
        }
        ResponseFormat::Xml => Ok(Body::Tree(Element::parse(&bytes)?)),
        ResponseFormat::Json => Ok(Body::Mapping(serde_json::from_slice(&bytes)?)),
        ResponseFormat::Html | ResponseFormat::Other => Ok(Body::Raw(bytes)),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::write::DeflateEncoder;
    use flate2::Compression;

    use super::*;

    #[test]
    fn ids_list_becomes_comma_joined_entry() {
        let args = ApiArgs::new().with_ids(Some(&Ids::from(vec![1i64, 2, 3])));
        assert_eq!(args.get("id"), Some(&ArgValue::Str("1,2,3".into())));
    }

    #[test]
    fn scalar_id_stays_scalar() {
        let args = ApiArgs::new().with_ids(Some(&Ids::from(7i64)));
        assert_eq!(args.get("id"), Some(&ArgValue::Int(7)));
    }

    #[test]
    fn missing_ids_add_nothing() {
        let args = ApiArgs::new().with_ids(None);
        assert!(args.get("id").is_none());
        assert!(args.is_empty());
    }

    #[test]
    fn bool_args_render_lowercase() {
        assert_eq!(ArgValue::from(true).to_string(), "true");
        assert_eq!(ArgValue::from(false).to_string(), "false");
    }

    #[test]
    fn format_resolution_prefers_format_over_alias() {
        assert_eq!(ApiArgs::new().response_format(), ResponseFormat::Xml);
        assert_eq!(ApiArgs::json().response_format(), ResponseFormat::Json);
        assert_eq!(
            ApiArgs::new().with("f", "json").response_format(),
            ResponseFormat::Json
        );
        assert_eq!(
            ApiArgs::new()
                .with("format", "html")
                .with("f", "json")
                .response_format(),
            ResponseFormat::Html
        );
        assert_eq!(
            ApiArgs::new().with("format", "csv").response_format(),
            ResponseFormat::Other
        );
    }

    #[test]
    fn no_args_and_no_body_sends_nothing() {
        assert_eq!(merge_args(&ApiArgs::new(), None).unwrap(), None);
    }

    #[test]
    fn no_args_passes_body_through_verbatim() {
        // Without arguments the body is never parsed, XML or not.
        let payload = merge_args(&ApiArgs::new(), Some("plain text, not XML"))
            .unwrap()
            .unwrap();
        assert_eq!(payload, b"plain text, not XML");
    }

    #[test]
    fn args_without_body_become_the_entire_payload() {
        let args = ApiArgs::json().with("verbose", true).with("token", "s3cret");
        let payload = merge_args(&args, None).unwrap().unwrap();

        let root = Element::parse(&payload).unwrap();
        assert_eq!(root.name, "apiArgs");
        assert!(root.children.is_empty());
        assert_eq!(root.attr("format"), Some("json"));
        assert_eq!(root.attr("verbose"), Some("true"));
        assert_eq!(root.attr("token"), Some("s3cret"));
    }

    #[test]
    fn args_merge_as_first_child_preserving_body() {
        let body = "<channel type=\"standard\"><feedUrl>https://example.com/feed.xml</feedUrl></channel>";
        let args = ApiArgs::json().with("token", "s3cret");
        let payload = merge_args(&args, Some(body)).unwrap().unwrap();

        let root = Element::parse(&payload).unwrap();
        assert_eq!(root.name, "channel");
        assert_eq!(root.attr("type"), Some("standard"));

        let first = &root.children[0];
        assert_eq!(first.name, "apiArgs");
        assert_eq!(first.attr("format"), Some("json"));
        assert_eq!(first.attr("token"), Some("s3cret"));

        assert_eq!(
            root.find("feedUrl").unwrap().text(),
            "https://example.com/feed.xml"
        );
    }

    #[test]
    fn inflate_round_trips_raw_deflate() {
        let plain = b"<channels><channel/><channel/></channels>";
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(plain).unwrap();
        let compressed = encoder.finish().unwrap();

        assert_eq!(inflate(&compressed).unwrap(), plain);
    }

    #[test]
    fn decode_xml_body() {
        let body = decode_body(ResponseFormat::Xml, b"<channels><channel/></channels>".to_vec())
            .unwrap();
        let tree = body.as_tree().unwrap();
        assert_eq!(tree.name, "channels");
        assert_eq!(tree.children.len(), 1);
    }

    #[test]
    fn decode_json_body() {
        let body = decode_body(ResponseFormat::Json, br#"{"stats":{"channels":12}}"#.to_vec())
            .unwrap();
        assert_eq!(body.as_mapping().unwrap()["stats"]["channels"], 12);
    }

    #[test]
    fn empty_body_is_empty_not_a_parse_error() {
        assert_eq!(
            decode_body(ResponseFormat::Xml, b"  \n ".to_vec()).unwrap(),
            Body::Empty
        );
        assert_eq!(
            decode_body(ResponseFormat::Json, Vec::new()).unwrap(),
            Body::Empty
        );
    }

    #[test]
    fn html_and_unknown_formats_stay_raw() {
        let html = b"<html><body>summary</body></html>".to_vec();
        assert_eq!(
            decode_body(ResponseFormat::Html, html.clone()).unwrap(),
            Body::Raw(html)
        );
        assert_eq!(
            decode_body(ResponseFormat::Other, b"a,b,c".to_vec()).unwrap(),
            Body::Raw(b"a,b,c".to_vec())
        );
    }
}
