//! # feedctl
//!
//! Client library and command-line wrapper for the HTTP automation API
//! exposed by a desktop feed reader on a local port.
//!
//! ## Architecture
//!
//! ```text
//! ops → client → wire → transport
//! ```
//!
//! - [`client`]: the [`ApiClient`](client::ApiClient), one round trip per
//!   call, plus a convenience method per remote operation
//! - [`wire`]: argument/payload marshaling and response decoding
//! - [`transport`]: the HTTP seam (reqwest behind a trait)
//! - [`xml`]: the small element tree the API speaks
//!
//! ## Quick start
//!
//! ```no_run
//! use feedctl::{ApiClient, Ids};
//!
//! # async fn demo() -> feedctl::Result<()> {
//! let api = ApiClient::new(None, Some("s3cret"))?;
//!
//! // every channel's name
//! let channels = api.channels(None, false).await?;
//! for channel in channels.as_array().into_iter().flatten() {
//!     println!("{}", channel["name"]);
//! }
//!
//! api.delete_channels(Ids::from(vec![3, 5])).await?;
//! # Ok(())
//! # }
//! ```
//!
//! Or from the command line:
//!
//! ```bash
//! feedctl channels/list verbose=1
//! feedctl workpads/addItem id=@ url=https://example.com title=Example
//! ```

/// Error type and crate-wide `Result` alias.
pub mod app;

/// Command-line interface: flags, `key=value` argument parsing, output.
pub mod cli;

/// The API client: transport primitive (`call`/`call_checked`) and one
/// convenience method per remote operation.
pub mod client;

/// HTTP transport behind a trait, so tests can swap in a canned one.
pub mod transport;

/// Request/response marshaling: API arguments, payload merging, deflate
/// decoding, format-tagged response bodies.
pub mod wire;

/// Navigable XML element tree used for payloads and tree-shaped responses.
pub mod xml;

pub use app::{FeedctlError, Result};
pub use client::ops::{SearchOptions, SearchScope};
pub use client::{ApiClient, ApiResponse, DEFAULT_API_URL};
pub use wire::{ApiArgs, ArgValue, Body, Ids, ResponseFormat};
pub use xml::Element;
