pub mod error;

pub use error::{FeedctlError, Result};
