//! peerdex publishing
//!
//! Keeps tracked local directories published under their naming keys and
//! advertises them to peers through a discovery index published under the
//! node's own name.

pub mod artifact;
pub mod error;
pub mod publisher;

pub use artifact::{render_html, write_index_artifact, HTML_FILE_NAME};
pub use error::{PublishError, Result};
pub use publisher::{Publisher, DEFAULT_TTL};
