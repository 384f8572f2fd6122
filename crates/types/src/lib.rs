//! peerdex shared types
//!
//! Data model for discovered and published naming pointers, the peer index
//! document exchanged between nodes, and the typed progress events streamed by
//! the scan and publish orchestrators.

pub mod catalog;
pub mod entry;
pub mod index_document;
pub mod publish;
pub mod scan;

pub use catalog::{CatalogEntry, EntrySource, INDEX_LABEL};
pub use entry::{DiscoveredEntry, PublishedEntry};
pub use index_document::{IndexDocumentError, PeerIndexDocument, INDEX_FILE_NAME};
pub use publish::{IndexOutcome, OutcomeError, PublishEvent, PublishOutcome, PublishSummary};
pub use scan::{PeerEntry, ScanEvent, ScanResult, ScanSummary};
