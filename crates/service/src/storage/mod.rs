//! Storage abstractions for the service layer
//!
//! A record store maps `(collection, key)` to one JSON document. The file
//! implementation keeps one document per file under a fixed root.

pub mod errors;
pub mod record_store;

pub use errors::StoreError;
pub use record_store::{read_json, Document, FileRecordStore, RecordStore};
