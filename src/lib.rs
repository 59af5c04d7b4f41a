//! # Skillet
//!
//! A multi-tenant incremental full-text indexing service. Skillet sits in
//! front of a document database and keeps one inverted index per
//! (instance, docType, language) continuously in sync with the database's
//! change feed. Newly observed documents are routed to the shard of their
//! detected language; updated documents stay in the shard that already owns
//! them. After every successful pass the refreshed shards are shipped to a
//! separate read-side query service as byte-exact store snapshots.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use skillet::{ControllerConfig, IndexController, UpdateNotif};
//! use skillet::changes::HttpChangesSource;
//! use skillet::content::NoopContentFetcher;
//! use skillet::language::WhatlangIdentifier;
//! use std::sync::Arc;
//!
//! # async fn run() -> skillet::Result<()> {
//! let controller = IndexController::new(
//!     ControllerConfig::new("./data", "./mappings", "http://query.local:8080"),
//!     Arc::new(HttpChangesSource::new("http://couch.local:5984")),
//!     Arc::new(NoopContentFetcher),
//!     Arc::new(WhatlangIdentifier::new()),
//! );
//!
//! controller.init(&["alice.example.net".to_string()]).await?;
//! controller.add_update_notif(UpdateNotif::new("alice.example.net", "photos"))?;
//! # Ok(())
//! # }
//! ```
//!
//! The change feed, the file-content extractor, and the language identifier
//! are injected services, so tests run against deterministic fakes.

pub mod changes;
pub mod content;
pub mod error;
pub mod index;
pub mod language;
pub mod mapping;
pub mod replication;
pub mod types;

pub use error::{Result, SkilletError};
pub use index::{ControllerConfig, IndexController, UpdateQueue, WorkerConfig};
pub use language::{LanguageIdentify, WhatlangIdentifier};
pub use mapping::MappingStore;
pub use replication::QueryClient;
pub use types::{
    InstanceOptions, OptionsPatch, UpdateNotif, CONTENT_DOC_TYPE, DEFAULT_LANGUAGE, FILES_DOC_TYPE,
};
