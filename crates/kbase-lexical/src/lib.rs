#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for index lifecycle operations.
pub const TRACING_TARGET_INDEX: &str = "kbase_lexical::index";

/// Tracing target for search operations.
pub const TRACING_TARGET_SEARCH: &str = "kbase_lexical::search";

mod config;
mod error;
mod store;

pub use config::LexicalStoreConfig;
pub use error::{LexicalError, LexicalResult};
pub use store::{LexicalHit, LexicalRecord, LexicalStore};
