//! Model runtime providers.

mod http;

pub use http::{HttpProvider, HttpProviderConfig};
