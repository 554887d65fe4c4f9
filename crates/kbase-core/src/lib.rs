#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod codes;
mod error;
mod health;

pub use codes::ApiErrorCode;
pub use error::{BoxedError, Error, ErrorKind, Result};
pub use health::{ServiceHealth, ServiceStatus};
