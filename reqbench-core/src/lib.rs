#![forbid(unsafe_code)]

pub mod http;
pub mod runner;

mod error;
mod template;

pub use error::{Error, Result};
pub use template::{BasicAuth, Method, RequestTemplate, RequestTemplateBuilder, RequestVariant};
