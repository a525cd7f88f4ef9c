mod client;
mod error;
mod types;

pub use client::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT, HttpClient};
pub use error::{Error, Result};
pub use types::HttpResponse;
