//! HTTP surface of the webhook proxy

mod errors;
mod extractors;
pub mod handlers;

pub use errors::ProxyError;
pub use extractors::SignatureHeaderValue;
