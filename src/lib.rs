//! Hashnode webhook proxy - verifies signed webhook deliveries and forwards
//! them to a trusted origin under SigV4
//!
//! This library provides the verification core, the outbound request model
//! and signer, and the axum handlers used by the proxy binary.

pub mod api;
pub mod config;
pub mod metrics;
pub mod request;
pub mod secrets;
pub mod signing;
pub mod webhook;
