//! OpenAI-compatible HTTP gateway in front of a sentinel-delimited chat
//! upstream.
//!
//! Exposes `/healthz`, `/v1/models`, `/v1/models/{id}` and
//! `/v1/chat/completions`; protocol translation itself lives in
//! `jimmygate-core`.
#![deny(unsafe_code)]

mod auth;
mod chat;
pub mod completion;
pub mod config;
mod cors;
pub mod error;
pub mod models;
pub mod models_cache;
mod stream;
pub mod server;
pub mod upstream;

pub use config::{DEFAULT_MODEL, ProxyConfig};
pub use error::ProxyError;
pub use models_cache::ModelDirectory;
pub use server::{ProxyState, create_router, serve};
pub use upstream::{ModelListSource, UpstreamClient};
