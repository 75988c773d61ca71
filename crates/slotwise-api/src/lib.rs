//! HTTP API for booking, availability, and appointment management.
//!
//! Identity and permissions are resolved upstream; this surface trusts the
//! `X-Customer-Id` / `X-Actor-*` headers stamped by the auth layer and
//! applies only domain-level rules.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod handlers;
pub mod server;
pub mod state;

pub use config::Config;
pub use server::{create_router, start_server};
pub use state::AppState;
