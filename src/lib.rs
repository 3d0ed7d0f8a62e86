//! CareAlign: session-gated clinical documentation assistant.
//!
//! ARCHITECTURE
//! ============
//! `identity` talks to the identity provider. `session` turns the
//! provider's notifications into one observable session per visitor.
//! `gate` and `signin` decide what a visitor may see and where to send
//! them. `routes` exposes all of it over HTTP.

pub mod analysis;
pub mod config;
pub mod error;
pub mod gate;
pub mod identity;
pub mod redirect;
pub mod routes;
pub mod services;
pub mod session;
pub mod signin;
pub mod state;
