//! Domain services used by HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own visitor bookkeeping so route handlers can stay
//! focused on protocol translation and auth plumbing.

pub mod visitors;
