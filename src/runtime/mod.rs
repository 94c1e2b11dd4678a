//! # Runtime
//!
//! Process startup for the platform server.

pub mod initialization;
