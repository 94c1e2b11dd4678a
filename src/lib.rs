//! Harmonix Platform Library
//!
//! Core of the Harmonix developer platform backend: git provider adapters,
//! the AWS facade, catalog processors, platform workflows and scaffolder
//! actions. Tests are included in the module files and under `tests/`.
//!
//! ## Quick Start
//!
//! ```rust
//! use harmonix_platform::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod actions;
pub mod aws;
pub mod catalog;
pub mod config;
pub mod constants;
pub mod error;
pub mod observability;
pub mod platform;
pub mod prelude;
pub mod runtime;
pub mod scm;
pub mod server;
