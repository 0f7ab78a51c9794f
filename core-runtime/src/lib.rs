//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the sync engine:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the engine and its hosts share.
//! It establishes the logging conventions, the configuration contract, and
//! the event broadcasting used to report sync and account state.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
