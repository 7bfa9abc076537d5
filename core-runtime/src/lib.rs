//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the upload engine:
//! - Logging and tracing infrastructure
//! - Session configuration
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the ambient utilities the sync engine depends on. It
//! establishes the logging conventions, the explicit configuration value that
//! replaces ambient settings lookups, and the broadcast channel through which
//! queue state changes reach observers.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
