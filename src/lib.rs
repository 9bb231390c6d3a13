#![deny(missing_docs)]
//! PDF courier bot library.
//!
//! Attachment gateway between Telegram and an external document-processing
//! pipeline: validation, scoped transfers, conversation state and delivery.

/// Task telemetry.
pub mod analytics;
/// Telegram transport: dispatcher handlers, dialogue state and views.
pub mod bot;
/// Configuration management.
pub mod config;
/// Attachment gateway core.
pub mod gateway;
/// Chat platform seam and its Telegram implementation.
pub mod platform;
/// Document-processing collaborator.
pub mod processing;
/// Utility functions.
pub mod utils;
