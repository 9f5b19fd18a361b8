//! # Utilities Module
//!
//! Internal utility modules for the core-logic crate.
//! These modules are marked as `pub(crate)` to enforce API boundaries.

// Internal modules - not part of public API
pub(crate) mod account_loader;
pub(crate) mod logger;
pub(crate) mod retry;
pub(crate) mod runner;

// Selective exports - only public utilities
pub use account_loader::AccountLoader;
pub use logger::{setup_logger, targets};
pub use runner::ShutdownSignal;
