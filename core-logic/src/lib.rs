//! # Core Logic - Shared Runtime for Account Runners
//!
//! This crate provides the service-independent pieces used by the runners
//! under `chains/`: activity tracking, retry policy, HTTP transport and
//! payload decoding, account loading and logging.
//!
//! ## Modules
//!
//! - [`activity`] - Last-activity record, pacing/countdown windows, freeze watchdog
//! - [`config`] - Plain configuration records
//! - [`entropy`] - Injectable randomness
//! - [`error`] - Typed error handling with thiserror
//! - [`http`] - Request/response values, zstd-aware decoder, reqwest transport
//! - [`traits`] - Core trait definitions
//! - [`utils`] - Logger, retry policy, account loader, shutdown signal

// Module declarations - internal modules marked pub(crate)
pub mod activity;
pub mod config;
pub mod entropy;
pub mod error;
pub mod http;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod traits;
pub(crate) mod utils;

// Selective exports - only public API types
pub use activity::{spawn_watchdog, ActivityState, PacingGuard};
pub use config::{AccountRecord, DelayRange};
pub use entropy::{Entropy, SystemEntropy};
pub use error::{ConfigError, CoreError, DecodeError, NetworkError, SessionError, TaskError};
pub use http::{decode_json_body, HttpRequest, HttpResponse, Method, ReqwestTransport};
pub use traits::Transport;

// Utils are pub(crate) - only export specific public utilities
pub use utils::{setup_logger, targets, AccountLoader, ShutdownSignal};

pub use utils::retry::{attempt_timeout, RetryConfig, MAX_ATTEMPTS};
