//! Authentication module: the session acquisition engine.
//!
//! This module provides:
//! - `cipher`: the gateway-compatible client-side password encryption
//! - `SsoClient`: the login handshake and the one shared cookie session
//! - `with_retry_on_auth_failure`: the one-shot re-login supervisor

pub mod cipher;
pub mod sso;
pub mod supervisor;

pub use sso::{SsoClient, SsoEndpoints};
pub use supervisor::{with_retry_on_auth_failure, TaskError};
