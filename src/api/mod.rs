//! Downstream API support: error taxonomy and bearer-token derivation.
//!
//! Watcher tasks talk to the downstream campus APIs through the shared
//! session handle; this module supplies the per-service token bridge and
//! the engine's error vocabulary.

pub mod error;
pub mod token;

pub use error::EngineError;
pub use token::derive_token;
