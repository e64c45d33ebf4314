//! Campus SSO watcher service library.
//!
//! The core of this crate is the authenticated session acquisition engine:
//! a client that logs in against the campus single-sign-on gateway
//! (replicating the browser's client-side password encryption and hidden
//! form-field handshake), keeps a cookie-bearing session alive, and derives
//! per-service bearer tokens by inspecting CAS redirect chains.
//!
//! On top of that engine sit the watcher tasks (grades, power balance), an
//! email notification sink, and a small policy-driven scheduler.

pub mod api;
pub mod auth;
pub mod config;
pub mod notify;
pub mod scheduler;
pub mod watchers;
