//! Watcher tasks.
//!
//! A watcher is a unit of scheduled work that pulls data from a downstream
//! campus API through the shared SSO session and pushes anything noteworthy
//! to the notification sink. `run` reports plain success/failure; the
//! scheduler logs the outcome and moves on either way.

use async_trait::async_trait;

pub mod grades;
pub mod power;

pub use grades::GradeWatcher;
pub use power::PowerWatcher;

#[async_trait]
pub trait Watcher: Send + Sync {
    fn name(&self) -> &str;

    /// Run one check. Returns `true` when the check completed, whether or
    /// not it found anything new.
    async fn run(&mut self) -> bool;
}
