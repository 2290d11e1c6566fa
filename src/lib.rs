//! Level-triggered reconciliation controller.
//!
//! A watch-driven [`StateCache`] mirrors a remote collection, every accepted
//! delta enqueues the object's identity in a deduplicating, rate-limited
//! [`WorkQueue`], and a fixed pool of workers drives a [`Handler`] towards the
//! current state of each identity.

mod cache;
mod config;
mod constants;
mod controller;
mod errors;
mod handler;
pub mod metrics;
mod pipeline;
mod queue;
mod resource;
pub mod source;
pub mod utils;

pub use cache::*;
pub use config::*;
pub use constants::LOG_FILE_NAME;
pub use controller::*;
pub use errors::*;
pub use handler::*;
pub use pipeline::*;
pub use queue::*;
pub use resource::*;
pub use source::KubePodCollection;
pub use source::RemoteCollection;
pub use utils::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
