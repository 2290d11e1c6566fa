//! Explicit wiring of the reconciliation pipeline.
//!
//! ```text
//! RemoteCollection --list/watch--> Informer --Notification--> router --key--> WorkQueue --> workers --> Handler
//!                                     |                                                       ^
//!                                     +------------------- StateCache ------------------------+
//! ```
//! [`PipelineBuilder`] constructs every stage from a [`crate::ControllerConfig`];
//! [`Pipeline::run`] owns their lifecycle.

mod builder;
#[allow(clippy::module_inception)]
mod pipeline;

pub use builder::*;
pub use pipeline::*;
