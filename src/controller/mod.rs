//! Reconciliation loop.
//!
//! ## Per item
//! ```text
//! get -> resolve against cache -> handler call -> forget | add_rate_limited -> done
//! ```
//! The [`Controller`] owns the worker pool; the router moves cache
//! notifications into the [`crate::WorkQueue`].

mod controller;
mod router;

pub use controller::*;
pub use router::*;
