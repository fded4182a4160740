//! # Event subscribers for the procvisor runtime.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out
//! and the built-in [`LogWriter`].
//!
//! ## Architecture
//! ```text
//! Supervisor::publish(Event)
//!     ├──► SubscriberSet::emit ──┬──► LogWriter
//!     │                          ├──► Metrics
//!     │                          └──► Custom
//!     └──► Bus::publish ─────────────► external receivers (Supervisor::subscribe)
//! ```

mod log;
mod set;
mod subscribe;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
