//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to observability events emitted by the supervisor and
//! subscriber workers.
//!
//! These are not the worker lifecycle notifications: those travel on the
//! event channel as [`WorkerEvent`](crate::workers::WorkerEvent) and drive
//! the supervisor. The bus only reports what the supervisor decided.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
