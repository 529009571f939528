//! Core systems for padgrid.
//!
//! This crate provides the foundational components of the padgrid
//! grid-controller toolkit:
//!
//! - **Signal/Slot System**: Type-safe multicast callbacks with stable
//!   connection handles and deterministic, synchronous dispatch
//! - **Scheduler**: Delayed one-shot tasks on a worker thread, used for
//!   timed visual effects
//!
//! Nothing in this crate knows about grids, views or controllers; the
//! `padgrid` crate builds the domain model on top of these pieces.
//!
//! # Signal/Slot Example
//!
//! ```
//! use padgrid_core::Signal;
//!
//! let value_changed = Signal::<i32>::new();
//!
//! let conn_id = value_changed.connect(|value| {
//!     println!("Value changed to: {}", value);
//! });
//!
//! value_changed.emit(&42);
//!
//! value_changed.disconnect(conn_id);
//! ```

mod error;
mod scheduler;
pub mod signal;

pub use error::{CoreError, Result, SchedulerError};
pub use scheduler::{ScheduledTaskId, Scheduler};
pub use signal::{ConnectionId, Signal};
