//! Sift Engine — configurable log-filtering pipeline.
//!
//! Reassembles raw log lines into logical multi-line entries, filters them
//! through qualifier patterns, cross-entry thread correlation, and a date
//! window with deterministic early stop, then aggregates the survivors.
//! Named config profiles ("configIds") select the patterns per log format,
//! so one binary serves many formats without code changes.
//!
//! No AI, no DB, no network; pure computation + in-memory state.

pub mod aggregate;
pub mod chain;
pub mod config;
pub mod entries;
pub mod error;
pub mod flow;
pub mod matcher;
pub mod pattern;
pub mod threads;
pub mod window;

pub use chain::{FilterChain, Stage, StageKind};
pub use config::ConfigBundle;
pub use error::FilterError;
pub use flow::{ConfigBound, Event, EventReactive, Filterable, Verdict};
