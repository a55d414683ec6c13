//! Verdicts, lifecycle events, and the capability traits stages implement.

use crate::config::ConfigBundle;
use crate::error::FilterError;

/// Outcome of pushing one entry through a filter stage (or the whole chain).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
  /// The entry survived; carries the (possibly transformed) text.
  Pass(String),
  /// The entry was dropped or buffered; nothing flows further this call.
  Drop,
  /// The upper date bound was exceeded; carries the formatted bound.
  /// Processing of the current chunk should stop. Not an error.
  Stop(String),
}

/// Out-of-band lifecycle events delivered at chunk/stream boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
  /// One input source (e.g. one file) was fully read.
  ChunkEnded,
  /// The whole run is done.
  AllChunksProcessed,
  /// The config profile should be re-resolved.
  ConfigRefreshed,
}

/// The filtering operation itself.
pub trait Filterable {
  fn filter(&mut self, data: String) -> Result<Verdict, FilterError>;
}

/// Lifecycle handling for stages that buffer state across entries.
pub trait EventReactive {
  /// Reacts to a lifecycle event, returning any entries flushed out of
  /// internal buffers.
  fn process_event(&mut self, event: Event) -> Vec<String>;

  /// Clears buffered state unconditionally.
  fn flush(&mut self);
}

/// Construction and reconfiguration from a named config profile.
pub trait ConfigBound: Sized {
  /// Does `config_id` carry configuration for this stage kind?
  fn config_id_exists(config: &ConfigBundle, config_id: &str) -> bool;

  fn from_config(config: &ConfigBundle, config_id: &str) -> Result<Self, FilterError>;

  /// Attempts reconfiguration for `config_id`. Config errors are reported
  /// as "no change"; returns true only when parameters actually changed.
  fn refresh_by_config_id(&mut self, config: &ConfigBundle, config_id: &str) -> bool;
}
