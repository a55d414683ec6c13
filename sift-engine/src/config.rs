//! Config model: named profiles ("configIds") selecting patterns per log format.

use serde::Deserialize;
use std::collections::HashMap;

/// Root of the resolved configuration handed to the engine.
/// Unknown fields are silently ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigBundle {
  /// Entry reassembly and date format sections, keyed by configId.
  #[serde(default)]
  pub saved_configs: HashMap<String, EntryConfig>,
  /// Thread correlation sections, keyed by configId.
  #[serde(default)]
  pub process_threads: HashMap<String, ThreadConfig>,
  /// Filter alias patterns (may contain %and%/%or% qualifiers), keyed by configId.
  #[serde(default)]
  pub filter_aliases: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryConfig {
  /// Regex matching the first line of an entry.
  #[serde(default)]
  pub starter: Option<String>,
  /// Regex matching the last line of an entry. Without it, the next starter
  /// match closes the previous entry.
  #[serde(default)]
  pub terminator: Option<String>,
  #[serde(default)]
  pub date_format: Option<DateFormatConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DateFormatConfig {
  /// Regex locating the stamp; group 1 captures the parseable substring.
  pub regex: String,
  /// chrono format string the captured substring parses with.
  pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThreadConfig {
  /// Patterns whose matched substrings become thread keys.
  #[serde(default)]
  pub extractors: Option<Vec<String>>,
  /// Patterns vetoing a thread-end decision for an entry.
  #[serde(default)]
  pub skipends: Option<Vec<String>>,
  /// Patterns marking an entry as a thread terminator.
  #[serde(default)]
  pub ends: Option<Vec<String>>,
}

impl ConfigBundle {
  pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(text)
  }
}
