//! Structured error types for the filter engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FilterError {
  #[error("no config section for id: {0}")]
  ConfigNotFound(String),

  #[error("missing properties: {0}")]
  PropertiesNotFound(String),

  #[error("pattern: {0}")]
  Pattern(#[from] regex::Error),

  #[error("date format {format:?} does not parse captured stamp {value:?}")]
  DateFormatMismatch { format: String, value: String },

  #[error("filter chain has no stages")]
  NoStages,
}

impl FilterError {
  pub fn config_not_found(config_id: impl Into<String>) -> Self {
    Self::ConfigNotFound(config_id.into())
  }

  pub fn properties(what: impl Into<String>) -> Self {
    Self::PropertiesNotFound(what.into())
  }
}
