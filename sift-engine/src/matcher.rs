//! Extended pattern filter: containment match against the composed qualifier pattern.

use log::debug;

use crate::config::ConfigBundle;
use crate::error::FilterError;
use crate::flow::{ConfigBound, Filterable, Verdict};
use crate::pattern::{Qualifier, QualifierPattern};

/// Passes entries containing the qualifier pattern through unchanged.
///
/// Matching uses find (containment) semantics, never full anchoring.
/// Standalone, the pattern is fixed at construction; embedded in the thread
/// correlator, open-thread keys are spliced in and out as threads open and
/// close.
#[derive(Debug, Clone)]
pub struct MatchFilter {
  raw: String,
  pattern: QualifierPattern,
  config_id: Option<String>,
}

impl MatchFilter {
  pub fn new(raw: &str) -> Result<Self, FilterError> {
    Ok(Self {
      raw: raw.to_string(),
      pattern: QualifierPattern::from_raw(raw)?,
      config_id: None,
    })
  }

  /// The alias pattern this filter was configured with.
  pub fn raw_pattern(&self) -> &str {
    &self.raw
  }

  pub fn set_pattern(&mut self, raw: &str) -> Result<(), FilterError> {
    self.pattern.set_pattern(raw)?;
    self.raw = raw.to_string();
    Ok(())
  }

  /// Resets to the configured alias, dropping any parts spliced in since.
  pub fn reset(&mut self) -> Result<(), FilterError> {
    self.pattern.set_pattern(&self.raw)
  }

  pub fn matches(&self, text: &str) -> bool {
    self.pattern.is_match(text)
  }

  pub fn add_part(&mut self, value: &str, qualifier: Option<Qualifier>) -> Result<(), FilterError> {
    self.pattern.add_part(value, qualifier)
  }

  pub fn remove_part(&mut self, value: &str) -> Result<(), FilterError> {
    self.pattern.remove_part(value)
  }

  pub fn pattern(&self) -> &QualifierPattern {
    &self.pattern
  }
}

impl Filterable for MatchFilter {
  fn filter(&mut self, data: String) -> Result<Verdict, FilterError> {
    if self.pattern.is_match(&data) {
      Ok(Verdict::Pass(data))
    } else {
      Ok(Verdict::Drop)
    }
  }
}

impl ConfigBound for MatchFilter {
  fn config_id_exists(config: &ConfigBundle, config_id: &str) -> bool {
    config.filter_aliases.contains_key(config_id)
  }

  fn from_config(config: &ConfigBundle, config_id: &str) -> Result<Self, FilterError> {
    let Some(alias) = config.filter_aliases.get(config_id) else {
      return Err(FilterError::config_not_found(config_id));
    };
    let mut filter = Self::new(alias)?;
    filter.config_id = Some(config_id.to_string());
    Ok(filter)
  }

  fn refresh_by_config_id(&mut self, config: &ConfigBundle, config_id: &str) -> bool {
    if self.config_id.as_deref() == Some(config_id) {
      return false;
    }
    let Some(alias) = config.filter_aliases.get(config_id) else {
      debug!("no filter alias for {}, not refreshing", config_id);
      return false;
    };
    match self.set_pattern(alias) {
      Ok(()) => {
        self.config_id = Some(config_id.to_string());
        true
      }
      Err(e) => {
        debug!("not refreshing: {}", e);
        false
      }
    }
  }
}
