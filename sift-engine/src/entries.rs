//! Groups consecutive raw lines into logical multi-line entries.

use log::{debug, trace};
use regex::Regex;

use crate::config::ConfigBundle;
use crate::error::FilterError;
use crate::flow::{ConfigBound, Event, EventReactive, Filterable, Verdict};

/// Line-to-entry boundary detector.
///
/// An entry starts at a line matching the starter pattern. Without a
/// terminator pattern the next starter match closes the previous entry;
/// with one, the entry closes on the terminator line and interior starter
/// matches are appended rather than treated as a boundary.
#[derive(Debug, Clone)]
pub struct EntryFilter {
  starter: Regex,
  terminator: Option<Regex>,
  block: String,
  matched: bool,
  config_id: Option<String>,
}

impl EntryFilter {
  pub fn new(starter: &str) -> Result<Self, FilterError> {
    Self::with_terminator(starter, None)
  }

  pub fn with_terminator(starter: &str, terminator: Option<&str>) -> Result<Self, FilterError> {
    if starter.is_empty() {
      return Err(FilterError::properties("entry starter pattern must not be empty"));
    }
    Ok(Self {
      starter: Regex::new(starter)?,
      terminator: terminator.map(Regex::new).transpose()?,
      block: String::new(),
      matched: false,
      config_id: None,
    })
  }

  fn append(&mut self, line: &str) {
    if !self.block.is_empty() {
      self.block.push('\n');
    }
    self.block.push_str(line);
  }

  fn take_block(&mut self) -> String {
    std::mem::take(&mut self.block)
  }
}

impl Filterable for EntryFilter {
  fn filter(&mut self, data: String) -> Result<Verdict, FilterError> {
    if self.starter.is_match(&data) {
      if !self.matched {
        trace!("starting entry");
        self.matched = true;
        self.append(&data);
        return Ok(Verdict::Drop);
      }
      if self.terminator.is_some() {
        debug!("starter matched inside an open entry, appending");
        self.append(&data);
        return Ok(Verdict::Drop);
      }
      trace!("starter closes the previous entry");
      let done = self.take_block();
      self.append(&data);
      return Ok(Verdict::Pass(done));
    }

    if self.matched {
      self.append(&data);
      let terminated = self
        .terminator
        .as_ref()
        .map_or(false, |t| t.is_match(&data));
      if terminated {
        trace!("terminator closes the entry");
        let done = self.take_block();
        self.matched = false;
        return Ok(Verdict::Pass(done));
      }
    }
    Ok(Verdict::Drop)
  }
}

impl EventReactive for EntryFilter {
  fn process_event(&mut self, event: Event) -> Vec<String> {
    match event {
      Event::ChunkEnded | Event::AllChunksProcessed => {
        let done = self.take_block();
        self.flush();
        if done.is_empty() {
          Vec::new()
        } else {
          vec![done]
        }
      }
      Event::ConfigRefreshed => Vec::new(),
    }
  }

  fn flush(&mut self) {
    self.block.clear();
    self.matched = false;
  }
}

impl ConfigBound for EntryFilter {
  fn config_id_exists(config: &ConfigBundle, config_id: &str) -> bool {
    config.saved_configs.contains_key(config_id)
  }

  fn from_config(config: &ConfigBundle, config_id: &str) -> Result<Self, FilterError> {
    let Some(section) = config.saved_configs.get(config_id) else {
      return Err(FilterError::config_not_found(config_id));
    };
    let starter = section.starter.as_deref().unwrap_or_default();
    let date_regex = section
      .date_format
      .as_ref()
      .map(|d| d.regex.as_str())
      .unwrap_or_default();
    if starter.is_empty() && date_regex.is_empty() {
      return Err(FilterError::properties(format!(
        "either savedConfigs.{id}.starter or savedConfigs.{id}.dateFormat.regex must be filled",
        id = config_id
      )));
    }
    let combined = format!("{}{}", starter, date_regex);
    debug!("entry pattern: /{}/", combined);
    let mut filter = Self::with_terminator(&combined, section.terminator.as_deref())?;
    filter.config_id = Some(config_id.to_string());
    Ok(filter)
  }

  fn refresh_by_config_id(&mut self, config: &ConfigBundle, config_id: &str) -> bool {
    if self.config_id.as_deref() == Some(config_id) {
      return false;
    }
    match Self::from_config(config, config_id) {
      Ok(next) => {
        *self = next;
        true
      }
      Err(e) => {
        debug!("not refreshing: {}", e);
        false
      }
    }
  }
}
