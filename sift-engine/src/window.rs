//! Date window filter: from/to slicing with an early stop once the upper
//! bound is passed.

use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, trace};
use regex::Regex;

use crate::config::ConfigBundle;
use crate::error::FilterError;
use crate::flow::{ConfigBound, Event, EventReactive, Filterable, Verdict};

/// Filters entries by the timestamp their stamp regex captures.
///
/// Entries before `from` are dropped; the first entry past `to` yields
/// `Verdict::Stop` carrying the formatted bound, on the assumption that
/// entries within a chunk arrive in date order. Once `from` is passed and
/// no upper bound is set, the regex match is skipped entirely.
#[derive(Debug, Clone)]
pub struct DateFilter {
  stamp: Option<Regex>,
  format: Option<String>,
  from: Option<NaiveDateTime>,
  to: Option<NaiveDateTime>,
  passed_from: bool,
  config_id: Option<String>,
}

impl DateFilter {
  pub fn new(stamp: &str, format: &str) -> Result<Self, FilterError> {
    Ok(Self {
      stamp: Some(Regex::new(stamp)?),
      format: Some(format.to_string()),
      from: None,
      to: None,
      passed_from: false,
      config_id: None,
    })
  }

  pub fn set_from(&mut self, from: Option<NaiveDateTime>) {
    self.from = from;
  }

  pub fn set_to(&mut self, to: Option<NaiveDateTime>) {
    self.to = to;
  }
}

/// Parses a stamp with `format`, assuming midnight for date-only formats.
pub fn parse_stamp(value: &str, format: &str) -> Option<NaiveDateTime> {
  NaiveDateTime::parse_from_str(value, format)
    .ok()
    .or_else(|| {
      NaiveDate::parse_from_str(value, format)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    })
}

impl Filterable for DateFilter {
  fn filter(&mut self, data: String) -> Result<Verdict, FilterError> {
    let (Some(stamp), Some(format)) = (&self.stamp, &self.format) else {
      trace!("date check skipped, no stamp pattern configured");
      return Ok(Verdict::Pass(data));
    };
    if self.from.is_none() && self.to.is_none() {
      return Ok(Verdict::Pass(data));
    }
    if self.passed_from && self.to.is_none() {
      trace!("lower bound already passed, skipping the date check");
      return Ok(Verdict::Pass(data));
    }

    let Some(captures) = stamp.captures(&data) else {
      trace!("no stamp in entry");
      return Ok(Verdict::Drop);
    };
    let Some(value) = captures.get(1) else {
      return Err(FilterError::properties(
        "date regex must capture the stamp in group 1",
      ));
    };
    let Some(entry_date) = parse_stamp(value.as_str(), format) else {
      return Err(FilterError::DateFormatMismatch {
        format: format.clone(),
        value: value.as_str().to_string(),
      });
    };

    if self.from.map_or(false, |from| entry_date < from) {
      trace!("before the lower bound");
      return Ok(Verdict::Drop);
    }
    self.passed_from = true;
    match self.to {
      Some(to) if entry_date > to => {
        debug!("entry past the upper bound, stopping the source");
        Ok(Verdict::Stop(to.format(format).to_string()))
      }
      _ => Ok(Verdict::Pass(data)),
    }
  }
}

impl EventReactive for DateFilter {
  fn process_event(&mut self, event: Event) -> Vec<String> {
    match event {
      Event::ChunkEnded | Event::AllChunksProcessed => self.flush(),
      Event::ConfigRefreshed => {}
    }
    Vec::new()
  }

  // each chunk is assumed independently date-ordered
  fn flush(&mut self) {
    self.passed_from = false;
  }
}

impl ConfigBound for DateFilter {
  fn config_id_exists(config: &ConfigBundle, config_id: &str) -> bool {
    config
      .saved_configs
      .get(config_id)
      .map_or(false, |section| section.date_format.is_some())
  }

  fn from_config(config: &ConfigBundle, config_id: &str) -> Result<Self, FilterError> {
    let Some(section) = config.saved_configs.get(config_id) else {
      return Err(FilterError::config_not_found(config_id));
    };
    let Some(date_format) = section.date_format.as_ref() else {
      return Err(FilterError::properties(format!(
        "savedConfigs.{}.dateFormat is not filled",
        config_id
      )));
    };
    let mut filter = Self::new(&date_format.regex, &date_format.value)?;
    filter.config_id = Some(config_id.to_string());
    Ok(filter)
  }

  fn refresh_by_config_id(&mut self, config: &ConfigBundle, config_id: &str) -> bool {
    if self.config_id.as_deref() == Some(config_id) {
      return false;
    }
    match Self::from_config(config, config_id) {
      Ok(mut next) => {
        // bounds are run parameters, they survive reconfiguration
        next.from = self.from;
        next.to = self.to;
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
