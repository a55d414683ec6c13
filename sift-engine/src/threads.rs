//! Thread correlator: stitches interleaved, non-contiguous entries sharing
//! an extracted key back into complete threads.

use std::collections::{HashMap, VecDeque};

use log::{debug, trace};
use regex::Regex;

use crate::config::ConfigBundle;
use crate::error::FilterError;
use crate::flow::{ConfigBound, Event, EventReactive, Filterable, Verdict};
use crate::matcher::MatchFilter;
use crate::pattern::Qualifier;

/// Correlates entries into threads on top of the qualifier-pattern match.
///
/// Each matched entry has thread keys extracted by the extractor patterns
/// and is appended to the per-key buffers. While a thread is open its key
/// is spliced into the live match pattern as an `or` part, so later
/// fragments match even when the configured alias alone would not. A
/// thread-end entry (end pattern matches, no skip-end pattern does) closes
/// its keys' buffers onto a FIFO ready queue; completed threads are handed
/// back one per call, out of arrival order when threads interleave.
#[derive(Debug, Clone)]
pub struct ThreadFilter {
  matcher: MatchFilter,
  extractors: Vec<Regex>,
  skip_ends: Vec<Regex>,
  ends: Vec<Regex>,
  buffers: HashMap<String, String>,
  key_order: Vec<String>,
  ready: VecDeque<String>,
  config_id: Option<String>,
}

impl ThreadFilter {
  pub fn new(
    filter_pattern: &str,
    extractors: &[String],
    skip_ends: &[String],
    ends: &[String],
  ) -> Result<Self, FilterError> {
    if extractors.is_empty() {
      return Err(FilterError::properties(
        "at least one thread extractor pattern is required",
      ));
    }
    if ends.is_empty() {
      return Err(FilterError::properties(
        "thread end patterns should be supplied if extractors were",
      ));
    }
    Ok(Self {
      matcher: MatchFilter::new(filter_pattern)?,
      extractors: compile_all(extractors)?,
      skip_ends: compile_all(skip_ends)?,
      ends: compile_all(ends)?,
      buffers: HashMap::new(),
      key_order: Vec::new(),
      ready: VecDeque::new(),
      config_id: None,
    })
  }

  /// The embedded match filter carrying the live qualifier pattern.
  pub fn matcher(&self) -> &MatchFilter {
    &self.matcher
  }

  pub fn open_thread_count(&self) -> usize {
    self.buffers.len()
  }

  fn next_ready(&mut self) -> Verdict {
    self.ready.pop_front().map_or(Verdict::Drop, Verdict::Pass)
  }

  fn correlate(&mut self, data: &str) -> Result<(), FilterError> {
    let keys = self.extract_keys(data);
    if self.is_thread_end(data) {
      for key in keys {
        // append first so the end marker is part of the emitted thread
        self.append_fragment(&key, data)?;
        if let Some(done) = self.complete(&key)? {
          self.ready.push_back(done);
        }
      }
    } else {
      trace!("thread continues, keeping starts");
      for key in keys {
        self.append_fragment(&key, data)?;
      }
    }
    Ok(())
  }

  /// Matched substrings of the extractor patterns, deduped, in extractor
  /// order.
  fn extract_keys(&self, data: &str) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for extractor in &self.extractors {
      if let Some(found) = extractor.find(data) {
        let key = found.as_str().to_string();
        if !keys.contains(&key) {
          trace!("extracted thread key: {}", key);
          keys.push(key);
        }
      }
    }
    keys
  }

  /// Skip-end patterns veto end patterns.
  fn is_thread_end(&self, data: &str) -> bool {
    if self.skip_ends.iter().any(|p| p.is_match(data)) {
      return false;
    }
    self.ends.iter().any(|p| p.is_match(data))
  }

  /// Appends to the key's buffer, opening the thread (and splicing its key
  /// into the live match pattern) when the key is new.
  fn append_fragment(&mut self, key: &str, data: &str) -> Result<(), FilterError> {
    if let Some(buffer) = self.buffers.get_mut(key) {
      if !data.starts_with('\n') {
        buffer.push('\n');
      }
      buffer.push_str(data);
      return Ok(());
    }
    debug!("opening thread: {}", key);
    self.buffers.insert(key.to_string(), data.to_string());
    self.key_order.push(key.to_string());
    self.matcher.add_part(key, Some(Qualifier::Or))
  }

  /// Removes the key's buffer, exactly once, returning the full thread.
  fn complete(&mut self, key: &str) -> Result<Option<String>, FilterError> {
    let done = self.buffers.remove(key);
    if done.is_some() {
      debug!("closing thread: {}", key);
      self.key_order.retain(|k| k != key);
      self.matcher.remove_part(key)?;
    }
    Ok(done)
  }
}

fn compile_all(patterns: &[String]) -> Result<Vec<Regex>, FilterError> {
  patterns
    .iter()
    .map(|p| Regex::new(p).map_err(FilterError::from))
    .collect()
}

impl Filterable for ThreadFilter {
  fn filter(&mut self, data: String) -> Result<Verdict, FilterError> {
    if !self.matcher.matches(&data) {
      return Ok(self.next_ready());
    }
    self.correlate(&data)?;
    Ok(self.next_ready())
  }
}

impl EventReactive for ThreadFilter {
  fn process_event(&mut self, event: Event) -> Vec<String> {
    match event {
      Event::ChunkEnded | Event::AllChunksProcessed => {
        let mut flushed: Vec<String> = self.ready.drain(..).collect();
        for key in &self.key_order {
          if let Some(buffer) = self.buffers.remove(key) {
            debug!("force-closing thread at chunk end: {}", key);
            flushed.push(buffer);
          }
        }
        self.flush();
        flushed
      }
      Event::ConfigRefreshed => Vec::new(),
    }
  }

  fn flush(&mut self) {
    self.buffers.clear();
    self.key_order.clear();
    self.ready.clear();
    if let Err(e) = self.matcher.reset() {
      debug!("pattern reset failed: {}", e);
    }
  }
}

impl ConfigBound for ThreadFilter {
  fn config_id_exists(config: &ConfigBundle, config_id: &str) -> bool {
    config.process_threads.contains_key(config_id)
  }

  fn from_config(config: &ConfigBundle, config_id: &str) -> Result<Self, FilterError> {
    let Some(section) = config.process_threads.get(config_id) else {
      return Err(FilterError::config_not_found(config_id));
    };
    let Some(alias) = config.filter_aliases.get(config_id) else {
      return Err(FilterError::properties(format!(
        "filterAliases.{id} must be filled when processThreads.{id} is",
        id = config_id
      )));
    };
    let extractors = section.extractors.as_ref().ok_or_else(|| {
      FilterError::properties(format!(
        "processThreads.{}.extractors is not filled",
        config_id
      ))
    })?;
    let ends = section.ends.as_ref().ok_or_else(|| {
      FilterError::properties(format!("processThreads.{}.ends is not filled", config_id))
    })?;
    let skip_ends = section.skipends.clone().unwrap_or_default();
    let mut filter = Self::new(alias, extractors, &skip_ends, ends)?;
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

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::ThreadConfig;

  fn job_filter() -> ThreadFilter {
    ThreadFilter::new(
      "START",
      &[r"job-\d+".to_string()],
      &[],
      &["DONE".to_string()],
    )
    .unwrap()
  }

  fn feed(filter: &mut ThreadFilter, entry: &str) -> Verdict {
    filter.filter(entry.to_string()).unwrap()
  }

  #[test]
  fn buffers_fragments_until_the_end_marker() {
    let mut filter = job_filter();
    assert_eq!(feed(&mut filter, "START job-7"), Verdict::Drop);
    assert_eq!(feed(&mut filter, "job-7 step two"), Verdict::Drop);
    assert_eq!(
      feed(&mut filter, "job-7 DONE"),
      Verdict::Pass("START job-7\njob-7 step two\njob-7 DONE".into())
    );
    assert_eq!(filter.open_thread_count(), 0);
  }

  #[test]
  fn open_keys_widen_the_live_pattern_and_close_narrows_it() {
    let mut filter = job_filter();
    feed(&mut filter, "START job-7");
    assert_eq!(filter.matcher().pattern().source(), "(?ms)START|job-7");
    feed(&mut filter, "job-7 DONE");
    assert_eq!(filter.matcher().pattern().source(), "(?ms)START");
  }

  #[test]
  fn unrelated_entries_fall_through() {
    let mut filter = job_filter();
    feed(&mut filter, "START job-1");
    assert_eq!(feed(&mut filter, "no match at all"), Verdict::Drop);
    assert_eq!(filter.open_thread_count(), 1);
  }

  #[test]
  fn interleaved_threads_complete_out_of_arrival_order() {
    let mut filter = job_filter();
    feed(&mut filter, "START job-1");
    feed(&mut filter, "START job-2");
    assert_eq!(
      feed(&mut filter, "job-2 DONE"),
      Verdict::Pass("START job-2\njob-2 DONE".into())
    );
    assert_eq!(
      feed(&mut filter, "job-1 DONE"),
      Verdict::Pass("START job-1\njob-1 DONE".into())
    );
  }

  #[test]
  fn two_keys_ending_in_one_entry_drain_fifo() {
    let mut filter = ThreadFilter::new(
      "START",
      &[r"alpha-\d".to_string(), r"beta-\d".to_string()],
      &[],
      &["DONE".to_string()],
    )
    .unwrap();
    feed(&mut filter, "START alpha-1");
    feed(&mut filter, "START beta-2");
    // one call completes both keys, the first comes back immediately
    assert_eq!(
      feed(&mut filter, "alpha-1 beta-2 DONE"),
      Verdict::Pass("START alpha-1\nalpha-1 beta-2 DONE".into())
    );
    // the second waits for the next call, even a non-matching one
    assert_eq!(
      feed(&mut filter, "unrelated"),
      Verdict::Pass("START beta-2\nalpha-1 beta-2 DONE".into())
    );
  }

  #[test]
  fn skip_end_vetoes_the_end_pattern() {
    let mut filter = ThreadFilter::new(
      "START",
      &[r"job-\d+".to_string()],
      &["nested DONE".to_string()],
      &["DONE".to_string()],
    )
    .unwrap();
    feed(&mut filter, "START job-3");
    assert_eq!(feed(&mut filter, "job-3 nested DONE"), Verdict::Drop);
    assert_eq!(filter.open_thread_count(), 1);
    assert!(matches!(feed(&mut filter, "job-3 DONE"), Verdict::Pass(_)));
  }

  #[test]
  fn single_entry_thread_ends_immediately() {
    let mut filter = job_filter();
    assert_eq!(
      feed(&mut filter, "START job-9 DONE"),
      Verdict::Pass("START job-9 DONE".into())
    );
    assert_eq!(filter.open_thread_count(), 0);
  }

  #[test]
  fn chunk_end_drains_every_open_thread_exactly_once() {
    let mut filter = job_filter();
    feed(&mut filter, "START job-1");
    feed(&mut filter, "START job-2");
    feed(&mut filter, "START job-3");
    feed(&mut filter, "job-2 more work");
    let flushed = filter.process_event(Event::ChunkEnded);
    // pinned: key insertion order
    assert_eq!(
      flushed,
      vec![
        "START job-1".to_string(),
        "START job-2\njob-2 more work".to_string(),
        "START job-3".to_string(),
      ]
    );
    assert_eq!(filter.open_thread_count(), 0);
    assert_eq!(filter.matcher().pattern().source(), "(?ms)START");
    assert!(filter.process_event(Event::ChunkEnded).is_empty());
  }

  #[test]
  fn chunk_end_drains_the_ready_queue_first() {
    let mut filter = ThreadFilter::new(
      "START",
      &[r"alpha-\d".to_string(), r"beta-\d".to_string()],
      &[],
      &["DONE".to_string()],
    )
    .unwrap();
    feed(&mut filter, "START alpha-1");
    feed(&mut filter, "START beta-2");
    feed(&mut filter, "START gamma"); // matches the alias but has no key, swallowed
    feed(&mut filter, "START alpha-3");
    // completes alpha-1 and beta-2; alpha-1 comes back, beta-2 stays queued
    assert!(matches!(
      feed(&mut filter, "alpha-1 beta-2 DONE"),
      Verdict::Pass(_)
    ));
    let flushed = filter.process_event(Event::ChunkEnded);
    assert_eq!(flushed.len(), 2);
    assert!(flushed[0].contains("beta-2 DONE"));
    assert!(flushed[1].starts_with("START alpha-3"));
  }

  #[test]
  fn missing_ends_is_a_config_error() {
    let result = ThreadFilter::new("START", &[r"job-\d+".to_string()], &[], &[]);
    assert!(matches!(result, Err(FilterError::PropertiesNotFound(_))));
  }

  #[test]
  fn config_without_alias_is_missing_properties() {
    let mut bundle = ConfigBundle::default();
    bundle.process_threads.insert(
      "app".into(),
      ThreadConfig {
        extractors: Some(vec![r"job-\d+".into()]),
        skipends: None,
        ends: Some(vec!["DONE".into()]),
      },
    );
    assert!(matches!(
      ThreadFilter::from_config(&bundle, "app"),
      Err(FilterError::PropertiesNotFound(_))
    ));
  }

  #[test]
  fn config_without_ends_is_missing_properties() {
    let mut bundle = ConfigBundle::default();
    bundle.filter_aliases.insert("app".into(), "START".into());
    bundle.process_threads.insert(
      "app".into(),
      ThreadConfig {
        extractors: Some(vec![r"job-\d+".into()]),
        skipends: None,
        ends: None,
      },
    );
    assert!(matches!(
      ThreadFilter::from_config(&bundle, "app"),
      Err(FilterError::PropertiesNotFound(_))
    ));
  }
}
