//! The filter chain: ordered stages, lifecycle routing, and config-driven
//! assembly from the static stage registry.

use chrono::NaiveDateTime;
use log::{debug, trace};

use crate::aggregate::StringAggregator;
use crate::config::ConfigBundle;
use crate::entries::EntryFilter;
use crate::error::FilterError;
use crate::flow::{ConfigBound, Event, EventReactive, Filterable, Verdict};
use crate::matcher::MatchFilter;
use crate::threads::ThreadFilter;
use crate::window::DateFilter;

// ---------------------------------------------------------------------------
// Stage identity and dispatch
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
  Entries,
  Matcher,
  Threads,
  Window,
}

impl StageKind {
  /// Declared order; lower runs earlier, a missing order sorts last.
  pub fn order(self) -> Option<i32> {
    match self {
      Self::Entries => Some(0),
      Self::Matcher => Some(5),
      Self::Threads => Some(10),
      Self::Window => Some(15),
    }
  }

  /// A stage kind may subsume another of the same conceptual role; the
  /// replaced kind is removed from the chain and retired.
  pub fn replaces(self) -> Option<StageKind> {
    match self {
      Self::Threads => Some(Self::Matcher),
      _ => None,
    }
  }
}

/// One active stage in the chain.
#[derive(Debug)]
pub enum Stage {
  Entries(EntryFilter),
  Matcher(MatchFilter),
  Threads(ThreadFilter),
  Window(DateFilter),
}

impl Stage {
  pub fn kind(&self) -> StageKind {
    match self {
      Self::Entries(_) => StageKind::Entries,
      Self::Matcher(_) => StageKind::Matcher,
      Self::Threads(_) => StageKind::Threads,
      Self::Window(_) => StageKind::Window,
    }
  }

  fn is_stateful(&self) -> bool {
    matches!(self, Self::Entries(_) | Self::Threads(_) | Self::Window(_))
  }

  fn process_event(&mut self, event: Event) -> Vec<String> {
    match self {
      Self::Entries(filter) => filter.process_event(event),
      Self::Threads(filter) => filter.process_event(event),
      Self::Window(filter) => filter.process_event(event),
      Self::Matcher(_) => Vec::new(),
    }
  }

  fn refresh_by_config_id(&mut self, config: &ConfigBundle, config_id: &str) -> bool {
    match self {
      Self::Entries(filter) => filter.refresh_by_config_id(config, config_id),
      Self::Matcher(filter) => filter.refresh_by_config_id(config, config_id),
      Self::Threads(filter) => filter.refresh_by_config_id(config, config_id),
      Self::Window(filter) => filter.refresh_by_config_id(config, config_id),
    }
  }
}

impl Filterable for Stage {
  fn filter(&mut self, data: String) -> Result<Verdict, FilterError> {
    match self {
      Self::Entries(filter) => filter.filter(data),
      Self::Matcher(filter) => filter.filter(data),
      Self::Threads(filter) => filter.filter(data),
      Self::Window(filter) => filter.filter(data),
    }
  }
}

// ---------------------------------------------------------------------------
// Static stage registry
// ---------------------------------------------------------------------------

/// Registry row: how a stage kind is discovered and built from config.
pub struct StageSpec {
  pub kind: StageKind,
  pub exists: fn(&ConfigBundle, &str) -> bool,
  pub build: fn(&ConfigBundle, &str) -> Result<Stage, FilterError>,
}

/// Known stage kinds, walked in declaration order by `add_by_config_id`.
/// Threads precedes Matcher so a thread profile never builds the stage it
/// replaces.
pub const REGISTRY: [StageSpec; 4] = [
  StageSpec {
    kind: StageKind::Entries,
    exists: EntryFilter::config_id_exists,
    build: build_entries,
  },
  StageSpec {
    kind: StageKind::Threads,
    exists: ThreadFilter::config_id_exists,
    build: build_threads,
  },
  StageSpec {
    kind: StageKind::Matcher,
    exists: MatchFilter::config_id_exists,
    build: build_matcher,
  },
  StageSpec {
    kind: StageKind::Window,
    exists: DateFilter::config_id_exists,
    build: build_window,
  },
];

fn build_entries(config: &ConfigBundle, config_id: &str) -> Result<Stage, FilterError> {
  EntryFilter::from_config(config, config_id).map(Stage::Entries)
}

fn build_matcher(config: &ConfigBundle, config_id: &str) -> Result<Stage, FilterError> {
  MatchFilter::from_config(config, config_id).map(Stage::Matcher)
}

fn build_threads(config: &ConfigBundle, config_id: &str) -> Result<Stage, FilterError> {
  ThreadFilter::from_config(config, config_id).map(Stage::Threads)
}

fn build_window(config: &ConfigBundle, config_id: &str) -> Result<Stage, FilterError> {
  DateFilter::from_config(config, config_id).map(Stage::Window)
}

fn order_key(kind: StageKind) -> (bool, i32) {
  match kind.order() {
    Some(order) => (false, order),
    None => (true, 0),
  }
}

// ---------------------------------------------------------------------------
// The chain
// ---------------------------------------------------------------------------

/// Ordered filter stages with lifecycle routing.
///
/// Stages are added directly or resolved from a config profile; the chain
/// is locked before the first entry of a run, after which all structural
/// changes are silently refused.
#[derive(Debug, Default)]
pub struct FilterChain {
  stages: Vec<Stage>,
  retired: Vec<StageKind>,
  aggregator: StringAggregator,
  locked: bool,
}

impl FilterChain {
  pub fn new() -> Self {
    Self::default()
  }

  /// Adds a stage, honoring its replaces relationship and re-sorting by
  /// declared order (stable for ties). Returns false when locked.
  pub fn add(&mut self, stage: Stage) -> bool {
    if self.locked {
      return false;
    }
    if let Some(replaced) = stage.kind().replaces() {
      self.stages.retain(|s| s.kind() != replaced);
      if !self.retired.contains(&replaced) {
        debug!("{:?} replaces {:?}", stage.kind(), replaced);
        self.retired.push(replaced);
      }
    }
    debug!("adding stage: {:?}", stage.kind());
    self.stages.push(stage);
    self.stages.sort_by_key(|s| order_key(s.kind()));
    true
  }

  /// Builds and adds every registered stage that has configuration under
  /// `config_id` and is neither active nor retired. Returns whether any
  /// stage was added.
  pub fn add_by_config_id(
    &mut self,
    config: &ConfigBundle,
    config_id: &str,
  ) -> Result<bool, FilterError> {
    if self.locked {
      return Ok(false);
    }
    let mut added = false;
    for spec in &REGISTRY {
      if self.retired.contains(&spec.kind) {
        continue;
      }
      if self.stages.iter().any(|s| s.kind() == spec.kind) {
        continue;
      }
      if (spec.exists)(config, config_id) {
        self.add((spec.build)(config, config_id)?);
        added = true;
      }
    }
    Ok(added)
  }

  /// Routes a lifecycle event to every stateful stage. Data a stage flushes
  /// is re-filtered through the stages after it only (never re-checked
  /// against the stages it already passed) and survivors are aggregated.
  pub fn process_event(&mut self, event: Event) -> Result<Option<String>, FilterError> {
    trace!("processing event: {:?}", event);
    for index in 0..self.stages.len() {
      if !self.stages[index].is_stateful() {
        continue;
      }
      let flushed = self.stages[index].process_event(event);
      for data in flushed {
        match self.filter_from(index + 1, data)? {
          Verdict::Pass(survivor) => self.aggregator.add(&survivor),
          Verdict::Drop => {}
          Verdict::Stop(bound) => {
            debug!(
              "upper bound {} reached while re-filtering flushed data during {:?}",
              bound, event
            );
          }
        }
      }
    }
    Ok(self.aggregator.aggregate())
  }

  /// Attempts reconfiguration of every active stage for `config_id`, then
  /// picks up newly relevant stages. Config errors mean "no change".
  pub fn refresh_by_config_id(&mut self, config: &ConfigBundle, config_id: &str) -> bool {
    if self.locked {
      return false;
    }
    let mut changed = false;
    for stage in &mut self.stages {
      changed |= stage.refresh_by_config_id(config, config_id);
    }
    match self.add_by_config_id(config, config_id) {
      Ok(added) => changed |= added,
      Err(e) => debug!("no new stages for {}: {}", config_id, e),
    }
    changed
  }

  /// Sets the date window bounds on the active date stage, if any.
  pub fn set_date_bounds(
    &mut self,
    from: Option<NaiveDateTime>,
    to: Option<NaiveDateTime>,
  ) -> bool {
    for stage in &mut self.stages {
      if let Stage::Window(filter) = stage {
        filter.set_from(from);
        filter.set_to(to);
        return true;
      }
    }
    false
  }

  /// One-way: once locked, structural changes are refused for the chain's
  /// lifetime.
  pub fn lock(&mut self) {
    self.locked = true;
  }

  pub fn is_locked(&self) -> bool {
    self.locked
  }

  pub fn is_empty(&self) -> bool {
    self.stages.is_empty()
  }

  pub fn stages(&self) -> &[Stage] {
    &self.stages
  }

  pub fn stage_kinds(&self) -> Vec<StageKind> {
    self.stages.iter().map(Stage::kind).collect()
  }

  fn filter_from(&mut self, start: usize, data: String) -> Result<Verdict, FilterError> {
    let mut current = data;
    for stage in self.stages[start..].iter_mut() {
      match stage.filter(current)? {
        Verdict::Pass(next) => current = next,
        Verdict::Drop => return Ok(Verdict::Drop),
        Verdict::Stop(bound) => return Ok(Verdict::Stop(bound)),
      }
    }
    Ok(Verdict::Pass(current))
  }
}

impl Filterable for FilterChain {
  /// Runs one entry through every stage in order; any stage dropping it
  /// short-circuits the rest, a stop signal propagates to the caller.
  fn filter(&mut self, data: String) -> Result<Verdict, FilterError> {
    if self.stages.is_empty() {
      return Err(FilterError::NoStages);
    }
    self.filter_from(0, data)
  }
}
