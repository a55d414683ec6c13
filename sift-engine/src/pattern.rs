//! Qualifier pattern algebra: one regex composed from %and%/%or%-joined parts.

use log::trace;
use regex::Regex;

use crate::error::FilterError;

/// Multiline + dot-matches-newline, so entries with embedded newlines match
/// as single blocks.
const PATTERN_FLAGS: &str = "(?ms)";

/// Boolean connector joining sub-patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qualifier {
  And,
  Or,
}

impl Qualifier {
  const ALL: [Qualifier; 2] = [Qualifier::And, Qualifier::Or];

  /// The regex text this qualifier contributes in front of its part.
  pub fn connector(self) -> &'static str {
    match self {
      Self::And => ".*",
      Self::Or => "|",
    }
  }

  pub fn name(self) -> &'static str {
    match self {
      Self::And => "and",
      Self::Or => "or",
    }
  }

  fn from_token(token: &str) -> Option<Self> {
    match token {
      "and" => Some(Self::And),
      "or" => Some(Self::Or),
      _ => None,
    }
  }
}

/// Ordered sub-patterns plus the single regex they compose into.
///
/// The regex is always the concatenation, in list order, of each part
/// prefixed by its qualifier's connector; it is recompiled whenever the
/// list changes.
#[derive(Debug, Clone)]
pub struct QualifierPattern {
  parts: Vec<(String, Option<Qualifier>)>,
  source: String,
  compiled: Regex,
}

impl QualifierPattern {
  pub fn new() -> Self {
    Self {
      parts: Vec::new(),
      source: PATTERN_FLAGS.to_string(),
      // flag-only pattern, matches everything
      compiled: Regex::new(PATTERN_FLAGS).expect("flag-only pattern compiles"),
    }
  }

  pub fn from_raw(raw: &str) -> Result<Self, FilterError> {
    let mut pattern = Self::new();
    pattern.set_pattern(raw)?;
    Ok(pattern)
  }

  /// Replaces all parts with those parsed from `raw`.
  ///
  /// `raw` is split on `%and%`/`%or%` tokens; each plain substring between
  /// tokens becomes a part carrying the qualifier that preceded it. An
  /// input with no recognized qualifier token is one bare part, so
  /// malformed `%…%` runs pass through unexpanded.
  pub fn set_pattern(&mut self, raw: &str) -> Result<(), FilterError> {
    self.parts.clear();
    self.source.clear();
    self.source.push_str(PATTERN_FLAGS);

    let has_qualifier = Qualifier::ALL
      .iter()
      .any(|q| raw.contains(&format!("%{}%", q.name())));
    if has_qualifier {
      let mut next: Option<Qualifier> = None;
      for token in raw.split('%') {
        if let Some(qualifier) = Qualifier::from_token(token) {
          next = Some(qualifier);
          continue;
        }
        self.push_part(token, next.take());
      }
    } else {
      self.push_part(raw, None);
    }
    self.recompile()
  }

  /// Appends a part, prefixed by its qualifier's connector.
  pub fn add_part(&mut self, value: &str, qualifier: Option<Qualifier>) -> Result<(), FilterError> {
    self.push_part(value, qualifier);
    self.recompile()
  }

  /// Removes the first part equal to `value`, together with its connector.
  pub fn remove_part(&mut self, value: &str) -> Result<(), FilterError> {
    let Some(position) = self.parts.iter().position(|(v, _)| v == value) else {
      trace!("no part {:?} to remove", value);
      return Ok(());
    };
    let qualifier = self.parts[position].1;
    let mut piece = String::new();
    if let Some(q) = qualifier {
      piece.push_str(q.connector());
    }
    piece.push_str(value);
    if let Some(index) = self.source.find(&piece) {
      trace!("deleting /{}/ at {}", piece, index);
      self.source.replace_range(index..index + piece.len(), "");
      self.parts.remove(position);
      return self.recompile();
    }
    Ok(())
  }

  pub fn is_match(&self, text: &str) -> bool {
    self.compiled.is_match(text)
  }

  pub fn parts(&self) -> &[(String, Option<Qualifier>)] {
    &self.parts
  }

  /// The composed pattern text the regex is compiled from.
  pub fn source(&self) -> &str {
    &self.source
  }

  fn push_part(&mut self, value: &str, qualifier: Option<Qualifier>) {
    trace!("adding pattern part: val={:?} qual={:?}", value, qualifier);
    if let Some(q) = qualifier {
      self.source.push_str(q.connector());
    }
    self.source.push_str(value);
    self.parts.push((value.to_string(), qualifier));
  }

  fn recompile(&mut self) -> Result<(), FilterError> {
    trace!("compiling pattern: {}", self.source);
    self.compiled = Regex::new(&self.source)?;
    Ok(())
  }
}

impl Default for QualifierPattern {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bare_pattern_is_one_part() {
    let pattern = QualifierPattern::from_raw("ERROR").unwrap();
    assert_eq!(pattern.parts().len(), 1);
    assert_eq!(pattern.source(), "(?ms)ERROR");
    assert!(pattern.is_match("x ERROR y"));
    assert!(!pattern.is_match("warning"));
  }

  #[test]
  fn and_allows_intervening_text() {
    let pattern = QualifierPattern::from_raw("A%and%B").unwrap();
    assert_eq!(pattern.source(), "(?ms)A.*B");
    assert!(pattern.is_match("A lots of stuff B"));
    assert!(pattern.is_match("A\nspanning\nlines B"));
    assert!(!pattern.is_match("B before A"));
  }

  #[test]
  fn or_matches_either_part() {
    let pattern = QualifierPattern::from_raw("A%or%B").unwrap();
    assert_eq!(pattern.source(), "(?ms)A|B");
    assert!(pattern.is_match("only B here"));
    assert!(pattern.is_match("only A here"));
    assert!(!pattern.is_match("neither"));
  }

  #[test]
  fn add_remove_round_trips() {
    let mut pattern = QualifierPattern::from_raw("A%and%B").unwrap();
    let before = pattern.source().to_string();
    pattern.add_part("C", Some(Qualifier::Or)).unwrap();
    assert_eq!(pattern.source(), "(?ms)A.*B|C");
    pattern.remove_part("C").unwrap();
    assert_eq!(pattern.source(), before);
    assert_eq!(pattern.parts().len(), 2);
  }

  #[test]
  fn remove_unknown_part_is_a_noop() {
    let mut pattern = QualifierPattern::from_raw("A").unwrap();
    let before = pattern.source().to_string();
    pattern.remove_part("missing").unwrap();
    assert_eq!(pattern.source(), before);
  }

  #[test]
  fn malformed_qualifier_run_passes_through_unexpanded() {
    // No recognized %and%/%or% token, so the whole string is one literal part.
    let pattern = QualifierPattern::from_raw("a%%b").unwrap();
    assert_eq!(pattern.parts().len(), 1);
    assert_eq!(pattern.source(), "(?ms)a%%b");
    assert!(pattern.is_match("x a%%b y"));
  }

  #[test]
  fn adjacent_qualifiers_keep_empty_parts() {
    // Pinned behavior for the degenerate token stream "a", and, "", or, "b".
    let pattern = QualifierPattern::from_raw("a%and%%or%b").unwrap();
    assert_eq!(pattern.source(), "(?ms)a.*|b");
    assert_eq!(pattern.parts().len(), 3);
  }

  #[test]
  fn invalid_regex_is_a_pattern_error() {
    let result = QualifierPattern::from_raw("un(closed");
    assert!(matches!(result, Err(crate::error::FilterError::Pattern(_))));
  }
}
