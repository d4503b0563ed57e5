//! Daily match quota tracking
//!
//! The server owns the real counters. We keep the last snapshot it pushed
//! and replace it wholesale whenever a frame carries a new one.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::models::{Filter, Gender};

/// Matches allowed per concrete category per day
pub const MAX_DAILY_MATCHES: u8 = 5;

/// Remaining matches per concrete category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyLimits {
    remaining: BTreeMap<Gender, u8>,
}

impl Default for DailyLimits {
    fn default() -> Self {
        Self {
            remaining: Gender::ALL
                .iter()
                .map(|g| (*g, MAX_DAILY_MATCHES))
                .collect(),
        }
    }
}

impl DailyLimits {
    /// Build from a server snapshot keyed by wire category name.
    ///
    /// Unknown keys are ignored, missing categories fall back to the
    /// maximum and values are clamped to `0..=MAX_DAILY_MATCHES`.
    pub fn from_snapshot(snapshot: &HashMap<String, i64>) -> Self {
        let mut limits = Self::default();
        for (key, value) in snapshot {
            match key.parse::<Gender>() {
                Ok(gender) => {
                    let clamped = (*value).clamp(0, i64::from(MAX_DAILY_MATCHES)) as u8;
                    limits.remaining.insert(gender, clamped);
                }
                Err(_) => {
                    tracing::debug!(key = %key, "Ignoring unknown limit category");
                }
            }
        }
        limits
    }

    /// Replace the cached snapshot (last write wins)
    pub fn replace(&mut self, snapshot: &HashMap<String, i64>) {
        *self = Self::from_snapshot(snapshot);
    }

    /// Remaining matches for a category
    pub fn remaining_for(&self, gender: Gender) -> u8 {
        self.remaining
            .get(&gender)
            .copied()
            .unwrap_or(MAX_DAILY_MATCHES)
    }

    /// Remaining matches shown for a filter.
    ///
    /// `Any` may land in any category, so it reports the smallest remainder.
    pub fn remaining(&self, filter: Filter) -> u8 {
        match filter.category() {
            Some(gender) => self.remaining_for(gender),
            None => Gender::ALL
                .iter()
                .map(|g| self.remaining_for(*g))
                .min()
                .unwrap_or(MAX_DAILY_MATCHES),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(pairs: &[(&str, i64)]) -> HashMap<String, i64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_defaults_to_max() {
        let limits = DailyLimits::default();
        for filter in Filter::ALL {
            assert_eq!(limits.remaining(filter), MAX_DAILY_MATCHES);
        }
    }

    #[test]
    fn test_any_is_minimum() {
        let limits = DailyLimits::from_snapshot(&snapshot(&[
            ("male", 4),
            ("female", 2),
            ("non-binary", 5),
            ("prefer-not-to-say", 3),
        ]));
        assert_eq!(limits.remaining(Filter::Any), 2);
        assert_eq!(limits.remaining(Filter::Male), 4);
    }

    #[test]
    fn test_replace_is_wholesale() {
        let mut limits = DailyLimits::from_snapshot(&snapshot(&[("male", 1), ("female", 0)]));
        limits.replace(&snapshot(&[("female", 3)]));
        // male was absent in the new snapshot, so it resets to the default
        assert_eq!(limits.remaining(Filter::Male), MAX_DAILY_MATCHES);
        assert_eq!(limits.remaining(Filter::Female), 3);
    }

    #[test]
    fn test_values_clamped_and_unknown_ignored() {
        let limits = DailyLimits::from_snapshot(&snapshot(&[("male", -2), ("female", 99), ("robot", 1)]));
        assert_eq!(limits.remaining(Filter::Male), 0);
        assert_eq!(limits.remaining(Filter::Female), MAX_DAILY_MATCHES);
        assert_eq!(limits.remaining(Filter::Any), 0);
    }
}
