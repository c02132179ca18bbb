//! Named batch selection rules.
//!
//! A batch name prefixed with `+` is disabled by default and only runs when
//! explicitly enabled. The rule set accumulates across repeated applications:
//! `only` intersects, `with` unions, `except` subtracts and always wins.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Cumulative only/with/except selection over named batches.
///
/// The enabled set is `((default-enabled ∩ only) ∪ with) − except`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedBatches {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    only: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    with: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    except: BTreeSet<String>,
}

impl NamedBatches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the enabled set to exactly these names. Cumulative
    /// applications intersect.
    pub fn only<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        self.only = Some(match self.only.take() {
            None => names,
            Some(previous) => previous.intersection(&names).cloned().collect(),
        });
        self
    }

    /// Additionally enables these names, even when disabled by default.
    pub fn with<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with.extend(names.into_iter().map(Into::into));
        self
    }

    /// Removes these names from the enabled set. Exclusion always wins.
    pub fn except<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.except.extend(names.into_iter().map(Into::into));
        self
    }

    /// Drops all accumulated rules.
    pub fn reset(self) -> Self {
        Self::default()
    }

    /// Whether the batch with the given name survives selection.
    pub fn is_enabled(&self, batch: &str, default_disabled: bool) -> bool {
        if self.except.contains(batch) {
            return false;
        }
        if self.with.contains(batch) {
            return true;
        }
        if default_disabled {
            return false;
        }
        match &self.only {
            Some(only) => only.contains(batch),
            None => true,
        }
    }
}
