use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

pub mod extract;
pub mod normalize;
pub mod pipeline;
pub mod sdk;


pub use normalize::normalize_number;
pub use pipeline::PhoneResolver;
pub use sdk::{AgentSdk, Topic};

/// Which data source produced a candidate, in decreasing specificity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Visitor profile record.
    Profile,
    /// Structured conversation metadata / survey answer.
    Metadata,
    /// Free-text transcript scan.
    Transcript,
}

/// An unvalidated candidate pulled from one tier. Lives only long enough to
/// be normalized into the field value.
#[derive(Debug, Clone)]
pub struct PhoneCandidate {
    pub raw: String,
    pub tier: Tier,
}

#[derive(Default)]
struct PhoneFieldInner {
    value: String,
    /// Set when tier 2 or tier 3 locks a value in. Monotonic: once set it is
    /// never cleared, which is what makes first-success sticky regardless of
    /// delivery order.
    locked: Option<Tier>,
    /// Set on the first manual edit; pipeline writes keep off the field from
    /// then on.
    user_edited: bool,
}

/// The editable number field both cores converge on. Cloneable handle over
/// shared state; writers go through the tier rules below, the user goes
/// through `set_text`/`commit_edit`.
#[derive(Clone, Default)]
pub struct PhoneField {
    inner: Arc<RwLock<PhoneFieldInner>>,
}

impl PhoneField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self) -> String {
        self.inner.read().unwrap().value.clone()
    }

    pub fn locked_tier(&self) -> Option<Tier> {
        self.inner.read().unwrap().locked
    }

    pub fn is_locked(&self) -> bool {
        self.locked_tier().is_some()
    }

    /// Overwrite the field text, as typed by the user. Takes precedence over
    /// pipeline writes until committed.
    pub fn set_text(&self, text: &str) {
        let mut inner = self.inner.write().unwrap();
        inner.value = text.to_string();
        inner.user_edited = true;
    }

    /// Re-normalize the current text in place, as on blur or an explicit
    /// commit keystroke. An all-whitespace edit is left empty. Returns the
    /// committed value.
    pub fn commit_edit(&self) -> String {
        let mut inner = self.inner.write().unwrap();
        if inner.value.trim().is_empty() {
            inner.value.clear();
        } else {
            let normalized = normalize_number(&inner.value);
            inner.value = normalized;
        }
        inner.value.clone()
    }

    /// Tier 1 write: seeds the initial value but never claims the lock, so a
    /// later tier 2/3 hit may still replace it. Loses to an existing lock
    /// and to a manual edit.
    pub(crate) fn seed(&self, normalized: &str) -> bool {
        let mut inner = self.inner.write().unwrap();
        if inner.locked.is_some() || inner.user_edited {
            return false;
        }
        inner.value = normalized.to_string();
        true
    }

    /// Tier 2/3 write: claims the lock. Exactly one caller ever wins; the
    /// re-check under the write lock is what decides the race. Returns
    /// whether the value was actually applied (a manual edit still takes
    /// precedence over the display).
    pub(crate) fn lock_in(&self, tier: Tier, normalized: &str) -> bool {
        let mut inner = self.inner.write().unwrap();
        if inner.locked.is_some() {
            return false;
        }
        inner.locked = Some(tier);
        if inner.user_edited {
            return false;
        }
        inner.value = normalized.to_string();
        true
    }
}
