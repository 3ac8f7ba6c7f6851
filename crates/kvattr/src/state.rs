//! Per-instance attribute cache and dirty tracking

use std::collections::HashMap;

use crate::coerce::AttrValue;

/// In-memory state of one attribute
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Slot {
    /// Never read or assigned; the next read goes to the backend
    #[default]
    Unloaded,
    /// Materialized, possibly as absent
    Loaded(Option<AttrValue>),
}

impl Slot {
    pub fn is_loaded(&self) -> bool {
        matches!(self, Slot::Loaded(_))
    }
}

static UNLOADED: Slot = Slot::Unloaded;

/// Before/after pair of a changed attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrChange {
    pub before: Option<AttrValue>,
    pub after: Option<AttrValue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Pending {
    /// Last known persisted value, coerced
    before: Option<AttrValue>,
    /// Marked by `attr_will_change`, kept even if the value returns to `before`
    forced: bool,
}

/// Attribute slots and pending changes owned by one entity instance
///
/// Hosts embed one of these in each record and hand it out through
/// [`crate::AttrModel::attr_cache`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttrCache {
    slots: HashMap<String, Slot>,
    pending: HashMap<String, Pending>,
}

impl AttrCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slot(&self, name: &str) -> &Slot {
        self.slots.get(name).unwrap_or(&UNLOADED)
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.slot(name).is_loaded()
    }

    /// Materialize `name` with `value`
    pub fn load(&mut self, name: &str, value: Option<AttrValue>) {
        self.slots.insert(name.to_string(), Slot::Loaded(value));
    }

    /// Forget `name` so the next read fetches it again
    pub fn unload(&mut self, name: &str) {
        self.slots.remove(name);
    }

    /// Drop every slot and pending change
    pub fn reset(&mut self) {
        self.slots.clear();
        self.pending.clear();
    }

    pub fn is_changed(&self, name: &str) -> bool {
        self.pending.contains_key(name)
    }

    pub fn has_changes(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Value `name` had before its pending change
    pub fn before(&self, name: &str) -> Option<&Option<AttrValue>> {
        self.pending.get(name).map(|p| &p.before)
    }

    /// Record that `name` is moving away from `before`
    ///
    /// The first recorded `before` is kept until the change is cleared.
    pub fn record_change(&mut self, name: &str, before: Option<AttrValue>) {
        self.pending
            .entry(name.to_string())
            .or_insert(Pending { before, forced: false });
    }

    /// Mark `name` changed regardless of its value
    pub fn force_change(&mut self, name: &str, before: Option<AttrValue>) {
        self.pending
            .entry(name.to_string())
            .and_modify(|p| p.forced = true)
            .or_insert(Pending { before, forced: true });
    }

    /// Drop the pending change of `name` if `value` equals its `before` and
    /// the change was not forced
    pub fn settle(&mut self, name: &str, value: &Option<AttrValue>) {
        if let Some(p) = self.pending.get(name) {
            if !p.forced && p.before == *value {
                self.pending.remove(name);
            }
        }
    }

    /// Clear the pending change of `name`, returning its `before` value
    pub fn take_change(&mut self, name: &str) -> Option<Option<AttrValue>> {
        self.pending.remove(name).map(|p| p.before)
    }

    pub fn clear_changes<'a, I>(&mut self, names: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for name in names {
            self.pending.remove(name);
        }
    }
}
