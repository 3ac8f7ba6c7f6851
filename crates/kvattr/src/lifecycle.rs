//! Record lifecycle glue
//!
//! The host's ORM calls these at the matching points of a record's life.
//! Only the post-commit destroy clears keys, so a rolled back delete leaves
//! the attributes in place.

use kvattr_common::Result;
use tracing::debug;

use crate::engine::AttrAccess;
use crate::model::AttrModel;

/// Points in a record's life that touch cached attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The record was inserted
    Created,
    /// The record's columns were updated
    Updated,
    /// The record's delete was committed
    Destroyed,
    /// The host is about to reload the record's columns
    Reloading,
}

/// Lifecycle hooks for every [`AttrModel`]
pub trait AttrLifecycle: AttrAccess {
    /// Write every attribute, defaults included
    fn after_create(&mut self) -> Result<()> {
        self.initialize_attrs().map(|_| ())
    }

    /// Persist pending attribute changes
    fn after_update(&mut self) -> Result<()> {
        self.save_attrs().map(|_| ())
    }

    /// Delete the record's attribute keys
    fn after_destroy_commit(&mut self) -> Result<()> {
        self.clear_attrs()
    }

    /// Refresh every attribute ahead of the host's own reload
    fn before_reload(&mut self) -> Result<()> {
        self.reload_attrs()
    }

    fn on_lifecycle(&mut self, event: LifecycleEvent) -> Result<()> {
        debug!(event = ?event, "kv attr lifecycle");
        match event {
            LifecycleEvent::Created => self.after_create(),
            LifecycleEvent::Updated => self.after_update(),
            LifecycleEvent::Destroyed => self.after_destroy_commit(),
            LifecycleEvent::Reloading => self.before_reload(),
        }
    }
}

impl<M: AttrModel> AttrLifecycle for M {}
