//! Host integration contract
//!
//! A host record type implements [`AttrModel`] to expose its schema, its
//! identity and its attribute cache. Optional capabilities (save callbacks and
//! touching columns) are declared explicitly through [`AttrHooks`].

use kvattr_common::Result;
use kvattr_pool::PoolRegistry;
use std::fmt;

use crate::schema::AttrSchema;
use crate::state::AttrCache;

/// Callback run around a save
pub type HookFn<M> = fn(&mut M) -> Result<()>;

/// Callback receiving the columns to touch after a save
pub type TouchFn<M> = fn(&mut M, &[String]) -> Result<()>;

/// Optional host capabilities used by the engine
///
/// # Example
/// ```rust,ignore
/// static HOOKS: Lazy<AttrHooks<Post>> = Lazy::new(|| {
///     AttrHooks::new()
///         .before_save(Post::stamp_editor)
///         .after_save(Post::notify_followers)
///         .touch(Post::touch_columns)
/// });
/// ```
pub struct AttrHooks<M> {
    /// Run in order before a non-empty save. An error aborts the save.
    pub before_save: Vec<HookFn<M>>,
    /// Run in order after a successful save
    pub after_save: Vec<HookFn<M>>,
    /// Touches columns once per save that persisted attributes with a touch option
    pub touch: Option<TouchFn<M>>,
}

impl<M> AttrHooks<M> {
    pub fn new() -> Self {
        Self {
            before_save: Vec::new(),
            after_save: Vec::new(),
            touch: None,
        }
    }

    pub fn before_save(mut self, hook: HookFn<M>) -> Self {
        self.before_save.push(hook);
        self
    }

    pub fn after_save(mut self, hook: HookFn<M>) -> Self {
        self.after_save.push(hook);
        self
    }

    pub fn touch(mut self, touch: TouchFn<M>) -> Self {
        self.touch = Some(touch);
        self
    }
}

impl<M> Default for AttrHooks<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> fmt::Debug for AttrHooks<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttrHooks")
            .field("before_save", &self.before_save.len())
            .field("after_save", &self.after_save.len())
            .field("touch", &self.touch.is_some())
            .finish()
    }
}

/// A record whose attributes are cached in a key-value backend
pub trait AttrModel: Sized + 'static {
    /// Attribute schema of this type
    fn attr_schema() -> &'static AttrSchema;

    /// Text value of a record field, used for the identity segment of keys
    fn attr_field(&self, field: &str) -> Option<String>;

    fn attr_cache(&self) -> &AttrCache;

    fn attr_cache_mut(&mut self) -> &mut AttrCache;

    /// Pools used by this type, the process-wide registry by default
    fn attr_pools(&self) -> Result<&PoolRegistry> {
        kvattr_pool::global()
    }

    /// Optional save callbacks and touch capability
    fn attr_hooks() -> Option<&'static AttrHooks<Self>> {
        None
    }
}
