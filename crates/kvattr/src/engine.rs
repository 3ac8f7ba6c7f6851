//! Attribute synchronization engine
//!
//! Every [`AttrModel`] gets the generic accessor contract through
//! [`AttrAccess`]: reads go through the instance cache to the backend,
//! writes are tracked as pending changes and persisted in batches.
//!
//! Keys have the form `<collection>:<identity>:<attribute>`, e.g.
//! `posts:7:title`.

use kvattr_common::{KvAttrError, Result};
use kvattr_pool::Pool;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::coerce::{coerce, decode, AttrValue, IntoAttr};
use crate::model::AttrModel;
use crate::schema::{AttrDefinition, AttrSchema};
use crate::state::{AttrChange, Slot};

/// Identity of `model`, if its identity field has a value
pub(crate) fn identity<M: AttrModel>(model: &M) -> Option<String> {
    model
        .attr_field(M::attr_schema().identity_field())
        .filter(|id| !id.is_empty())
}

pub(crate) fn require_identity<M: AttrModel>(model: &M) -> Result<String> {
    identity(model)
        .ok_or_else(|| KvAttrError::MissingIdentity(M::attr_schema().identity_field().to_string()))
}

pub(crate) fn build_key(schema: &AttrSchema, id: &str, name: &str) -> String {
    format!("{}:{}:{}", schema.collection(), id, name)
}

/// Accept `title` and `:title` alike
pub(crate) fn normalize_name(name: &str) -> &str {
    name.trim().trim_start_matches(':')
}

pub(crate) fn resolve_pool<M: AttrModel>(model: &M, pool: Option<&str>) -> Result<Arc<Pool>> {
    model.attr_pools()?.resolve(pool)
}

/// Group items by pool name, keeping first-seen order
pub(crate) fn group_by_pool<T>(
    entries: Vec<(Option<&'static str>, T)>,
) -> Vec<(Option<&'static str>, Vec<T>)> {
    let mut groups: Vec<(Option<&'static str>, Vec<T>)> = Vec::new();
    for (pool, item) in entries {
        match groups.iter_mut().find(|(p, _)| *p == pool) {
            Some((_, items)) => items.push(item),
            None => groups.push((pool, vec![item])),
        }
    }
    groups
}

/// Multi-get that insists on one value per key
pub(crate) fn fetch_many(pool: &Pool, keys: &[String]) -> Result<Vec<Option<String>>> {
    let values = pool.with(|conn| conn.mget(keys))?;
    if values.len() != keys.len() {
        return Err(KvAttrError::Transport(format!(
            "MGET returned {} values for {} keys",
            values.len(),
            keys.len()
        )));
    }
    Ok(values)
}

/// Generic attribute accessors, keyed by attribute name
pub trait AttrAccess: AttrModel {
    /// Backend key of attribute `name`
    fn attr_key(&self, name: &str) -> Result<String>;

    /// Current value of `name`
    ///
    /// The first read fetches from the backend. A missing key yields the
    /// declared default, else the kind's zero value. Later reads come from
    /// the cache, re-coerced.
    fn get_attr(&mut self, name: &str) -> Result<Option<AttrValue>>;

    fn get_string(&mut self, name: &str) -> Result<Option<String>>;

    fn get_int(&mut self, name: &str) -> Result<Option<i64>>;

    /// Assign `value` to `name`, recording a change if the coerced value differs
    fn set_attr<V: IntoAttr>(&mut self, name: &str, value: V) -> Result<()>;

    /// Value before the pending change, or the current value
    fn attr_was(&mut self, name: &str) -> Result<Option<AttrValue>>;

    fn attr_change(&mut self, name: &str) -> Result<Option<AttrChange>>;

    fn attr_changed(&self, name: &str) -> bool;

    /// Changed attribute names in declaration order
    fn changed_attrs(&self) -> Vec<&'static str>;

    /// Revert `name` to its value before the pending change
    fn restore_attr(&mut self, name: &str) -> Result<()>;

    /// Mark `name` changed even if its value stays the same
    fn attr_will_change(&mut self, name: &str) -> Result<()>;

    /// Declared default of `name`, coerced; `None` if none was declared
    fn attr_default_value(&self, name: &str) -> Result<Option<AttrValue>>;

    /// Persist pending changes
    ///
    /// Present values go out in one MSET and nil values in one DEL per pool.
    /// If the backend write fails the pending changes are kept. Returns the
    /// number of attributes persisted.
    ///
    /// The touch capability and `after_save` hooks run once the write has
    /// succeeded. An error from either is returned as is, but the values are
    /// already persisted and no longer pending, and later `after_save` hooks
    /// do not run.
    fn save_attrs(&mut self) -> Result<usize>;

    /// Delete every declared attribute key of this instance
    fn clear_attrs(&mut self) -> Result<()>;

    /// Reload every declared attribute from the backend
    fn reload_attrs(&mut self) -> Result<()>;

    /// Reload the given attributes. Absent keys load as `None`, not the default.
    fn reload_attrs_named(&mut self, names: &[&str]) -> Result<()>;

    /// Assign every declared name in `attrs`, then save. Undeclared names are skipped.
    fn update_attrs<I, K, V>(&mut self, attrs: I) -> Result<bool>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: IntoAttr;

    /// Write every attribute of a newly created record
    ///
    /// Unread attributes take their fallback value without a backend read,
    /// then everything is saved.
    fn initialize_attrs(&mut self) -> Result<usize>;
}

impl<M: AttrModel> AttrAccess for M {
    fn attr_key(&self, name: &str) -> Result<String> {
        let schema = M::attr_schema();
        let def = schema.require(name)?;
        let id = require_identity(self)?;
        Ok(build_key(schema, &id, &def.name))
    }

    fn get_attr(&mut self, name: &str) -> Result<Option<AttrValue>> {
        let schema = M::attr_schema();
        let def = schema.require(name)?;

        if let Slot::Loaded(raw) = self.attr_cache().slot(name) {
            return Ok(coerce(raw.as_ref(), def.kind));
        }

        let raw = match identity(self) {
            Some(id) => {
                let key = build_key(schema, &id, name);
                let pool = resolve_pool(self, schema.pool_for(def))?;
                let raw = pool.with(|conn| conn.get(&key))?;
                trace!(key = %key, hit = raw.is_some(), "Fetched kv attr");
                raw
            }
            // Unsaved record, nothing to fetch
            None => None,
        };

        let value = decode(raw, def.kind).unwrap_or_else(|| def.fallback());
        self.attr_cache_mut().load(name, Some(value.clone()));
        Ok(Some(value))
    }

    fn get_string(&mut self, name: &str) -> Result<Option<String>> {
        Ok(self.get_attr(name)?.map(|v| v.to_text()))
    }

    fn get_int(&mut self, name: &str) -> Result<Option<i64>> {
        Ok(self.get_attr(name)?.map(|v| v.to_int()))
    }

    fn set_attr<V: IntoAttr>(&mut self, name: &str, value: V) -> Result<()> {
        let def = M::attr_schema().require(name)?;
        let raw = value.into_attr();
        let new = coerce(raw.as_ref(), def.kind);
        let current = self.get_attr(name)?;

        let cache = self.attr_cache_mut();
        if new != current {
            cache.record_change(name, current);
            cache.settle(name, &new);
        }
        cache.load(name, raw);
        Ok(())
    }

    fn attr_was(&mut self, name: &str) -> Result<Option<AttrValue>> {
        M::attr_schema().require(name)?;
        if let Some(before) = self.attr_cache().before(name) {
            return Ok(before.clone());
        }
        self.get_attr(name)
    }

    fn attr_change(&mut self, name: &str) -> Result<Option<AttrChange>> {
        M::attr_schema().require(name)?;
        let before = match self.attr_cache().before(name) {
            Some(before) => before.clone(),
            None => return Ok(None),
        };
        let after = self.get_attr(name)?;
        Ok(Some(AttrChange { before, after }))
    }

    fn attr_changed(&self, name: &str) -> bool {
        self.attr_cache().is_changed(name)
    }

    fn changed_attrs(&self) -> Vec<&'static str> {
        M::attr_schema()
            .definitions()
            .iter()
            .filter(|def| self.attr_cache().is_changed(&def.name))
            .map(|def| def.name.as_str())
            .collect()
    }

    fn restore_attr(&mut self, name: &str) -> Result<()> {
        M::attr_schema().require(name)?;
        let cache = self.attr_cache_mut();
        if let Some(before) = cache.take_change(name) {
            cache.load(name, before);
        }
        Ok(())
    }

    fn attr_will_change(&mut self, name: &str) -> Result<()> {
        let current = self.get_attr(name)?;
        self.attr_cache_mut().force_change(name, current);
        Ok(())
    }

    fn attr_default_value(&self, name: &str) -> Result<Option<AttrValue>> {
        Ok(M::attr_schema().require(name)?.default_value())
    }

    fn save_attrs(&mut self) -> Result<usize> {
        if !self.attr_cache().has_changes() {
            return Ok(0);
        }
        let id = require_identity(self)?;

        let hooks = M::attr_hooks();
        if let Some(hooks) = hooks {
            for hook in &hooks.before_save {
                hook(self)?;
            }
        }

        let schema = M::attr_schema();
        let changed: Vec<&'static AttrDefinition> = schema
            .definitions()
            .iter()
            .filter(|def| self.attr_cache().is_changed(&def.name))
            .collect();
        if changed.is_empty() {
            return Ok(0);
        }

        let mut entries = Vec::with_capacity(changed.len());
        for def in changed.iter().copied() {
            let value = self.get_attr(&def.name)?;
            entries.push((schema.pool_for(def), (def, build_key(schema, &id, &def.name), value)));
        }

        let mut removed: Vec<&'static AttrDefinition> = Vec::new();
        for (pool_name, writes) in group_by_pool(entries) {
            let mut sets: Vec<(String, String)> = Vec::new();
            let mut dels: Vec<String> = Vec::new();
            for (def, key, value) in writes {
                match value {
                    Some(v) => sets.push((key, v.to_text())),
                    None => {
                        dels.push(key);
                        removed.push(def);
                    }
                }
            }

            let pool = resolve_pool(self, pool_name)?;
            pool.with(|conn| {
                if !sets.is_empty() {
                    conn.mset(&sets)?;
                }
                if !dels.is_empty() {
                    conn.del(&dels)?;
                }
                Ok(())
            })?;
            debug!(
                pool = pool.name(),
                id = %id,
                set = sets.len(),
                del = dels.len(),
                "Persisted kv attrs"
            );
        }

        let cache = self.attr_cache_mut();
        cache.clear_changes(changed.iter().map(|def| def.name.as_str()));
        // A removed key reads back as its fallback
        for def in removed {
            cache.load(&def.name, Some(def.fallback()));
        }

        let mut columns: Vec<String> = Vec::new();
        for touch in changed.iter().filter_map(|def| def.touch.as_ref()) {
            for column in touch.column_names() {
                if !columns.iter().any(|c| c == column) {
                    columns.push(column.to_string());
                }
            }
        }

        if let Some(hooks) = hooks {
            if !columns.is_empty() {
                match hooks.touch {
                    Some(touch) => touch(self, &columns)?,
                    None => debug!(columns = ?columns, "No touch capability, skipping"),
                }
            }
            for hook in &hooks.after_save {
                hook(self)?;
            }
        }

        Ok(changed.len())
    }

    fn clear_attrs(&mut self) -> Result<()> {
        let schema = M::attr_schema();
        let id = require_identity(self)?;
        let entries = schema
            .definitions()
            .iter()
            .map(|def| (schema.pool_for(def), build_key(schema, &id, &def.name)))
            .collect();

        for (pool_name, keys) in group_by_pool(entries) {
            let pool = resolve_pool(self, pool_name)?;
            let removed = pool.with(|conn| conn.del(&keys))?;
            debug!(pool = pool.name(), id = %id, removed, "Cleared kv attrs");
        }

        self.attr_cache_mut().reset();
        Ok(())
    }

    fn reload_attrs(&mut self) -> Result<()> {
        let names = M::attr_schema().names();
        self.reload_attrs_named(&names)
    }

    fn reload_attrs_named(&mut self, names: &[&str]) -> Result<()> {
        let schema = M::attr_schema();
        let mut defs: Vec<&'static AttrDefinition> = Vec::with_capacity(names.len());
        for name in names {
            let def = schema.require(normalize_name(name))?;
            if !defs.iter().any(|d| d.name == def.name) {
                defs.push(def);
            }
        }
        if defs.is_empty() {
            return Ok(());
        }

        let id = require_identity(self)?;
        let entries = defs
            .iter()
            .copied()
            .map(|def| (schema.pool_for(def), (def, build_key(schema, &id, &def.name))))
            .collect();

        let mut loaded = Vec::with_capacity(defs.len());
        for (pool_name, group) in group_by_pool(entries) {
            let keys: Vec<String> = group.iter().map(|(_, key)| key.clone()).collect();
            let pool = resolve_pool(self, pool_name)?;
            let values = fetch_many(&pool, &keys)?;
            debug!(pool = pool.name(), id = %id, keys = keys.len(), "Reloaded kv attrs");

            for ((def, _), raw) in group.into_iter().zip(values) {
                loaded.push((def, decode(raw, def.kind)));
            }
        }

        let cache = self.attr_cache_mut();
        for (def, value) in loaded {
            cache.load(&def.name, value);
            cache.take_change(&def.name);
        }
        Ok(())
    }

    fn update_attrs<I, K, V>(&mut self, attrs: I) -> Result<bool>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: IntoAttr,
    {
        let schema = M::attr_schema();
        for (name, value) in attrs {
            let name = normalize_name(name.as_ref());
            if schema.is_defined(name) {
                self.set_attr(name, value)?;
            } else {
                trace!(attr = name, "Skipping undeclared attribute");
            }
        }
        self.save_attrs()?;
        Ok(true)
    }

    fn initialize_attrs(&mut self) -> Result<usize> {
        require_identity(self)?;
        let schema = M::attr_schema();
        let cache = self.attr_cache_mut();
        for def in schema.definitions() {
            if !cache.is_loaded(&def.name) {
                cache.load(&def.name, Some(def.fallback()));
            }
            cache.force_change(&def.name, None);
        }
        self.save_attrs()
    }
}
