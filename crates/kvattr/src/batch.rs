//! Bulk hydration across instances
//!
//! Loading `n` records with `m` attributes each costs one MGET per pool
//! instead of `n * m` GETs.

use kvattr_common::Result;
use tracing::{debug, trace};

use crate::coerce::decode;
use crate::engine::{build_key, fetch_many, group_by_pool, identity, normalize_name};
use crate::model::AttrModel;
use crate::schema::AttrDefinition;

/// Load `fields` of every instance in one round trip per pool
///
/// Present values are coerced, absent ones take the attribute's fallback
/// like the getter does. Records without an identity take fallbacks
/// without a backend call. Undeclared fields are skipped. Loaded fields lose
/// any pending change. Returns `instances` for chaining.
pub fn load_many<'a, M: AttrModel>(instances: &'a mut [M], fields: &[&str]) -> Result<&'a mut [M]> {
    let schema = M::attr_schema();

    let mut defs: Vec<&'static AttrDefinition> = Vec::with_capacity(fields.len());
    for field in fields {
        match schema.definition(normalize_name(field)) {
            Some(def) if !defs.iter().any(|d| d.name == def.name) => defs.push(def),
            Some(_) => {}
            None => trace!(attr = *field, "Skipping undeclared attribute"),
        }
    }

    if instances.is_empty() || defs.is_empty() {
        return Ok(instances);
    }

    let mut entries = Vec::with_capacity(instances.len() * defs.len());
    let mut loaded = Vec::new();
    for (idx, instance) in instances.iter().enumerate() {
        match identity(instance) {
            Some(id) => {
                for def in defs.iter().copied() {
                    entries.push((schema.pool_for(def), (idx, def, build_key(schema, &id, &def.name))));
                }
            }
            // Unsaved record, nothing to fetch
            None => loaded.extend(defs.iter().map(|def| (idx, *def, def.fallback()))),
        }
    }

    if !entries.is_empty() {
        let registry = instances[0].attr_pools()?;
        for (pool_name, group) in group_by_pool(entries) {
            let pool = registry.resolve(pool_name)?;
            let keys: Vec<String> = group.iter().map(|(_, _, key)| key.clone()).collect();
            let values = fetch_many(&pool, &keys)?;
            debug!(
                pool = pool.name(),
                collection = schema.collection(),
                keys = keys.len(),
                "Batch loaded kv attrs"
            );

            for ((idx, def, _), raw) in group.into_iter().zip(values) {
                let value = decode(raw, def.kind).unwrap_or_else(|| def.fallback());
                loaded.push((idx, def, value));
            }
        }
    }

    for (idx, def, value) in loaded {
        let cache = instances[idx].attr_cache_mut();
        cache.load(&def.name, Some(value));
        cache.take_change(&def.name);
    }
    Ok(instances)
}

/// Method form of [`load_many`] for slices and vectors of records
pub trait LoadAttrs {
    fn load_attrs(&mut self, fields: &[&str]) -> Result<&mut Self>;
}

impl<M: AttrModel> LoadAttrs for [M] {
    fn load_attrs(&mut self, fields: &[&str]) -> Result<&mut Self> {
        load_many(self, fields)
    }
}
