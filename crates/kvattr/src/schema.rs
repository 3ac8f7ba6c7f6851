//! Attribute definitions per entity type
//!
//! An [`AttrSchema`] is built once, usually inside a `Lazy` static, and is
//! read-only afterwards.
//!
//! # Example
//! ```rust,ignore
//! use kvattr::{AttrKind, AttrOptions, AttrSchema, Touch};
//! use once_cell::sync::Lazy;
//!
//! static POST: Lazy<AttrSchema> = Lazy::new(|| {
//!     let mut schema = AttrSchema::new("Post");
//!     schema
//!         .define("title", AttrKind::String, AttrOptions::new())
//!         .define("version", AttrKind::Integer, AttrOptions::new().default(1))
//!         .define("content", AttrKind::String, AttrOptions::new().touch(Touch::Timestamp));
//!     schema
//! });
//! ```

use kvattr_common::{KvAttrError, Result};
use std::collections::HashMap;

use crate::coerce::{self, AttrKind, AttrValue, IntoAttr};
use crate::inflect;

/// Identity field used unless overridden
pub const DEFAULT_IDENTITY_FIELD: &str = "id";

/// Columns touched when an attribute is persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Touch {
    /// The record's `updated_at` timestamp
    Timestamp,
    /// The listed columns
    Columns(Vec<String>),
}

impl Touch {
    pub const TIMESTAMP_COLUMN: &'static str = "updated_at";

    /// Touch a single column
    pub fn column(name: impl Into<String>) -> Self {
        Touch::Columns(vec![name.into()])
    }

    /// Touch several columns
    pub fn columns<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Touch::Columns(names.into_iter().map(Into::into).collect())
    }

    pub fn column_names(&self) -> Vec<&str> {
        match self {
            Touch::Timestamp => vec![Self::TIMESTAMP_COLUMN],
            Touch::Columns(cols) => cols.iter().map(String::as_str).collect(),
        }
    }
}

/// Options accepted by [`AttrSchema::define`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttrOptions {
    default: Option<AttrValue>,
    touch: Option<Touch>,
    pool: Option<String>,
}

impl AttrOptions {
    pub fn new() -> Self {
        <Self as Default>::default()
    }

    /// Value used when the backend has none
    pub fn default(mut self, value: impl IntoAttr) -> Self {
        self.default = value.into_attr();
        self
    }

    /// Columns to touch after this attribute is persisted
    pub fn touch(mut self, touch: Touch) -> Self {
        self.touch = Some(touch);
        self
    }

    /// Pool for this attribute, overriding the entity's pool
    pub fn pool(mut self, name: impl Into<String>) -> Self {
        self.pool = Some(name.into());
        self
    }
}

/// Static metadata for one attribute
#[derive(Debug, Clone, PartialEq)]
pub struct AttrDefinition {
    pub name: String,
    pub kind: AttrKind,
    /// Declared default, uncoerced
    pub default: Option<AttrValue>,
    pub touch: Option<Touch>,
    pub pool_name: Option<String>,
}

impl AttrDefinition {
    /// Declared default coerced to this attribute's kind
    pub fn default_value(&self) -> Option<AttrValue> {
        coerce::default_for(self)
    }

    /// Declared default, or the kind's zero value
    pub fn fallback(&self) -> AttrValue {
        self.default_value().unwrap_or_else(|| self.kind.zero())
    }
}

/// Attribute definitions and key settings of one entity type
#[derive(Debug, Clone)]
pub struct AttrSchema {
    type_name: String,
    collection: String,
    identity_field: Option<String>,
    pool_name: Option<String>,
    attrs: Vec<AttrDefinition>,
    index: HashMap<String, usize>,
}

impl AttrSchema {
    /// Empty schema for the entity type `type_name` (e.g. `"Post"`)
    pub fn new(type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        Self {
            collection: inflect::collection_name(&type_name),
            type_name,
            identity_field: None,
            pool_name: None,
            attrs: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Declare an attribute
    ///
    /// Redefining a name replaces its definition in place.
    pub fn define(&mut self, name: impl Into<String>, kind: AttrKind, options: AttrOptions) -> &mut Self {
        let name = name.into();
        let def = AttrDefinition {
            name: name.clone(),
            kind,
            default: options.default,
            touch: options.touch,
            pool_name: options.pool,
        };

        match self.index.get(&name) {
            Some(&pos) => self.attrs[pos] = def,
            None => {
                self.index.insert(name, self.attrs.len());
                self.attrs.push(def);
            }
        }
        self
    }

    /// Declare an attribute whose kind is given by name
    pub fn define_named(
        &mut self,
        name: impl Into<String>,
        kind: &str,
        options: AttrOptions,
    ) -> Result<&mut Self> {
        let kind = kind.parse::<AttrKind>()?;
        Ok(self.define(name, kind, options))
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Key prefix for this type
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Override the key prefix derived from the type name
    pub fn set_collection(&mut self, collection: impl Into<String>) -> &mut Self {
        self.collection = collection.into();
        self
    }

    /// Attribute names in declaration order
    pub fn names(&self) -> Vec<&str> {
        self.attrs.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn definitions(&self) -> &[AttrDefinition] {
        &self.attrs
    }

    pub fn definition(&self, name: &str) -> Option<&AttrDefinition> {
        self.index.get(name).map(|&pos| &self.attrs[pos])
    }

    /// Definition of `name`, or `UnknownAttribute`
    pub fn require(&self, name: &str) -> Result<&AttrDefinition> {
        self.definition(name).ok_or_else(|| {
            KvAttrError::UnknownAttribute(format!("{}.{}", self.type_name, name))
        })
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn identity_field(&self) -> &str {
        self.identity_field.as_deref().unwrap_or(DEFAULT_IDENTITY_FIELD)
    }

    /// Use `field` instead of `id` to build keys. Can be set once.
    pub fn set_identity_field(&mut self, field: &str) -> Result<&mut Self> {
        let field = field.trim();
        if field.is_empty() {
            return Err(KvAttrError::Configuration(format!(
                "{}: identity field must not be empty",
                self.type_name
            )));
        }
        if let Some(existing) = &self.identity_field {
            return Err(KvAttrError::Configuration(format!(
                "{}: identity field already set to '{}'",
                self.type_name, existing
            )));
        }
        self.identity_field = Some(field.to_string());
        Ok(self)
    }

    /// Pool for this type, `None` meaning the registry default
    pub fn pool_name(&self) -> Option<&str> {
        self.pool_name.as_deref()
    }

    /// Route this type through the pool `name`. Can be set once.
    pub fn set_pool(&mut self, name: &str) -> Result<&mut Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(KvAttrError::Configuration(format!(
                "{}: pool name must not be empty",
                self.type_name
            )));
        }
        if let Some(existing) = &self.pool_name {
            return Err(KvAttrError::Configuration(format!(
                "{}: pool already set to '{}'",
                self.type_name, existing
            )));
        }
        self.pool_name = Some(name.to_string());
        Ok(self)
    }

    /// Pool used for `def`: its own, else the type's
    pub fn pool_for<'a>(&'a self, def: &'a AttrDefinition) -> Option<&'a str> {
        def.pool_name.as_deref().or(self.pool_name.as_deref())
    }
}
