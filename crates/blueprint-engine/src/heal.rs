//! Self-healing key resolution
//!
//! Generated buttons often name a data key that the generated data does not
//! contain (`cups` vs `count`, `running` vs `is_running`). Before an
//! operation touches the data bag, the engine resolves the field it should
//! act on:
//!
//! 1. the requested key, if the bag has it;
//! 2. a conventional name for the field (timer fields only);
//! 3. the first entry whose value has the expected kind;
//! 4. otherwise a new entry, created with the kind's default value.
//!
//! [`HealingPolicy`] decides whether a requested-but-missing key is created
//! outright or whether an existing same-typed entry is borrowed first.

use serde::{Deserialize, Serialize};

use crate::events::HealStrategy;
use crate::value::{DataBag, DataKind};

/// What to do when the requested key is missing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealingPolicy {
    /// Create the requested key. Type matching only applies when no key
    /// was requested at all.
    #[default]
    PreferRequested,
    /// Borrow the first same-typed entry before creating anything.
    PreferExisting,
}

/// The key an operation will act on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedKey {
    pub key: String,
    pub strategy: HealStrategy,
}

impl ResolvedKey {
    fn new(key: impl Into<String>, strategy: HealStrategy) -> Self {
        Self {
            key: key.into(),
            strategy,
        }
    }

    /// Whether the key has to be created before use
    pub fn is_created(&self) -> bool {
        self.strategy == HealStrategy::Created
    }

    /// Insert the kind's default value if the key does not exist yet
    pub fn ensure(&self, data: &mut DataBag, kind: DataKind) {
        if !data.contains_key(&self.key) {
            data.insert(self.key.clone(), kind.default_value());
        }
    }
}

/// How to look up one field
#[derive(Debug, Clone, Copy)]
pub struct FieldQuery<'a> {
    /// Key named by the caller
    pub requested: Option<&'a str>,
    /// Conventional names, in priority order
    pub conventions: &'a [&'a str],
    /// Expected kind of the entry
    pub kind: DataKind,
    /// Name to create when nothing was requested or found
    pub fallback: &'a str,
    /// Keys that must not be picked by type matching
    pub exclude: &'a [&'a str],
    /// Whether type matching is allowed at all
    pub type_match: bool,
}

impl<'a> FieldQuery<'a> {
    /// Query for a plain field with no conventional names
    pub fn new(requested: Option<&'a str>, kind: DataKind, fallback: &'a str) -> Self {
        Self {
            requested,
            conventions: &[],
            kind,
            fallback,
            exclude: &[],
            type_match: true,
        }
    }

    pub fn with_conventions(mut self, conventions: &'a [&'a str]) -> Self {
        self.conventions = conventions;
        self
    }

    pub fn excluding(mut self, exclude: &'a [&'a str]) -> Self {
        self.exclude = exclude;
        self
    }

    pub fn without_type_match(mut self) -> Self {
        self.type_match = false;
        self
    }
}

/// Resolve the key a field query refers to
///
/// Pure: the bag is not modified. Use [`ResolvedKey::ensure`] to create a
/// missing entry.
pub fn resolve_key(data: &DataBag, query: FieldQuery<'_>, policy: HealingPolicy) -> ResolvedKey {
    if let Some(requested) = query.requested {
        if data.contains_key(requested) {
            return ResolvedKey::new(requested, HealStrategy::Exact);
        }
    }

    if let Some(found) = query.conventions.iter().find(|k| data.contains_key(k)) {
        return ResolvedKey::new(*found, HealStrategy::Convention);
    }

    if let (Some(requested), HealingPolicy::PreferRequested) = (query.requested, policy) {
        return ResolvedKey::new(requested, HealStrategy::Created);
    }

    if query.type_match {
        let found = data.first_key_matching(query.kind, |k| {
            !query.exclude.contains(&k) && !query.conventions.contains(&k)
        });
        if let Some(found) = found {
            return ResolvedKey::new(found, HealStrategy::TypeMatch);
        }
    }

    let name = query
        .requested
        .or_else(|| query.conventions.first().copied())
        .unwrap_or(query.fallback);
    ResolvedKey::new(name, HealStrategy::Created)
}
