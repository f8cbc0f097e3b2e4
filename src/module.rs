//! Module identity
//!
//! A [`ModuleId`] is an opaque handle for a compilation unit owned by the
//! embedding system. The core never inspects a module beyond using it as a
//! lookup key and event payload; the only structure it carries is the
//! source/binary split, which global invalidation uses to decide whether
//! binary-only modules are affected.

use std::fmt;
use std::sync::Arc;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

/// Whether a module is backed by source code or by a compiled binary.
///
/// Binary modules are skipped by global invalidation when
/// `include_binary_modules` is false, since their content cannot change from
/// an editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    Source,
    Binary,
}

/// Opaque identity of a compilation unit
///
/// Cheap to clone (the name is shared), hashable, and usable as a map key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleId {
    name: Arc<str>,
    kind: ModuleKind,
}

impl ModuleId {
    pub fn new(name: impl Into<Arc<str>>, kind: ModuleKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Create a source-module handle
    pub fn source(name: impl Into<Arc<str>>) -> Self {
        Self::new(name, ModuleKind::Source)
    }

    /// Create a binary-module handle
    pub fn binary(name: impl Into<Arc<str>>) -> Self {
        Self::new(name, ModuleKind::Binary)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ModuleKind {
        self.kind
    }

    pub fn is_binary(&self) -> bool {
        self.kind == ModuleKind::Binary
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

// Manual impl so the shared name serializes as a plain string without
// serde's rc feature.
impl Serialize for ModuleId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ModuleId", 2)?;
        s.serialize_field("name", self.name())?;
        s.serialize_field("kind", &self.kind)?;
        s.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_module_id_equality_and_hashing() {
        let a = ModuleId::source("app.main");
        let b = ModuleId::source("app.main");
        let c = ModuleId::binary("app.main");
        assert_eq!(a, b);
        assert_ne!(a, c); // kind is part of identity

        let mut map = HashMap::new();
        map.insert(a.clone(), 1);
        assert_eq!(map.get(&b), Some(&1));
        assert_eq!(map.get(&c), None);
    }

    #[test]
    fn test_module_id_serialization() {
        let m = ModuleId::binary("stdlib");
        let json = serde_json::to_string(&m).unwrap();
        assert!(json.contains("\"name\":\"stdlib\""));
        assert!(json.contains("\"kind\":\"binary\""));
    }

    #[test]
    fn test_display_is_bare_name() {
        assert_eq!(ModuleId::source("core.util").to_string(), "core.util");
    }
}
