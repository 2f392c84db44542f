//! Resource identifiers shared by every backend plugin.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Opaque unique name of a resource or operation within one backend system.
///
/// By convention IDs are namespaced as `<plugin>:<type>:<qualified-name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(String);

impl Id {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Id {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for Id {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A value that uniquely identifies a resource or operation in a particular
/// system. Two identifiers are considered equal when their IDs are equal.
pub trait Identifier: fmt::Debug + Send + Sync {
    /// The unique ID of the resource or operation.
    fn id(&self) -> Id;

    /// Access to the concrete type, for plugins that need their own
    /// identifier back (e.g. a killer deleting backend resources).
    fn as_any(&self) -> &dyn Any;
}

/// An ordered group of identifiers: the unit scenarios and exclusions are
/// expressed in.
#[derive(Debug, Clone, Default)]
pub struct Identifiers(Vec<Arc<dyn Identifier>>);

impl Identifiers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, identifier: Arc<dyn Identifier>) {
        self.0.push(identifier);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<dyn Identifier>> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Arc<dyn Identifier>] {
        &self.0
    }

    /// The IDs of all identifiers, in order.
    pub fn ids(&self) -> Vec<Id> {
        self.0.iter().map(|identifier| identifier.id()).collect()
    }
}

impl PartialEq for Identifiers {
    fn eq(&self, other: &Self) -> bool {
        self.ids() == other.ids()
    }
}

impl FromIterator<Arc<dyn Identifier>> for Identifiers {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Identifier>>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Vec<Arc<dyn Identifier>>> for Identifiers {
    fn from(identifiers: Vec<Arc<dyn Identifier>>) -> Self {
        Self(identifiers)
    }
}

impl<'a> IntoIterator for &'a Identifiers {
    type Item = &'a Arc<dyn Identifier>;
    type IntoIter = std::slice::Iter<'a, Arc<dyn Identifier>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// The canonical multi-line rendering used in logs and the audit report.
impl fmt::Display for Identifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[")?;
        for identifier in &self.0 {
            writeln!(f, "{{{}}}", identifier.id())?;
        }
        write!(f, "]")
    }
}
