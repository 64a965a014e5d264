//! Stub lookup.
//!
//! Matches a query's collection against the registered stubs.

use crate::config::StubDefinition;

/// How a stub was selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Stub names the query's collection
    Collection,
    /// Stub has no collection and no collection stub applied
    Wildcard,
}

/// Result of matching a collection against the registry.
#[derive(Debug)]
pub struct MatchResult<'a> {
    /// The matched stub
    pub stub: &'a StubDefinition,
    /// Position of the stub in registration order
    pub index: usize,
    pub kind: MatchKind,
}

/// Ordered collection of stubs.
#[derive(Debug, Clone, Default)]
pub struct StubRegistry {
    stubs: Vec<StubDefinition>,
}

impl StubRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stub. Its data is stored as-is.
    pub fn register(&mut self, stub: StubDefinition) {
        self.stubs.push(stub);
    }

    /// Find the stub answering for `collection`.
    ///
    /// The first stub naming the collection wins; otherwise the first
    /// wildcard stub. A query with no collection only sees wildcards.
    pub fn find_match(&self, collection: Option<&str>) -> Option<MatchResult<'_>> {
        let exact = collection.and_then(|name| {
            self.stubs
                .iter()
                .position(|stub| stub.collection.as_deref() == Some(name))
        });

        if let Some(index) = exact {
            return Some(MatchResult {
                stub: &self.stubs[index],
                index,
                kind: MatchKind::Collection,
            });
        }

        self.stubs
            .iter()
            .position(StubDefinition::is_wildcard)
            .map(|index| MatchResult {
                stub: &self.stubs[index],
                index,
                kind: MatchKind::Wildcard,
            })
    }

    pub fn len(&self) -> usize {
        self.stubs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stubs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StubDefinition> {
        self.stubs.iter()
    }
}

impl From<Vec<StubDefinition>> for StubRegistry {
    fn from(stubs: Vec<StubDefinition>) -> Self {
        Self { stubs }
    }
}
