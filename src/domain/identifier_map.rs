// Source -> target identifier mapping built during one migration run
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Collection,
    Card,
    Tab,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntityKind::Collection => "collection",
            EntityKind::Card => "card",
            EntityKind::Tab => "tab",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentifierMap {
    resolved: HashMap<(EntityKind, i64), i64>,
    unresolved: Vec<(EntityKind, i64)>,
}

impl IdentifierMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: EntityKind, source_id: i64) -> Option<i64> {
        self.resolved.get(&(kind, source_id)).copied()
    }

    pub fn contains(&self, kind: EntityKind, source_id: i64) -> bool {
        self.resolved.contains_key(&(kind, source_id))
    }

    /// Records a mapping. A later resolution of the same entity clears any
    /// earlier unresolved marker.
    pub fn insert(&mut self, kind: EntityKind, source_id: i64, target_id: i64) {
        self.unresolved.retain(|entry| *entry != (kind, source_id));
        self.resolved.insert((kind, source_id), target_id);
    }

    pub fn mark_unresolved(&mut self, kind: EntityKind, source_id: i64) {
        if !self.contains(kind, source_id) && !self.unresolved.contains(&(kind, source_id)) {
            self.unresolved.push((kind, source_id));
        }
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.resolved.keys().filter(|(k, _)| *k == kind).count()
    }

    pub fn unresolved(&self) -> &[(EntityKind, i64)] {
        &self.unresolved
    }

    /// Resolved entries sorted by kind, then source id.
    pub fn entries(&self) -> Vec<(EntityKind, i64, i64)> {
        let mut entries: Vec<_> = self
            .resolved
            .iter()
            .map(|(&(kind, source), &target)| (kind, source, target))
            .collect();
        entries.sort();
        entries
    }
}
