// Collection resolver - Maps a source collection and its ancestors onto the target
use crate::application::metabase_gateway::{MetabaseGateway, NewCollection};
use crate::domain::collection::Collection;
use crate::domain::identifier_map::{EntityKind, IdentifierMap};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Ancestor chains deeper than this are treated like a cycle.
const MAX_COLLECTION_DEPTH: usize = 64;

/// Precedence between the two reuse rules for an existing target collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionMatchPolicy {
    /// Same name and parent first, then same personal owner.
    #[default]
    NameThenOwner,
    OwnerThenName,
    NameOnly,
}

pub struct CollectionResolver<'a> {
    source: &'a dyn MetabaseGateway,
    target: &'a dyn MetabaseGateway,
    policy: CollectionMatchPolicy,
    target_collections: Option<Vec<Collection>>,
}

impl<'a> CollectionResolver<'a> {
    pub fn new(
        source: &'a dyn MetabaseGateway,
        target: &'a dyn MetabaseGateway,
        policy: CollectionMatchPolicy,
    ) -> Self {
        Self {
            source,
            target,
            policy,
            target_collections: None,
        }
    }

    /// Returns the target collection equivalent to `source_id`, creating it
    /// and any missing ancestors parent-first. `None` means "place under
    /// root": the collection could not be fetched or created.
    pub async fn resolve(&mut self, source_id: i64, map: &mut IdentifierMap) -> Option<i64> {
        let mut chain: Vec<Collection> = Vec::new();
        let mut visited = HashSet::new();
        let mut anchor = None;
        let mut cursor = Some(source_id);

        while let Some(id) = cursor {
            if !visited.insert(id) {
                tracing::warn!(collection_id = id, "Detected cycle in collection hierarchy, placing branch under root");
                break;
            }
            if let Some(target_id) = map.get(EntityKind::Collection, id) {
                anchor = Some(target_id);
                break;
            }
            if chain.len() >= MAX_COLLECTION_DEPTH {
                tracing::warn!(collection_id = id, depth = chain.len(), "Collection hierarchy too deep, placing branch under root");
                break;
            }

            match self.source.get_collection(id).await {
                Ok(collection) => {
                    cursor = collection.parent();
                    chain.push(collection);
                }
                Err(e) => {
                    tracing::error!(collection_id = id, error = %e, "Failed to fetch source collection");
                    map.mark_unresolved(EntityKind::Collection, id);
                    if chain.is_empty() {
                        return None;
                    }
                    tracing::warn!(collection_id = id, "Parent collection unavailable, using root as parent");
                    break;
                }
            }
        }

        if chain.is_empty() {
            return anchor;
        }

        let mut parent_target = anchor;
        let mut resolved = None;
        for (depth, collection) in chain.iter().rev().enumerate() {
            resolved = self.ensure(collection, parent_target, map).await;
            if resolved.is_none() && depth + 1 < chain.len() {
                tracing::warn!(
                    collection_id = collection.id,
                    "Collection could not be resolved, its children go under root"
                );
            }
            parent_target = resolved;
        }
        resolved
    }

    /// Resolves the collection a card lives in; cards without one stay in root.
    pub async fn resolve_optional(
        &mut self,
        source_id: Option<i64>,
        map: &mut IdentifierMap,
    ) -> Option<i64> {
        match source_id {
            Some(id) => self.resolve(id, map).await,
            None => None,
        }
    }

    async fn ensure(
        &mut self,
        collection: &Collection,
        parent: Option<i64>,
        map: &mut IdentifierMap,
    ) -> Option<i64> {
        let name = collection.display_name();

        if let Some(existing) = self
            .find_existing(&name, parent, collection.personal_owner_id)
            .await
        {
            tracing::info!(
                source_id = collection.id,
                target_id = existing,
                parent = ?parent,
                "Reusing existing target collection '{}'",
                name
            );
            map.insert(EntityKind::Collection, collection.id, existing);
            return Some(existing);
        }

        let payload = NewCollection {
            name: name.clone(),
            description: collection.description_or_none(),
            authority_level: None,
            namespace: collection.namespace_or_none(),
            parent_id: parent,
        };

        match self.target.create_collection(&payload).await {
            Ok(target_id) => {
                tracing::info!(
                    source_id = collection.id,
                    target_id,
                    parent = ?parent,
                    "Created collection '{}' on target",
                    name
                );
                map.insert(EntityKind::Collection, collection.id, target_id);
                if let Some(cache) = self.target_collections.as_mut() {
                    cache.push(Collection {
                        id: target_id,
                        name: Some(name),
                        parent_id: parent,
                        ..Default::default()
                    });
                }
                Some(target_id)
            }
            Err(e) => {
                tracing::error!(source_id = collection.id, error = %e, "Failed to create collection '{}' on target", name);
                map.mark_unresolved(EntityKind::Collection, collection.id);
                None
            }
        }
    }

    async fn find_existing(
        &mut self,
        name: &str,
        parent: Option<i64>,
        personal_owner_id: Option<i64>,
    ) -> Option<i64> {
        let policy = self.policy;
        let collections = self.target_collections().await;

        let by_name = || {
            collections
                .iter()
                .find(|c| c.has_name(name) && c.parent() == parent)
                .map(|c| c.id)
        };
        let by_owner = || {
            let owner = personal_owner_id?;
            collections
                .iter()
                .find(|c| c.personal_owner_id == Some(owner))
                .map(|c| c.id)
        };

        match policy {
            CollectionMatchPolicy::NameThenOwner => by_name().or_else(by_owner),
            CollectionMatchPolicy::OwnerThenName => by_owner().or_else(by_name),
            CollectionMatchPolicy::NameOnly => by_name(),
        }
    }

    /// Target collections, listed once per resolver. A failed listing is
    /// treated as "nothing exists" and retried on the next lookup.
    async fn target_collections(&mut self) -> &[Collection] {
        if self.target_collections.is_none() {
            match self.target.list_collections().await {
                Ok(collections) => self.target_collections = Some(collections),
                Err(e) => {
                    tracing::warn!(error = %e, "Could not list target collections, assuming none match");
                    return &[];
                }
            }
        }
        self.target_collections.as_deref().unwrap_or(&[])
    }
}
