// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Entity registries and the catalog that owns them
//!
//! A [`Catalog`] owns one [`Registry`] per entity kind plus a merged index
//! that maps every identifier to its kind, giving O(1) lookup across all
//! kinds and guaranteeing that identifier spaces never collide.

use crate::{
    Aggregation, Attribute, EntityId, EntityKind, Hierarchy, ModelError, Node, Object,
    PropertySet, Result,
};
use rustc_hash::FxHashMap;

/// Arena of entities of one kind, keyed by identifier
#[derive(Clone, Debug)]
pub struct Registry<T> {
    entries: FxHashMap<EntityId, T>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            entries: FxHashMap::default(),
        }
    }
}

impl<T: Hierarchy> Registry<T> {
    /// Get entity by identifier
    pub fn get(&self, id: &EntityId) -> Option<&T> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entities sorted by name
    ///
    /// Entities sharing a name are ordered by identifier.
    pub fn iter(&self) -> std::vec::IntoIter<&T> {
        let mut sorted: Vec<&T> = self.entries.values().collect();
        sorted.sort_by(|a, b| a.name().cmp(b.name()).then_with(|| a.id().cmp(b.id())));
        sorted.into_iter()
    }

    /// Iterate identifiers in arbitrary order
    pub fn ids(&self) -> impl Iterator<Item = &EntityId> {
        self.entries.keys()
    }

    pub(crate) fn get_mut(&mut self, id: &EntityId) -> Option<&mut T> {
        self.entries.get_mut(id)
    }

    pub(crate) fn insert(&mut self, entity: T) {
        self.entries.insert(entity.id().clone(), entity);
    }

    pub(crate) fn remove(&mut self, id: &EntityId) -> Option<T> {
        self.entries.remove(id)
    }

    pub(crate) fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.entries.values_mut().map(|e| e.node_mut())
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Borrowed view of any entity
#[derive(Clone, Copy, Debug)]
pub enum EntityRef<'a> {
    Attribute(&'a Attribute),
    PropertySet(&'a PropertySet),
    Object(&'a Object),
    Aggregation(&'a Aggregation),
}

impl<'a> EntityRef<'a> {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityRef::Attribute(_) => EntityKind::Attribute,
            EntityRef::PropertySet(_) => EntityKind::PropertySet,
            EntityRef::Object(_) => EntityKind::Object,
            EntityRef::Aggregation(_) => EntityKind::Aggregation,
        }
    }

    /// Shared hierarchy data
    pub fn node(&self) -> &'a Node {
        match *self {
            EntityRef::Attribute(e) => e.node(),
            EntityRef::PropertySet(e) => e.node(),
            EntityRef::Object(e) => e.node(),
            EntityRef::Aggregation(e) => e.node(),
        }
    }

    pub fn id(&self) -> &'a EntityId {
        self.node().id()
    }

    pub fn name(&self) -> &'a str {
        self.node().name()
    }

    pub fn as_attribute(&self) -> Option<&'a Attribute> {
        match *self {
            EntityRef::Attribute(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_property_set(&self) -> Option<&'a PropertySet> {
        match *self {
            EntityRef::PropertySet(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&'a Object> {
        match *self {
            EntityRef::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_aggregation(&self) -> Option<&'a Aggregation> {
        match *self {
            EntityRef::Aggregation(a) => Some(a),
            _ => None,
        }
    }
}

/// Owner of all entities of one document
///
/// Every mutation that touches more than one entity goes through the catalog,
/// since entities reference each other by identifier only.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    pub(crate) attributes: Registry<Attribute>,
    pub(crate) property_sets: Registry<PropertySet>,
    pub(crate) objects: Registry<Object>,
    pub(crate) aggregations: Registry<Aggregation>,
    index: FxHashMap<EntityId, EntityKind>,
}

impl Catalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attributes(&self) -> &Registry<Attribute> {
        &self.attributes
    }

    pub fn property_sets(&self) -> &Registry<PropertySet> {
        &self.property_sets
    }

    pub fn objects(&self) -> &Registry<Object> {
        &self.objects
    }

    pub fn aggregations(&self) -> &Registry<Aggregation> {
        &self.aggregations
    }

    /// Registry of the given kind
    pub fn registry<T: Hierarchy>(&self) -> &Registry<T> {
        T::registry(self)
    }

    /// Get entity of a known kind
    pub fn get<T: Hierarchy>(&self, id: &EntityId) -> Option<&T> {
        T::registry(self).get(id)
    }

    /// Get mutable entity of a known kind
    ///
    /// Only fields without cross-entity invariants are writable through the
    /// returned reference.
    pub fn get_mut<T: Hierarchy>(&mut self, id: &EntityId) -> Option<&mut T> {
        T::registry_mut(self).get_mut(id)
    }

    /// Kind of the entity registered under `id`
    pub fn kind_of(&self, id: &EntityId) -> Option<EntityKind> {
        self.index.get(id).copied()
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.index.contains_key(id)
    }

    /// Look up any entity by identifier
    pub fn get_element_by_uuid(&self, id: &EntityId) -> Option<EntityRef<'_>> {
        match self.index.get(id)? {
            EntityKind::Attribute => self.attributes.get(id).map(EntityRef::Attribute),
            EntityKind::PropertySet => self.property_sets.get(id).map(EntityRef::PropertySet),
            EntityKind::Object => self.objects.get(id).map(EntityRef::Object),
            EntityKind::Aggregation => self.aggregations.get(id).map(EntityRef::Aggregation),
        }
    }

    /// Shared node data of any entity
    pub fn node(&self, id: &EntityId) -> Option<&Node> {
        self.get_element_by_uuid(id).map(|e| e.node())
    }

    /// Mutable shared node data of any entity
    pub(crate) fn node_mut(&mut self, id: &EntityId) -> Option<&mut Node> {
        match self.index.get(id)? {
            EntityKind::Attribute => self.attributes.get_mut(id).map(|e| e.node_mut()),
            EntityKind::PropertySet => self.property_sets.get_mut(id).map(|e| e.node_mut()),
            EntityKind::Object => self.objects.get_mut(id).map(|e| e.node_mut()),
            EntityKind::Aggregation => self.aggregations.get_mut(id).map(|e| e.node_mut()),
        }
    }

    /// Total number of entities of all kinds
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Entities of a kind without a parent, sorted by name
    pub fn roots<T: Hierarchy>(&self) -> Vec<&T> {
        T::registry(self)
            .iter()
            .filter(|e| e.node().is_root())
            .collect()
    }

    /// Remove every entity
    pub fn clear(&mut self) {
        self.attributes.clear();
        self.property_sets.clear();
        self.objects.clear();
        self.aggregations.clear();
        self.index.clear();
    }

    /// Apply `f` to the node of every entity
    pub(crate) fn for_each_node_mut(&mut self, mut f: impl FnMut(&mut Node)) {
        self.attributes.nodes_mut().for_each(&mut f);
        self.property_sets.nodes_mut().for_each(&mut f);
        self.objects.nodes_mut().for_each(&mut f);
        self.aggregations.nodes_mut().for_each(&mut f);
    }

    /// Whether `id` is free for a new entity
    pub fn is_free(&self, id: &EntityId) -> bool {
        !self.index.contains_key(id)
    }

    pub(crate) fn register<T: Hierarchy>(&mut self, entity: T) -> Result<EntityId> {
        let id = entity.id().clone();
        if let Some(existing) = self.index.get(&id) {
            return Err(ModelError::DuplicateId {
                id,
                existing: *existing,
            });
        }
        self.index.insert(id.clone(), T::KIND);
        T::registry_mut(self).insert(entity);
        Ok(id)
    }

    pub(crate) fn deregister<T: Hierarchy>(&mut self, id: &EntityId) -> Option<T> {
        let entity = T::registry_mut(self).remove(id)?;
        self.index.remove(id);
        Some(entity)
    }

    /// Entity of a known kind or a not-found error
    pub(crate) fn require<T: Hierarchy>(&self, id: &EntityId) -> Result<&T> {
        self.get::<T>(id)
            .ok_or_else(|| ModelError::not_found(T::KIND, id))
    }

    pub(crate) fn require_mut<T: Hierarchy>(&mut self, id: &EntityId) -> Result<&mut T> {
        T::registry_mut(self)
            .get_mut(id)
            .ok_or_else(|| ModelError::not_found(T::KIND, id))
    }
}
