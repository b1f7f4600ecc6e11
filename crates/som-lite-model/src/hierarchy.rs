// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Generic parent/child inheritance engine
//!
//! All four entity kinds embed a [`Node`] holding the data shared by every
//! tree: identity, name, description, the `optional` flag, the parent link,
//! the child back-references and the visibility filter. The [`Hierarchy`]
//! trait gives the catalog uniform access to those nodes, so tree operations
//! are written once here.
//!
//! Kind-specific rules are explicit:
//! - [`Hierarchy::PROPAGATES_NAME`] is false for objects and aggregations,
//!   whose names stay local.
//! - Only [`Inheritable`] kinds can be linked with [`Catalog::add_child`];
//!   aggregations use [`Catalog::add_aggregation_child`], which enforces the
//!   composition graph rules.
//! - Deletion is exposed per kind (`delete_attribute`, `delete_property_set`,
//!   ...) because each kind has its own cleanup, see [`Hierarchy::release`].

use crate::{Catalog, EntityId, EntityKind, FilterMatrix, ModelError, Registry, Result};
use std::collections::BTreeSet;

/// Hierarchy data shared by all entity kinds
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub(crate) id: EntityId,
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) optional: bool,
    pub(crate) parent: Option<EntityId>,
    pub(crate) children: BTreeSet<EntityId>,
    pub(crate) filter: FilterMatrix,
}

impl Node {
    pub(crate) fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            optional: false,
            parent: None,
            children: BTreeSet::new(),
            filter: FilterMatrix::new(),
        }
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Description set on this entity itself, without ancestor fallback
    pub fn local_description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Set the local description; empty strings clear it
    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description.filter(|d| !d.is_empty());
    }

    /// Optional flag set on this entity itself, ignoring ancestors
    pub fn local_optional(&self) -> bool {
        self.optional
    }

    pub fn set_optional(&mut self, optional: bool) {
        self.optional = optional;
    }

    pub fn parent(&self) -> Option<&EntityId> {
        self.parent.as_ref()
    }

    pub fn children(&self) -> impl Iterator<Item = &EntityId> {
        self.children.iter()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_child(&self) -> bool {
        self.parent.is_some()
    }

    pub fn is_parent(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn filter_matrix(&self) -> &FilterMatrix {
        &self.filter
    }

    pub fn filter_matrix_mut(&mut self) -> &mut FilterMatrix {
        &mut self.filter
    }

    pub fn set_filter_matrix(&mut self, filter: FilterMatrix) {
        self.filter = filter;
    }
}

/// Uniform access to the entity kinds stored in a [`Catalog`]
pub trait Hierarchy: Sized + 'static {
    const KIND: EntityKind;

    /// Whether renaming an entity renames its descendants too
    const PROPAGATES_NAME: bool;

    fn node(&self) -> &Node;

    fn node_mut(&mut self) -> &mut Node;

    fn registry(catalog: &Catalog) -> &Registry<Self>;

    fn registry_mut(catalog: &mut Catalog) -> &mut Registry<Self>;

    /// Drop the links other entities hold to `id` before it is deregistered
    fn release(_catalog: &mut Catalog, _id: &EntityId) {}

    /// Hook run after the entity's own name changed
    fn renamed(_catalog: &mut Catalog, _id: &EntityId) {}

    /// Hook run after `child` was linked below `parent` through the public API
    fn adopted(_catalog: &mut Catalog, _parent: &EntityId, _child: &EntityId) {}

    /// Hook run when `child` leaves `old_parent` through the public API
    fn detached(_catalog: &mut Catalog, _old_parent: &EntityId, _child: &EntityId) {}

    fn id(&self) -> &EntityId {
        &self.node().id
    }

    fn name(&self) -> &str {
        &self.node().name
    }
}

/// Kinds that form classification inheritance trees
pub trait Inheritable: Hierarchy {}

impl Catalog {
    /// Make `child` a child of `parent`
    ///
    /// A child that already has another parent is moved. Linking an entity
    /// below one of its own descendants is rejected.
    pub fn add_child<T: Inheritable>(&mut self, parent: &EntityId, child: &EntityId) -> Result<()> {
        self.require::<T>(parent)?;
        let previous = self.require::<T>(child)?.node().parent.clone();
        if parent == child || self.ancestors::<T>(parent).contains(child) {
            return Err(ModelError::CyclicHierarchy {
                kind: T::KIND,
                parent: parent.clone(),
                child: child.clone(),
            });
        }
        if let Some(previous) = previous.filter(|p| p != parent) {
            T::detached(self, &previous, child);
        }
        self.link::<T>(parent, child);
        T::adopted(self, parent, child);
        Ok(())
    }

    /// Unlink `child` from `parent` without deleting anything
    ///
    /// Returns false if `child` was not a child of `parent`.
    pub fn remove_child<T: Hierarchy>(&mut self, parent: &EntityId, child: &EntityId) -> bool {
        let is_linked = self
            .get::<T>(child)
            .is_some_and(|c| c.node().parent.as_ref() == Some(parent));
        if !is_linked {
            return false;
        }
        T::detached(self, parent, child);
        self.unlink::<T>(child);
        true
    }

    /// Set an entity's name
    ///
    /// For kinds with [`Hierarchy::PROPAGATES_NAME`] all descendants receive
    /// the same name.
    pub fn set_name<T: Hierarchy>(&mut self, id: &EntityId, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        let targets = if T::PROPAGATES_NAME {
            let mut all = vec![id.clone()];
            all.extend(self.descendants::<T>(id));
            all
        } else {
            vec![id.clone()]
        };
        self.require::<T>(id)?;
        for target in &targets {
            if let Some(entity) = T::registry_mut(self).get_mut(target) {
                entity.node_mut().name = name.clone();
            }
        }
        for target in &targets {
            T::renamed(self, target);
        }
        Ok(())
    }

    /// Effective optional flag: set locally or on any ancestor
    pub fn is_optional<T: Hierarchy>(&self, id: &EntityId) -> bool {
        let Some(entity) = self.get::<T>(id) else {
            return false;
        };
        entity.node().optional
            || self
                .ancestors::<T>(id)
                .iter()
                .filter_map(|a| self.get::<T>(a))
                .any(|a| a.node().optional)
    }

    /// Effective description: the local one, else the nearest ancestor's
    ///
    /// Returns an empty string if no entity in the chain has a description.
    pub fn description<T: Hierarchy>(&self, id: &EntityId) -> &str {
        let mut current = self.get::<T>(id);
        while let Some(entity) = current {
            if let Some(description) = entity.node().description.as_deref() {
                return description;
            }
            current = entity
                .node()
                .parent
                .as_ref()
                .and_then(|p| self.get::<T>(p));
        }
        ""
    }

    /// Parent chain of an entity, nearest first
    pub fn ancestors<T: Hierarchy>(&self, id: &EntityId) -> Vec<EntityId> {
        let mut chain = Vec::new();
        let mut current = self.get::<T>(id).and_then(|e| e.node().parent.clone());
        while let Some(parent) = current {
            // Guard against corrupted links
            if chain.contains(&parent) || &parent == id {
                break;
            }
            current = self.get::<T>(&parent).and_then(|e| e.node().parent.clone());
            chain.push(parent);
        }
        chain
    }

    /// All descendants of an entity, depth-first
    pub fn descendants<T: Hierarchy>(&self, id: &EntityId) -> Vec<EntityId> {
        let mut result = Vec::new();
        let mut stack: Vec<EntityId> = self
            .get::<T>(id)
            .map(|e| e.node().children.iter().rev().cloned().collect())
            .unwrap_or_default();
        while let Some(next) = stack.pop() {
            if result.contains(&next) {
                continue;
            }
            if let Some(entity) = self.get::<T>(&next) {
                stack.extend(entity.node().children.iter().rev().cloned());
            }
            result.push(next);
        }
        result
    }

    /// Set parent link and child back-reference, detaching from a previous parent
    pub(crate) fn link<T: Hierarchy>(&mut self, parent: &EntityId, child: &EntityId) {
        self.unlink::<T>(child);
        if let Some(c) = T::registry_mut(self).get_mut(child) {
            c.node_mut().parent = Some(parent.clone());
        }
        if let Some(p) = T::registry_mut(self).get_mut(parent) {
            p.node_mut().children.insert(child.clone());
        }
    }

    /// Clear the parent link of `child` and the matching back-reference
    pub(crate) fn unlink<T: Hierarchy>(&mut self, child: &EntityId) {
        let Some(old_parent) = T::registry_mut(self)
            .get_mut(child)
            .and_then(|c| c.node_mut().parent.take())
        else {
            return;
        };
        if let Some(p) = T::registry_mut(self).get_mut(&old_parent) {
            p.node_mut().children.remove(child);
        }
    }

    /// Deregister an entity
    ///
    /// The entity is detached from its parent. With `recursive` the whole
    /// subtree is deleted; otherwise the children are promoted to roots.
    pub(crate) fn delete<T: Hierarchy>(&mut self, id: &EntityId, recursive: bool) -> bool {
        let Some(children) = self
            .get::<T>(id)
            .map(|e| e.node().children.iter().cloned().collect::<Vec<_>>())
        else {
            return false;
        };

        T::release(self, id);
        self.unlink::<T>(id);
        self.deregister::<T>(id);

        for child in children {
            if recursive {
                self.delete::<T>(&child, true);
            } else if let Some(c) = T::registry_mut(self).get_mut(&child) {
                c.node_mut().parent = None;
            }
        }
        true
    }
}
