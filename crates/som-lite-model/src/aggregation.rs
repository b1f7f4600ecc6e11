// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Aggregation graph
//!
//! Aggregation nodes wrap objects and form a composition tree separate from
//! the classification tree. An object may appear in many nodes, but never
//! twice on one root-to-leaf path.

use crate::{
    Catalog, ConnectionType, EntityId, EntityKind, FilterMatrix, Hierarchy, Node, Object, Registry,
    Result,
};
use log::debug;

const CODE_SEPARATOR: &str = "_xxx_";
const CODE_SUFFIX: &str = "_xxx";

/// A node of the composition tree
#[derive(Clone, Debug, PartialEq)]
pub struct Aggregation {
    pub(crate) node: Node,
    pub(crate) object: EntityId,
    pub(crate) connection: ConnectionType,
}

impl Aggregation {
    /// The wrapped object
    pub fn object(&self) -> &EntityId {
        &self.object
    }

    /// Tag of the edge to the parent, `None` for roots
    pub fn parent_connection(&self) -> Option<ConnectionType> {
        self.node.parent.as_ref().map(|_| self.connection)
    }

    /// Stored edge tag, kept even while the node is a root
    pub fn connection(&self) -> ConnectionType {
        self.connection
    }
}

impl Hierarchy for Aggregation {
    const KIND: EntityKind = EntityKind::Aggregation;
    const PROPAGATES_NAME: bool = false;

    fn node(&self) -> &Node {
        &self.node
    }

    fn node_mut(&mut self) -> &mut Node {
        &mut self.node
    }

    fn registry(catalog: &Catalog) -> &Registry<Self> {
        &catalog.aggregations
    }

    fn registry_mut(catalog: &mut Catalog) -> &mut Registry<Self> {
        &mut catalog.aggregations
    }

    fn release(catalog: &mut Catalog, id: &EntityId) {
        let Some(object) = catalog.aggregations.get(id).map(|a| a.object.clone()) else {
            return;
        };
        if let Some(object) = catalog.objects.get_mut(&object) {
            object.aggregations.remove(id);
        }
    }
}

/// Parameters for creating an aggregation node
#[derive(Clone, Debug, Default)]
pub struct NewAggregation {
    pub id: Option<EntityId>,
    pub connection: ConnectionType,
    pub description: Option<String>,
    pub optional: bool,
    pub filter: FilterMatrix,
}

impl NewAggregation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<EntityId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_connection(mut self, connection: ConnectionType) -> Self {
        self.connection = connection;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn with_filter(mut self, filter: FilterMatrix) -> Self {
        self.filter = filter;
        self
    }
}

impl Catalog {
    /// Create a root aggregation node wrapping `object`
    ///
    /// The node takes the object's name.
    pub fn create_aggregation(&mut self, object: &EntityId, new: NewAggregation) -> Result<EntityId> {
        let name = self.require::<Object>(object)?.node.name.clone();
        let mut node = Node::new(new.id.unwrap_or_default(), name);
        node.set_description(new.description);
        node.optional = new.optional;
        node.filter = new.filter;
        let id = self.register(Aggregation {
            node,
            object: object.clone(),
            connection: new.connection,
        })?;
        self.require_mut::<Object>(object)?
            .aggregations
            .insert(id.clone());
        Ok(id)
    }

    /// Attach `child` below `parent` with the given edge tag
    ///
    /// Returns false and leaves the graph unchanged when both nodes wrap the
    /// same object, when the child's object already appears above `parent`,
    /// or when the child is attached to a different parent. Re-adding a child
    /// to its current parent only updates the edge tag.
    pub fn add_aggregation_child(
        &mut self,
        parent: &EntityId,
        child: &EntityId,
        connection: ConnectionType,
    ) -> bool {
        let (Some(p), Some(c)) = (self.aggregations.get(parent), self.aggregations.get(child))
        else {
            return false;
        };
        if p.object == c.object {
            debug!("Refused self-aggregation of object {}", c.object);
            return false;
        }
        let child_object = c.object.clone();
        let wraps_child_object = self
            .ancestors::<Aggregation>(parent)
            .iter()
            .filter_map(|a| self.aggregations.get(a))
            .any(|a| a.object == child_object);
        if wraps_child_object {
            debug!("Refused aggregation {} -> {}: cycle", parent, child);
            return false;
        }
        match c.node.parent.as_ref() {
            Some(current) if current != parent => {
                debug!("Refused aggregation {} -> {}: already attached", parent, child);
                return false;
            }
            _ => {}
        }

        self.link::<Aggregation>(parent, child);
        if let Some(c) = self.aggregations.get_mut(child) {
            c.connection = connection;
        }
        true
    }

    /// Detach a node from its parent; returns false for roots
    pub fn remove_aggregation_parent(&mut self, id: &EntityId) -> bool {
        let is_child = self
            .aggregations
            .get(id)
            .is_some_and(|a| a.node.is_child());
        if is_child {
            self.unlink::<Aggregation>(id);
        }
        is_child
    }

    pub fn set_parent_connection(&mut self, id: &EntityId, connection: ConnectionType) -> Result<()> {
        self.require_mut::<Aggregation>(id)?.connection = connection;
        Ok(())
    }

    /// Code prefix built from the abbreviations of aggregating ancestors
    ///
    /// Only edges tagged with AGGREGATION contribute. Roots have an empty
    /// group.
    pub fn id_group(&self, id: &EntityId) -> String {
        let Some(node) = self.aggregations.get(id) else {
            return String::new();
        };
        if node.node.is_root() {
            return String::new();
        }

        let mut abbreviations = Vec::new();
        let mut current = node;
        let mut seen = vec![id];
        while let Some(parent_id) = current.node.parent.as_ref() {
            let Some(parent) = self.aggregations.get(parent_id) else {
                break;
            };
            if current.connection.is_aggregation() {
                abbreviations.push(self.abbreviation_of(&parent.object));
            }
            if seen.contains(&parent_id) {
                break;
            }
            seen.push(parent_id);
            current = parent;
        }
        abbreviations.reverse();
        format!("{}{}", abbreviations.join(CODE_SEPARATOR), CODE_SUFFIX)
    }

    /// Full code of a node: its group followed by its own abbreviation
    pub fn identity(&self, id: &EntityId) -> String {
        let abbreviation = self
            .aggregations
            .get(id)
            .map(|a| self.abbreviation_of(&a.object))
            .unwrap_or_default();
        format!("{}_{}{}", self.id_group(id), abbreviation, CODE_SUFFIX)
    }

    /// Delete an aggregation node, see [`Catalog::delete`] for the child policy
    pub fn delete_aggregation(&mut self, id: &EntityId, recursive: bool) -> bool {
        self.delete::<Aggregation>(id, recursive)
    }

    fn abbreviation_of(&self, object: &EntityId) -> String {
        self.objects
            .get(object)
            .map(|o| o.abbreviation.clone())
            .unwrap_or_default()
    }
}
