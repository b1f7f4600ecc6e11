// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Objects: the classes of the catalog

use crate::{
    Aggregation, Attribute, Catalog, EntityId, EntityKind, FilterMatrix, Hierarchy, Inheritable,
    Node, PropertySet, Registry, Result,
};
use log::warn;
use std::collections::BTreeSet;

/// IFC entity used when an object has no explicit mapping
pub const DEFAULT_IFC_MAPPING: &str = "IfcBuildingElementProxy";

/// How an object is identified
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Identifier {
    /// Identified by the value of one of its attributes
    Attribute(EntityId),
    /// Abstract concept without an identifying attribute, optionally with a
    /// free-text marker
    Concept(Option<String>),
}

impl Default for Identifier {
    fn default() -> Self {
        Identifier::Concept(None)
    }
}

/// A class of the catalog
#[derive(Clone, Debug, PartialEq)]
pub struct Object {
    pub(crate) node: Node,
    pub(crate) property_sets: Vec<EntityId>,
    pub(crate) ident: Identifier,
    pub(crate) abbreviation: String,
    pub(crate) ifc_mapping: BTreeSet<String>,
    pub(crate) aggregations: BTreeSet<EntityId>,
}

impl Object {
    /// Owned property set identifiers in insertion order
    pub fn property_set_ids(&self) -> &[EntityId] {
        &self.property_sets
    }

    pub fn ident(&self) -> &Identifier {
        &self.ident
    }

    /// Identifying attribute, `None` for concepts
    pub fn ident_attribute(&self) -> Option<&EntityId> {
        match &self.ident {
            Identifier::Attribute(id) => Some(id),
            Identifier::Concept(_) => None,
        }
    }

    pub fn is_concept(&self) -> bool {
        matches!(self.ident, Identifier::Concept(_))
    }

    pub fn abbreviation(&self) -> &str {
        &self.abbreviation
    }

    pub fn set_abbreviation(&mut self, abbreviation: impl Into<String>) {
        self.abbreviation = abbreviation.into();
    }

    pub fn ifc_mapping(&self) -> &BTreeSet<String> {
        &self.ifc_mapping
    }

    /// Replace the IFC mappings, dropping empty entries
    pub fn set_ifc_mapping<I, S>(&mut self, mappings: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ifc_mapping = mappings
            .into_iter()
            .map(Into::into)
            .filter(|m| !m.is_empty())
            .collect();
    }

    pub fn add_ifc_mapping(&mut self, mapping: impl Into<String>) {
        let mapping = mapping.into();
        if !mapping.is_empty() {
            self.ifc_mapping.insert(mapping);
        }
    }

    pub fn remove_ifc_mapping(&mut self, mapping: &str) -> bool {
        self.ifc_mapping.remove(mapping)
    }

    /// Aggregation nodes wrapping this object
    pub fn aggregation_ids(&self) -> impl Iterator<Item = &EntityId> {
        self.aggregations.iter()
    }
}

impl Hierarchy for Object {
    const KIND: EntityKind = EntityKind::Object;
    const PROPAGATES_NAME: bool = false;

    fn node(&self) -> &Node {
        &self.node
    }

    fn node_mut(&mut self) -> &mut Node {
        &mut self.node
    }

    fn registry(catalog: &Catalog) -> &Registry<Self> {
        &catalog.objects
    }

    fn registry_mut(catalog: &mut Catalog) -> &mut Registry<Self> {
        &mut catalog.objects
    }

    fn release(catalog: &mut Catalog, id: &EntityId) {
        let Some(object) = catalog.objects.get(id) else {
            return;
        };
        let property_sets = object.property_sets.clone();
        let aggregations: Vec<EntityId> = object.aggregations.iter().cloned().collect();
        for pset in &property_sets {
            catalog.delete::<PropertySet>(pset, false);
        }
        for aggregation in &aggregations {
            catalog.delete::<Aggregation>(aggregation, false);
        }
    }

    fn renamed(catalog: &mut Catalog, id: &EntityId) {
        let Some(object) = catalog.objects.get(id) else {
            return;
        };
        let name = object.node.name.clone();
        let aggregations: Vec<EntityId> = object.aggregations.iter().cloned().collect();
        for aggregation in aggregations {
            if let Some(node) = catalog.aggregations.get_mut(&aggregation) {
                node.node.name = name.clone();
            }
        }
    }
}

impl Inheritable for Object {}

/// Parameters for creating an object
#[derive(Clone, Debug)]
pub struct NewObject {
    pub id: Option<EntityId>,
    pub name: String,
    pub abbreviation: String,
    pub ifc_mapping: Option<BTreeSet<String>>,
    pub ident: Identifier,
    pub description: Option<String>,
    pub optional: bool,
    pub filter: FilterMatrix,
}

impl NewObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            abbreviation: String::new(),
            ifc_mapping: None,
            ident: Identifier::default(),
            description: None,
            optional: false,
            filter: FilterMatrix::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<EntityId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_abbreviation(mut self, abbreviation: impl Into<String>) -> Self {
        self.abbreviation = abbreviation.into();
        self
    }

    pub fn with_ifc_mapping<I, S>(mut self, mappings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ifc_mapping = Some(mappings.into_iter().map(Into::into).collect());
        self
    }

    /// Mark the object as a concept with a free-text marker
    pub fn with_concept(mut self, marker: impl Into<String>) -> Self {
        self.ident = Identifier::Concept(Some(marker.into()));
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

    fn build(self) -> Object {
        let mut node = Node::new(self.id.unwrap_or_default(), self.name);
        node.set_description(self.description);
        node.optional = self.optional;
        node.filter = self.filter;
        let mut object = Object {
            node,
            property_sets: Vec::new(),
            ident: self.ident,
            abbreviation: self.abbreviation,
            ifc_mapping: BTreeSet::new(),
            aggregations: BTreeSet::new(),
        };
        match self.ifc_mapping {
            Some(mappings) => object.set_ifc_mapping(mappings),
            None => object.add_ifc_mapping(DEFAULT_IFC_MAPPING),
        }
        object
    }
}

impl Catalog {
    /// Create and register an object
    pub fn create_object(&mut self, new: NewObject) -> Result<EntityId> {
        self.register(new.build())
    }

    /// Identify an object by one of its attributes
    pub fn set_ident_attribute(&mut self, object: &EntityId, attribute: &EntityId) -> Result<()> {
        self.require::<Attribute>(attribute)?;
        self.set_ident(object, Identifier::Attribute(attribute.clone()))
    }

    pub fn set_ident(&mut self, object: &EntityId, ident: Identifier) -> Result<()> {
        self.require_mut::<Object>(object)?.ident = ident;
        Ok(())
    }

    /// Attach a property set to an object, taking it from its previous owner
    pub fn add_property_set(&mut self, object: &EntityId, property_set: &EntityId) -> Result<()> {
        self.require::<Object>(object)?;
        let previous = self.require::<PropertySet>(property_set)?.object.clone();
        if previous.as_ref() == Some(object) {
            return Ok(());
        }
        if let Some(previous) = previous {
            self.remove_property_set(&previous, property_set)?;
        }
        self.require_mut::<PropertySet>(property_set)?.object = Some(object.clone());
        self.require_mut::<Object>(object)?
            .property_sets
            .push(property_set.clone());
        Ok(())
    }

    /// Detach a property set from an object; it becomes predefined
    ///
    /// If the set held the object's identifying attribute, the object turns
    /// into a concept.
    pub fn remove_property_set(&mut self, object: &EntityId, property_set: &EntityId) -> Result<bool> {
        let owned = self.require::<Object>(object)?.property_sets.contains(property_set);
        if !owned {
            return Ok(false);
        }
        let attributes = self.require::<PropertySet>(property_set)?.attributes.clone();
        for attribute in &attributes {
            self.release_identifier(attribute);
        }
        self.require_mut::<Object>(object)?
            .property_sets
            .retain(|p| p != property_set);
        self.require_mut::<PropertySet>(property_set)?.object = None;
        Ok(true)
    }

    /// Owned property sets in insertion order
    pub fn object_property_sets(&self, object: &EntityId) -> Vec<&PropertySet> {
        self.objects
            .get(object)
            .map(|o| {
                o.property_sets
                    .iter()
                    .filter_map(|p| self.property_sets.get(p))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Owned property set with the exact given name
    pub fn property_set_by_name(&self, object: &EntityId, name: &str) -> Option<&PropertySet> {
        self.object_property_sets(object)
            .into_iter()
            .find(|p| p.name() == name)
    }

    /// Property sets owned by each ancestor object, nearest ancestor first
    ///
    /// Ancestors without property sets are left out.
    pub fn inherited_property_sets(&self, object: &EntityId) -> Vec<(EntityId, Vec<EntityId>)> {
        self.ancestors::<Object>(object)
            .into_iter()
            .filter_map(|ancestor| {
                let psets = self.objects.get(&ancestor)?.property_sets.clone();
                (!psets.is_empty()).then_some((ancestor, psets))
            })
            .collect()
    }

    /// Attributes of all owned property sets, optionally including ancestors'
    pub fn object_attributes(&self, object: &EntityId, inherit: bool) -> Vec<&Attribute> {
        let mut owners = vec![object.clone()];
        if inherit {
            owners.extend(self.ancestors::<Object>(object));
        }
        owners
            .iter()
            .flat_map(|o| self.object_property_sets(o))
            .flat_map(|p| p.attributes.iter())
            .filter_map(|a| self.attributes.get(a))
            .collect()
    }

    /// Identifier string of an object: its identifying values joined by `;`
    ///
    /// Empty for concepts and unknown objects.
    pub fn ident_value(&self, object: &EntityId) -> String {
        let Some(Identifier::Attribute(attribute)) = self.objects.get(object).map(|o| &o.ident)
        else {
            return String::new();
        };
        match self.attributes.get(attribute) {
            Some(attribute) => attribute
                .value
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(";"),
            None => {
                warn!("Identifying attribute {} of object {} is missing", attribute, object);
                String::new()
            }
        }
    }

    /// Delete an object with its property sets and aggregation nodes
    pub fn delete_object(&mut self, id: &EntityId, recursive: bool) -> bool {
        self.delete::<Object>(id, recursive)
    }
}
