// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Property sets
//!
//! A property set either belongs to one object or is predefined (no object).
//! Child property sets mirror their parent: every attribute added to a parent
//! is cloned into each child as a linked child attribute.

use crate::{
    Attribute, Catalog, EntityId, EntityKind, FilterMatrix, Hierarchy, Identifier, Inheritable,
    Node, Registry, Result,
};
use log::{debug, warn};

/// A named group of attributes
#[derive(Clone, Debug, PartialEq)]
pub struct PropertySet {
    pub(crate) node: Node,
    pub(crate) object: Option<EntityId>,
    pub(crate) attributes: Vec<EntityId>,
}

impl PropertySet {
    /// Owning object, `None` for predefined property sets
    pub fn object(&self) -> Option<&EntityId> {
        self.object.as_ref()
    }

    pub fn is_predefined(&self) -> bool {
        self.object.is_none()
    }

    /// Attribute identifiers in insertion order
    pub fn attribute_ids(&self) -> &[EntityId] {
        &self.attributes
    }
}

impl Hierarchy for PropertySet {
    const KIND: EntityKind = EntityKind::PropertySet;
    const PROPAGATES_NAME: bool = true;

    fn node(&self) -> &Node {
        &self.node
    }

    fn node_mut(&mut self) -> &mut Node {
        &mut self.node
    }

    fn registry(catalog: &Catalog) -> &Registry<Self> {
        &catalog.property_sets
    }

    fn registry_mut(catalog: &mut Catalog) -> &mut Registry<Self> {
        &mut catalog.property_sets
    }

    fn release(catalog: &mut Catalog, id: &EntityId) {
        let attributes = catalog
            .property_sets
            .get(id)
            .map(|p| p.attributes.clone())
            .unwrap_or_default();
        // Attributes go first: their cleanup needs the object link
        for attribute in &attributes {
            catalog.delete::<Attribute>(attribute, false);
        }
        let owner = catalog.property_sets.get_mut(id).and_then(|p| p.object.take());
        if let Some(object) = owner.and_then(|o| catalog.objects.get_mut(&o)) {
            object.property_sets.retain(|p| p != id);
        }
    }

    /// Drop the attributes mirrored from the old parent set
    fn detached(catalog: &mut Catalog, old_parent: &EntityId, child: &EntityId) {
        let mirrors: Vec<EntityId> = catalog
            .property_set_attributes(child)
            .into_iter()
            .filter(|a| {
                a.node
                    .parent
                    .as_ref()
                    .and_then(|p| catalog.attributes.get(p))
                    .is_some_and(|p| p.property_set.as_ref() == Some(old_parent))
            })
            .map(|a| a.id().clone())
            .collect();
        for mirror in &mirrors {
            if let Err(err) = catalog.remove_attribute(child, mirror) {
                warn!("Could not drop mirrored attribute {}: {}", mirror, err);
            }
        }
        debug!(
            "Property set {} left {}; {} mirrored attributes dropped",
            child,
            old_parent,
            mirrors.len()
        );
    }
}

impl Inheritable for PropertySet {}

/// Parameters for creating a property set
#[derive(Clone, Debug)]
pub struct NewPropertySet {
    pub id: Option<EntityId>,
    pub name: String,
    pub description: Option<String>,
    pub optional: bool,
    pub filter: FilterMatrix,
}

impl NewPropertySet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: None,
            optional: false,
            filter: FilterMatrix::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<EntityId>) -> Self {
        self.id = Some(id.into());
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

    fn build(self) -> PropertySet {
        let mut node = Node::new(self.id.unwrap_or_default(), self.name);
        node.set_description(self.description);
        node.optional = self.optional;
        node.filter = self.filter;
        PropertySet {
            node,
            object: None,
            attributes: Vec::new(),
        }
    }
}

impl Catalog {
    /// Create a property set, owned by `object` or predefined if `None`
    pub fn create_property_set(
        &mut self,
        object: Option<&EntityId>,
        new: NewPropertySet,
    ) -> Result<EntityId> {
        if let Some(object) = object {
            self.require::<crate::Object>(object)?;
        }
        let id = self.register(new.build())?;
        if let Some(object) = object {
            self.add_property_set(object, &id)?;
        }
        Ok(id)
    }

    /// Add an attribute to a property set
    ///
    /// The attribute leaves its previous property set. Every child property
    /// set receives a linked clone, recursively down the tree. Adding an
    /// attribute to the set it already belongs to changes nothing.
    pub fn add_attribute(&mut self, property_set: &EntityId, attribute: &EntityId) -> Result<()> {
        let already_member = self
            .require::<PropertySet>(property_set)?
            .attributes
            .contains(attribute);
        let previous = self.require::<Attribute>(attribute)?.property_set.clone();
        if already_member && previous.as_ref() == Some(property_set) {
            return Ok(());
        }

        if let Some(previous) = previous.filter(|p| p != property_set) {
            if let Some(old) = self.property_sets.get_mut(&previous) {
                old.attributes.retain(|a| a != attribute);
            }
        }
        self.require_mut::<Attribute>(attribute)?.property_set = Some(property_set.clone());

        let children = {
            let pset = self.require_mut::<PropertySet>(property_set)?;
            if !pset.attributes.contains(attribute) {
                pset.attributes.push(attribute.clone());
            }
            pset.node.children.iter().cloned().collect::<Vec<_>>()
        };

        for child in children {
            let clone = self.create_child_attribute(attribute, &child)?;
            debug!("Mirrored attribute {} into property set {} as {}", attribute, child, clone);
        }
        Ok(())
    }

    /// Remove an attribute from a property set and delete it
    ///
    /// The clones mirrored into child property sets are removed as well.
    /// Children of the attribute living elsewhere are promoted to roots.
    /// Returns false if it was not part of the set.
    pub fn remove_attribute(&mut self, property_set: &EntityId, attribute: &EntityId) -> Result<bool> {
        let pset = self.require::<PropertySet>(property_set)?;
        if !pset.attributes.contains(attribute) {
            return Ok(false);
        }
        let children: Vec<EntityId> = pset.node.children.iter().cloned().collect();

        for child in children {
            let mirrors: Vec<EntityId> = self
                .property_set_attributes(&child)
                .into_iter()
                .filter(|a| a.node.parent.as_ref() == Some(attribute))
                .map(|a| a.id().clone())
                .collect();
            for mirror in mirrors {
                self.remove_attribute(&child, &mirror)?;
            }
        }
        self.delete::<Attribute>(attribute, false);
        Ok(true)
    }

    /// Create a child property set holding child clones of every attribute
    pub fn create_child_property_set(
        &mut self,
        property_set: &EntityId,
        name: impl Into<String>,
    ) -> Result<EntityId> {
        let attributes = self.require::<PropertySet>(property_set)?.attributes.clone();
        let child = self.create_property_set(None, NewPropertySet::new(name))?;
        self.link::<PropertySet>(property_set, &child);
        for attribute in &attributes {
            self.create_child_attribute(attribute, &child)?;
        }
        Ok(child)
    }

    /// Attributes of a property set in insertion order
    pub fn property_set_attributes(&self, property_set: &EntityId) -> Vec<&Attribute> {
        self.property_sets
            .get(property_set)
            .map(|p| {
                p.attributes
                    .iter()
                    .filter_map(|a| self.attributes.get(a))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Find an attribute of a property set by name, ignoring case
    pub fn attribute_by_name(&self, property_set: &EntityId, name: &str) -> Option<&Attribute> {
        self.property_set_attributes(property_set)
            .into_iter()
            .find(|a| a.name().eq_ignore_ascii_case(name))
    }

    /// Delete a property set and its attributes
    ///
    /// Refused (returns false) when the set holds the identifying attribute
    /// of its object, unless `force` is set.
    pub fn delete_property_set(&mut self, id: &EntityId, recursive: bool, force: bool) -> Result<bool> {
        let pset = self.require::<PropertySet>(id)?;
        let holds_ident = pset
            .object
            .as_ref()
            .and_then(|o| self.objects.get(o))
            .is_some_and(|o| match &o.ident {
                Identifier::Attribute(ident) => pset.attributes.contains(ident),
                Identifier::Concept(_) => false,
            });
        if holds_ident && !force {
            warn!(
                "Property set '{}' ({}) holds the identifying attribute of its object; not deleted",
                pset.name(),
                id
            );
            return Ok(false);
        }
        Ok(self.delete::<PropertySet>(id, recursive))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NewAttribute, NewObject, Object, Value, ValueType};

    fn width() -> NewAttribute {
        NewAttribute::new("Width", ValueType::Value).with_value(vec![Value::Real(0.9)])
    }

    #[test]
    fn test_add_attribute_mirrors_into_children() {
        let mut catalog = Catalog::new();
        let parent = catalog
            .create_property_set(None, NewPropertySet::new("Dims"))
            .unwrap();
        let child = catalog.create_child_property_set(&parent, "Dims").unwrap();
        let grandchild = catalog.create_child_property_set(&child, "Dims").unwrap();

        let attribute = catalog.create_attribute(&parent, width()).unwrap();

        let mirrored = catalog.attribute_by_name(&child, "width").unwrap();
        assert_eq!(mirrored.node().parent(), Some(&attribute));
        assert_eq!(mirrored.property_set(), Some(&child));
        let mirrored = mirrored.id().clone();

        let deep = catalog.attribute_by_name(&grandchild, "WIDTH").unwrap();
        assert_eq!(deep.node().parent(), Some(&mirrored));
        assert_eq!(catalog.attributes().len(), 3);
    }

    #[test]
    fn test_child_property_set_clones_attributes() {
        let mut catalog = Catalog::new();
        let parent = catalog
            .create_property_set(None, NewPropertySet::new("Dims"))
            .unwrap();
        let a = catalog.create_attribute(&parent, width()).unwrap();
        let b = catalog
            .create_attribute(&parent, NewAttribute::new("Height", ValueType::Value))
            .unwrap();

        let child = catalog.create_child_property_set(&parent, "DoorDims").unwrap();
        let attrs = catalog.property_set_attributes(&child);
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[0].node().parent(), Some(&a));
        assert_eq!(attrs[1].node().parent(), Some(&b));
        assert!(attrs.iter().all(|x| x.id() != &a && x.id() != &b));
        assert_eq!(
            catalog.get::<PropertySet>(&child).unwrap().node().parent(),
            Some(&parent)
        );
    }

    #[test]
    fn test_remove_attribute_deletes_mirrors() {
        let mut catalog = Catalog::new();
        let parent = catalog
            .create_property_set(None, NewPropertySet::new("Dims"))
            .unwrap();
        let child = catalog.create_child_property_set(&parent, "Dims").unwrap();
        let attribute = catalog.create_attribute(&parent, width()).unwrap();
        assert_eq!(catalog.attributes().len(), 2);

        assert!(catalog.remove_attribute(&parent, &attribute).unwrap());
        assert!(catalog.property_set_attributes(&child).is_empty());
        assert!(catalog.property_set_attributes(&parent).is_empty());
        // No attribute is left without a property set
        assert!(catalog.attributes().is_empty());
        assert!(!catalog.remove_attribute(&parent, &attribute).unwrap());
    }

    #[test]
    fn test_re_adding_attribute_does_not_duplicate_mirrors() {
        let mut catalog = Catalog::new();
        let parent = catalog
            .create_property_set(None, NewPropertySet::new("Dims"))
            .unwrap();
        let child = catalog.create_child_property_set(&parent, "Dims").unwrap();
        let attribute = catalog.create_attribute(&parent, width()).unwrap();

        catalog.add_attribute(&parent, &attribute).unwrap();
        assert_eq!(catalog.property_set_attributes(&parent).len(), 1);
        assert_eq!(catalog.property_set_attributes(&child).len(), 1);
        assert_eq!(catalog.attributes().len(), 2);
    }

    #[test]
    fn test_detached_child_set_drops_mirrors() {
        let mut catalog = Catalog::new();
        let parent = catalog
            .create_property_set(None, NewPropertySet::new("Dims"))
            .unwrap();
        let inherited = catalog.create_attribute(&parent, width()).unwrap();
        let child = catalog.create_child_property_set(&parent, "Dims").unwrap();
        let own = catalog
            .create_attribute(&child, NewAttribute::new("Colour", ValueType::Value))
            .unwrap();

        assert!(catalog.remove_child::<PropertySet>(&parent, &child));
        let names: Vec<&str> = catalog
            .property_set_attributes(&child)
            .iter()
            .map(|a| a.name())
            .collect();
        assert_eq!(names, vec!["Colour"]);
        assert!(!catalog.get::<Attribute>(&inherited).unwrap().node().is_parent());
        assert!(catalog.get::<Attribute>(&own).is_some());
        assert_eq!(catalog.attributes().len(), 2);
    }

    #[test]
    fn test_moving_child_set_drops_old_mirrors() {
        let mut catalog = Catalog::new();
        let first = catalog
            .create_property_set(None, NewPropertySet::new("Dims"))
            .unwrap();
        catalog.create_attribute(&first, width()).unwrap();
        let second = catalog
            .create_property_set(None, NewPropertySet::new("Dims"))
            .unwrap();
        let child = catalog.create_child_property_set(&first, "Dims").unwrap();
        assert_eq!(catalog.property_set_attributes(&child).len(), 1);

        catalog.add_child::<PropertySet>(&second, &child).unwrap();
        assert!(catalog.property_set_attributes(&child).is_empty());
        assert_eq!(
            catalog.get::<PropertySet>(&child).unwrap().node().parent(),
            Some(&second)
        );
    }

    #[test]
    fn test_adding_attribute_moves_it() {
        let mut catalog = Catalog::new();
        let first = catalog
            .create_property_set(None, NewPropertySet::new("A"))
            .unwrap();
        let second = catalog
            .create_property_set(None, NewPropertySet::new("B"))
            .unwrap();
        let attribute = catalog.create_attribute(&first, width()).unwrap();
        catalog.add_attribute(&second, &attribute).unwrap();

        assert!(catalog.property_set_attributes(&first).is_empty());
        assert_eq!(catalog.property_set_attributes(&second).len(), 1);
    }

    #[test]
    fn test_delete_refused_for_identifier_set() {
        let mut catalog = Catalog::new();
        let door = catalog.create_object(NewObject::new("Door")).unwrap();
        let pset = catalog
            .create_property_set(Some(&door), NewPropertySet::new("Ident"))
            .unwrap();
        let code = catalog.create_attribute(&pset, width()).unwrap();
        catalog.set_ident_attribute(&door, &code).unwrap();

        assert!(!catalog.delete_property_set(&pset, false, false).unwrap());
        assert!(catalog.get::<PropertySet>(&pset).is_some());

        assert!(catalog.delete_property_set(&pset, false, true).unwrap());
        assert!(catalog.get::<PropertySet>(&pset).is_none());
        assert!(catalog.get::<Attribute>(&code).is_none());
        let door = catalog.get::<Object>(&door).unwrap();
        assert!(door.is_concept());
        assert!(door.property_set_ids().is_empty());
    }

    #[test]
    fn test_predefined_flag() {
        let mut catalog = Catalog::new();
        let door = catalog.create_object(NewObject::new("Door")).unwrap();
        let owned = catalog
            .create_property_set(Some(&door), NewPropertySet::new("Dims"))
            .unwrap();
        let predefined = catalog
            .create_property_set(None, NewPropertySet::new("Common"))
            .unwrap();
        assert!(!catalog.get::<PropertySet>(&owned).unwrap().is_predefined());
        assert!(catalog.get::<PropertySet>(&predefined).unwrap().is_predefined());
    }
}
