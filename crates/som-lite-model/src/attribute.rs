// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Attributes and their value inheritance
//!
//! An attribute inherits from its parent attribute along its own chain. The
//! inheritance rules are:
//! - `value_type` and `data_type` are owned by the root of the chain and
//!   always cascade to every descendant.
//! - If a parent has `child_inherits_values` set, its children cannot hold
//!   their own value; writes are refused and the parent's value is pushed
//!   down instead.

use crate::{
    Catalog, DataType, EntityId, EntityKind, FilterMatrix, Hierarchy, Identifier, Inheritable,
    Node, Registry, Result, Value, ValueType,
};
use log::{debug, warn};

/// A typed, possibly multi-valued property definition
#[derive(Clone, Debug, PartialEq)]
pub struct Attribute {
    pub(crate) node: Node,
    pub(crate) property_set: Option<EntityId>,
    pub(crate) value: Vec<Value>,
    pub(crate) value_type: ValueType,
    pub(crate) data_type: DataType,
    pub(crate) child_inherits_values: bool,
    pub(crate) revit_mapping: String,
}

impl Attribute {
    /// The property set this attribute belongs to
    pub fn property_set(&self) -> Option<&EntityId> {
        self.property_set.as_ref()
    }

    pub fn value(&self) -> &[Value] {
        &self.value
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn child_inherits_values(&self) -> bool {
        self.child_inherits_values
    }

    /// Alias used by the Revit shared-parameter mapping
    pub fn revit_name(&self) -> &str {
        &self.revit_mapping
    }

    pub fn set_revit_mapping(&mut self, name: impl Into<String>) {
        self.revit_mapping = name.into();
    }
}

impl Hierarchy for Attribute {
    const KIND: EntityKind = EntityKind::Attribute;
    const PROPAGATES_NAME: bool = true;

    fn node(&self) -> &Node {
        &self.node
    }

    fn node_mut(&mut self) -> &mut Node {
        &mut self.node
    }

    fn registry(catalog: &Catalog) -> &Registry<Self> {
        &catalog.attributes
    }

    fn registry_mut(catalog: &mut Catalog) -> &mut Registry<Self> {
        &mut catalog.attributes
    }

    fn release(catalog: &mut Catalog, id: &EntityId) {
        let Some(pset_id) = catalog
            .attributes
            .get(id)
            .and_then(|a| a.property_set.clone())
        else {
            return;
        };
        catalog.release_identifier(id);
        if let Some(pset) = catalog.property_sets.get_mut(&pset_id) {
            pset.attributes.retain(|a| a != id);
        }
    }

    fn adopted(catalog: &mut Catalog, parent: &EntityId, _child: &EntityId) {
        if catalog
            .attributes
            .get(parent)
            .is_some_and(|p| p.child_inherits_values)
        {
            catalog.push_inherited_value(parent);
        }
    }
}

impl Inheritable for Attribute {}

/// Parameters for creating an attribute
#[derive(Clone, Debug)]
pub struct NewAttribute {
    pub id: Option<EntityId>,
    pub name: String,
    pub value: Vec<Value>,
    pub value_type: ValueType,
    pub data_type: DataType,
    pub child_inherits_values: bool,
    pub description: Option<String>,
    pub optional: bool,
    pub revit_mapping: Option<String>,
    pub filter: FilterMatrix,
}

impl NewAttribute {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            id: None,
            name: name.into(),
            value: Vec::new(),
            value_type,
            data_type: DataType::default(),
            child_inherits_values: false,
            description: None,
            optional: false,
            revit_mapping: None,
            filter: FilterMatrix::new(),
        }
    }

    /// Use a caller-supplied identifier
    pub fn with_id(mut self, id: impl Into<EntityId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_value(mut self, value: Vec<Value>) -> Self {
        self.value = value;
        self
    }

    pub fn with_data_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    pub fn with_child_inherits_values(mut self, inherits: bool) -> Self {
        self.child_inherits_values = inherits;
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

    pub fn with_revit_mapping(mut self, name: impl Into<String>) -> Self {
        self.revit_mapping = Some(name.into());
        self
    }

    pub fn with_filter(mut self, filter: FilterMatrix) -> Self {
        self.filter = filter;
        self
    }

    fn build(self) -> Attribute {
        let mut node = Node::new(self.id.unwrap_or_default(), &self.name);
        node.set_description(self.description);
        node.optional = self.optional;
        node.filter = self.filter;
        Attribute {
            node,
            property_set: None,
            value: split_values(self.value),
            value_type: self.value_type,
            data_type: self.data_type,
            child_inherits_values: self.child_inherits_values,
            revit_mapping: self.revit_mapping.unwrap_or(self.name),
        }
    }
}

/// Split text values on `|` into separate entries
pub fn split_values(values: Vec<Value>) -> Vec<Value> {
    let mut result = Vec::with_capacity(values.len());
    for value in values {
        match value {
            Value::Text(text) if text.contains('|') => {
                result.extend(text.split('|').map(|part| Value::Text(part.to_string())));
            }
            other => result.push(other),
        }
    }
    result
}

impl Catalog {
    /// Create an attribute in a property set
    ///
    /// The attribute is added through [`Catalog::add_attribute`], so it is
    /// mirrored into child property sets.
    pub fn create_attribute(
        &mut self,
        property_set: &EntityId,
        new: NewAttribute,
    ) -> Result<EntityId> {
        self.require::<crate::PropertySet>(property_set)?;
        let id = self.register(new.build())?;
        self.add_attribute(property_set, &id)?;
        Ok(id)
    }

    /// Assign a new value list
    ///
    /// Refused (returns false) when the attribute's parent has
    /// `child_inherits_values` set. Text values containing `|` are split into
    /// separate entries. If this attribute passes its values on, inheriting
    /// descendants receive the new list as well.
    pub fn set_attribute_value(&mut self, id: &EntityId, value: Vec<Value>) -> Result<bool> {
        let attribute = self.require::<Attribute>(id)?;
        let locked = attribute
            .node
            .parent
            .as_ref()
            .and_then(|p| self.attributes.get(p))
            .is_some_and(|p| p.child_inherits_values);
        if locked {
            warn!(
                "Attribute '{}' ({}) inherits its value from its parent; write ignored",
                attribute.name(),
                id
            );
            return Ok(false);
        }

        let value = split_values(value);
        let inherits = {
            let attribute = self.require_mut::<Attribute>(id)?;
            attribute.value = value;
            attribute.child_inherits_values
        };
        if inherits {
            self.push_inherited_value(id);
        }
        Ok(true)
    }

    /// Enable or disable strict value inheritance for children
    pub fn set_child_inherits_values(&mut self, id: &EntityId, inherits: bool) -> Result<()> {
        self.require_mut::<Attribute>(id)?.child_inherits_values = inherits;
        if inherits {
            self.push_inherited_value(id);
        }
        Ok(())
    }

    /// Set the value type on a root attribute and all its descendants
    ///
    /// Returns false for child attributes, whose type is owned by the root.
    pub fn set_value_type(&mut self, id: &EntityId, value_type: ValueType) -> Result<bool> {
        if self.require::<Attribute>(id)?.node.is_child() {
            warn!("Value type of child attribute {} follows its parent", id);
            return Ok(false);
        }
        let mut targets = vec![id.clone()];
        targets.extend(self.descendants::<Attribute>(id));
        for target in &targets {
            if let Some(attribute) = self.attributes.get_mut(target) {
                attribute.value_type = value_type;
            }
        }
        Ok(true)
    }

    /// Set the data type on a root attribute and all its descendants
    ///
    /// Returns false for child attributes, whose type is owned by the root.
    pub fn set_data_type(&mut self, id: &EntityId, data_type: DataType) -> Result<bool> {
        if self.require::<Attribute>(id)?.node.is_child() {
            warn!("Data type of child attribute {} follows its parent", id);
            return Ok(false);
        }
        let mut targets = vec![id.clone()];
        targets.extend(self.descendants::<Attribute>(id));
        for target in &targets {
            if let Some(attribute) = self.attributes.get_mut(target) {
                attribute.data_type = data_type;
            }
        }
        Ok(true)
    }

    /// Clone an attribute into `property_set` and link the clone as its child
    ///
    /// The clone gets a fresh identifier; everything else is copied.
    pub fn create_child_attribute(
        &mut self,
        id: &EntityId,
        property_set: &EntityId,
    ) -> Result<EntityId> {
        self.require::<crate::PropertySet>(property_set)?;
        let clone = self.clone_attribute(id)?;
        self.link::<Attribute>(id, &clone);
        self.add_attribute(property_set, &clone)?;
        debug!("Created child attribute {} of {}", clone, id);
        Ok(clone)
    }

    /// Register an unlinked copy of an attribute under a fresh identifier
    pub(crate) fn clone_attribute(&mut self, id: &EntityId) -> Result<EntityId> {
        let source = self.require::<Attribute>(id)?;
        let mut node = Node::new(EntityId::new(), source.node.name.clone());
        node.description = source.node.description.clone();
        node.optional = source.node.optional;
        node.filter = source.node.filter.clone();
        let clone = Attribute {
            node,
            property_set: None,
            value: source.value.clone(),
            value_type: source.value_type,
            data_type: source.data_type,
            child_inherits_values: source.child_inherits_values,
            revit_mapping: source.revit_mapping.clone(),
        };
        self.register(clone)
    }

    /// Delete an attribute, see [`Catalog::delete`] for the child policy
    pub fn delete_attribute(&mut self, id: &EntityId, recursive: bool) -> bool {
        self.delete::<Attribute>(id, recursive)
    }

    /// Same name, same values and owning property sets of the same name
    pub fn attributes_equal(&self, a: &EntityId, b: &EntityId) -> bool {
        let (Some(a), Some(b)) = (self.attributes.get(a), self.attributes.get(b)) else {
            return false;
        };
        let pset_name = |attribute: &Attribute| {
            attribute
                .property_set
                .as_ref()
                .and_then(|p| self.property_sets.get(p))
                .map(|p| p.name().to_string())
        };
        a.name() == b.name() && a.value == b.value && pset_name(a) == pset_name(b)
    }

    /// Copy an attribute's value into every descendant that inherits it
    fn push_inherited_value(&mut self, id: &EntityId) {
        let Some(source) = self.attributes.get(id) else {
            return;
        };
        let value = source.value.clone();
        let children: Vec<EntityId> = source.node.children.iter().cloned().collect();
        for child in children {
            let passes_on = match self.attributes.get_mut(&child) {
                Some(attribute) => {
                    attribute.value = value.clone();
                    attribute.child_inherits_values
                }
                None => false,
            };
            if passes_on {
                self.push_inherited_value(&child);
            }
        }
    }

    /// Turn the owning object into a concept if `attribute` identifies it
    pub(crate) fn release_identifier(&mut self, attribute: &EntityId) {
        let owner = self
            .attributes
            .get(attribute)
            .and_then(|a| a.property_set.as_ref())
            .and_then(|p| self.property_sets.get(p))
            .and_then(|p| p.object.clone());
        let Some(object) = owner.and_then(|o| self.objects.get_mut(&o)) else {
            return;
        };
        if object.ident == Identifier::Attribute(attribute.clone()) {
            warn!(
                "Identifying attribute of object '{}' removed; object is now a concept",
                object.node.name
            );
            object.ident = Identifier::Concept(None);
        }
    }
}
