// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Document to project conversion
//!
//! Entities are created bottom-up (attributes with their property set,
//! property sets with their object, then aggregations). Parent references are
//! collected on the side and resolved in a link pass once everything is
//! registered, so records may appear in any order.
//!
//! References that still do not resolve go through an optional repair pass:
//! the entity is attached to a parentless entity of the same kind and name
//! (and the same value, for attributes). Repairs are logged.

use crate::document::{
    AggregationRecord, AttributeRecord, BaseRecord, Document, FilterSelector, ObjectRecord,
    ProjectRecord, PropertySetRecord,
};
use crate::{ImportOptions, Result};
use log::{debug, info, warn};
use som_lite_model::{
    Aggregation, Attribute, Catalog, ConnectionType, DataType, EntityId, EntityKind, FilterLabel,
    FilterMatrix, Hierarchy, Identifier, Inheritable, NewAggregation, NewAttribute, NewObject,
    NewPropertySet, Object, Project, PropertySet, DEFAULT_FILTER_NAME,
};

/// Build a project from a document
///
/// On error the partially built project is dropped.
pub fn from_document(document: Document, options: &ImportOptions) -> Result<Project> {
    let mut project = Project::new("");
    let record = document.project.unwrap_or_default();
    apply_project_record(&mut project, &record)?;

    let mut loader = Loader {
        catalog: project.catalog_mut(),
        parents: Vec::new(),
        aggregation_parents: Vec::new(),
    };
    for (id, record) in document.predefined_property_sets.unwrap_or_default() {
        loader.property_set(id, record, None)?;
    }
    for (id, record) in document.objects.unwrap_or_default() {
        loader.object(id, record)?;
    }
    for (id, record) in document.aggregations.unwrap_or_default() {
        loader.aggregation(id, record)?;
    }

    let unresolved = loader.link();
    loader.link_aggregations();
    if !unresolved.is_empty() {
        if options.repair_parents {
            repair_parents(loader.catalog, &unresolved);
        } else {
            for (kind, id, parent) in &unresolved {
                warn!("{} {} references missing parent {}", kind, id, parent);
            }
        }
    }

    project.reconcile_filters();
    *project.extensions_mut() = document.extensions;

    let catalog = project.catalog();
    info!(
        "Imported project '{}': {} objects, {} property sets, {} attributes, {} aggregations",
        project.name,
        catalog.objects().len(),
        catalog.property_sets().len(),
        catalog.attributes().len(),
        catalog.aggregations().len()
    );
    Ok(project)
}

fn apply_project_record(project: &mut Project, record: &ProjectRecord) -> Result<()> {
    project.name = record.name.clone();
    project.author = record.author.clone();
    project.description = record.description.clone();
    if let Some(version) = &record.version {
        project.version = version.clone();
    }
    if let Some(pset) = &record.aggregation_pset {
        project.aggregation_pset = pset.clone();
    }
    if let Some(attribute) = &record.aggregation_attribute {
        project.aggregation_attribute = attribute.clone();
    }

    let vocabulary = |labels: &[FilterLabel]| {
        if labels.is_empty() {
            vec![FilterLabel::new(DEFAULT_FILTER_NAME)]
        } else {
            labels.to_vec()
        }
    };
    project.set_vocabulary(vocabulary(&record.phases), vocabulary(&record.use_cases))?;

    let phase = match &record.current_project_phase {
        Some(FilterSelector::Index(index)) => project.set_current_phase_index(*index),
        Some(FilterSelector::Name(name)) => project.set_current_phase(name),
        None => project.set_current_phase_index(0),
    };
    if let Err(err) = phase {
        warn!("{}; using the first phase", err);
        project.set_current_phase_index(0)?;
    }
    let use_case = match &record.current_use_case {
        Some(FilterSelector::Index(index)) => project.set_current_use_case_index(*index),
        Some(FilterSelector::Name(name)) => project.set_current_use_case(name),
        None => project.set_current_use_case_index(0),
    };
    if let Err(err) = use_case {
        warn!("{}; using the first use case", err);
        project.set_current_use_case_index(0)?;
    }
    Ok(())
}

/// Parent reference waiting for the link pass: (kind, entity, parent)
type PendingParent = (EntityKind, EntityId, EntityId);

struct Loader<'a> {
    catalog: &'a mut Catalog,
    parents: Vec<PendingParent>,
    aggregation_parents: Vec<(EntityId, EntityId, ConnectionType)>,
}

impl Loader<'_> {
    fn remember_parent(&mut self, kind: EntityKind, id: &EntityId, base: &BaseRecord) {
        if let Some(parent) = &base.parent {
            self.parents
                .push((kind, id.clone(), EntityId::from(parent.as_str())));
        }
    }

    fn property_set(
        &mut self,
        id: String,
        record: PropertySetRecord,
        object: Option<&EntityId>,
    ) -> Result<()> {
        let PropertySetRecord { base, attributes } = record;
        let mut new = NewPropertySet::new(base.name.clone())
            .with_id(id)
            .with_optional(base.optional)
            .with_filter(FilterMatrix::from_rows(base.filter_matrix.clone()));
        new.description = Some(base.description.clone());
        let pset = self.catalog.create_property_set(object, new)?;
        self.remember_parent(EntityKind::PropertySet, &pset, &base);

        for (id, record) in attributes {
            self.attribute(id, record, &pset)?;
        }
        Ok(())
    }

    fn attribute(&mut self, id: String, record: AttributeRecord, pset: &EntityId) -> Result<()> {
        let AttributeRecord {
            base,
            data_type,
            value_type,
            child_inherits_values,
            revit_mapping,
            value,
        } = record;
        let data_type = match data_type.as_deref() {
            None => DataType::default(),
            Some(name) => DataType::parse(name).unwrap_or_else(|| {
                warn!("Unknown data type '{}' on attribute {}; using text", name, id);
                DataType::default()
            }),
        };
        let mut new = NewAttribute::new(base.name.clone(), value_type)
            .with_id(id)
            .with_value(value)
            .with_data_type(data_type)
            .with_child_inherits_values(child_inherits_values)
            .with_optional(base.optional)
            .with_filter(FilterMatrix::from_rows(base.filter_matrix.clone()));
        new.description = Some(base.description.clone());
        new.revit_mapping = revit_mapping;
        // The set has no children yet, so nothing is mirrored
        let attribute = self.catalog.create_attribute(pset, new)?;
        self.remember_parent(EntityKind::Attribute, &attribute, &base);
        Ok(())
    }

    fn object(&mut self, id: String, record: ObjectRecord) -> Result<()> {
        let ObjectRecord {
            base,
            ident_attribute,
            ifc_mappings,
            abbreviation,
            property_sets,
        } = record;
        let mut new = NewObject::new(base.name.clone())
            .with_id(id)
            .with_abbreviation(abbreviation.unwrap_or_default())
            .with_optional(base.optional)
            .with_filter(FilterMatrix::from_rows(base.filter_matrix.clone()));
        new.description = Some(base.description.clone());
        if let Some(mappings) = ifc_mappings {
            new = new.with_ifc_mapping(mappings);
        }
        let object = self.catalog.create_object(new)?;
        self.remember_parent(EntityKind::Object, &object, &base);

        for (id, record) in property_sets {
            self.property_set(id, record, Some(&object))?;
        }

        // Strings that name no attribute are concept markers
        if let Some(ident) = ident_attribute.filter(|i| !i.is_empty() && i != "None") {
            let attribute = EntityId::from(ident.as_str());
            if self.catalog.get::<Attribute>(&attribute).is_some() {
                self.catalog.set_ident_attribute(&object, &attribute)?;
            } else {
                debug!("Object '{}' is a concept marked '{}'", base.name, ident);
                self.catalog
                    .set_ident(&object, Identifier::Concept(Some(ident)))?;
            }
        }
        Ok(())
    }

    fn aggregation(&mut self, id: String, record: AggregationRecord) -> Result<()> {
        let AggregationRecord {
            base,
            object,
            connection,
        } = record;
        let object = EntityId::from(object);
        if self.catalog.get::<Object>(&object).is_none() {
            warn!("Aggregation {} references missing object {}; skipped", id, object);
            return Ok(());
        }
        let connection = connection.unwrap_or_default();
        let mut new = NewAggregation::new()
            .with_id(id)
            .with_connection(connection)
            .with_optional(base.optional)
            .with_filter(FilterMatrix::from_rows(base.filter_matrix));
        new.description = Some(base.description);
        let node = self.catalog.create_aggregation(&object, new)?;
        if let Some(parent) = base.parent {
            self.aggregation_parents
                .push((node, EntityId::from(parent), connection));
        }
        Ok(())
    }

    /// Resolve classification parents; returns the ones that did not resolve
    fn link(&mut self) -> Vec<PendingParent> {
        let pending = std::mem::take(&mut self.parents);
        let mut unresolved = Vec::new();
        for (kind, id, parent) in pending {
            if self.catalog.kind_of(&parent) != Some(kind) {
                unresolved.push((kind, id, parent));
                continue;
            }
            let linked = match kind {
                EntityKind::Attribute => self.catalog.add_child::<Attribute>(&parent, &id),
                EntityKind::PropertySet => self.catalog.add_child::<PropertySet>(&parent, &id),
                EntityKind::Object => self.catalog.add_child::<Object>(&parent, &id),
                EntityKind::Aggregation => continue,
            };
            match linked {
                Ok(()) => debug!("Linked {} {} below {}", kind, id, parent),
                Err(err) => warn!("Parent of {} {} ignored: {}", kind, id, err),
            }
        }
        unresolved
    }

    fn link_aggregations(&mut self) {
        for (node, parent, connection) in std::mem::take(&mut self.aggregation_parents) {
            if self.catalog.get::<Aggregation>(&parent).is_none() {
                warn!("Aggregation {} references missing parent {}", node, parent);
                continue;
            }
            if !self
                .catalog
                .add_aggregation_child(&parent, &node, connection)
            {
                warn!("Aggregation {} rejected below {}", node, parent);
            }
        }
    }
}

/// Attach entities with dangling parent references to a matching root
fn repair_parents(catalog: &mut Catalog, unresolved: &[PendingParent]) {
    for (kind, id, missing) in unresolved {
        let repaired = match kind {
            EntityKind::Attribute => repair::<Attribute>(catalog, id, |a, b| a.value() == b.value()),
            EntityKind::PropertySet => repair::<PropertySet>(catalog, id, |_, _| true),
            EntityKind::Object => repair::<Object>(catalog, id, |_, _| true),
            EntityKind::Aggregation => None,
        };
        match repaired {
            Some(parent) => info!(
                "Repaired parent of {} {}: {} replaced by {}",
                kind, id, missing, parent
            ),
            None => warn!("{} {} references missing parent {}", kind, id, missing),
        }
    }
}

fn repair<T: Inheritable>(
    catalog: &mut Catalog,
    id: &EntityId,
    same_value: impl Fn(&T, &T) -> bool,
) -> Option<EntityId> {
    let entity = catalog.get::<T>(id)?;
    let descendants = catalog.descendants::<T>(id);
    let candidates: Vec<EntityId> = catalog
        .registry::<T>()
        .iter()
        .filter(|c| {
            c.id() != id
                && c.node().is_root()
                && c.name() == entity.name()
                && !descendants.contains(c.id())
                && same_value(*c, entity)
        })
        .map(|c| c.id().clone())
        .collect();

    let parent = candidates.first()?.clone();
    if candidates.len() > 1 {
        warn!(
            "{} candidates to repair the parent of {} {}; using {}",
            candidates.len(),
            T::KIND,
            id,
            parent
        );
    }
    catalog.add_child::<T>(&parent, id).ok()?;
    Some(parent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::to_document;
    use som_lite_model::{NewAttribute, Node, Value, ValueType};

    fn load(json: &str) -> Project {
        let document: Document = serde_json::from_str(json).unwrap();
        from_document(document, &ImportOptions::default()).unwrap()
    }

    /// Project with phases Design/Build, use case QA and a small inheritance tree
    fn sample() -> Project {
        let mut project = Project::with_filters(
            "Sample",
            vec![FilterLabel::new("Design"), FilterLabel::new("Build")],
            vec![FilterLabel::new("QA")],
        )
        .unwrap();
        project.author = Some("Author".into());
        let catalog = project.catalog_mut();
        let common = catalog
            .create_property_set(None, NewPropertySet::new("Common"))
            .unwrap();
        let status = catalog
            .create_attribute(
                &common,
                NewAttribute::new("Status", ValueType::List)
                    .with_value(vec!["new".into(), "old".into()])
                    .with_child_inherits_values(true)
                    .with_optional(true),
            )
            .unwrap();
        let door = catalog
            .create_object(NewObject::new("Door").with_abbreviation("DOR"))
            .unwrap();
        let fire_door = catalog
            .create_object(NewObject::new("FireDoor").with_abbreviation("FDR"))
            .unwrap();
        catalog.add_child::<Object>(&door, &fire_door).unwrap();
        let dims = catalog.create_child_property_set(&common, "Common").unwrap();
        catalog.add_property_set(&door, &dims).unwrap();
        let ident = catalog
            .create_property_set(
                Some(&door),
                NewPropertySet::new("Identity").with_optional(true),
            )
            .unwrap();
        let code = catalog
            .create_attribute(
                &ident,
                NewAttribute::new("Code", ValueType::Value)
                    .with_data_type(DataType::Real)
                    .with_value(vec![Value::Real(1.0)])
                    .with_description("classification code"),
            )
            .unwrap();
        catalog.set_ident_attribute(&door, &code).unwrap();
        let top = catalog
            .create_aggregation(&door, NewAggregation::new())
            .unwrap();
        let part = catalog
            .create_aggregation(&fire_door, NewAggregation::new().with_optional(true))
            .unwrap();
        catalog.add_aggregation_child(&top, &part, ConnectionType::AGGREGATION);
        catalog
            .create_object(NewObject::new("Opening").with_concept("abstract"))
            .unwrap();
        project.set_filter_state(&door, "Build", "QA", false).unwrap();
        project.set_filter_state(&status, "Design", "QA", false).unwrap();
        project.set_filter_state(&dims, "Build", "QA", false).unwrap();
        project.set_filter_state(&top, "Design", "QA", false).unwrap();
        project
    }

    /// Name-based structural fingerprint of every entity with its parent
    fn fingerprint(project: &Project) -> Vec<String> {
        let catalog = project.catalog();
        let parent_name = |parent: Option<&EntityId>| {
            parent
                .and_then(|p| catalog.node(p))
                .map(|n| n.name().to_string())
                .unwrap_or_default()
        };
        let flags = |node: &Node| {
            format!(
                "{} {:?}",
                node.local_optional(),
                node.filter_matrix().to_grid(2, 1)
            )
        };
        let mut lines: Vec<String> = Vec::new();
        for a in catalog.attributes().iter() {
            lines.push(format!(
                "A {} {:?} {:?} {} {} {} <{}>",
                a.name(),
                a.value(),
                a.data_type(),
                a.child_inherits_values(),
                catalog.description::<Attribute>(a.id()),
                flags(a.node()),
                parent_name(a.node().parent())
            ));
        }
        for p in catalog.property_sets().iter() {
            lines.push(format!(
                "P {} {} {} {} <{}>",
                p.name(),
                p.is_predefined(),
                p.attribute_ids().len(),
                flags(p.node()),
                parent_name(p.node().parent())
            ));
        }
        for o in catalog.objects().iter() {
            lines.push(format!(
                "O {} {} {:?} {} {} <{}>",
                o.name(),
                project.ident_value(o.id()),
                o.ident(),
                o.abbreviation(),
                flags(o.node()),
                parent_name(o.node().parent())
            ));
        }
        for g in catalog.aggregations().iter() {
            lines.push(format!(
                "G {} {} {}",
                g.name(),
                catalog.identity(g.id()),
                flags(g.node())
            ));
        }
        lines.sort();
        lines
    }

    #[test]
    fn test_round_trip_is_isomorphic() {
        let project = sample();
        let json = serde_json::to_string(&to_document(&project)).unwrap();
        let restored = load(&json);

        assert_eq!(restored.catalog().len(), project.catalog().len());
        assert_eq!(fingerprint(&restored), fingerprint(&project));
        assert_inherited_values_match(&restored);
        assert_eq!(restored.author.as_deref(), Some("Author"));
        assert_eq!(restored.phases(), project.phases());
    }

    /// Every child of an inheriting attribute carries its parent's value
    fn assert_inherited_values_match(project: &Project) {
        let catalog = project.catalog();
        for a in catalog.attributes().iter() {
            let Some(parent) = a.node().parent().and_then(|p| catalog.get::<Attribute>(p)) else {
                continue;
            };
            if parent.child_inherits_values() {
                assert_eq!(a.value(), parent.value(), "attribute {}", a.id());
            }
        }
    }

    #[test]
    fn test_concept_marker_round_trips() {
        let project = sample();
        let json = serde_json::to_string(&to_document(&project)).unwrap();
        let restored = load(&json);
        let opening = restored
            .catalog()
            .objects()
            .iter()
            .find(|o| o.name() == "Opening")
            .unwrap();
        assert_eq!(
            opening.ident(),
            &Identifier::Concept(Some("abstract".to_string()))
        );
    }

    #[test]
    fn test_detached_attribute_is_not_lost() {
        let mut project = sample();
        let catalog = project.catalog_mut();
        let dims = catalog
            .create_property_set(None, NewPropertySet::new("Dims"))
            .unwrap();
        let width = catalog
            .create_attribute(&dims, NewAttribute::new("Width", ValueType::Value))
            .unwrap();
        assert!(catalog.remove_attribute(&dims, &width).unwrap());

        let json = serde_json::to_string(&to_document(&project)).unwrap();
        let restored = load(&json);
        assert_eq!(
            restored.catalog().attributes().len(),
            project.catalog().attributes().len()
        );
    }

    #[test]
    fn test_inherited_value_enforced_on_load() {
        let project = load(
            r#"{"PredefinedPropertySets": {
                "p-root": {"name": "Common", "parent": null, "Attributes": {
                    "a-root": {"name": "Status", "parent": null, "Value": ["parent"],
                        "value_type": "Value", "child_inherits_value": true}
                }},
                "p-child": {"name": "Common", "parent": "p-root", "Attributes": {
                    "a-child": {"name": "Status", "parent": "a-root", "Value": ["stale"],
                        "value_type": "Value"}
                }}
            }}"#,
        );
        let child = project
            .catalog()
            .get::<Attribute>(&EntityId::from("a-child"))
            .unwrap();
        assert_eq!(child.value(), &[Value::from("parent")]);
        assert_inherited_values_match(&project);
    }

    #[test]
    fn test_current_phase_restored() {
        let project = sample();
        let json = serde_json::to_string(&to_document(&project)).unwrap();
        let restored = load(&json);
        assert_eq!(restored.current_project_phase().name, "Design");
        assert_eq!(restored.current_use_case().name, "QA");
    }

    #[test]
    fn test_current_phase_by_name_and_out_of_range() {
        let project = load(
            r#"{"Project": {"name": "P", "ProjectPhases": [{"name": "Design"}, {"name": "Build"}],
                "UseCases": [{"name": "QA"}], "current_project_phase": "Build", "current_use_case": 4}}"#,
        );
        assert_eq!(project.current_project_phase().name, "Build");
        assert_eq!(project.current_use_case().name, "QA");
    }

    #[test]
    fn test_missing_vocabulary_gets_default() {
        let project = load(r#"{"Project": {"name": "P"}}"#);
        assert_eq!(project.current_project_phase().name, DEFAULT_FILTER_NAME);
        assert_eq!(project.version, som_lite_model::DEFAULT_VERSION);
    }

    #[test]
    fn test_matrices_reconciled_to_vocabulary() {
        let project = load(
            r#"{"Project": {"name": "P", "ProjectPhases": [{"name": "Design"}], "UseCases": [{"name": "QA"}]},
                "Objects": {"o1": {"name": "Wall", "parent": null, "ident_attribute": null,
                    "filter_matrix": [[false, false], [false, false]], "PropertySets": {}}}}"#,
        );
        let node = project.catalog().node(&EntityId::from("o1")).unwrap();
        assert_eq!(node.filter_matrix().rows(), &[vec![false]]);
        assert!(project.objects().is_empty());
    }

    #[test]
    fn test_parents_link_regardless_of_order() {
        let project = load(
            r#"{"Objects": {
                "a-child": {"name": "FireDoor", "parent": "z-parent", "ident_attribute": null, "PropertySets": {}},
                "z-parent": {"name": "Door", "parent": "None", "ident_attribute": null, "PropertySets": {}}
            }}"#,
        );
        let child = project
            .catalog()
            .get::<Object>(&EntityId::from("a-child"))
            .unwrap();
        assert_eq!(child.node().parent(), Some(&EntityId::from("z-parent")));
    }

    const DANGLING: &str = r#"{
        "PredefinedPropertySets": {
            "p-root": {"name": "Common", "parent": null, "Attributes": {
                "a-root": {"name": "Status", "parent": null, "Value": ["x"], "value_type": "Value"},
                "a-other": {"name": "Status", "parent": null, "Value": ["y"], "value_type": "Value"}
            }},
            "p-lost": {"name": "Common", "parent": "gone-pset", "Attributes": {
                "a-lost": {"name": "Status", "parent": "gone-attr", "Value": ["y"], "value_type": "Value"}
            }}
        }
    }"#;

    #[test]
    fn test_repair_attaches_to_matching_root() {
        let project = load(DANGLING);
        let catalog = project.catalog();
        let lost_set = catalog.get::<PropertySet>(&EntityId::from("p-lost")).unwrap();
        assert_eq!(lost_set.node().parent(), Some(&EntityId::from("p-root")));

        // Same name, but only "a-other" carries the same value
        let lost = catalog.get::<Attribute>(&EntityId::from("a-lost")).unwrap();
        assert_eq!(lost.node().parent(), Some(&EntityId::from("a-other")));
    }

    #[test]
    fn test_repair_can_be_disabled() {
        let document: Document = serde_json::from_str(DANGLING).unwrap();
        let project =
            from_document(document, &ImportOptions::default().with_parent_repair(false)).unwrap();
        let lost = project
            .catalog()
            .get::<PropertySet>(&EntityId::from("p-lost"))
            .unwrap();
        assert!(lost.node().is_root());
    }

    #[test]
    fn test_missing_references_are_tolerated() {
        let project = load(
            r#"{"Objects": {"o1": {"name": "Wall", "parent": null, "ident_attribute": "gone", "PropertySets": {}}},
                "Aggregations": {
                    "g1": {"name": "Wall", "parent": "gone", "Object": "o1", "connection": 1},
                    "g2": {"name": "Ghost", "parent": null, "Object": "missing", "connection": null}
                }}"#,
        );
        let catalog = project.catalog();
        assert!(catalog.get::<Object>(&EntityId::from("o1")).unwrap().is_concept());
        assert_eq!(catalog.aggregations().len(), 1);
        assert!(catalog
            .get::<Aggregation>(&EntityId::from("g1"))
            .unwrap()
            .node()
            .is_root());
    }

    #[test]
    fn test_aggregation_cycle_in_document_rejected() {
        let project = load(
            r#"{"Objects": {
                    "o1": {"name": "Door", "parent": null, "ident_attribute": null, "PropertySets": {}},
                    "o2": {"name": "FireDoor", "parent": null, "ident_attribute": null, "PropertySets": {}}
                },
                "Aggregations": {
                    "g1": {"name": "Door", "parent": "g2", "Object": "o1", "connection": 1},
                    "g2": {"name": "FireDoor", "parent": "g1", "Object": "o2", "connection": 1}
                }}"#,
        );
        let catalog = project.catalog();
        let g1 = catalog.get::<Aggregation>(&EntityId::from("g1")).unwrap();
        let g2 = catalog.get::<Aggregation>(&EntityId::from("g2")).unwrap();
        // Exactly one of the two edges survives
        assert!(g1.node().is_root() != g2.node().is_root());
    }

    #[test]
    fn test_duplicate_identifier_is_an_error() {
        let document: Document = serde_json::from_str(
            r#"{"PredefinedPropertySets": {"same": {"name": "A", "parent": null, "Attributes": {}}},
                "Objects": {"same": {"name": "B", "parent": null, "ident_attribute": null, "PropertySets": {}}}}"#,
        )
        .unwrap();
        let err = from_document(document, &ImportOptions::default()).unwrap_err();
        assert!(matches!(err, crate::DocumentError::Model(_)));
    }
}
