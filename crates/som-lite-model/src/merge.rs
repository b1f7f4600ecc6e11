// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Merging one project into another
//!
//! Objects of the source project are copied into the target unless the
//! target already has an object with the same identifier value. Concepts have
//! no identifier value and are matched by name instead.
//!
//! Filter matrices are recomputed against the target vocabulary through an
//! explicit [`FilterMapping`]; unmapped cells are visible.

use crate::{
    Aggregation, Attribute, Catalog, EntityId, EntityKind, FilterMatrix, Hierarchy, Identifier,
    Inheritable, NewAggregation, NewAttribute, NewObject, NewPropertySet, Object, Project,
    PropertySet, Result,
};
use log::{debug, info, warn};
use rustc_hash::FxHashMap;
use serde_json::{Map, Value as JsonValue};

/// Correspondence between target and source filter vocabularies
///
/// Keys are target names, values the source names whose visibility they take.
#[derive(Clone, Debug, Default)]
pub struct FilterMapping {
    pub phases: FxHashMap<String, String>,
    pub use_cases: FxHashMap<String, String>,
}

impl FilterMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map every name present in both projects to itself
    pub fn identity(target: &Project, source: &Project) -> Self {
        let mut mapping = Self::new();
        for phase in target.phases() {
            if source.phase_index(&phase.name).is_some() {
                mapping.phases.insert(phase.name.clone(), phase.name.clone());
            }
        }
        for use_case in target.use_cases() {
            if source.use_case_index(&use_case.name).is_some() {
                mapping
                    .use_cases
                    .insert(use_case.name.clone(), use_case.name.clone());
            }
        }
        mapping
    }

    pub fn map_phase(mut self, target: impl Into<String>, source: impl Into<String>) -> Self {
        self.phases.insert(target.into(), source.into());
        self
    }

    pub fn map_use_case(mut self, target: impl Into<String>, source: impl Into<String>) -> Self {
        self.use_cases.insert(target.into(), source.into());
        self
    }
}

/// Summary of a merge
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Objects copied into the target
    pub objects_merged: usize,
    /// Objects skipped because the target already had them
    pub objects_skipped: usize,
    /// Predefined property sets matched by name
    pub predefined_matched: usize,
    /// Predefined property sets copied into the target
    pub predefined_imported: usize,
}

/// Merge `source` into `target`
pub fn merge_projects(
    target: &mut Project,
    source: &Project,
    mapping: &FilterMapping,
) -> Result<MergeReport> {
    let mut merger = Merger {
        grid: FilterGrid::new(target, source, mapping),
        target: target.catalog_mut(),
        source: source.catalog(),
        remap: FxHashMap::default(),
        imported: Vec::new(),
        report: MergeReport::default(),
    };
    merger.merge_predefined()?;
    merger.merge_objects()?;
    merger.link_imported();
    let report = merger.report;

    merge_maps(target.extensions_mut(), source.extensions());
    info!(
        "Merged {} objects ({} skipped), {} predefined property sets matched, {} imported",
        report.objects_merged,
        report.objects_skipped,
        report.predefined_matched,
        report.predefined_imported
    );
    Ok(report)
}

/// Recursively merge JSON maps; existing entries in `target` win
pub fn merge_maps(target: &mut Map<String, JsonValue>, source: &Map<String, JsonValue>) {
    for (key, value) in source {
        match target.get_mut(key) {
            Some(JsonValue::Object(existing)) => {
                if let JsonValue::Object(incoming) = value {
                    merge_maps(existing, incoming);
                }
            }
            Some(JsonValue::Null) | None => {
                target.insert(key.clone(), value.clone());
            }
            Some(_) => {}
        }
    }
}

/// Source cell coordinates for each target cell
struct FilterGrid {
    cells: Vec<Vec<Option<(usize, usize)>>>,
}

impl FilterGrid {
    fn new(target: &Project, source: &Project, mapping: &FilterMapping) -> Self {
        let lookup = |target_name: &str, names: &FxHashMap<String, String>, is_phase: bool| {
            let source_name = names.get(target_name)?;
            if is_phase {
                source.phase_index(source_name)
            } else {
                source.use_case_index(source_name)
            }
        };
        let cells = target
            .phases()
            .iter()
            .map(|phase| {
                let p = lookup(&phase.name, &mapping.phases, true);
                target
                    .use_cases()
                    .iter()
                    .map(|use_case| {
                        let u = lookup(&use_case.name, &mapping.use_cases, false);
                        p.zip(u)
                    })
                    .collect()
            })
            .collect();
        Self { cells }
    }

    fn recompute(&self, source: &FilterMatrix) -> FilterMatrix {
        FilterMatrix::from_rows(
            self.cells
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|cell| cell.map_or(true, |(p, u)| source.get(p, u)))
                        .collect()
                })
                .collect(),
        )
    }
}

/// Identifier value, or the name for concepts
fn object_key(catalog: &Catalog, object: &Object) -> String {
    if object.is_concept() {
        format!("concept:{}", object.name())
    } else {
        format!("ident:{}", catalog.ident_value(object.id()))
    }
}

struct Merger<'a> {
    grid: FilterGrid,
    target: &'a mut Catalog,
    source: &'a Catalog,
    /// Source identifier to target identifier
    remap: FxHashMap<EntityId, EntityId>,
    /// Source entities copied into the target, in creation order
    imported: Vec<(EntityKind, EntityId)>,
    report: MergeReport,
}

impl Merger<'_> {
    fn fresh_id(&self, id: &EntityId) -> EntityId {
        if self.target.is_free(id) {
            id.clone()
        } else {
            EntityId::new()
        }
    }

    fn merge_predefined(&mut self) -> Result<()> {
        let source = self.source;
        for pset in source.property_sets().iter().filter(|p| p.is_predefined()) {
            let matched = self
                .target
                .property_sets()
                .iter()
                .find(|p| p.is_predefined() && p.name() == pset.name())
                .map(|p| p.id().clone());
            match matched {
                Some(target_pset) => {
                    self.map_by_name(pset, &target_pset);
                    self.report.predefined_matched += 1;
                }
                None => {
                    self.import_property_set(pset, None)?;
                    self.report.predefined_imported += 1;
                }
            }
        }
        Ok(())
    }

    fn merge_objects(&mut self) -> Result<()> {
        let target: &Catalog = &*self.target;
        let existing: FxHashMap<String, EntityId> = target
            .objects()
            .iter()
            .map(|o| (object_key(target, o), o.id().clone()))
            .collect();

        let source = self.source;
        for object in source.objects().iter() {
            let key = object_key(source, object);
            match existing.get(&key) {
                Some(duplicate) => {
                    debug!("Object '{}' already present, skipped", object.name());
                    self.remap.insert(object.id().clone(), duplicate.clone());
                    for pset in source.object_property_sets(object.id()) {
                        let counterpart = self
                            .target
                            .property_set_by_name(duplicate, pset.name())
                            .map(|p| p.id().clone());
                        if let Some(counterpart) = counterpart {
                            self.map_by_name(pset, &counterpart);
                        }
                    }
                    self.report.objects_skipped += 1;
                }
                None => {
                    self.import_object(object)?;
                    self.report.objects_merged += 1;
                }
            }
        }
        Ok(())
    }

    /// Map a source property set and its attributes onto a target set by name
    fn map_by_name(&mut self, source_pset: &PropertySet, target_pset: &EntityId) {
        self.remap
            .insert(source_pset.id().clone(), target_pset.clone());
        let source = self.source;
        for attribute in source.property_set_attributes(source_pset.id()) {
            if let Some(counterpart) = self.target.attribute_by_name(target_pset, attribute.name()) {
                self.remap
                    .insert(attribute.id().clone(), counterpart.id().clone());
            }
        }
    }

    fn import_object(&mut self, object: &Object) -> Result<()> {
        let source = self.source;
        let mut new = NewObject::new(object.name())
            .with_id(self.fresh_id(object.id()))
            .with_abbreviation(object.abbreviation())
            .with_ifc_mapping(object.ifc_mapping().iter().cloned())
            .with_optional(object.node().local_optional())
            .with_filter(self.grid.recompute(object.node().filter_matrix()));
        new.description = object.node().local_description().map(str::to_string);
        if let Identifier::Concept(marker) = object.ident() {
            new.ident = Identifier::Concept(marker.clone());
        }
        let id = self.target.create_object(new)?;
        self.remap.insert(object.id().clone(), id.clone());
        self.imported.push((EntityKind::Object, object.id().clone()));

        for pset in source.object_property_sets(object.id()) {
            self.import_property_set(pset, Some(&id))?;
        }

        if let Some(ident) = object.ident_attribute() {
            match self.remap.get(ident).cloned() {
                Some(ident) => self.target.set_ident_attribute(&id, &ident)?,
                None => warn!("Identifying attribute of '{}' was not merged", object.name()),
            }
        }

        for node in object.aggregation_ids() {
            let Some(node) = source.get::<Aggregation>(node) else {
                continue;
            };
            let mut new = NewAggregation::new()
                .with_id(self.fresh_id(node.id()))
                .with_connection(node.connection())
                .with_optional(node.node().local_optional())
                .with_filter(self.grid.recompute(node.node().filter_matrix()));
            new.description = node.node().local_description().map(str::to_string);
            let new_node = self.target.create_aggregation(&id, new)?;
            self.remap.insert(node.id().clone(), new_node);
            self.imported.push((EntityKind::Aggregation, node.id().clone()));
        }
        Ok(())
    }

    fn import_property_set(&mut self, pset: &PropertySet, object: Option<&EntityId>) -> Result<()> {
        let mut new = NewPropertySet::new(pset.name())
            .with_id(self.fresh_id(pset.id()))
            .with_optional(pset.node().local_optional())
            .with_filter(self.grid.recompute(pset.node().filter_matrix()));
        new.description = pset.node().local_description().map(str::to_string);
        let id = self.target.create_property_set(object, new)?;
        self.remap.insert(pset.id().clone(), id.clone());
        self.imported.push((EntityKind::PropertySet, pset.id().clone()));

        let source = self.source;
        for attribute in source.property_set_attributes(pset.id()) {
            let mut new = NewAttribute::new(attribute.name(), attribute.value_type())
                .with_id(self.fresh_id(attribute.id()))
                .with_value(attribute.value().to_vec())
                .with_data_type(attribute.data_type())
                .with_child_inherits_values(attribute.child_inherits_values())
                .with_optional(attribute.node().local_optional())
                .with_revit_mapping(attribute.revit_name())
                .with_filter(self.grid.recompute(attribute.node().filter_matrix()));
            new.description = attribute.node().local_description().map(str::to_string);
            // The new set has no children yet, so nothing is mirrored
            let new_id = self.target.create_attribute(&id, new)?;
            self.remap.insert(attribute.id().clone(), new_id);
            self.imported
                .push((EntityKind::Attribute, attribute.id().clone()));
        }
        Ok(())
    }

    /// Recreate the parent links of every imported entity
    fn link_imported(&mut self) {
        let imported = std::mem::take(&mut self.imported);
        for (kind, id) in &imported {
            match kind {
                EntityKind::Attribute => self.link::<Attribute>(id),
                EntityKind::PropertySet => self.link::<PropertySet>(id),
                EntityKind::Object => self.link::<Object>(id),
                EntityKind::Aggregation => self.link_aggregation(id),
            }
        }
        debug!("Restored links of {} merged entities", imported.len());
    }

    fn link<T: Inheritable>(&mut self, source_id: &EntityId) {
        let Some(parent) = self
            .source
            .get::<T>(source_id)
            .and_then(|e| e.node().parent())
        else {
            return;
        };
        let (Some(new_parent), Some(new_child)) =
            (self.remap.get(parent), self.remap.get(source_id))
        else {
            debug!("Parent {} of {} {} not merged", parent, T::KIND, source_id);
            return;
        };
        if let Err(err) = self.target.add_child::<T>(new_parent, new_child) {
            warn!("Could not restore parent of merged {}: {}", T::KIND, err);
        }
    }

    fn link_aggregation(&mut self, source_id: &EntityId) {
        let Some(node) = self.source.get::<Aggregation>(source_id) else {
            return;
        };
        let Some(parent) = node.node().parent() else {
            return;
        };
        let (Some(new_parent), Some(new_child)) =
            (self.remap.get(parent), self.remap.get(source_id))
        else {
            return;
        };
        if !self
            .target
            .add_aggregation_child(new_parent, new_child, node.connection())
        {
            warn!("Merged aggregation {} rejected below {}", new_child, new_parent);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConnectionType, FilterLabel, Value, ValueType};
    use serde_json::json;

    fn project(phases: &[&str], use_cases: &[&str]) -> Project {
        Project::with_filters(
            "P",
            phases.iter().map(|p| FilterLabel::new(*p)).collect(),
            use_cases.iter().map(|u| FilterLabel::new(*u)).collect(),
        )
        .unwrap()
    }

    /// Object with an "Identity" set holding a "Code" attribute used as identifier
    fn coded_object(project: &mut Project, name: &str, code: &str) -> EntityId {
        let catalog = project.catalog_mut();
        let object = catalog.create_object(NewObject::new(name)).unwrap();
        let pset = catalog
            .create_property_set(Some(&object), NewPropertySet::new("Identity"))
            .unwrap();
        let attribute = catalog
            .create_attribute(
                &pset,
                NewAttribute::new("Code", ValueType::Value).with_value(vec![code.into()]),
            )
            .unwrap();
        catalog.set_ident_attribute(&object, &attribute).unwrap();
        object
    }

    fn object_by_name<'a>(project: &'a Project, name: &str) -> &'a Object {
        project
            .catalog()
            .objects()
            .iter()
            .find(|o| o.name() == name)
            .unwrap()
    }

    #[test]
    fn test_duplicates_are_skipped() {
        let mut target = project(&["A"], &["U"]);
        let mut source = project(&["A"], &["U"]);
        coded_object(&mut target, "Door", "1");
        coded_object(&mut source, "DoorCopy", "1");
        coded_object(&mut source, "Wall", "2");

        let mapping = FilterMapping::identity(&target, &source);
        let report = merge_projects(&mut target, &source, &mapping).unwrap();
        assert_eq!(report.objects_merged, 1);
        assert_eq!(report.objects_skipped, 1);
        assert_eq!(target.catalog().objects().len(), 2);

        let wall = object_by_name(&target, "Wall").id().clone();
        assert_eq!(target.ident_value(&wall), "2");
    }

    #[test]
    fn test_concepts_matched_by_name() {
        let mut target = project(&["A"], &["U"]);
        let mut source = project(&["A"], &["U"]);
        target
            .catalog_mut()
            .create_object(NewObject::new("Element"))
            .unwrap();
        source
            .catalog_mut()
            .create_object(NewObject::new("Element"))
            .unwrap();
        source
            .catalog_mut()
            .create_object(NewObject::new("Space"))
            .unwrap();

        let report = merge_projects(&mut target, &source, &FilterMapping::new()).unwrap();
        assert_eq!(report.objects_merged, 1);
        assert_eq!(target.catalog().objects().len(), 2);
    }

    #[test]
    fn test_filter_matrix_recomputed_through_mapping() {
        let mut target = project(&["Planning", "Execution"], &["QA"]);
        let mut source = project(&["Design", "Build"], &["Check"]);
        let wall = coded_object(&mut source, "Wall", "2");
        source.set_filter_state(&wall, "Build", "Check", false).unwrap();

        let mapping = FilterMapping::new()
            .map_phase("Execution", "Build")
            .map_use_case("QA", "Check");
        merge_projects(&mut target, &source, &mapping).unwrap();

        let merged = object_by_name(&target, "Wall").id().clone();
        assert!(!target.filter_state(&merged, "Execution", "QA"));
        // "Planning" has no source phase and stays visible
        assert!(target.filter_state(&merged, "Planning", "QA"));
        assert_eq!(
            target
                .catalog()
                .node(&merged)
                .unwrap()
                .filter_matrix()
                .rows(),
            &[vec![true], vec![false]]
        );
    }

    #[test]
    fn test_predefined_sets_matched_and_attributes_reparented() {
        let mut target = project(&["A"], &["U"]);
        let mut source = project(&["A"], &["U"]);

        let common = target
            .catalog_mut()
            .create_property_set(None, NewPropertySet::new("Common"))
            .unwrap();
        let target_width = target
            .catalog_mut()
            .create_attribute(&common, NewAttribute::new("Width", ValueType::Value))
            .unwrap();

        let source_common = source
            .catalog_mut()
            .create_property_set(None, NewPropertySet::new("Common"))
            .unwrap();
        source
            .catalog_mut()
            .create_attribute(&source_common, NewAttribute::new("Width", ValueType::Value))
            .unwrap();
        let extra = source
            .catalog_mut()
            .create_property_set(None, NewPropertySet::new("Extra"))
            .unwrap();
        source
            .catalog_mut()
            .create_attribute(
                &extra,
                NewAttribute::new("Colour", ValueType::Value).with_value(vec![Value::from("red")]),
            )
            .unwrap();

        let wall = coded_object(&mut source, "Wall", "2");
        let child = source
            .catalog_mut()
            .create_child_property_set(&source_common, "Common")
            .unwrap();
        source.catalog_mut().add_property_set(&wall, &child).unwrap();

        let report = merge_projects(&mut target, &source, &FilterMapping::new()).unwrap();
        assert_eq!(report.predefined_matched, 1);
        assert_eq!(report.predefined_imported, 1);
        assert_eq!(target.predefined_property_sets().len(), 2);

        let merged_wall = object_by_name(&target, "Wall").id().clone();
        let merged_set = target
            .catalog()
            .property_set_by_name(&merged_wall, "Common")
            .unwrap();
        assert_eq!(merged_set.node().parent(), Some(&common));
        let merged_width = target
            .catalog()
            .attribute_by_name(merged_set.id(), "Width")
            .unwrap();
        assert_eq!(merged_width.node().parent(), Some(&target_width));
    }

    #[test]
    fn test_merged_child_takes_inherited_target_value() {
        let mut target = project(&["A"], &["U"]);
        let mut source = project(&["A"], &["U"]);
        let status = NewAttribute::new("Status", ValueType::Value).with_child_inherits_values(true);

        let common = target
            .catalog_mut()
            .create_property_set(None, NewPropertySet::new("Common"))
            .unwrap();
        target
            .catalog_mut()
            .create_attribute(&common, status.clone().with_value(vec!["target".into()]))
            .unwrap();

        let source_common = source
            .catalog_mut()
            .create_property_set(None, NewPropertySet::new("Common"))
            .unwrap();
        source
            .catalog_mut()
            .create_attribute(&source_common, status.with_value(vec!["source".into()]))
            .unwrap();
        let wall = coded_object(&mut source, "Wall", "2");
        let child = source
            .catalog_mut()
            .create_child_property_set(&source_common, "Common")
            .unwrap();
        source.catalog_mut().add_property_set(&wall, &child).unwrap();

        merge_projects(&mut target, &source, &FilterMapping::new()).unwrap();

        let merged_wall = object_by_name(&target, "Wall").id().clone();
        let merged_set = target
            .catalog()
            .property_set_by_name(&merged_wall, "Common")
            .unwrap();
        let merged_status = target
            .catalog()
            .attribute_by_name(merged_set.id(), "Status")
            .unwrap();
        assert_eq!(merged_status.value(), &[Value::from("target")]);
    }

    #[test]
    fn test_aggregations_follow_objects() {
        let mut target = project(&["A"], &["U"]);
        let mut source = project(&["A"], &["U"]);
        let building = coded_object(&mut source, "Building", "1");
        let storey = coded_object(&mut source, "Storey", "2");
        let catalog = source.catalog_mut();
        let top = catalog
            .create_aggregation(&building, NewAggregation::new())
            .unwrap();
        let below = catalog
            .create_aggregation(&storey, NewAggregation::new())
            .unwrap();
        assert!(catalog.add_aggregation_child(&top, &below, ConnectionType::AGGREGATION));

        merge_projects(&mut target, &source, &FilterMapping::new()).unwrap();
        assert_eq!(target.catalog().aggregations().len(), 2);
        let merged = target
            .catalog()
            .aggregations()
            .iter()
            .find(|a| a.name() == "Storey")
            .unwrap();
        let parent = merged.node().parent().unwrap();
        assert_eq!(
            target.catalog().get::<Aggregation>(parent).unwrap().name(),
            "Building"
        );
    }

    #[test]
    fn test_merge_keeps_free_ids_and_renames_taken_ones() {
        let mut target = project(&["A"], &["U"]);
        let mut source = project(&["A"], &["U"]);
        target
            .catalog_mut()
            .create_object(NewObject::new("Door").with_id("shared"))
            .unwrap();
        source
            .catalog_mut()
            .create_object(NewObject::new("Window").with_id("shared"))
            .unwrap();
        source
            .catalog_mut()
            .create_object(NewObject::new("Slab").with_id("own"))
            .unwrap();

        merge_projects(&mut target, &source, &FilterMapping::new()).unwrap();
        assert!(target.catalog().get::<Object>(&EntityId::from("own")).is_some());
        let window = object_by_name(&target, "Window");
        assert_ne!(window.id(), &EntityId::from("shared"));
    }

    #[test]
    fn test_plugin_data_merged() {
        let mut target = project(&["A"], &["U"]);
        let mut source = project(&["A"], &["U"]);
        target
            .extensions_mut()
            .insert("Plugin".into(), json!({"a": 1, "nested": {"x": true}}));
        source
            .extensions_mut()
            .insert("Plugin".into(), json!({"a": 2, "b": 3, "nested": {"y": false}}));
        source.extensions_mut().insert("Other".into(), json!([1, 2]));

        merge_projects(&mut target, &source, &FilterMapping::new()).unwrap();
        assert_eq!(
            target.extensions().get("Plugin").unwrap(),
            &json!({"a": 1, "b": 3, "nested": {"x": true, "y": false}})
        );
        assert_eq!(target.extensions().get("Other").unwrap(), &json!([1, 2]));
    }
}
