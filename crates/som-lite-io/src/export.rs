// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Project to document conversion
//!
//! Every registered entity is written, not only the ones visible under the
//! active filter. Filter matrices are written as dense grids sized to the
//! project's current vocabulary.

use crate::document::{
    AggregationRecord, AttributeRecord, BaseRecord, Document, FilterSelector, ObjectRecord,
    ProjectRecord, PropertySetRecord, RecordMap,
};
use log::info;
use som_lite_model::{Catalog, EntityId, Hierarchy, Identifier, Node, Project, PropertySet};

/// Build the document for a project
pub fn to_document(project: &Project) -> Document {
    let writer = Writer {
        catalog: project.catalog(),
        phases: project.phases().len(),
        use_cases: project.use_cases().len(),
    };

    let predefined: RecordMap<PropertySetRecord> = project
        .predefined_property_sets()
        .into_iter()
        .map(|p| (p.id().to_string(), writer.property_set(p)))
        .collect();

    let objects: RecordMap<ObjectRecord> = writer
        .catalog
        .objects()
        .iter()
        .map(|o| {
            let record = ObjectRecord {
                base: writer.base(o.node()),
                ident_attribute: match o.ident() {
                    Identifier::Attribute(id) => Some(id.to_string()),
                    Identifier::Concept(marker) => marker.clone(),
                },
                ifc_mappings: Some(o.ifc_mapping().iter().cloned().collect()),
                abbreviation: Some(o.abbreviation().to_string()),
                property_sets: writer
                    .catalog
                    .object_property_sets(o.id())
                    .into_iter()
                    .map(|p| (p.id().to_string(), writer.property_set(p)))
                    .collect(),
            };
            (o.id().to_string(), record)
        })
        .collect();

    let aggregations: RecordMap<AggregationRecord> = writer
        .catalog
        .aggregations()
        .iter()
        .map(|a| {
            let record = AggregationRecord {
                base: writer.base(a.node()),
                object: a.object().to_string(),
                connection: a.parent_connection(),
            };
            (a.id().to_string(), record)
        })
        .collect();

    info!(
        "Exported project '{}': {} predefined property sets, {} objects, {} aggregations",
        project.name,
        predefined.len(),
        objects.len(),
        aggregations.len()
    );

    Document {
        project: Some(project_record(project)),
        predefined_property_sets: Some(predefined),
        objects: Some(objects),
        aggregations: Some(aggregations),
        extensions: project.extensions().clone(),
    }
}

fn project_record(project: &Project) -> ProjectRecord {
    ProjectRecord {
        name: project.name.clone(),
        author: project.author.clone(),
        version: Some(project.version.clone()),
        description: project.description.clone(),
        aggregation_pset: Some(project.aggregation_pset.clone()),
        aggregation_attribute: Some(project.aggregation_attribute.clone()),
        current_project_phase: Some(FilterSelector::Index(project.current_phase_index())),
        current_use_case: Some(FilterSelector::Index(project.current_use_case_index())),
        phases: project.phases().to_vec(),
        use_cases: project.use_cases().to_vec(),
    }
}

struct Writer<'a> {
    catalog: &'a Catalog,
    phases: usize,
    use_cases: usize,
}

impl Writer<'_> {
    fn base(&self, node: &Node) -> BaseRecord {
        BaseRecord {
            name: node.name().to_string(),
            description: node.local_description().unwrap_or_default().to_string(),
            optional: node.local_optional(),
            parent: node.parent().map(EntityId::to_string),
            filter_matrix: node.filter_matrix().to_grid(self.phases, self.use_cases),
        }
    }

    fn property_set(&self, pset: &PropertySet) -> PropertySetRecord {
        let attributes = self
            .catalog
            .property_set_attributes(pset.id())
            .into_iter()
            .map(|a| {
                let record = AttributeRecord {
                    base: self.base(a.node()),
                    data_type: Some(a.data_type().as_str().to_string()),
                    value_type: a.value_type(),
                    child_inherits_values: a.child_inherits_values(),
                    revit_mapping: Some(a.revit_name().to_string()),
                    value: a.value().to_vec(),
                };
                (a.id().to_string(), record)
            })
            .collect();
        PropertySetRecord {
            base: self.base(pset.node()),
            attributes,
        }
    }
}
