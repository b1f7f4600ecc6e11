// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! On-disk document records
//!
//! Records mirror the JSON layout one to one. Entity maps are keyed by
//! identifier and kept in [`BTreeMap`]s so output is stable.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value as JsonValue};
use som_lite_model::{ConnectionType, FilterLabel, Value, ValueType};
use std::collections::BTreeMap;

/// Entity records keyed by identifier
pub type RecordMap<T> = BTreeMap<String, T>;

/// A complete catalog document
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "Project", default)]
    pub project: Option<ProjectRecord>,

    #[serde(rename = "PredefinedPropertySets", default)]
    pub predefined_property_sets: Option<RecordMap<PropertySetRecord>>,

    #[serde(rename = "Objects", default)]
    pub objects: Option<RecordMap<ObjectRecord>>,

    #[serde(rename = "Aggregations", default)]
    pub aggregations: Option<RecordMap<AggregationRecord>>,

    /// Top-level entries written by other tools
    #[serde(flatten)]
    pub extensions: Map<String, JsonValue>,
}

/// Active phase or use case, stored by position or by name
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterSelector {
    Index(usize),
    Name(String),
}

/// Project metadata and filter vocabulary
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProjectRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "AggregationPsetName", default)]
    pub aggregation_pset: Option<String>,
    #[serde(rename = "AggregationAttributeName", default)]
    pub aggregation_attribute: Option<String>,
    #[serde(default)]
    pub current_project_phase: Option<FilterSelector>,
    #[serde(default)]
    pub current_use_case: Option<FilterSelector>,
    #[serde(rename = "ProjectPhases", default)]
    pub phases: Vec<FilterLabel>,
    #[serde(rename = "UseCases", default)]
    pub use_cases: Vec<FilterLabel>,
}

/// Fields shared by every entity record
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BaseRecord {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub optional: bool,
    /// Parent identifier; older files write the string "None" for roots
    #[serde(default, deserialize_with = "parent_reference")]
    pub parent: Option<String>,
    /// One row per phase, one column per use case
    #[serde(default)]
    pub filter_matrix: Vec<Vec<bool>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttributeRecord {
    #[serde(flatten)]
    pub base: BaseRecord,
    /// Kept as text so unknown type names degrade to the default
    #[serde(default)]
    pub data_type: Option<String>,
    #[serde(default)]
    pub value_type: ValueType,
    #[serde(rename = "child_inherits_value", default)]
    pub child_inherits_values: bool,
    #[serde(default)]
    pub revit_mapping: Option<String>,
    #[serde(rename = "Value", default)]
    pub value: Vec<Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PropertySetRecord {
    #[serde(flatten)]
    pub base: BaseRecord,
    #[serde(rename = "Attributes", default)]
    pub attributes: RecordMap<AttributeRecord>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ObjectRecord {
    #[serde(flatten)]
    pub base: BaseRecord,
    #[serde(default)]
    pub ident_attribute: Option<String>,
    #[serde(rename = "IfcMappings", default)]
    pub ifc_mappings: Option<Vec<String>>,
    #[serde(default)]
    pub abbreviation: Option<String>,
    #[serde(rename = "PropertySets", default)]
    pub property_sets: RecordMap<PropertySetRecord>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AggregationRecord {
    #[serde(flatten)]
    pub base: BaseRecord,
    #[serde(rename = "Object")]
    pub object: String,
    /// Edge tag to the parent, null for roots
    #[serde(default)]
    pub connection: Option<ConnectionType>,
}

fn parent_reference<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let parent = Option::<String>::deserialize(deserializer)?;
    Ok(parent.filter(|p| !p.is_empty() && p != "None"))
}
