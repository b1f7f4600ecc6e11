// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Project root
//!
//! The project owns the catalog, the filter vocabulary (phases and use cases)
//! and the active phase/use-case pair that the filtered accessors apply.

use crate::{
    Aggregation, Attribute, Catalog, EntityId, EntityRef, FilterLabel, Hierarchy, ModelError,
    Object, Phase, PropertySet, Result, UseCase,
};
use serde_json::{Map, Value as JsonValue};

/// Version given to new projects
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Name of the phase and use case created with a new project
pub const DEFAULT_FILTER_NAME: &str = "default";

/// Root of a catalog document
#[derive(Clone, Debug)]
pub struct Project {
    pub name: String,
    pub author: Option<String>,
    pub version: String,
    pub description: Option<String>,
    /// Property set holding the aggregation attribute in exported models
    pub aggregation_pset: String,
    /// Attribute carrying aggregation identities in exported models
    pub aggregation_attribute: String,
    phases: Vec<Phase>,
    use_cases: Vec<UseCase>,
    current_phase: usize,
    current_use_case: usize,
    catalog: Catalog,
    extensions: Map<String, JsonValue>,
}

impl Project {
    /// Create an empty project with a single "default" phase and use case
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            author: None,
            version: DEFAULT_VERSION.to_string(),
            description: None,
            aggregation_pset: String::new(),
            aggregation_attribute: String::new(),
            phases: vec![FilterLabel::new(DEFAULT_FILTER_NAME)],
            use_cases: vec![FilterLabel::new(DEFAULT_FILTER_NAME)],
            current_phase: 0,
            current_use_case: 0,
            catalog: Catalog::new(),
            extensions: Map::new(),
        }
    }

    /// Create an empty project with an explicit filter vocabulary
    pub fn with_filters(
        name: impl Into<String>,
        phases: Vec<Phase>,
        use_cases: Vec<UseCase>,
    ) -> Result<Self> {
        if phases.is_empty() {
            return Err(ModelError::EmptyVocabulary("phases"));
        }
        if use_cases.is_empty() {
            return Err(ModelError::EmptyVocabulary("use cases"));
        }
        check_unique(&phases)?;
        check_unique(&use_cases)?;
        let mut project = Self::new(name);
        project.phases = phases;
        project.use_cases = use_cases;
        Ok(project)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut Catalog {
        &mut self.catalog
    }

    /// Document entries not understood by the model, kept for round trips
    pub fn extensions(&self) -> &Map<String, JsonValue> {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Map<String, JsonValue> {
        &mut self.extensions
    }

    /// Remove every entity and reset the metadata
    pub fn clear(&mut self) {
        self.catalog.clear();
        self.name.clear();
        self.author = None;
        self.version = DEFAULT_VERSION.to_string();
        self.description = None;
    }

    // Filter vocabulary

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn use_cases(&self) -> &[UseCase] {
        &self.use_cases
    }

    pub fn current_project_phase(&self) -> &Phase {
        &self.phases[self.current_phase]
    }

    pub fn current_use_case(&self) -> &UseCase {
        &self.use_cases[self.current_use_case]
    }

    pub fn current_phase_index(&self) -> usize {
        self.current_phase
    }

    pub fn current_use_case_index(&self) -> usize {
        self.current_use_case
    }

    pub fn phase_index(&self, name: &str) -> Option<usize> {
        self.phases.iter().position(|p| p.name == name)
    }

    pub fn use_case_index(&self, name: &str) -> Option<usize> {
        self.use_cases.iter().position(|u| u.name == name)
    }

    /// Activate a phase by name
    pub fn set_current_phase(&mut self, name: &str) -> Result<()> {
        self.current_phase = self
            .phase_index(name)
            .ok_or_else(|| ModelError::UnknownPhase(name.to_string()))?;
        Ok(())
    }

    /// Activate a phase by position
    pub fn set_current_phase_index(&mut self, index: usize) -> Result<()> {
        if index >= self.phases.len() {
            return Err(ModelError::UnknownPhase(index.to_string()));
        }
        self.current_phase = index;
        Ok(())
    }

    /// Activate a use case by name
    pub fn set_current_use_case(&mut self, name: &str) -> Result<()> {
        self.current_use_case = self
            .use_case_index(name)
            .ok_or_else(|| ModelError::UnknownUseCase(name.to_string()))?;
        Ok(())
    }

    /// Activate a use case by position
    pub fn set_current_use_case_index(&mut self, index: usize) -> Result<()> {
        if index >= self.use_cases.len() {
            return Err(ModelError::UnknownUseCase(index.to_string()));
        }
        self.current_use_case = index;
        Ok(())
    }

    /// Append a phase; existing entities are visible in it
    pub fn add_phase(&mut self, phase: Phase) -> Result<usize> {
        if self.phase_index(&phase.name).is_some() {
            return Err(ModelError::DuplicateFilterName(phase.name));
        }
        self.phases.push(phase);
        Ok(self.phases.len() - 1)
    }

    /// Append a use case; existing entities are visible in it
    pub fn add_use_case(&mut self, use_case: UseCase) -> Result<usize> {
        if self.use_case_index(&use_case.name).is_some() {
            return Err(ModelError::DuplicateFilterName(use_case.name));
        }
        self.use_cases.push(use_case);
        Ok(self.use_cases.len() - 1)
    }

    pub fn rename_phase(&mut self, old: &str, new: impl Into<String>) -> Result<()> {
        let new = new.into();
        let index = self
            .phase_index(old)
            .ok_or_else(|| ModelError::UnknownPhase(old.to_string()))?;
        if old != new && self.phase_index(&new).is_some() {
            return Err(ModelError::DuplicateFilterName(new));
        }
        self.phases[index].name = new;
        Ok(())
    }

    pub fn rename_use_case(&mut self, old: &str, new: impl Into<String>) -> Result<()> {
        let new = new.into();
        let index = self
            .use_case_index(old)
            .ok_or_else(|| ModelError::UnknownUseCase(old.to_string()))?;
        if old != new && self.use_case_index(&new).is_some() {
            return Err(ModelError::DuplicateFilterName(new));
        }
        self.use_cases[index].name = new;
        Ok(())
    }

    /// Remove a phase and purge its row from every entity
    ///
    /// The last remaining phase cannot be removed.
    pub fn remove_phase(&mut self, name: &str) -> Result<()> {
        let index = self
            .phase_index(name)
            .ok_or_else(|| ModelError::UnknownPhase(name.to_string()))?;
        if self.phases.len() == 1 {
            return Err(ModelError::EmptyVocabulary("phases"));
        }
        self.phases.remove(index);
        self.catalog
            .for_each_node_mut(|node| node.filter.remove_phase(index));
        self.current_phase = shift_current(self.current_phase, index, self.phases.len());
        Ok(())
    }

    /// Remove a use case and purge its column from every entity
    ///
    /// The last remaining use case cannot be removed.
    pub fn remove_use_case(&mut self, name: &str) -> Result<()> {
        let index = self
            .use_case_index(name)
            .ok_or_else(|| ModelError::UnknownUseCase(name.to_string()))?;
        if self.use_cases.len() == 1 {
            return Err(ModelError::EmptyVocabulary("use cases"));
        }
        self.use_cases.remove(index);
        self.catalog
            .for_each_node_mut(|node| node.filter.remove_use_case(index));
        self.current_use_case = shift_current(self.current_use_case, index, self.use_cases.len());
        Ok(())
    }

    /// Replace the whole vocabulary without touching entity matrices
    ///
    /// Used when loading documents; matrices are reconciled afterwards by
    /// [`Project::reconcile_filters`].
    pub fn set_vocabulary(&mut self, phases: Vec<Phase>, use_cases: Vec<UseCase>) -> Result<()> {
        if phases.is_empty() {
            return Err(ModelError::EmptyVocabulary("phases"));
        }
        if use_cases.is_empty() {
            return Err(ModelError::EmptyVocabulary("use cases"));
        }
        check_unique(&phases)?;
        check_unique(&use_cases)?;
        self.phases = phases;
        self.use_cases = use_cases;
        self.current_phase = self.current_phase.min(self.phases.len() - 1);
        self.current_use_case = self.current_use_case.min(self.use_cases.len() - 1);
        Ok(())
    }

    /// Trim every entity's matrix to the vocabulary dimensions
    pub fn reconcile_filters(&mut self) {
        let (phases, use_cases) = (self.phases.len(), self.use_cases.len());
        self.catalog
            .for_each_node_mut(|node| node.filter.reconcile(phases, use_cases));
    }

    // Visibility

    /// Visibility of an entity for a named phase and use case
    ///
    /// Unknown names and missing cells count as visible.
    pub fn filter_state(&self, id: &EntityId, phase: &str, use_case: &str) -> bool {
        let (Some(p), Some(u)) = (self.phase_index(phase), self.use_case_index(use_case)) else {
            return true;
        };
        self.catalog
            .node(id)
            .map_or(true, |node| node.filter.get(p, u))
    }

    /// Set the visibility of an entity for a named phase and use case
    pub fn set_filter_state(
        &mut self,
        id: &EntityId,
        phase: &str,
        use_case: &str,
        visible: bool,
    ) -> Result<()> {
        let p = self
            .phase_index(phase)
            .ok_or_else(|| ModelError::UnknownPhase(phase.to_string()))?;
        let u = self
            .use_case_index(use_case)
            .ok_or_else(|| ModelError::UnknownUseCase(use_case.to_string()))?;
        let node = self
            .catalog
            .node_mut(id)
            .ok_or_else(|| ModelError::UnknownEntity(id.clone()))?;
        node.filter.set(p, u, visible);
        Ok(())
    }

    /// Visibility under the active phase and use case
    pub fn is_visible(&self, id: &EntityId) -> bool {
        self.catalog.node(id).map_or(false, |node| {
            node.filter.get(self.current_phase, self.current_use_case)
        })
    }

    // Filtered read surface

    /// Objects visible under the active filter, sorted by name
    pub fn objects(&self) -> Vec<&Object> {
        self.visible(self.catalog.objects().iter())
    }

    /// Aggregation nodes visible under the active filter, sorted by name
    pub fn aggregations(&self) -> Vec<&Aggregation> {
        self.visible(self.catalog.aggregations().iter())
    }

    /// Visible property sets of an object
    pub fn property_sets(&self, object: &EntityId) -> Vec<&PropertySet> {
        self.visible(self.catalog.object_property_sets(object).into_iter())
    }

    /// Visible attributes of a property set
    pub fn attributes(&self, property_set: &EntityId) -> Vec<&Attribute> {
        self.visible(self.catalog.property_set_attributes(property_set).into_iter())
    }

    /// Property sets not owned by any object, sorted by name
    pub fn predefined_property_sets(&self) -> Vec<&PropertySet> {
        self.catalog
            .property_sets()
            .iter()
            .filter(|p| p.is_predefined())
            .collect()
    }

    pub fn get_element_by_uuid(&self, id: &EntityId) -> Option<EntityRef<'_>> {
        self.catalog.get_element_by_uuid(id)
    }

    pub fn ident_value(&self, object: &EntityId) -> String {
        self.catalog.ident_value(object)
    }

    fn visible<'a, T: Hierarchy + 'a>(&self, entities: impl Iterator<Item = &'a T>) -> Vec<&'a T> {
        entities
            .filter(|e| {
                e.node()
                    .filter
                    .get(self.current_phase, self.current_use_case)
            })
            .collect()
    }
}

impl Default for Project {
    fn default() -> Self {
        Self::new("")
    }
}

fn check_unique(labels: &[FilterLabel]) -> Result<()> {
    for (i, label) in labels.iter().enumerate() {
        if labels[..i].iter().any(|l| l.name == label.name) {
            return Err(ModelError::DuplicateFilterName(label.name.clone()));
        }
    }
    Ok(())
}

/// New position of the active entry after removing `removed`
fn shift_current(current: usize, removed: usize, len: usize) -> usize {
    let shifted = if current > removed { current - 1 } else { current };
    shifted.min(len.saturating_sub(1))
}
