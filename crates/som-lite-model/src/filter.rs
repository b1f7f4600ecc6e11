// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Phase x use-case visibility filtering
//!
//! Every entity carries a [`FilterMatrix`]: rows are project phases, columns
//! are use cases, and a cell says whether the entity is visible for that
//! combination. Cells that were never written are visible, so growing the
//! project vocabulary never needs a backfill. Shrinking it purges the matching
//! row or column from every entity (see `Project::remove_phase`).

use serde::{Deserialize, Serialize};

/// A named entry of the filter vocabulary (a project phase or a use case)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterLabel {
    /// Short name, unique within its vocabulary
    pub name: String,
    /// Long display name
    #[serde(default)]
    pub long_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl FilterLabel {
    /// Create a label with only a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            long_name: None,
            description: None,
        }
    }

    /// Set the long display name
    pub fn with_long_name(mut self, long_name: impl Into<String>) -> Self {
        self.long_name = Some(long_name.into());
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A project phase
pub type Phase = FilterLabel;

/// A use case
pub type UseCase = FilterLabel;

/// Per-entity visibility grid indexed by (phase, use case)
///
/// The grid may be ragged or smaller than the vocabulary; any cell outside the
/// stored rows is visible.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterMatrix(Vec<Vec<bool>>);

impl FilterMatrix {
    /// Create an empty matrix (visible everywhere)
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Create a matrix from explicit rows
    pub fn from_rows(rows: Vec<Vec<bool>>) -> Self {
        Self(rows)
    }

    /// Get the visibility for a phase/use-case pair
    pub fn get(&self, phase: usize, use_case: usize) -> bool {
        self.0
            .get(phase)
            .and_then(|row| row.get(use_case))
            .copied()
            .unwrap_or(true)
    }

    /// Set the visibility for a phase/use-case pair, growing the grid as needed
    pub fn set(&mut self, phase: usize, use_case: usize, visible: bool) {
        if visible && self.get(phase, use_case) {
            return;
        }
        if self.0.len() <= phase {
            self.0.resize_with(phase + 1, Vec::new);
        }
        let row = &mut self.0[phase];
        if row.len() <= use_case {
            row.resize(use_case + 1, true);
        }
        row[use_case] = visible;
    }

    /// Remove the row of a deleted phase
    pub fn remove_phase(&mut self, phase: usize) {
        if phase < self.0.len() {
            self.0.remove(phase);
        }
    }

    /// Remove the column of a deleted use case
    pub fn remove_use_case(&mut self, use_case: usize) {
        for row in &mut self.0 {
            if use_case < row.len() {
                row.remove(use_case);
            }
        }
    }

    /// Drop rows and columns beyond the vocabulary size
    pub fn reconcile(&mut self, phases: usize, use_cases: usize) {
        self.0.truncate(phases);
        for row in &mut self.0 {
            row.truncate(use_cases);
        }
    }

    /// Dense grid with exactly `phases` rows of `use_cases` cells
    pub fn to_grid(&self, phases: usize, use_cases: usize) -> Vec<Vec<bool>> {
        (0..phases)
            .map(|p| (0..use_cases).map(|u| self.get(p, u)).collect())
            .collect()
    }

    /// Whether no cell hides the entity
    pub fn is_all_visible(&self) -> bool {
        self.0.iter().flatten().all(|visible| *visible)
    }

    /// Stored rows
    pub fn rows(&self) -> &[Vec<bool>] {
        &self.0
    }
}
