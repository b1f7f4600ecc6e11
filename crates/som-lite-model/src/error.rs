// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for catalog operations

use crate::{EntityId, EntityKind};
use thiserror::Error;

/// Result type alias for model operations
pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors raised by mutating catalog APIs
///
/// Structural refusals (aggregation cycles, value writes on inheriting
/// children, guarded deletes) are reported through `bool` returns instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// Entity with the given identifier does not exist in the expected registry
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: EntityId },

    /// No entity of any kind uses the identifier
    #[error("Entity {0} not found")]
    UnknownEntity(EntityId),

    /// Identifier is already taken, possibly by an entity of another kind
    #[error("Identifier {id} already used by {existing}")]
    DuplicateId { id: EntityId, existing: EntityKind },

    /// Linking would make an entity its own ancestor
    #[error("{kind} {child} cannot become a child of its descendant {parent}")]
    CyclicHierarchy {
        kind: EntityKind,
        parent: EntityId,
        child: EntityId,
    },

    /// Phase name not part of the project vocabulary
    #[error("Unknown project phase: {0}")]
    UnknownPhase(String),

    /// Use case name not part of the project vocabulary
    #[error("Unknown use case: {0}")]
    UnknownUseCase(String),

    /// Phase or use case name already in use
    #[error("Duplicate filter name: {0}")]
    DuplicateFilterName(String),

    /// Filter vocabulary must contain at least one phase and one use case
    #[error("Filter vocabulary must not be empty: {0}")]
    EmptyVocabulary(&'static str),
}

impl ModelError {
    /// Create a not-found error for the given kind
    pub fn not_found(kind: EntityKind, id: &EntityId) -> Self {
        ModelError::NotFound {
            kind,
            id: id.clone(),
        }
    }
}
