// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! SOM-Lite Model - In-memory model for hierarchical classification catalogs
//!
//! A catalog describes building classes ([`Object`]s) with their property
//! groups ([`PropertySet`]s) and typed properties ([`Attribute`]s), plus a
//! separate composition graph of [`Aggregation`] nodes. Every entity kind
//! supports single-parent inheritance and carries a phase x use-case
//! visibility [`FilterMatrix`].
//!
//! # Architecture
//!
//! - [`Catalog`] - Owns one arena per entity kind and a merged identifier index
//! - [`Hierarchy`] - Uniform access to the tree data shared by all kinds
//! - [`Project`] - Filter vocabulary, active filter and the filtered read surface
//! - [`merge_projects`] - Copies objects of one project into another
//!
//! Persistence lives in the `som-lite-io` crate.
//!
//! # Example
//!
//! ```ignore
//! use som_lite_model::{NewAttribute, NewObject, NewPropertySet, Project, ValueType};
//!
//! let mut project = Project::new("Catalog");
//! let catalog = project.catalog_mut();
//! let door = catalog.create_object(NewObject::new("Door").with_abbreviation("DOR"))?;
//! let dims = catalog.create_property_set(Some(&door), NewPropertySet::new("Dims"))?;
//! catalog.create_attribute(&dims, NewAttribute::new("Width", ValueType::Value))?;
//!
//! for object in project.objects() {
//!     println!("{} ({})", object.name(), project.ident_value(object.id()));
//! }
//! ```

pub mod aggregation;
pub mod attribute;
pub mod error;
pub mod filter;
pub mod hierarchy;
pub mod merge;
pub mod object;
pub mod project;
pub mod property_set;
pub mod registry;
pub mod types;

// Re-export all public types
pub use aggregation::*;
pub use attribute::*;
pub use error::*;
pub use filter::*;
pub use hierarchy::*;
pub use merge::*;
pub use object::*;
pub use project::*;
pub use property_set::*;
pub use registry::*;
pub use types::*;
