// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! SOM-Lite IO - JSON persistence for catalog projects
//!
//! This crate reads and writes [`Project`]s as JSON documents. Import is
//! tolerant: dangling references are logged and dropped, and parent links
//! that point nowhere can be repaired by name (see [`ImportOptions`]).
//!
//! # Example
//!
//! ```ignore
//! use som_lite_io::{DocumentIo, ImportOptions};
//!
//! let io = DocumentIo::new().with_import_options(ImportOptions::new().with_parent_repair(false));
//! let project = io.open("catalog.SOMjson")?;
//! println!("{} objects", project.objects().len());
//! io.save(&project, "copy.SOMjson")?;
//! ```

pub mod document;
pub mod error;
mod export;
mod import;

pub use document::Document;
pub use error::{DocumentError, Result};
pub use export::to_document;
pub use import::from_document;

use som_lite_model::Project;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Settings for reading documents
#[derive(Clone, Debug)]
pub struct ImportOptions {
    /// Whether to reattach entities whose parent reference does not resolve
    pub repair_parents: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportOptions {
    /// Create options with parent repair enabled
    pub fn new() -> Self {
        Self {
            repair_parents: true,
        }
    }

    /// Set whether to repair dangling parent references
    pub fn with_parent_repair(mut self, enabled: bool) -> Self {
        self.repair_parents = enabled;
        self
    }
}

/// Settings for writing documents
#[derive(Clone, Debug)]
pub struct ExportOptions {
    /// Indent the JSON output
    pub pretty: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportOptions {
    pub fn new() -> Self {
        Self { pretty: true }
    }

    pub fn with_pretty(mut self, enabled: bool) -> Self {
        self.pretty = enabled;
        self
    }
}

/// Reads and writes project documents with fixed options
#[derive(Clone, Debug, Default)]
pub struct DocumentIo {
    pub import: ImportOptions,
    pub export: ExportOptions,
}

impl DocumentIo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_import_options(mut self, options: ImportOptions) -> Self {
        self.import = options;
        self
    }

    pub fn with_export_options(mut self, options: ExportOptions) -> Self {
        self.export = options;
        self
    }

    /// Read a project from a file
    ///
    /// A missing file is reported as [`DocumentError::NotFound`].
    pub fn open(&self, path: impl AsRef<Path>) -> Result<Project> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DocumentError::NotFound(path.to_path_buf()));
        }
        let reader = BufReader::new(File::open(path)?);
        let document: Document = serde_json::from_reader(reader)?;
        log::debug!("Read document {}", path.display());
        from_document(document, &self.import)
    }

    /// Write a project to a file, replacing its content
    pub fn save(&self, project: &Project, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        let document = to_document(project);
        if self.export.pretty {
            serde_json::to_writer_pretty(&mut writer, &document)?;
        } else {
            serde_json::to_writer(&mut writer, &document)?;
        }
        writer.flush()?;
        log::debug!("Wrote document {}", path.display());
        Ok(())
    }

    /// Read a project from JSON text
    pub fn from_str(&self, json: &str) -> Result<Project> {
        let document: Document = serde_json::from_str(json)?;
        from_document(document, &self.import)
    }

    /// Write a project as JSON text
    pub fn to_string(&self, project: &Project) -> Result<String> {
        let document = to_document(project);
        let json = if self.export.pretty {
            serde_json::to_string_pretty(&document)?
        } else {
            serde_json::to_string(&document)?
        };
        Ok(json)
    }
}

/// Read a project with default options
pub fn open(path: impl AsRef<Path>) -> Result<Project> {
    DocumentIo::new().open(path)
}

/// Write a project with default options
pub fn save(project: &Project, path: impl AsRef<Path>) -> Result<()> {
    DocumentIo::new().save(project, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use som_lite_model::{FilterLabel, Hierarchy, NewObject};

    fn project() -> Project {
        let mut project = Project::with_filters(
            "Files",
            vec![FilterLabel::new("Design"), FilterLabel::new("Build")],
            vec![FilterLabel::new("QA")],
        )
        .unwrap();
        project
            .catalog_mut()
            .create_object(NewObject::new("Door").with_abbreviation("DOR"))
            .unwrap();
        project
            .extensions_mut()
            .insert("PluginData".into(), serde_json::json!({"version": 2}));
        project
    }

    #[test]
    fn test_save_and_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        save(&project(), &path).unwrap();

        let restored = open(&path).unwrap();
        assert_eq!(restored.name, "Files");
        assert_eq!(restored.current_project_phase().name, "Design");
        let names: Vec<&str> = restored.objects().iter().map(|o| o.name()).collect();
        assert_eq!(names, vec!["Door"]);
        assert_eq!(
            restored.extensions().get("PluginData"),
            Some(&serde_json::json!({"version": 2}))
        );
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        match open(&path) {
            Err(DocumentError::NotFound(missing)) => assert_eq!(missing, path),
            other => panic!("expected NotFound, got {:?}", other.map(|p| p.name)),
        }
    }

    #[test]
    fn test_malformed_document() {
        let err = DocumentIo::new().from_str("{ not json").unwrap_err();
        assert!(matches!(err, DocumentError::Json(_)));
    }

    #[test]
    fn test_compact_output() {
        let io = DocumentIo::new().with_export_options(ExportOptions::new().with_pretty(false));
        let json = io.to_string(&project()).unwrap();
        assert!(!json.contains('\n'));
        let restored = io.from_str(&json).unwrap();
        assert_eq!(restored.catalog().objects().len(), 1);
    }
}
