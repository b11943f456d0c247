//! Package reference editing for MSBuild project files
//!
//! Loads a `.csproj`/`.fsproj`/`Directory.Packages.props` style document into
//! an element tree, removes `PackageReference` items by package id and writes
//! the document back indented.
//!
//! ```no_run
//! use accessops_projfile::ProjectFile;
//!
//! let mut project = ProjectFile::load("src/App/App.csproj")?;
//! let removed = project.remove_package_reference("Newtonsoft.Json");
//! if removed > 0 {
//!     project.save("src/App/App.csproj")?;
//! }
//! # Ok::<(), accessops_projfile::ProjectFileError>(())
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use xmltree::{Element, EmitterConfig, XMLNode};

const PACKAGE_REFERENCE: &str = "PackageReference";
const ITEM_GROUP: &str = "ItemGroup";

#[derive(Debug, thiserror::Error)]
pub enum ProjectFileError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid project XML: {0}")]
    Parse(#[from] xmltree::ParseError),

    #[error("Expected a <Project> root element, found <{0}>")]
    NotAProject(String),

    #[error("Failed to write project XML: {0}")]
    Write(#[from] xmltree::Error),
}

pub type Result<T> = std::result::Result<T, ProjectFileError>;

/// A package id with its pinned version, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRef {
    pub name: String,
    pub version: Option<String>,
}

/// An MSBuild project held in memory
#[derive(Debug, Clone)]
pub struct ProjectFile {
    root: Element,
    declaration: bool,
}

impl ProjectFile {
    pub fn parse(xml: &str) -> Result<Self> {
        let mut root = Element::parse(xml.as_bytes())?;
        if root.name != "Project" {
            return Err(ProjectFileError::NotAProject(root.name));
        }
        strip_whitespace(&mut root);
        Ok(Self {
            root,
            declaration: xml.trim_start().starts_with("<?xml"),
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let xml = fs::read_to_string(path).map_err(|source| ProjectFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&xml)
    }

    /// Removes every `PackageReference` whose `Include` or `Update` equals
    /// `name` ignoring ASCII case. Item groups emptied by the removal go too.
    pub fn remove_package_reference(&mut self, name: &str) -> usize {
        let removed = prune(&mut self.root, name);
        debug!(package = name, removed, "Removed package references");
        removed
    }

    pub fn package_references(&self) -> Vec<PackageRef> {
        let mut refs = Vec::new();
        collect(&self.root, &mut refs);
        refs
    }

    pub fn to_xml_string(&self) -> Result<String> {
        let config = EmitterConfig::new()
            .perform_indent(true)
            .indent_string("  ")
            .write_document_declaration(self.declaration);
        let mut buf = Vec::new();
        self.root.write_with_config(&mut buf, config)?;
        let mut xml = String::from_utf8_lossy(&buf).into_owned();
        xml.push('\n');
        Ok(xml)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let xml = self.to_xml_string()?;
        fs::write(path, xml).map_err(|source| ProjectFileError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn package_id(element: &Element) -> Option<&str> {
    element
        .attributes
        .get("Include")
        .or_else(|| element.attributes.get("Update"))
        .map(String::as_str)
}

fn is_reference_to(element: &Element, name: &str) -> bool {
    element.name == PACKAGE_REFERENCE
        && package_id(element).is_some_and(|id| id.trim().eq_ignore_ascii_case(name))
}

fn has_elements(element: &Element) -> bool {
    element
        .children
        .iter()
        .any(|node| matches!(node, XMLNode::Element(_)))
}

fn prune(element: &mut Element, name: &str) -> usize {
    let mut removed = 0;
    element.children.retain_mut(|node| {
        let XMLNode::Element(child) = node else {
            return true;
        };
        if is_reference_to(child, name) {
            removed += 1;
            return false;
        }
        let below = prune(child, name);
        removed += below;
        !(below > 0 && child.name == ITEM_GROUP && !has_elements(child))
    });
    removed
}

fn collect(element: &Element, refs: &mut Vec<PackageRef>) {
    for node in &element.children {
        let XMLNode::Element(child) = node else {
            continue;
        };
        if child.name == PACKAGE_REFERENCE {
            if let Some(id) = package_id(child) {
                let version = child.attributes.get("Version").cloned().or_else(|| {
                    child
                        .get_child("Version")
                        .and_then(|v| v.get_text())
                        .map(|t| t.trim().to_string())
                });
                refs.push(PackageRef {
                    name: id.to_string(),
                    version,
                });
            }
        } else {
            collect(child, refs);
        }
    }
}

// Indentation is regenerated on write
fn strip_whitespace(element: &mut Element) {
    element.children.retain_mut(|node| match node {
        XMLNode::Text(text) => !text.trim().is_empty(),
        XMLNode::Element(child) => {
            strip_whitespace(child);
            true
        }
        _ => true,
    });
}
