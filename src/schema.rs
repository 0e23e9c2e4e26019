//! Loads element schemas from description files.
//!
//! Description files are themselves XML: `<element>` declares a node (and,
//! with `type`/`default`, its value), `<attribute>` declares an attribute,
//! `<include filename=..>` pulls in another file, and
//! `<element copy_data="true"/>` marks the enclosing node as copying its
//! children verbatim. Files are looked up in a [`SchemaRegistry`] by name.

use crate::element::ElementPtr;
use crate::error::SdfError;
use crate::xml::XmlElement;
use std::collections::BTreeMap;
use tracing::{debug, error};

/// Name of the top-level description file.
pub const ROOT_DESCRIPTION: &str = "root.sdf";

/// The format version written by this crate.
pub const SDF_VERSION: &str = "1.3";

const BUILTIN_FILES: &[(&str, &str)] = &[
    ("root.sdf", include_str!("../sdf/1.3/root.sdf")),
    ("model.sdf", include_str!("../sdf/1.3/model.sdf")),
    ("link.sdf", include_str!("../sdf/1.3/link.sdf")),
    ("joint.sdf", include_str!("../sdf/1.3/joint.sdf")),
    ("inertial.sdf", include_str!("../sdf/1.3/inertial.sdf")),
    ("collision.sdf", include_str!("../sdf/1.3/collision.sdf")),
    ("visual.sdf", include_str!("../sdf/1.3/visual.sdf")),
    ("geometry.sdf", include_str!("../sdf/1.3/geometry.sdf")),
    ("surface.sdf", include_str!("../sdf/1.3/surface.sdf")),
    ("material.sdf", include_str!("../sdf/1.3/material.sdf")),
    ("sensor.sdf", include_str!("../sdf/1.3/sensor.sdf")),
    ("projector.sdf", include_str!("../sdf/1.3/projector.sdf")),
    ("plugin.sdf", include_str!("../sdf/1.3/plugin.sdf")),
    ("gripper.sdf", include_str!("../sdf/1.3/gripper.sdf")),
];

/// In-memory set of description files, keyed by file name.
#[derive(Clone, Debug, Default)]
pub struct SchemaRegistry {
    files: BTreeMap<String, String>,
}

impl SchemaRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The SDF 1.3 description files bundled with the crate.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for (name, text) in BUILTIN_FILES {
            registry.register(*name, *text);
        }
        registry
    }

    /// Adds or replaces a description file.
    pub fn register(&mut self, filename: impl Into<String>, text: impl Into<String>) {
        self.files.insert(filename.into(), text.into());
    }

    pub fn get(&self, filename: &str) -> Option<&str> {
        self.files.get(filename).map(String::as_str)
    }

    /// Builds the element schema described by `filename`.
    pub fn load(&self, filename: &str) -> Result<ElementPtr, SdfError> {
        let elem = ElementPtr::new();
        self.load_file(filename, &elem, &mut Vec::new())?;
        Ok(elem)
    }

    /// Builds a schema from description text that is not in the registry.
    /// Includes inside `text` are still resolved against the registry.
    pub fn load_str(&self, text: &str) -> Result<ElementPtr, SdfError> {
        let xml = XmlElement::parse(text)?;
        let elem = ElementPtr::new();
        self.read_description(&xml, &elem, &mut Vec::new())?;
        Ok(elem)
    }

    fn load_file(
        &self,
        filename: &str,
        elem: &ElementPtr,
        stack: &mut Vec<String>,
    ) -> Result<(), SdfError> {
        if stack.iter().any(|f| f == filename) {
            return Err(SdfError::IncludeCycle(filename.to_string()));
        }
        let text = self
            .get(filename)
            .ok_or_else(|| SdfError::Include(filename.to_string()))?;
        let xml = XmlElement::parse(text)?;

        debug!("loading description file [{}]", filename);
        stack.push(filename.to_string());
        let result = self.read_description(&xml, elem, stack);
        stack.pop();
        result
    }

    fn read_description(
        &self,
        xml: &XmlElement,
        elem: &ElementPtr,
        stack: &mut Vec<String>,
    ) -> Result<(), SdfError> {
        let name = xml
            .attribute("name")
            .ok_or(SdfError::InvalidDescription { attribute: "name" })?;
        let required = xml
            .attribute("required")
            .ok_or(SdfError::InvalidDescription {
                attribute: "required",
            })?;
        elem.set_name(name);
        elem.set_required(required);

        let description = xml
            .first_child("description")
            .map(|d| d.text().trim().to_string())
            .unwrap_or_default();
        elem.set_description(description.as_str());

        if let Some(type_name) = xml.attribute("type") {
            let default = xml.attribute("default").unwrap_or("");
            elem.add_value(type_name, default, required == "1", &description);
        }

        for child in &xml.children {
            match child.name.as_str() {
                "description" => {}
                "attribute" => read_attribute(child, elem)?,
                "element" if child.attribute("copy_data") == Some("true") => {
                    elem.set_copy_children(true);
                }
                "element" => {
                    let desc = ElementPtr::new();
                    self.read_description(child, &desc, stack)?;
                    elem.add_element_description(desc);
                }
                "include" => {
                    let filename = child
                        .attribute("filename")
                        .ok_or(SdfError::InvalidDescription {
                            attribute: "filename",
                        })?;
                    let desc = ElementPtr::new();
                    self.load_file(filename, &desc, stack)?;
                    desc.set_include(filename);
                    if let Some(required) = child.attribute("required") {
                        desc.set_required(required);
                    }
                    if let Some(text) = child.first_child("description") {
                        desc.set_description(text.text().trim());
                    }
                    elem.add_element_description(desc);
                }
                other => {
                    error!("unknown tag <{}> in description of <{}>", other, name);
                }
            }
        }
        Ok(())
    }
}

fn read_attribute(xml: &XmlElement, elem: &ElementPtr) -> Result<(), SdfError> {
    let name = xml
        .attribute("name")
        .ok_or(SdfError::InvalidDescription { attribute: "name" })?;
    let type_name = xml
        .attribute("type")
        .ok_or(SdfError::InvalidDescription { attribute: "type" })?;
    let default = xml.attribute("default").unwrap_or("__default__");
    let required = xml.attribute("required") == Some("1");
    let description = xml
        .first_child("description")
        .map(|d| d.text().trim().to_string())
        .unwrap_or_default();
    elem.add_attribute(name, type_name, default, required, &description);
    Ok(())
}
