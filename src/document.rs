//! The document aggregate and the schema-validated XML reader.

use crate::element::ElementPtr;
use crate::error::{SdfError, XmlError};
use crate::schema::{ROOT_DESCRIPTION, SDF_VERSION, SchemaRegistry};
use crate::urdf::UrdfConverter;
use crate::xml::{XmlDocument, XmlElement};
use std::fmt;
use tracing::{debug, error, warn};

/// One root element plus the format version it was read as.
#[derive(Clone, Debug)]
pub struct SdfDocument {
    root: ElementPtr,
    version: String,
}

impl SdfDocument {
    /// Creates an empty document described by the bundled schema.
    pub fn new() -> Result<Self, SdfError> {
        let root = SchemaRegistry::builtin().load(ROOT_DESCRIPTION)?;
        Ok(Self::with_schema(root))
    }

    /// Creates an empty document whose root is the caller-built schema `root`.
    pub fn with_schema(root: ElementPtr) -> Self {
        Self {
            root,
            version: SDF_VERSION.to_string(),
        }
    }

    pub fn root(&self) -> &ElementPtr {
        &self.root
    }

    pub fn set_root(&mut self, root: ElementPtr) {
        self.root = root;
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn set_version(&mut self, version: impl Into<String>) {
        self.version = version.into();
    }

    /// Replaces the document contents with `text`.
    ///
    /// A `<robot>` document is converted with the default URDF settings first.
    pub fn set_from_string(&mut self, text: &str) -> Result<(), SdfError> {
        let doc = XmlDocument::parse(text)?;
        let xml = doc
            .root
            .ok_or_else(|| XmlError::new(0, "document has no root element"))?;

        match xml.name.as_str() {
            "sdf" => self.read_sdf(&xml),
            "robot" => {
                debug!("converting URDF document to SDF");
                let converted = UrdfConverter::default().init_model_doc(&XmlDocument::new(xml));
                let sdf = converted.root.ok_or(SdfError::Conversion)?;
                self.read_sdf(&sdf)
            }
            other => Err(SdfError::UnknownRoot(other.to_string())),
        }
    }

    /// Reads an `<sdf>` element into the root, discarding previous contents.
    pub fn read_sdf(&mut self, xml: &XmlElement) -> Result<(), SdfError> {
        if let Some(version) = xml.attribute("version") {
            self.version = version.to_string();
        }
        self.root.clear_elements();
        self.root.reset();
        read_xml(xml, &self.root)
    }

    /// Prints the schema to stdout.
    pub fn print_description(&self) {
        self.root.print_description("");
    }

    /// Prints the instance values to stdout.
    pub fn print_values(&self) {
        self.root.print_values("");
    }
}

impl fmt::Display for SdfDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "<?xml version='1.0' ?>")?;
        if self.root.name() == "sdf" {
            f.write_str(&self.root.to_string(""))
        } else {
            writeln!(f, "<sdf version='{}'>", self.version)?;
            f.write_str(&self.root.to_string("  "))?;
            writeln!(f, "</sdf>")
        }
    }
}

/// Reads `xml` into `elem`, validating against `elem`'s descriptions.
///
/// Undeclared attributes and undescribed children are skipped with a warning.
/// A missing required attribute fails the read.
pub fn read_xml(xml: &XmlElement, elem: &ElementPtr) -> Result<(), SdfError> {
    let name = elem.name();

    if let Some(text) = &xml.text
        && let Some(value) = elem.value()
    {
        let result = value.write().set_from_string(text);
        if let Err(e) = result {
            error!("unable to read value of <{}>: {}", name, e);
        }
    }

    for (key, text) in &xml.attributes {
        match elem.get_attribute(key) {
            Some(param) => {
                let result = param.write().set_from_string(text);
                if let Err(e) = result {
                    error!("unable to read attribute [{}] of <{}>: {}", key, name, e);
                }
            }
            None if key.starts_with("xmlns") => {}
            None => warn!(
                "XML attribute [{}] in element <{}> not defined in schema, ignoring",
                key, name
            ),
        }
    }

    for attr in elem.attributes() {
        let attr = attr.read();
        if attr.required() && xml.attribute(attr.key()).is_none() {
            return Err(SdfError::MissingAttribute {
                attribute: attr.key().to_string(),
                element: name,
            });
        }
    }

    if elem.copy_children() {
        copy_children(xml, elem);
        return Ok(());
    }

    for child in &xml.children {
        if child.name == "include" {
            warn!("<include> inside <{}> is not resolved, skipping", name);
            continue;
        }
        let Some(desc) = elem.get_element_description(&child.name) else {
            warn!(
                "XML element <{}>, child of <{}>, not defined in schema, ignoring",
                child.name, name
            );
            continue;
        };
        let instance = desc.deep_clone();
        instance.set_parent(elem);
        read_xml(child, &instance).map_err(|e| SdfError::Element {
            element: child.name.clone(),
            source: Box::new(e),
        })?;
        elem.insert_element(instance);
    }

    for desc in elem.element_descriptions() {
        let required = desc.required();
        let desc_name = desc.name();
        if (required == "1" || required == "+") && !elem.has_element(&desc_name) {
            warn!(
                "required element <{}> missing in <{}>, adding default",
                desc_name, name
            );
            elem.add_element(&desc_name);
        }
    }
    Ok(())
}

/// Copies the children of `xml` into `elem` as untyped string elements.
pub fn copy_children(xml: &XmlElement, elem: &ElementPtr) {
    for child in &xml.children {
        let copy = ElementPtr::named(child.name.as_str());
        for (key, value) in &child.attributes {
            copy.add_attribute(key, "string", "", false, "");
            if let Some(param) = copy.get_attribute(key)
                && let Err(e) = param.write().set_from_string(value)
            {
                warn!("unable to copy attribute [{}] of <{}>: {}", key, child.name, e);
            }
        }
        if let Some(text) = &child.text {
            copy.add_value("string", "", true, "");
            if let Some(param) = copy.value()
                && let Err(e) = param.write().set_from_string(text)
            {
                warn!("unable to copy value of <{}>: {}", child.name, e);
            }
        }
        copy_children(child, &copy);
        elem.insert_element(copy);
    }
}
