//! The schema-aware element tree.
//!
//! An [`ElementPtr`] is simultaneously an instance node (attribute values, a
//! value, instance children) and a schema (the list of element descriptions
//! that say which children are legal). Instance children are always created
//! by cloning a description, so the schema itself is never mutated by
//! populating a document.
//!
//! Nodes are shared through `Arc<RwLock<_>>`. Parent links are weak, so the
//! only ownership direction is parent to child.

use crate::error::SdfError;
use crate::param::{Param, ParamData, ParamPtr};
use parking_lot::RwLock;
use quick_xml::escape::escape;
use std::fmt::Write as _;
use std::sync::{Arc, Weak};
use tracing::error;

#[derive(Debug, Default)]
struct ElementData {
    name: String,
    required: String,
    description: String,
    copy_children: bool,
    include_filename: String,
    parent: Weak<RwLock<ElementData>>,
    attributes: Vec<ParamPtr>,
    value: Option<ParamPtr>,
    elements: Vec<ElementPtr>,
    descriptions: Vec<ElementPtr>,
}

/// Shared handle to an element node.
///
/// Cloning the handle shares the node; use [`deep_clone`](Self::deep_clone)
/// for an independent copy.
#[derive(Clone, Debug, Default)]
pub struct ElementPtr(Arc<RwLock<ElementData>>);

fn clone_param(param: &ParamPtr) -> ParamPtr {
    param.read().clone().into_ptr()
}

impl ElementPtr {
    /// Creates an empty element with no schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty element named `name`.
    pub fn named(name: impl Into<String>) -> Self {
        let elem = Self::new();
        elem.set_name(name);
        elem
    }

    /// True when both handles point at the same node.
    pub fn ptr_eq(&self, other: &ElementPtr) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn name(&self) -> String {
        self.0.read().name.clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        self.0.write().name = name.into();
    }

    /// Multiplicity: `"0"`, `"1"`, `"+"` or `"*"`.
    pub fn required(&self) -> String {
        self.0.read().required.clone()
    }

    pub fn set_required(&self, required: impl Into<String>) {
        self.0.write().required = required.into();
    }

    pub fn description(&self) -> String {
        self.0.read().description.clone()
    }

    pub fn set_description(&self, description: impl Into<String>) {
        self.0.write().description = description.into();
    }

    /// Whether reading copies raw children verbatim instead of validating them.
    pub fn copy_children(&self) -> bool {
        self.0.read().copy_children
    }

    pub fn set_copy_children(&self, value: bool) {
        self.0.write().copy_children = value;
    }

    /// Name of the description file this element was included from.
    pub fn include(&self) -> String {
        self.0.read().include_filename.clone()
    }

    pub fn set_include(&self, filename: impl Into<String>) {
        self.0.write().include_filename = filename.into();
    }

    pub fn parent(&self) -> Option<ElementPtr> {
        self.0.read().parent.upgrade().map(ElementPtr)
    }

    pub fn set_parent(&self, parent: &ElementPtr) {
        self.0.write().parent = Arc::downgrade(&parent.0);
    }

    fn clear_parent(&self) {
        self.0.write().parent = Weak::new();
    }

    // --- attributes and value ---

    /// Registers an attribute. Logs and returns `false` for a duplicate key or
    /// an unknown type.
    pub fn add_attribute(
        &self,
        key: &str,
        type_name: &str,
        default: &str,
        required: bool,
        description: &str,
    ) -> bool {
        if self.has_attribute(key) {
            error!("attribute [{}] already exists on element <{}>", key, self.name());
            return false;
        }
        match Param::new(key, type_name, default, required, description) {
            Ok(param) => {
                self.0.write().attributes.push(param.into_ptr());
                true
            }
            Err(e) => {
                error!("unable to add attribute to element <{}>: {}", self.name(), e);
                false
            }
        }
    }

    /// Registers the value slot, replacing any previous one.
    pub fn add_value(&self, type_name: &str, default: &str, required: bool, description: &str) -> bool {
        let name = self.name();
        match Param::new(name.as_str(), type_name, default, required, description) {
            Ok(param) => {
                self.0.write().value = Some(param.into_ptr());
                true
            }
            Err(e) => {
                error!("unable to add value to element <{}>: {}", name, e);
                false
            }
        }
    }

    pub fn get_attribute(&self, key: &str) -> Option<ParamPtr> {
        self.0
            .read()
            .attributes
            .iter()
            .find(|p| p.read().key() == key)
            .cloned()
    }

    pub fn get_attribute_at(&self, index: usize) -> Option<ParamPtr> {
        self.0.read().attributes.get(index).cloned()
    }

    pub fn attribute_count(&self) -> usize {
        self.0.read().attributes.len()
    }

    pub fn attributes(&self) -> Vec<ParamPtr> {
        self.0.read().attributes.clone()
    }

    pub fn has_attribute(&self, key: &str) -> bool {
        self.get_attribute(key).is_some()
    }

    /// True if the attribute exists and was explicitly assigned.
    pub fn get_attribute_set(&self, key: &str) -> bool {
        self.get_attribute(key).is_some_and(|p| p.read().is_set())
    }

    /// The element's own value slot.
    pub fn value(&self) -> Option<ParamPtr> {
        self.0.read().value.clone()
    }

    // --- element descriptions ---

    pub fn element_description_count(&self) -> usize {
        self.0.read().descriptions.len()
    }

    pub fn get_element_description_at(&self, index: usize) -> Option<ElementPtr> {
        self.0.read().descriptions.get(index).cloned()
    }

    /// First registered description named `name`.
    pub fn get_element_description(&self, name: &str) -> Option<ElementPtr> {
        self.0
            .read()
            .descriptions
            .iter()
            .find(|d| d.name() == name)
            .cloned()
    }

    pub fn has_element_description(&self, name: &str) -> bool {
        self.get_element_description(name).is_some()
    }

    pub fn element_descriptions(&self) -> Vec<ElementPtr> {
        self.0.read().descriptions.clone()
    }

    /// Registers a child template. Logs and returns `false` if the name is taken.
    pub fn add_element_description(&self, desc: ElementPtr) -> bool {
        let name = desc.name();
        if self.has_element_description(&name) {
            error!(
                "element description <{}> already registered on <{}>",
                name,
                self.name()
            );
            return false;
        }
        desc.set_parent(self);
        self.0.write().descriptions.push(desc);
        true
    }

    // --- typed access ---

    /// Reads a value with the three-tier lookup.
    ///
    /// An empty `key` reads this element's own value. Otherwise the lookup
    /// tries an attribute named `key`, then the value of the first child
    /// element named `key`, then the default of the description named `key`.
    pub fn try_get<T: ParamData>(&self, key: &str) -> Result<T, SdfError> {
        if key.is_empty() {
            let value = self.value().ok_or_else(|| SdfError::NoValue(self.name()))?;
            return Ok(value.read().get::<T>()?);
        }
        if let Some(attr) = self.get_attribute(key) {
            return Ok(attr.read().get::<T>()?);
        }
        if let Some(child) = self.find_element(key) {
            return child.try_get("");
        }
        if let Some(desc) = self.get_element_description(key) {
            return desc.try_get("");
        }
        Err(SdfError::MissingKey {
            key: key.to_string(),
            element: self.name(),
        })
    }

    /// Like [`try_get`](Self::try_get), but logs failures and returns `T::default()`.
    pub fn get<T: ParamData + Default>(&self, key: &str) -> T {
        self.try_get(key).unwrap_or_else(|e| {
            error!("{}", e);
            T::default()
        })
    }

    /// Sets this element's own value. `false` if there is no value slot or the
    /// value cannot be represented in the declared type.
    pub fn set<T: ParamData>(&self, value: T) -> bool {
        let Some(param) = self.value() else {
            error!("element <{}> has no value to set", self.name());
            return false;
        };
        let result = param.write().set(value);
        match result {
            Ok(()) => true,
            Err(e) => {
                error!("{}", e);
                false
            }
        }
    }

    // --- instance children ---

    pub fn has_element(&self, name: &str) -> bool {
        self.find_element(name).is_some()
    }

    /// First instance child named `name`, without creating one.
    pub fn find_element(&self, name: &str) -> Option<ElementPtr> {
        self.0
            .read()
            .elements
            .iter()
            .find(|e| e.name() == name)
            .cloned()
    }

    /// First instance child named `name`, created from its description if absent.
    ///
    /// This is a read accessor with a side effect: asking for an optional
    /// element that is not present materializes it with schema defaults, so
    /// [`has_element`](Self::has_element) is true afterwards. Use
    /// [`find_element`](Self::find_element) to look without creating.
    pub fn get_element(&self, name: &str) -> Option<ElementPtr> {
        self.find_element(name).or_else(|| self.add_element(name))
    }

    pub fn first_element(&self) -> Option<ElementPtr> {
        self.0.read().elements.first().cloned()
    }

    /// The next sibling after this element named `name`. An empty name matches any sibling.
    pub fn next_element(&self, name: &str) -> Option<ElementPtr> {
        let parent = self.parent()?;
        let siblings = parent.elements();
        let idx = siblings.iter().position(|e| e.ptr_eq(self))?;
        siblings
            .into_iter()
            .skip(idx + 1)
            .find(|e| name.is_empty() || e.name() == name)
    }

    /// Instance children in order.
    pub fn elements(&self) -> Vec<ElementPtr> {
        self.0.read().elements.clone()
    }

    /// Instantiates the description named `name` as a new child.
    ///
    /// Every child description whose requirement is `"1"` is instantiated as
    /// well, recursively. Logs and returns `None` when no description exists.
    pub fn add_element(&self, name: &str) -> Option<ElementPtr> {
        let Some(desc) = self.get_element_description(name) else {
            error!(
                "missing element description for <{}> in <{}>",
                name,
                self.name()
            );
            return None;
        };
        let elem = desc.deep_clone();
        self.insert_element(elem.clone());

        let required: Vec<String> = elem
            .element_descriptions()
            .iter()
            .filter(|d| d.required() == "1")
            .map(|d| d.name())
            .collect();
        for child in required {
            elem.add_element(&child);
        }
        Some(elem)
    }

    /// Appends an externally built element as a child, detaching it from any previous parent.
    pub fn insert_element(&self, elem: ElementPtr) {
        elem.remove_from_parent();
        elem.set_parent(self);
        self.0.write().elements.push(elem);
    }

    /// Unlinks this element from its parent. No-op without a parent.
    pub fn remove_from_parent(&self) {
        if let Some(parent) = self.parent() {
            parent.remove_child(self);
        }
    }

    /// Unlinks `child` from this element. No-op if it is not a child.
    pub fn remove_child(&self, child: &ElementPtr) {
        let removed = {
            let mut data = self.0.write();
            match data.elements.iter().position(|e| e.ptr_eq(child)) {
                Some(idx) => Some(data.elements.remove(idx)),
                None => None,
            }
        };
        if let Some(removed) = removed {
            removed.clear_parent();
        }
    }

    /// Drops all instance children. Descriptions are kept.
    pub fn clear_elements(&self) {
        let removed = std::mem::take(&mut self.0.write().elements);
        for child in removed {
            child.clear_parent();
        }
    }

    // --- copying ---

    /// Deep copy of this node, its descriptions and its instance subtree.
    ///
    /// The copy has no parent; attach it with [`insert_element`](Self::insert_element).
    pub fn deep_clone(&self) -> ElementPtr {
        let (data, children) = {
            let src = self.0.read();
            let data = ElementData {
                name: src.name.clone(),
                required: src.required.clone(),
                description: src.description.clone(),
                copy_children: src.copy_children,
                include_filename: src.include_filename.clone(),
                parent: Weak::new(),
                attributes: src.attributes.iter().map(clone_param).collect(),
                value: src.value.as_ref().map(clone_param),
                elements: Vec::new(),
                descriptions: Vec::new(),
            };
            (data, (src.descriptions.clone(), src.elements.clone()))
        };
        let clone = ElementPtr(Arc::new(RwLock::new(data)));
        let (descriptions, elements) = children;
        for desc in descriptions {
            let copy = desc.deep_clone();
            copy.set_parent(&clone);
            clone.0.write().descriptions.push(copy);
        }
        for child in elements {
            clone.insert_element(child.deep_clone());
        }
        clone
    }

    /// Copies attribute values, the value and instance children from `src` in place.
    ///
    /// Missing attributes and the value slot are created as needed. The element
    /// descriptions of `self` are left untouched.
    pub fn copy_from(&self, src: &ElementPtr) {
        if self.ptr_eq(src) {
            return;
        }
        let (name, attributes, value, children) = {
            let s = src.0.read();
            (
                s.name.clone(),
                s.attributes.iter().map(clone_param).collect::<Vec<_>>(),
                s.value.as_ref().map(clone_param),
                s.elements.clone(),
            )
        };

        self.set_name(name);
        for attr in attributes {
            let key = attr.read().key().to_string();
            match self.get_attribute(&key) {
                Some(existing) => *existing.write() = attr.read().clone(),
                None => self.0.write().attributes.push(attr),
            }
        }
        if let Some(value) = value {
            match self.value() {
                Some(existing) => *existing.write() = value.read().clone(),
                None => self.0.write().value = Some(value),
            }
        }
        self.clear_elements();
        for child in children {
            self.insert_element(child.deep_clone());
        }
    }

    /// Restores every attribute and value in this subtree to its default.
    pub fn reset(&self) {
        for attr in self.attributes() {
            attr.write().reset();
        }
        if let Some(value) = self.value() {
            value.write().reset();
        }
        for child in self.elements() {
            child.reset();
        }
    }

    // --- text output ---

    /// Serializes the instance tree.
    ///
    /// Attributes are written when set or required. An element with children
    /// writes them indented by two spaces; otherwise its value, if any, is
    /// written as text.
    pub fn to_string(&self, prefix: &str) -> String {
        let mut out = String::new();
        self.write_values(prefix, &mut out);
        out
    }

    fn write_values(&self, prefix: &str, out: &mut String) {
        let name = self.name();
        let _ = write!(out, "{prefix}<{name}");
        for attr in self.attributes() {
            let attr = attr.read();
            if attr.is_set() || attr.required() {
                let _ = write!(out, " {}='{}'", attr.key(), escape(attr.as_string().as_str()));
            }
        }

        let children = self.elements();
        if !children.is_empty() {
            out.push_str(">\n");
            let child_prefix = format!("{prefix}  ");
            for child in children {
                child.write_values(&child_prefix, out);
            }
            let _ = writeln!(out, "{prefix}</{name}>");
        } else if let Some(value) = self.value() {
            let text = value.read().as_string();
            let _ = writeln!(out, ">{}</{name}>", escape(text.as_str()));
        } else {
            out.push_str("/>\n");
        }
    }

    /// Writes the schema in the description-file format.
    pub fn description_string(&self, prefix: &str) -> String {
        let mut out = String::new();
        self.write_description(prefix, &mut out);
        out
    }

    fn write_description(&self, prefix: &str, out: &mut String) {
        let inner = format!("{prefix}  ");
        let _ = write!(
            out,
            "{prefix}<element name='{}' required='{}'",
            self.name(),
            self.required()
        );
        if let Some(value) = self.value() {
            let value = value.read();
            let _ = write!(
                out,
                " type='{}' default='{}'",
                value.type_name(),
                escape(value.default_as_string().as_str())
            );
        }
        out.push_str(">\n");

        let description = self.description();
        if !description.is_empty() {
            let _ = writeln!(
                out,
                "{inner}<description>{}</description>",
                escape(description.as_str())
            );
        }

        for attr in self.attributes() {
            let attr = attr.read();
            let _ = write!(
                out,
                "{inner}<attribute name='{}' type='{}' default='{}' required='{}'",
                attr.key(),
                attr.type_name(),
                escape(attr.default_as_string().as_str()),
                if attr.required() { "1" } else { "0" }
            );
            if attr.description().is_empty() {
                out.push_str("/>\n");
            } else {
                let _ = writeln!(
                    out,
                    ">\n{inner}  <description>{}</description>\n{inner}</attribute>",
                    escape(attr.description())
                );
            }
        }

        if self.copy_children() {
            let _ = writeln!(out, "{inner}<element copy_data='true' required='*'/>");
        }

        for desc in self.element_descriptions() {
            desc.write_description(&inner, out);
        }
        let _ = writeln!(out, "{prefix}</element>");
    }

    /// Prints the schema to stdout.
    pub fn print_description(&self, prefix: &str) {
        print!("{}", self.description_string(prefix));
    }

    /// Prints the instance values to stdout.
    pub fn print_values(&self, prefix: &str) {
        print!("{}", self.to_string(prefix));
    }
}
