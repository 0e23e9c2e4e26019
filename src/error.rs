//! Error types for parameters, element trees and URDF conversion.

use thiserror::Error;

/// Malformed XML text, with the byte offset where reading stopped.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("XML error at byte {position}: {message}")]
pub struct XmlError {
    /// Byte offset into the input.
    pub position: u64,
    /// Reader diagnostic.
    pub message: String,
}

impl XmlError {
    /// Create an XML error.
    pub fn new(position: u64, message: impl std::fmt::Display) -> Self {
        Self {
            position,
            message: message.to_string(),
        }
    }
}

/// Errors raised by a single [`Param`](crate::Param) cell.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamError {
    /// The type tag is not one of the supported value kinds.
    #[error("unknown parameter type: {0}")]
    UnknownType(String),

    /// Text could not be decoded into the declared kind.
    #[error("unable to decode [{text}] as {kind} for key [{key}]")]
    Decode {
        /// Key of the parameter being decoded.
        key: String,
        /// Declared kind of the parameter.
        kind: &'static str,
        /// The offending text.
        text: String,
    },

    /// The stored value cannot be represented as the requested type.
    #[error("parameter [{key}] of type {found} cannot be read as {expected}")]
    TypeMismatch {
        /// Key of the parameter.
        key: String,
        /// Requested kind.
        expected: &'static str,
        /// Declared kind.
        found: &'static str,
    },
}

impl ParamError {
    /// Create a decode error.
    pub fn decode(key: impl Into<String>, kind: &'static str, text: impl Into<String>) -> Self {
        Self::Decode {
            key: key.into(),
            kind,
            text: text.into(),
        }
    }
}

/// Errors raised while building, reading or querying element trees.
#[derive(Debug, Error)]
pub enum SdfError {
    /// Malformed XML text.
    #[error(transparent)]
    Xml(#[from] XmlError),

    /// The document root is neither `<sdf>` nor a convertible `<robot>`.
    #[error("unrecognized document root <{0}>")]
    UnknownRoot(String),

    /// A required attribute was absent from the input.
    #[error("required attribute [{attribute}] not set on element <{element}>")]
    MissingAttribute {
        /// The attribute key.
        attribute: String,
        /// The element that should carry it.
        element: String,
    },

    /// An attribute the description file depends on is missing.
    #[error("schema element is missing its [{attribute}] attribute")]
    InvalidDescription {
        /// The missing description attribute.
        attribute: &'static str,
    },

    /// Schema include could not be resolved.
    #[error("unable to resolve schema include [{0}]")]
    Include(String),

    /// A schema include refers back to a file already being loaded.
    #[error("schema include cycle through [{0}]")]
    IncludeCycle(String),

    /// No attribute, child element or description matches the key.
    #[error("unable to find value for key [{key}] in element <{element}>")]
    MissingKey {
        /// The key that was looked up.
        key: String,
        /// The element that was searched.
        element: String,
    },

    /// The element has no value slot.
    #[error("element <{0}> has no value")]
    NoValue(String),

    /// A child element could not be read.
    #[error("error reading element <{element}>: {source}")]
    Element {
        /// Name of the element that failed.
        element: String,
        /// Underlying failure.
        #[source]
        source: Box<SdfError>,
    },

    /// The URDF converter produced no document.
    #[error("URDF conversion produced no document")]
    Conversion,

    /// Parameter failure.
    #[error(transparent)]
    Param(#[from] ParamError),
}

/// Errors that make a URDF document unconvertible.
#[derive(Debug, Error)]
pub enum UrdfError {
    /// XML parsing error.
    #[error(transparent)]
    Xml(#[from] XmlError),

    /// Missing required element.
    #[error("missing required element: {element} in {context}")]
    MissingElement {
        /// The missing element name.
        element: &'static str,
        /// Where the element was expected.
        context: String,
    },

    /// Missing required attribute.
    #[error("missing required attribute: {attribute} on {element}")]
    MissingAttribute {
        /// The missing attribute name.
        attribute: &'static str,
        /// The element that should have the attribute.
        element: String,
    },

    /// Unknown joint type.
    #[error("unknown joint type [{joint_type}] on joint [{joint}]")]
    UnknownJointType {
        /// The unrecognized type text.
        joint_type: String,
        /// The joint carrying it.
        joint: String,
    },

    /// Reference to undefined link.
    #[error("reference to undefined link: {link_name} in joint {joint_name}")]
    UndefinedLink {
        /// The link name that was referenced.
        link_name: String,
        /// The joint that referenced it.
        joint_name: String,
    },

    /// Duplicate link name.
    #[error("duplicate link name: {0}")]
    DuplicateLink(String),

    /// Duplicate joint name.
    #[error("duplicate joint name: {0}")]
    DuplicateJoint(String),

    /// A link has more than one parent joint.
    #[error("link [{link}] has multiple parent joints: {first}, {second}")]
    MultipleParents {
        /// The child link.
        link: String,
        /// First parent joint seen.
        first: String,
        /// Second parent joint seen.
        second: String,
    },

    /// Kinematic loop detected.
    #[error("kinematic loop detected: {0}")]
    KinematicLoop(String),

    /// No root link found.
    #[error("no root link found (all links are children of joints)")]
    NoRootLink,

    /// Multiple root links found.
    #[error("multiple root links found: {0:?}")]
    MultipleRootLinks(Vec<String>),
}

impl UrdfError {
    /// Create a missing element error.
    pub fn missing_element(element: &'static str, context: impl Into<String>) -> Self {
        Self::MissingElement {
            element,
            context: context.into(),
        }
    }

    /// Create a missing attribute error.
    pub fn missing_attribute(attribute: &'static str, element: impl Into<String>) -> Self {
        Self::MissingAttribute {
            attribute,
            element: element.into(),
        }
    }

    /// Create an undefined link error.
    pub fn undefined_link(link_name: impl Into<String>, joint_name: impl Into<String>) -> Self {
        Self::UndefinedLink {
            link_name: link_name.into(),
            joint_name: joint_name.into(),
        }
    }
}
