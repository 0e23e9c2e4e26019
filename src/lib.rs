//! # sdformat-tree
//!
//! A schema-driven element tree for the SDF robot description format, with a
//! URDF front end.
//!
//! Element schemas are loaded from description files into [`ElementPtr`]
//! trees whose attributes and values are typed [`Param`]s. Instance documents
//! are read against those schemas by [`read_xml`], and URDF robots are turned
//! into SDF by [`UrdfConverter`], optionally lumping links joined by fixed
//! joints into their parents.

pub mod document;
pub mod element;
pub mod error;
pub mod param;
pub mod pose;
pub mod schema;
pub mod urdf;
pub mod xml;

pub use document::*;
pub use element::*;
pub use error::*;
pub use param::*;
pub use pose::*;
pub use schema::*;
pub use urdf::{ConversionConfig, UrdfConverter};
pub use xml::*;
