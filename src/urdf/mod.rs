//! URDF to SDF conversion.
//!
//! The pipeline is: parse `<robot>` into a [`UrdfModel`], collect extension
//! blocks into an [`ExtensionTable`], optionally lump fixed joints, then walk
//! the tree writing SDF 1.3. The table lives only for one conversion.

pub mod emit;
pub mod extension;
pub mod model;
pub mod reduce;

pub use extension::{ExtensionTable, FRAME_REWRITE_RULES, FrameRef, FrameRewriteRule, SdfExtension};
pub use model::{
    Geometry, JointDynamics, JointLimits, JointType, UrdfCollision, UrdfInertial, UrdfJoint,
    UrdfLink, UrdfMaterial, UrdfModel, UrdfVisual,
};
pub use reduce::reduce_fixed_joints;

use crate::document::SdfDocument;
use crate::error::{SdfError, UrdfError};
use crate::xml::{XmlDocument, XmlElement};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Options for a conversion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// Write joint limits for limited joints.
    pub enforce_limits: bool,
    /// Lump links attached by fixed joints into their parents.
    pub reduce_fixed_joints: bool,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            enforce_limits: true,
            reduce_fixed_joints: true,
        }
    }
}

/// Converts URDF robots into SDF documents.
#[derive(Clone, Debug, Default)]
pub struct UrdfConverter {
    config: ConversionConfig,
}

impl UrdfConverter {
    pub fn new(config: ConversionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// Converts a parsed `<robot>` element into an `<sdf>` element.
    pub fn convert(&self, robot: &XmlElement) -> Result<XmlElement, UrdfError> {
        let mut model = UrdfModel::from_xml(robot)?;
        let mut extensions = ExtensionTable::from_robot(robot);

        if self.config.reduce_fixed_joints {
            reduce_fixed_joints(&mut model, &mut extensions);
        }

        info!(
            "converting URDF robot [{}] with {} links",
            model.name,
            model.links.len()
        );
        Ok(emit::Emitter::new(&model, &extensions, &self.config).emit())
    }

    /// Converts URDF text. Failures are logged and yield an empty document.
    pub fn init_model_string(&self, text: &str) -> XmlDocument {
        match XmlDocument::parse(text) {
            Ok(doc) => self.init_model_doc(&doc),
            Err(e) => {
                error!("unable to parse URDF: {}", e);
                XmlDocument::default()
            }
        }
    }

    /// Converts a parsed URDF document. Failures are logged and yield an empty document.
    pub fn init_model_doc(&self, doc: &XmlDocument) -> XmlDocument {
        let Some(robot) = &doc.root else {
            error!("URDF document has no root element");
            return XmlDocument::default();
        };
        match self.convert(robot) {
            Ok(sdf) => XmlDocument::new(sdf),
            Err(e) => {
                error!("unable to convert URDF: {}", e);
                XmlDocument::default()
            }
        }
    }

    /// Converts URDF text and reads the result into a schema-backed document.
    pub fn to_sdf_document(&self, text: &str) -> Result<SdfDocument, SdfError> {
        let converted = self.init_model_string(text);
        let sdf = converted.root.ok_or(SdfError::Conversion)?;
        let mut doc = SdfDocument::new()?;
        doc.read_sdf(&sdf)?;
        Ok(doc)
    }
}
