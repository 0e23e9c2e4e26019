//! Writes a (possibly reduced) URDF model as an SDF 1.3 element tree.

use super::ConversionConfig;
use super::extension::ExtensionTable;
use super::model::{
    DEFAULT_GROUP, Geometry, JointType, LUMP_PREFIX, LinkId, UrdfLink, UrdfModel, WORLD_LINK,
};
use crate::pose::Pose;
use crate::schema::SDF_VERSION;
use crate::xml::XmlElement;
use glam::DVec3;
use tracing::{debug, error, warn};

fn vec3_text(v: DVec3) -> String {
    format!("{} {} {}", v.x, v.y, v.z)
}

fn key_value(key: &str, value: impl ToString) -> XmlElement {
    XmlElement::new(key).with_text(value.to_string())
}

/// Walks the link tree and builds `<sdf><model>..</model></sdf>`.
pub(crate) struct Emitter<'a> {
    model: &'a UrdfModel,
    extensions: &'a ExtensionTable,
    config: &'a ConversionConfig,
}

impl<'a> Emitter<'a> {
    pub(crate) fn new(
        model: &'a UrdfModel,
        extensions: &'a ExtensionTable,
        config: &'a ConversionConfig,
    ) -> Self {
        Self {
            model,
            extensions,
            config,
        }
    }

    pub(crate) fn emit(&self) -> XmlElement {
        let mut robot = XmlElement::new("model").with_attribute("name", self.model.name.as_str());

        let root = &self.model.links[self.model.root];
        if root.name == WORLD_LINK {
            for &child in &root.child_links {
                self.create_sdf(&mut robot, child, Pose::IDENTITY);
            }
        } else {
            self.create_sdf(&mut robot, self.model.root, Pose::IDENTITY);
        }

        self.extensions.insert_into_robot(&mut robot);
        XmlElement::new("sdf")
            .with_attribute("version", SDF_VERSION)
            .with_child(robot)
    }

    /// Emits `link` unless it was lumped, then recurses into its children.
    /// `transform` is the pose of the nearest emitted ancestor in the model frame.
    fn create_sdf(&self, robot: &mut XmlElement, link: LinkId, transform: Pose) {
        let current = &self.model.links[link];

        if current.name != WORLD_LINK && current.is_massless() {
            let joint = self
                .model
                .parent_joint(link)
                .map_or("", |j| j.name.as_str());
            warn!(
                "urdf2sdf: link [{}] has no inertia, {} child links ignored, parent joint [{}] ignored, not modeled in sdf",
                current.name,
                current.child_links.len(),
                joint
            );
            return;
        }

        let mut transform = transform;
        let lumped = self.config.reduce_fixed_joints
            && !self.model.parent_is_world(link)
            && self.model.is_fixed_child(link);
        if !lumped {
            transform = self.create_link(robot, link, transform);
        }

        for &child in &current.child_links {
            self.create_sdf(robot, child, transform);
        }
    }

    /// Appends `<link>` and its parent `<joint>`, returning the link's pose in the model frame.
    fn create_link(&self, robot: &mut XmlElement, link: LinkId, transform: Pose) -> Pose {
        let current = &self.model.links[link];
        let joint_origin = self
            .model
            .parent_joint(link)
            .map_or(Pose::IDENTITY, |j| j.parent_to_joint);
        let pose = joint_origin.transform_to_parent_frame(&transform);
        debug!("emitting link [{}] at [{}]", current.name, pose);

        let mut elem = XmlElement::new("link")
            .with_attribute("name", current.name.as_str())
            .with_child(key_value("pose", pose));

        if let Some(inertial) = &current.inertial {
            if inertial.origin.has_rotation() {
                error!(
                    "inertial frame of link [{}] is rotated, SDF 1.3 cannot express that",
                    current.name
                );
            }
            let inertia = XmlElement::new("inertia")
                .with_child(key_value("ixx", inertial.ixx))
                .with_child(key_value("ixy", inertial.ixy))
                .with_child(key_value("ixz", inertial.ixz))
                .with_child(key_value("iyy", inertial.iyy))
                .with_child(key_value("iyz", inertial.iyz))
                .with_child(key_value("izz", inertial.izz));
            elem.push_child(
                XmlElement::new("inertial")
                    .with_child(key_value("pose", inertial.origin))
                    .with_child(key_value("mass", inertial.mass))
                    .with_child(inertia),
            );
        }

        self.create_collisions(&mut elem, current);
        self.create_visuals(&mut elem, current);
        self.extensions.insert_into_link(&mut elem, &current.name);

        robot.push_child(elem);
        self.create_joint(robot, link, &pose);
        pose
    }

    fn create_collisions(&self, elem: &mut XmlElement, link: &UrdfLink) {
        for (group, items) in &link.collision_groups {
            let source = source_link(group, &link.name);
            for (count, &id) in items.iter().enumerate() {
                let prefix = group_prefix(group, &link.name, count);
                let name = if prefix == link.name {
                    format!("{}_collision", link.name)
                } else {
                    format!("{}_collision_{}", link.name, prefix)
                };
                let collision = &self.model.collisions[id];
                let mut out = XmlElement::new("collision")
                    .with_attribute("name", name)
                    .with_child(key_value("pose", collision.origin));
                if let Some(geometry) = &collision.geometry {
                    out.push_child(create_geometry(geometry, &link.name));
                }
                self.extensions.insert_into_collision(&mut out, source);
                elem.push_child(out);
            }
        }
    }

    fn create_visuals(&self, elem: &mut XmlElement, link: &UrdfLink) {
        for (group, items) in &link.visual_groups {
            let source = source_link(group, &link.name);
            for (count, &id) in items.iter().enumerate() {
                let prefix = group_prefix(group, &link.name, count);
                let name = if prefix == link.name {
                    format!("{}_vis", link.name)
                } else {
                    format!("{}_vis_{}", link.name, prefix)
                };
                let visual = &self.model.visuals[id];
                let mut out = XmlElement::new("visual")
                    .with_attribute("name", name)
                    .with_child(key_value("pose", visual.origin));
                if let Some(geometry) = &visual.geometry {
                    out.push_child(create_geometry(geometry, &link.name));
                }
                if let Some(color) = visual.material.as_ref().and_then(|m| m.color) {
                    out.push_child(
                        XmlElement::new("material")
                            .with_child(key_value("ambient", color))
                            .with_child(key_value("diffuse", color)),
                    );
                }
                self.extensions.insert_into_visual(&mut out, source);
                elem.push_child(out);
            }
        }
    }

    fn create_joint(&self, robot: &mut XmlElement, link: LinkId, pose: &Pose) {
        let current = &self.model.links[link];
        let (Some(joint), Some(parent)) = (self.model.parent_joint(link), current.parent) else {
            return;
        };
        let parent_name = &self.model.links[parent].name;

        let sdf_type = match joint.joint_type {
            JointType::Continuous | JointType::Revolute | JointType::Fixed => "revolute",
            JointType::Prismatic => "prismatic",
            JointType::Floating | JointType::Planar => {
                debug!(
                    "joint [{}] is {}, leaving [{}] free",
                    joint.name,
                    joint.joint_type.as_str(),
                    current.name
                );
                return;
            }
        };
        if joint.joint_type == JointType::Fixed
            && parent_name != WORLD_LINK
            && self.config.reduce_fixed_joints
        {
            return;
        }

        let mut axis =
            XmlElement::new("axis").with_child(key_value("xyz", vec3_text(pose.rot * joint.axis)));
        if joint.joint_type == JointType::Fixed {
            axis.push_child(
                XmlElement::new("limit")
                    .with_child(key_value("lower", 0))
                    .with_child(key_value("upper", 0)),
            );
            axis.push_child(XmlElement::new("dynamics").with_child(key_value("damping", 0)));
        } else {
            if self.config.enforce_limits
                && joint.joint_type != JointType::Continuous
                && let Some(limits) = joint.limits
            {
                let (mut lower, mut upper) = (limits.lower, limits.upper);
                if lower > upper {
                    warn!(
                        "joint [{}] has lower limit {} above upper limit {}, swapping",
                        joint.name, lower, upper
                    );
                    std::mem::swap(&mut lower, &mut upper);
                }
                axis.push_child(
                    XmlElement::new("limit")
                        .with_child(key_value("lower", lower))
                        .with_child(key_value("upper", upper))
                        .with_child(key_value("effort", limits.effort))
                        .with_child(key_value("velocity", limits.velocity)),
                );
            }

            if let Some(dynamics) = joint.dynamics {
                axis.push_child(
                    XmlElement::new("dynamics")
                        .with_child(key_value("damping", dynamics.damping))
                        .with_child(key_value("friction", dynamics.friction)),
                );
            }
        }

        let mut elem = XmlElement::new("joint")
            .with_attribute("name", joint.name.as_str())
            .with_attribute("type", sdf_type)
            .with_child(key_value("child", &current.name))
            .with_child(key_value("parent", parent_name))
            .with_child(axis);
        self.extensions.insert_into_joint(&mut elem, &joint.name);
        robot.push_child(elem);
    }
}

/// Name suffix source for an item in `group`.
fn group_prefix(group: &str, link_name: &str, count: usize) -> String {
    let base = if group == DEFAULT_GROUP {
        link_name
    } else if let Some(lumped) = group.strip_prefix(LUMP_PREFIX) {
        lumped
    } else {
        return match count {
            0 => format!("{link_name}_{group}"),
            n => format!("{link_name}_{group}_{n}"),
        };
    };
    match count {
        0 => base.to_string(),
        n => format!("{base}_{n}"),
    }
}

/// Link whose extension records apply to items of `group`.
fn source_link<'g>(group: &'g str, link_name: &'g str) -> &'g str {
    group.strip_prefix(LUMP_PREFIX).unwrap_or(link_name)
}

fn create_geometry(geometry: &Geometry, link_name: &str) -> XmlElement {
    let shape = match geometry {
        Geometry::Box { size } => XmlElement::new("box").with_child(key_value("size", vec3_text(*size))),
        Geometry::Cylinder { radius, length } => XmlElement::new("cylinder")
            .with_child(key_value("length", length))
            .with_child(key_value("radius", radius)),
        Geometry::Sphere { radius } => {
            XmlElement::new("sphere").with_child(key_value("radius", radius))
        }
        Geometry::Mesh { filename, scale } => {
            if filename.is_empty() {
                error!("mesh geometry of link [{}] has no filename", link_name);
            }
            let uri = match filename.strip_prefix("package://") {
                Some(rest) => format!("model://{rest}"),
                None => filename.clone(),
            };
            XmlElement::new("mesh")
                .with_child(key_value("scale", vec3_text(*scale)))
                .with_child(key_value("uri", uri))
        }
    };
    XmlElement::new("geometry").with_child(shape)
}
