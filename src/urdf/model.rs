//! The URDF robot model: an arena of links, joints, visuals and collisions.
//!
//! Links refer to each other by index into [`UrdfModel::links`], so the tree
//! can be rewired during fixed-joint reduction without shared ownership.
//! Visuals and collisions live in their own arenas; a link's groups hold
//! indices, which is what lets a lumped item be recognised if it is offered
//! to the same group twice.

use crate::error::UrdfError;
use crate::pose::{Color, Pose, parse_f64s};
use crate::xml::XmlElement;
use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use tracing::{debug, error};

/// Index of a link in [`UrdfModel::links`].
pub type LinkId = usize;
/// Index of a joint in [`UrdfModel::joints`].
pub type JointId = usize;
/// Index of a visual in [`UrdfModel::visuals`].
pub type VisualId = usize;
/// Index of a collision in [`UrdfModel::collisions`].
pub type CollisionId = usize;

/// Name of the group that unlumped visuals and collisions belong to.
pub const DEFAULT_GROUP: &str = "default";
/// Prefix of groups created by lumping a child link into its parent.
pub const LUMP_PREFIX: &str = "lump::";
/// Name of the pseudo-link that anchors a robot to the environment.
pub const WORLD_LINK: &str = "world";

/// URDF joint types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JointType {
    /// Rotation about an axis with limits.
    Revolute,
    /// Unlimited rotation about an axis.
    Continuous,
    /// Translation along an axis.
    Prismatic,
    /// Rigid attachment.
    Fixed,
    /// Six degrees of freedom.
    Floating,
    /// Motion in a plane.
    Planar,
}

impl JointType {
    /// Parses the URDF `type` attribute.
    pub fn from_urdf(s: &str) -> Option<Self> {
        match s {
            "revolute" => Some(Self::Revolute),
            "continuous" => Some(Self::Continuous),
            "prismatic" => Some(Self::Prismatic),
            "fixed" => Some(Self::Fixed),
            "floating" => Some(Self::Floating),
            "planar" => Some(Self::Planar),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Revolute => "revolute",
            Self::Continuous => "continuous",
            Self::Prismatic => "prismatic",
            Self::Fixed => "fixed",
            Self::Floating => "floating",
            Self::Planar => "planar",
        }
    }
}

/// Joint limits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct JointLimits {
    pub lower: f64,
    pub upper: f64,
    pub effort: f64,
    pub velocity: f64,
}

/// Joint damping and friction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct JointDynamics {
    pub damping: f64,
    pub friction: f64,
}

/// A joint connecting a parent link to a child link.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UrdfJoint {
    pub name: String,
    pub joint_type: JointType,
    /// Name of the parent link. Rewritten when the joint is re-homed.
    pub parent_link_name: String,
    pub child_link_name: String,
    /// Pose of the joint frame in the parent link frame.
    pub parent_to_joint: Pose,
    /// Joint axis in the joint frame.
    pub axis: DVec3,
    pub limits: Option<JointLimits>,
    pub dynamics: Option<JointDynamics>,
}

/// Mass properties of a link.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UrdfInertial {
    /// Center of mass frame in the link frame.
    pub origin: Pose,
    pub mass: f64,
    pub ixx: f64,
    pub ixy: f64,
    pub ixz: f64,
    pub iyy: f64,
    pub iyz: f64,
    pub izz: f64,
}

/// Collision or visual geometry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    Box { size: DVec3 },
    Cylinder { radius: f64, length: f64 },
    Sphere { radius: f64 },
    Mesh { filename: String, scale: DVec3 },
}

/// A material reference, resolved against the robot-level materials.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UrdfMaterial {
    pub name: String,
    pub color: Option<Color>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UrdfVisual {
    pub origin: Pose,
    pub geometry: Option<Geometry>,
    pub material: Option<UrdfMaterial>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UrdfCollision {
    pub origin: Pose,
    pub geometry: Option<Geometry>,
}

/// A link and its place in the tree.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UrdfLink {
    pub name: String,
    pub inertial: Option<UrdfInertial>,
    /// Visuals by group name.
    pub visual_groups: BTreeMap<String, Vec<VisualId>>,
    /// Collisions by group name.
    pub collision_groups: BTreeMap<String, Vec<CollisionId>>,
    pub parent: Option<LinkId>,
    pub parent_joint: Option<JointId>,
    /// Children in joint document order.
    pub child_links: Vec<LinkId>,
    pub child_joints: Vec<JointId>,
}

impl UrdfLink {
    /// True when the link has no usable mass.
    pub fn is_massless(&self) -> bool {
        self.inertial.is_none_or(|i| i.mass.abs() < 1e-6)
    }
}

/// A validated URDF robot.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UrdfModel {
    pub name: String,
    pub links: Vec<UrdfLink>,
    pub joints: Vec<UrdfJoint>,
    pub visuals: Vec<UrdfVisual>,
    pub collisions: Vec<UrdfCollision>,
    /// The unique link without a parent joint.
    pub root: LinkId,
}

impl UrdfModel {
    /// Parses and validates URDF text.
    pub fn parse(text: &str) -> Result<Self, UrdfError> {
        let xml = XmlElement::parse(text)?;
        Self::from_xml(&xml)
    }

    /// Builds a model from a parsed `<robot>` element.
    ///
    /// Malformed numbers are logged and read as zero. Structural problems
    /// (duplicate names, dangling joints, several roots, unreachable links)
    /// are errors.
    pub fn from_xml(robot: &XmlElement) -> Result<Self, UrdfError> {
        if robot.name != "robot" {
            return Err(UrdfError::missing_element("robot", "document"));
        }
        let name = robot
            .attribute("name")
            .ok_or_else(|| UrdfError::missing_attribute("name", "robot"))?;

        let mut model = UrdfModel {
            name: name.to_string(),
            ..Default::default()
        };

        let materials: HashMap<String, UrdfMaterial> = robot
            .children_named("material")
            .filter_map(|m| {
                let material = parse_material(m, &HashMap::new());
                (!material.name.is_empty()).then(|| (material.name.clone(), material))
            })
            .collect();

        let mut link_index: HashMap<String, LinkId> = HashMap::new();
        for xml in robot.children_named("link") {
            let link = model.parse_link(xml, &materials)?;
            if link_index.insert(link.name.clone(), model.links.len()).is_some() {
                return Err(UrdfError::DuplicateLink(link.name));
            }
            model.links.push(link);
        }

        let mut joint_names = HashSet::new();
        for xml in robot.children_named("joint") {
            let joint = parse_joint(xml)?;
            if !joint_names.insert(joint.name.clone()) {
                return Err(UrdfError::DuplicateJoint(joint.name));
            }
            model.joints.push(joint);
        }

        model.connect(&link_index)?;
        model.root = model.find_root()?;
        model.check_reachable()?;

        debug!(
            "parsed URDF robot [{}]: {} links, {} joints, root [{}]",
            model.name,
            model.links.len(),
            model.joints.len(),
            model.links[model.root].name
        );
        Ok(model)
    }

    pub fn link(&self, id: LinkId) -> &UrdfLink {
        &self.links[id]
    }

    pub fn link_by_name(&self, name: &str) -> Option<LinkId> {
        self.links.iter().position(|l| l.name == name)
    }

    pub fn joint_by_name(&self, name: &str) -> Option<JointId> {
        self.joints.iter().position(|j| j.name == name)
    }

    /// The joint connecting `link` to its parent.
    pub fn parent_joint(&self, link: LinkId) -> Option<&UrdfJoint> {
        self.links[link].parent_joint.map(|j| &self.joints[j])
    }

    /// True when `link` hangs off its parent by a fixed joint.
    pub fn is_fixed_child(&self, link: LinkId) -> bool {
        self.parent_joint(link)
            .is_some_and(|j| j.joint_type == JointType::Fixed)
    }

    /// True when `link`'s parent is the world pseudo-link.
    pub fn parent_is_world(&self, link: LinkId) -> bool {
        self.links[link]
            .parent
            .is_some_and(|p| self.links[p].name == WORLD_LINK)
    }

    fn parse_link(
        &mut self,
        xml: &XmlElement,
        materials: &HashMap<String, UrdfMaterial>,
    ) -> Result<UrdfLink, UrdfError> {
        let name = xml
            .attribute("name")
            .ok_or_else(|| UrdfError::missing_attribute("name", "link"))?;
        let mut link = UrdfLink {
            name: name.to_string(),
            inertial: xml.first_child("inertial").map(parse_inertial),
            ..Default::default()
        };

        for visual in xml.children_named("visual") {
            let group = visual.attribute("group").unwrap_or(DEFAULT_GROUP);
            self.visuals.push(UrdfVisual {
                origin: parse_origin(visual.first_child("origin")),
                geometry: parse_geometry(visual.first_child("geometry"), name),
                material: visual
                    .first_child("material")
                    .map(|m| parse_material(m, materials)),
            });
            link.visual_groups
                .entry(group.to_string())
                .or_default()
                .push(self.visuals.len() - 1);
        }

        for collision in xml.children_named("collision") {
            let group = collision.attribute("group").unwrap_or(DEFAULT_GROUP);
            self.collisions.push(UrdfCollision {
                origin: parse_origin(collision.first_child("origin")),
                geometry: parse_geometry(collision.first_child("geometry"), name),
            });
            link.collision_groups
                .entry(group.to_string())
                .or_default()
                .push(self.collisions.len() - 1);
        }
        Ok(link)
    }

    /// Resolves joint endpoints into parent and child indices.
    fn connect(&mut self, link_index: &HashMap<String, LinkId>) -> Result<(), UrdfError> {
        for (jid, joint) in self.joints.iter().enumerate() {
            let parent = *link_index
                .get(&joint.parent_link_name)
                .ok_or_else(|| UrdfError::undefined_link(&joint.parent_link_name, &joint.name))?;
            let child = *link_index
                .get(&joint.child_link_name)
                .ok_or_else(|| UrdfError::undefined_link(&joint.child_link_name, &joint.name))?;

            if let Some(existing) = self.links[child].parent_joint {
                return Err(UrdfError::MultipleParents {
                    link: joint.child_link_name.clone(),
                    first: self.joints[existing].name.clone(),
                    second: joint.name.clone(),
                });
            }
            self.links[child].parent = Some(parent);
            self.links[child].parent_joint = Some(jid);
            self.links[parent].child_links.push(child);
            self.links[parent].child_joints.push(jid);
        }
        Ok(())
    }

    fn find_root(&self) -> Result<LinkId, UrdfError> {
        let roots: Vec<LinkId> = (0..self.links.len())
            .filter(|&id| self.links[id].parent.is_none())
            .collect();
        match roots.as_slice() {
            [] => Err(UrdfError::NoRootLink),
            [root] => Ok(*root),
            _ => Err(UrdfError::MultipleRootLinks(
                roots.iter().map(|&id| self.links[id].name.clone()).collect(),
            )),
        }
    }

    /// With one parent per link, any link not reached from the root sits on a cycle.
    fn check_reachable(&self) -> Result<(), UrdfError> {
        let mut seen = vec![false; self.links.len()];
        let mut queue = VecDeque::from([self.root]);
        seen[self.root] = true;
        while let Some(id) = queue.pop_front() {
            for &child in &self.links[id].child_links {
                if !seen[child] {
                    seen[child] = true;
                    queue.push_back(child);
                }
            }
        }

        let unreachable: Vec<&str> = self
            .links
            .iter()
            .zip(&seen)
            .filter(|(_, seen)| !**seen)
            .map(|(l, _)| l.name.as_str())
            .collect();
        if unreachable.is_empty() {
            Ok(())
        } else {
            Err(UrdfError::KinematicLoop(format!(
                "links not reachable from the root: {}",
                unreachable.join(", ")
            )))
        }
    }
}

fn parse_joint(xml: &XmlElement) -> Result<UrdfJoint, UrdfError> {
    let name = xml
        .attribute("name")
        .ok_or_else(|| UrdfError::missing_attribute("name", "joint"))?;
    let type_str = xml
        .attribute("type")
        .ok_or_else(|| UrdfError::missing_attribute("type", format!("joint '{name}'")))?;
    let joint_type = JointType::from_urdf(type_str).ok_or_else(|| UrdfError::UnknownJointType {
        joint_type: type_str.to_string(),
        joint: name.to_string(),
    })?;

    let parent = xml
        .first_child("parent")
        .ok_or_else(|| UrdfError::missing_element("parent", format!("joint '{name}'")))?
        .attribute("link")
        .ok_or_else(|| UrdfError::missing_attribute("link", format!("parent of joint '{name}'")))?;
    let child = xml
        .first_child("child")
        .ok_or_else(|| UrdfError::missing_element("child", format!("joint '{name}'")))?
        .attribute("link")
        .ok_or_else(|| UrdfError::missing_attribute("link", format!("child of joint '{name}'")))?;

    let axis = xml
        .first_child("axis")
        .and_then(|a| a.attribute("xyz"))
        .map_or(DVec3::X, |xyz| parse_vector3(xyz, "axis xyz"));

    let limits = xml.first_child("limit").map(|l| JointLimits {
        lower: parse_f64_attr(l, "lower"),
        upper: parse_f64_attr(l, "upper"),
        effort: parse_f64_attr(l, "effort"),
        velocity: parse_f64_attr(l, "velocity"),
    });
    let dynamics = xml.first_child("dynamics").map(|d| JointDynamics {
        damping: parse_f64_attr(d, "damping"),
        friction: parse_f64_attr(d, "friction"),
    });

    Ok(UrdfJoint {
        name: name.to_string(),
        joint_type,
        parent_link_name: parent.to_string(),
        child_link_name: child.to_string(),
        parent_to_joint: parse_origin(xml.first_child("origin")),
        axis,
        limits,
        dynamics,
    })
}

fn parse_inertial(xml: &XmlElement) -> UrdfInertial {
    let mass = xml
        .first_child("mass")
        .map_or(0.0, |m| parse_f64_attr(m, "value"));
    let inertia = xml.first_child("inertia");
    let entry = |key: &str| inertia.map_or(0.0, |i| parse_f64_attr(i, key));
    UrdfInertial {
        origin: parse_origin(xml.first_child("origin")),
        mass,
        ixx: entry("ixx"),
        ixy: entry("ixy"),
        ixz: entry("ixz"),
        iyy: entry("iyy"),
        iyz: entry("iyz"),
        izz: entry("izz"),
    }
}

fn parse_origin(xml: Option<&XmlElement>) -> Pose {
    let Some(xml) = xml else {
        return Pose::IDENTITY;
    };
    let xyz = xml
        .attribute("xyz")
        .map_or(DVec3::ZERO, |s| parse_vector3(s, "origin xyz"));
    let rpy = xml
        .attribute("rpy")
        .map_or(DVec3::ZERO, |s| parse_vector3(s, "origin rpy"));
    Pose::from_xyz_rpy(xyz, rpy)
}

fn parse_geometry(xml: Option<&XmlElement>, link: &str) -> Option<Geometry> {
    let shape = xml?.children.first()?;
    let geometry = match shape.name.as_str() {
        "box" => Geometry::Box {
            size: shape
                .attribute("size")
                .map_or(DVec3::ZERO, |s| parse_vector3(s, "box size")),
        },
        "cylinder" => Geometry::Cylinder {
            radius: parse_f64_attr(shape, "radius"),
            length: parse_f64_attr(shape, "length"),
        },
        "sphere" => Geometry::Sphere {
            radius: parse_f64_attr(shape, "radius"),
        },
        "mesh" => Geometry::Mesh {
            filename: shape.attribute("filename").unwrap_or_default().to_string(),
            scale: shape
                .attribute("scale")
                .map_or(DVec3::ONE, |s| parse_vector3(s, "mesh scale")),
        },
        other => {
            error!("unknown geometry <{}> in link [{}]", other, link);
            return None;
        }
    };
    Some(geometry)
}

fn parse_material(xml: &XmlElement, materials: &HashMap<String, UrdfMaterial>) -> UrdfMaterial {
    let name = xml.attribute("name").unwrap_or_default().to_string();
    let color = xml
        .first_child("color")
        .and_then(|c| c.attribute("rgba"))
        .and_then(|rgba| match rgba.parse::<Color>() {
            Ok(color) => Some(color),
            Err(e) => {
                error!("malformed material color [{}]: {}", rgba, e);
                None
            }
        });
    // SDF 1.3 materials have no texture slot.
    if color.is_none()
        && let Some(named) = materials.get(&name)
    {
        return named.clone();
    }
    UrdfMaterial { name, color }
}

fn parse_f64_attr(xml: &XmlElement, key: &str) -> f64 {
    match xml.attribute(key) {
        Some(text) => text.trim().parse().unwrap_or_else(|_| {
            error!("unable to parse [{}] as a number for <{} {}>", text, xml.name, key);
            0.0
        }),
        None => 0.0,
    }
}

/// Parses three numbers, logging and returning zero on malformed input.
pub(crate) fn parse_vector3(text: &str, what: &str) -> DVec3 {
    match parse_f64s(text).as_deref() {
        Some([x, y, z]) => DVec3::new(*x, *y, *z),
        _ => {
            error!("unable to parse [{}] as three numbers for {}", text, what);
            DVec3::ZERO
        }
    }
}
