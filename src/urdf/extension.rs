//! Simulator extensions attached to URDF links, joints and the robot.
//!
//! `<sdf reference="..">` (and the legacy `<gazebo reference="..">`) blocks
//! carry settings URDF has no words for. They are parsed once into an
//! [`ExtensionTable`] keyed by the referenced name; the empty key holds
//! robot-level records. Fixed-joint reduction moves records from a lumped
//! link to its parent and rewrites link names inside the opaque blobs
//! according to [`FRAME_REWRITE_RULES`].

use crate::pose::Pose;
use crate::xml::XmlElement;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, error};

/// Tags recognised as extension blocks.
pub const EXTENSION_TAGS: &[&str] = &["sdf", "gazebo"];

/// Script file that named visual materials resolve against.
pub const MATERIAL_SCRIPT_URI: &str = "file://media/materials/scripts/gazebo.material";

/// Settings collected from one extension block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SdfExtension {
    /// Link the record was written against, kept across reductions.
    pub old_link_name: String,
    /// Accumulated transform from the original link to the current owner.
    pub reduction_transform: Pose,

    pub material: Option<String>,
    pub is_static: bool,
    pub gravity: bool,
    pub self_collide: bool,
    pub damping_factor: Option<f64>,

    pub mu1: Option<f64>,
    pub mu2: Option<f64>,
    pub fdir1: Option<String>,
    pub kp: Option<f64>,
    pub kd: Option<f64>,
    pub max_vel: Option<f64>,
    pub min_depth: Option<f64>,
    pub laser_retro: Option<f64>,

    pub stop_cfm: Option<f64>,
    pub stop_erp: Option<f64>,
    pub fudge_factor: Option<f64>,
    /// Parsed for completeness; SDF 1.3 has nowhere to put it.
    pub initial_joint_position: Option<f64>,
    pub provide_feedback: bool,
    pub cfm_damping: bool,

    /// Children not recognised above, copied through verbatim.
    #[serde(skip)]
    pub blobs: Vec<XmlElement>,
}

impl Default for SdfExtension {
    fn default() -> Self {
        Self {
            old_link_name: String::new(),
            reduction_transform: Pose::IDENTITY,
            material: None,
            is_static: false,
            gravity: true,
            self_collide: false,
            damping_factor: None,
            mu1: None,
            mu2: None,
            fdir1: None,
            kp: None,
            kd: None,
            max_vel: None,
            min_depth: None,
            laser_retro: None,
            stop_cfm: None,
            stop_erp: None,
            fudge_factor: None,
            initial_joint_position: None,
            provide_feedback: false,
            cfm_damping: false,
            blobs: Vec::new(),
        }
    }
}

impl SdfExtension {
    /// Reads the children of one extension block.
    pub fn from_xml(xml: &XmlElement, reference: &str) -> Self {
        let mut ext = Self {
            old_link_name: reference.to_string(),
            ..Self::default()
        };

        for child in &xml.children {
            let value = child.key_value();
            match child.name.as_str() {
                "material" => ext.material = Some(value),
                "static" => ext.is_static = parse_true(&value),
                "gravity" => ext.gravity = !parse_false(&value),
                "selfCollide" => ext.self_collide = parse_true(&value),
                "provideFeedback" => ext.provide_feedback = parse_true(&value),
                "cfmDamping" => ext.cfm_damping = parse_true(&value),
                "fdir1" => ext.fdir1 = Some(value),
                "dampingFactor" => ext.damping_factor = parse_number(child),
                "mu1" => ext.mu1 = parse_number(child),
                "mu2" => ext.mu2 = parse_number(child),
                "kp" => ext.kp = parse_number(child),
                "kd" => ext.kd = parse_number(child),
                "maxVel" => ext.max_vel = parse_number(child),
                "minDepth" => ext.min_depth = parse_number(child),
                "laserRetro" => ext.laser_retro = parse_number(child),
                "stopCfm" => ext.stop_cfm = parse_number(child),
                "stopErp" => ext.stop_erp = parse_number(child),
                "fudgeFactor" => ext.fudge_factor = parse_number(child),
                "initialJointPosition" => ext.initial_joint_position = parse_number(child),
                _ => ext.blobs.push(child.clone()),
            }
        }
        ext
    }

    /// Moves this record one fixed joint up the tree.
    fn reduce(&mut self, joint_origin: &Pose) {
        self.reduction_transform = self.reduction_transform.transform_to_parent_frame(joint_origin);
        for blob in &mut self.blobs {
            if blob.name == "sensor" || blob.name == "projector" {
                compose_blob_pose(blob, joint_origin);
            }
        }
    }
}

fn parse_true(value: &str) -> bool {
    ["true", "yes", "1"]
        .iter()
        .any(|t| value.eq_ignore_ascii_case(t))
}

fn parse_false(value: &str) -> bool {
    ["false", "no", "0"]
        .iter()
        .any(|f| value.eq_ignore_ascii_case(f))
}

fn parse_number(xml: &XmlElement) -> Option<f64> {
    let value = xml.key_value();
    match value.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            error!("unable to parse extension <{}> value [{}]", xml.name, value);
            None
        }
    }
}

/// How a blob field names a link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameRef {
    /// `<link>_collision`, the name the emitter gives a link's first collision.
    CollisionName,
    /// The link name; the blob's `xyzOffset`/`rpyOffset` move with it.
    LinkWithOffset,
    /// The link name.
    LinkName,
    /// A `<link>/<item>` path.
    LinkPath,
}

/// One place inside a blob that may name a lumped link.
#[derive(Clone, Copy, Debug)]
pub struct FrameRewriteRule {
    /// Blob tag the rule applies to, or `None` for any blob.
    pub blob: Option<&'static str>,
    /// Child path from the blob to the field.
    pub path: &'static [&'static str],
    pub kind: FrameRef,
}

/// Fields rewritten when a link is lumped into its parent.
pub const FRAME_REWRITE_RULES: &[FrameRewriteRule] = &[
    FrameRewriteRule {
        blob: Some("sensor"),
        path: &["contact", "collision"],
        kind: FrameRef::CollisionName,
    },
    FrameRewriteRule {
        blob: Some("plugin"),
        path: &["bodyName"],
        kind: FrameRef::LinkWithOffset,
    },
    FrameRewriteRule {
        blob: Some("plugin"),
        path: &["frameName"],
        kind: FrameRef::LinkWithOffset,
    },
    FrameRewriteRule {
        blob: None,
        path: &["projector"],
        kind: FrameRef::LinkPath,
    },
    FrameRewriteRule {
        blob: Some("gripper"),
        path: &["gripper_link"],
        kind: FrameRef::LinkName,
    },
    FrameRewriteRule {
        blob: Some("gripper"),
        path: &["palm_link"],
        kind: FrameRef::LinkName,
    },
    FrameRewriteRule {
        blob: Some("joint"),
        path: &["parent"],
        kind: FrameRef::LinkName,
    },
    FrameRewriteRule {
        blob: Some("joint"),
        path: &["child"],
        kind: FrameRef::LinkName,
    },
];

fn field_at<'a>(blob: &'a mut XmlElement, path: &[&str]) -> Option<&'a mut XmlElement> {
    path.iter()
        .try_fold(blob, |elem, name| elem.first_child_mut(name))
}

fn set_key_value(elem: &mut XmlElement, value: String) {
    if elem.attribute("value").is_some() {
        elem.set_attribute("value", value);
    } else {
        elem.set_text(value);
    }
}

/// Name the emitter gives collision `current` of `link` once it sits in `parent`.
///
/// The link's own collisions land in group `lump::link`, and groups it had
/// already absorbed keep their suffix.
fn lumped_collision_name(current: &str, link: &str, parent: &str) -> Option<String> {
    let suffix = current.strip_prefix(link)?.strip_prefix("_collision")?;
    match suffix.strip_prefix('_') {
        None if suffix.is_empty() => Some(format!("{parent}_collision_{link}")),
        Some(rest) if !rest.is_empty() => Some(format!("{parent}_collision_{rest}")),
        _ => None,
    }
}

/// Rewrites one blob after `link` was lumped into `parent`.
fn rewrite_blob(blob: &mut XmlElement, link: &str, parent: &str, joint_origin: &Pose) {
    let mut move_offsets = false;
    for rule in FRAME_REWRITE_RULES {
        if rule.blob.is_some_and(|tag| tag != blob.name) {
            continue;
        }
        let Some(field) = field_at(blob, rule.path) else {
            continue;
        };
        let current = field.key_value();
        let replacement = match rule.kind {
            FrameRef::CollisionName => lumped_collision_name(&current, link, parent),
            FrameRef::LinkName => (current == link).then(|| parent.to_string()),
            FrameRef::LinkWithOffset => {
                let hit = current == link;
                move_offsets |= hit;
                hit.then(|| parent.to_string())
            }
            FrameRef::LinkPath => match current.split_once('/') {
                Some((owner, item)) if owner == link => Some(format!("{parent}/{item}")),
                Some(_) => None,
                None => {
                    error!("projector reference [{}] has no link/name separator", current);
                    None
                }
            },
        };
        if let Some(replacement) = replacement {
            debug!(
                "rewriting <{}> reference [{}] to [{}]",
                rule.path.join("/"),
                current,
                replacement
            );
            set_key_value(field, replacement);
        }
    }
    if move_offsets {
        move_plugin_offsets(blob, joint_origin);
    }
}

/// Carries a plugin's `xyzOffset`/`rpyOffset` (degrees) across the joint.
fn move_plugin_offsets(plugin: &mut XmlElement, joint_origin: &Pose) {
    let xyz = plugin
        .first_child("xyzOffset")
        .map_or(glam::DVec3::ZERO, |e| {
            super::model::parse_vector3(&e.key_value(), "xyzOffset")
        });
    let rpy_deg = plugin
        .first_child("rpyOffset")
        .map_or(glam::DVec3::ZERO, |e| {
            super::model::parse_vector3(&e.key_value(), "rpyOffset")
        });
    let offset = Pose::from_xyz_rpy(xyz, rpy_deg * std::f64::consts::PI / 180.0);
    let moved = offset.transform_to_parent_frame(joint_origin);
    let rpy = moved.rpy() * 180.0 / std::f64::consts::PI;

    plugin.remove_children("xyzOffset");
    plugin.remove_children("rpyOffset");
    plugin.push_child(XmlElement::new("xyzOffset").with_text(format!(
        "{} {} {}",
        moved.pos.x, moved.pos.y, moved.pos.z
    )));
    plugin.push_child(
        XmlElement::new("rpyOffset").with_text(format!("{} {} {}", rpy.x, rpy.y, rpy.z)),
    );
}

/// Re-expresses a sensor or projector `<pose>` in the parent link frame.
fn compose_blob_pose(blob: &mut XmlElement, joint_origin: &Pose) {
    let pose = match blob.first_child("pose") {
        Some(p) => p.key_value().parse::<Pose>().unwrap_or_else(|e| {
            error!("malformed <{}> pose: {}", blob.name, e);
            Pose::IDENTITY
        }),
        None => Pose::IDENTITY,
    };
    let moved = pose.transform_to_parent_frame(joint_origin);
    blob.remove_children("pose");
    blob.push_child(XmlElement::new("pose").with_text(moved.to_string()));
}

/// Extension records keyed by the link, joint or robot (`""`) they target.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExtensionTable {
    entries: BTreeMap<String, Vec<SdfExtension>>,
}

impl ExtensionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects every extension block directly under `<robot>`.
    pub fn from_robot(robot: &XmlElement) -> Self {
        let mut table = Self::new();
        for child in &robot.children {
            if !EXTENSION_TAGS.contains(&child.name.as_str()) {
                continue;
            }
            let reference = child.attribute("reference").unwrap_or_default();
            table.insert(reference, SdfExtension::from_xml(child, reference));
        }
        debug!("parsed {} extension records", table.len());
        table
    }

    pub fn insert(&mut self, reference: impl Into<String>, ext: SdfExtension) {
        self.entries.entry(reference.into()).or_default().push(ext);
    }

    /// Records keyed by `reference`.
    pub fn get(&self, reference: &str) -> &[SdfExtension] {
        self.entries.get(reference).map_or(&[], Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[SdfExtension])> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Total number of records.
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Moves `link`'s records to `parent` after a fixed-joint lump.
    ///
    /// Every record in the table then has its blobs rewritten so references
    /// to `link` point at `parent`.
    pub fn reduce_to_parent(&mut self, link: &str, parent: &str, joint_origin: &Pose) {
        if let Some(records) = self.entries.remove(link) {
            debug!(
                "moving {} extension records from [{}] to [{}]",
                records.len(),
                link,
                parent
            );
            let target = self.entries.entry(parent.to_string()).or_default();
            for mut ext in records {
                ext.reduce(joint_origin);
                target.push(ext);
            }
        }

        for ext in self.entries.values_mut().flatten() {
            for blob in &mut ext.blobs {
                rewrite_blob(blob, link, parent, joint_origin);
            }
        }
    }

    /// Adds surface and contact settings to a collision that came from `old_link_name`.
    pub fn insert_into_collision(&self, collision: &mut XmlElement, old_link_name: &str) {
        let mut friction = XmlElement::new("ode");
        let mut contact = XmlElement::new("ode");
        let mut matched = false;

        for ext in self
            .entries
            .values()
            .flatten()
            .filter(|e| e.old_link_name == old_link_name)
        {
            matched = true;
            if let Some(mu) = ext.mu1 {
                friction.add_key_value("mu", mu.to_string());
            }
            if let Some(mu2) = ext.mu2 {
                friction.add_key_value("mu2", mu2.to_string());
            }
            if let Some(fdir1) = &ext.fdir1 {
                friction.add_key_value("fdir1", fdir1.clone());
            }
            if let Some(kp) = ext.kp {
                contact.add_key_value("kp", kp.to_string());
            }
            if let Some(kd) = ext.kd {
                contact.add_key_value("kd", kd.to_string());
            }
            if let Some(max_vel) = ext.max_vel {
                contact.add_key_value("max_vel", max_vel.to_string());
            }
            if let Some(min_depth) = ext.min_depth {
                contact.add_key_value("min_depth", min_depth.to_string());
            }
            if let Some(laser_retro) = ext.laser_retro {
                collision.add_key_value("laser_retro", laser_retro.to_string());
            }
        }

        if !matched || (friction.children.is_empty() && contact.children.is_empty()) {
            return;
        }
        let surface = collision.child_mut_or_insert("surface");
        if !friction.children.is_empty() {
            surface.child_mut_or_insert("friction").push_child(friction);
        }
        if !contact.children.is_empty() {
            surface.child_mut_or_insert("contact").push_child(contact);
        }
    }

    /// Adds a script material to a visual that came from `old_link_name`.
    pub fn insert_into_visual(&self, visual: &mut XmlElement, old_link_name: &str) {
        for ext in self
            .entries
            .values()
            .flatten()
            .filter(|e| e.old_link_name == old_link_name)
        {
            if let Some(material) = &ext.material {
                let script = XmlElement::new("script")
                    .with_child(XmlElement::new("uri").with_text(MATERIAL_SCRIPT_URI))
                    .with_child(XmlElement::new("name").with_text(material.clone()));
                visual.remove_children("material");
                visual.push_child(XmlElement::new("material").with_child(script));
            }
        }
    }

    /// Adds link-level settings and blobs for records keyed by `link_name`.
    pub fn insert_into_link(&self, link: &mut XmlElement, link_name: &str) {
        for ext in self.get(link_name) {
            link.add_key_value("gravity", ext.gravity.to_string());
            link.add_key_value("self_collide", ext.self_collide.to_string());
            if let Some(damping) = ext.damping_factor {
                link.remove_children("velocity_decay");
                link.push_child(
                    XmlElement::new("velocity_decay")
                        .with_child(XmlElement::new("linear").with_text(damping.to_string()))
                        .with_child(XmlElement::new("angular").with_text(damping.to_string())),
                );
            }
            link.children.extend(ext.blobs.iter().cloned());
        }
    }

    /// Adds ODE joint physics for records keyed by `joint_name`.
    pub fn insert_into_joint(&self, joint: &mut XmlElement, joint_name: &str) {
        for ext in self.get(joint_name) {
            let ode = joint
                .child_mut_or_insert("physics")
                .child_mut_or_insert("ode");
            ode.add_key_value("provide_feedback", ext.provide_feedback.to_string());
            ode.add_key_value("cfm_damping", ext.cfm_damping.to_string());
            if let Some(fudge) = ext.fudge_factor {
                ode.add_key_value("fudge_factor", fudge.to_string());
            }
            if ext.stop_cfm.is_some() || ext.stop_erp.is_some() {
                let limit = ode.child_mut_or_insert("limit");
                if let Some(cfm) = ext.stop_cfm {
                    limit.add_key_value("cfm", cfm.to_string());
                }
                if let Some(erp) = ext.stop_erp {
                    limit.add_key_value("erp", erp.to_string());
                }
            }
        }
    }

    /// Adds robot-level settings and blobs to the model element.
    pub fn insert_into_robot(&self, model: &mut XmlElement) {
        for ext in self.get("") {
            model.add_key_value("static", ext.is_static.to_string());
            model.children.extend(ext.blobs.iter().cloned());
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::DVec3;

    fn table(text: &str) -> ExtensionTable {
        ExtensionTable::from_robot(&XmlElement::parse(text).unwrap())
    }

    #[test]
    fn test_parse_fields() {
        let t = table(
            r#"<robot name="r">
                 <sdf reference="wheel">
                   <mu1>0.8</mu1><kp value="1e5"/><gravity>no</gravity>
                   <selfCollide>yes</selfCollide><fdir1>1 0 0</fdir1>
                   <sensor name="s" type="contact"/>
                 </sdf>
                 <gazebo><static>true</static></gazebo>
               </robot>"#,
        );
        assert_eq!(t.len(), 2);
        let ext = &t.get("wheel")[0];
        assert_eq!(ext.old_link_name, "wheel");
        assert_eq!(ext.mu1, Some(0.8));
        assert_eq!(ext.kp, Some(1e5));
        assert!(!ext.gravity);
        assert!(ext.self_collide);
        assert_eq!(ext.fdir1.as_deref(), Some("1 0 0"));
        assert_eq!(ext.blobs.len(), 1);
        assert!(t.get("")[0].is_static);
    }

    #[test]
    fn test_malformed_number_left_unset() {
        let t = table(r#"<robot name="r"><sdf reference="a"><mu2>lots</mu2></sdf></robot>"#);
        assert_eq!(t.get("a")[0].mu2, None);
    }

    #[test]
    fn test_reduce_moves_records_and_rewrites_blobs() {
        let mut t = table(
            r#"<robot name="r">
                 <sdf reference="camera">
                   <sensor name="cam" type="camera"><pose>0 0 0.5 0 0 0</pose></sensor>
                 </sdf>
                 <sdf reference="base">
                   <plugin name="p" filename="libp.so">
                     <bodyName>camera</bodyName><xyzOffset>1 0 0</xyzOffset>
                   </plugin>
                   <gripper name="g"><palm_link>camera</palm_link></gripper>
                 </sdf>
               </robot>"#,
        );
        let origin = Pose::from_xyz_rpy(DVec3::new(0.0, 0.0, 1.0), DVec3::ZERO);
        t.reduce_to_parent("camera", "base", &origin);

        assert!(t.get("camera").is_empty());
        let records = t.get("base");
        assert_eq!(records.len(), 2);

        let moved = records.iter().find(|e| e.old_link_name == "camera").unwrap();
        assert_relative_eq!(moved.reduction_transform.pos.z, 1.0);
        let pose: Pose = moved.blobs[0]
            .first_child("pose")
            .unwrap()
            .key_value()
            .parse()
            .unwrap();
        assert_relative_eq!(pose.pos.z, 1.5);

        let own = records.iter().find(|e| e.old_link_name == "base").unwrap();
        let plugin = &own.blobs[0];
        assert_eq!(plugin.first_child("bodyName").unwrap().key_value(), "base");
        assert_eq!(plugin.first_child("xyzOffset").unwrap().key_value(), "1 0 1");
        assert_eq!(
            own.blobs[1].first_child("palm_link").unwrap().key_value(),
            "base"
        );
    }

    #[test]
    fn test_contact_sensor_collision_renamed() {
        let mut t = table(
            r#"<robot name="r"><sdf reference="foot">
                 <sensor name="touch" type="contact"><contact><collision>foot_collision</collision></contact></sensor>
               </sdf></robot>"#,
        );
        t.reduce_to_parent("foot", "leg", &Pose::IDENTITY);
        let sensor = &t.get("leg")[0].blobs[0];
        let collision = sensor
            .first_child("contact")
            .and_then(|c| c.first_child("collision"))
            .unwrap();
        assert_eq!(collision.key_value(), "leg_collision_foot");

        // one more level keeps the absorbed suffix
        t.reduce_to_parent("leg", "hip", &Pose::IDENTITY);
        let sensor = &t.get("hip")[0].blobs[0];
        let collision = sensor
            .first_child("contact")
            .and_then(|c| c.first_child("collision"))
            .unwrap();
        assert_eq!(collision.key_value(), "hip_collision_foot");
    }

    #[test]
    fn test_lumped_collision_name() {
        assert_eq!(
            lumped_collision_name("foot_collision", "foot", "leg").as_deref(),
            Some("leg_collision_foot")
        );
        assert_eq!(
            lumped_collision_name("leg_collision_foot_1", "leg", "hip").as_deref(),
            Some("hip_collision_foot_1")
        );
        assert_eq!(lumped_collision_name("foot_collisions", "foot", "leg"), None);
        assert_eq!(lumped_collision_name("hand_collision", "foot", "leg"), None);
    }

    #[test]
    fn test_boolean_flags_ignore_case() {
        let t = table(
            r#"<robot name="r"><sdf reference="arm">
                 <gravity>False</gravity><selfCollide>TRUE</selfCollide>
               </sdf><sdf><static>Yes</static></sdf></robot>"#,
        );
        let arm = &t.get("arm")[0];
        assert!(!arm.gravity);
        assert!(arm.self_collide);
        assert!(t.get("")[0].is_static);
    }

    #[test]
    fn test_insert_into_collision_single_surface() {
        let t = table(
            r#"<robot name="r">
                 <sdf reference="wheel"><mu1>0.5</mu1></sdf>
                 <sdf reference="wheel"><kp>100</kp><laserRetro>2</laserRetro></sdf>
               </robot>"#,
        );
        let mut collision = XmlElement::new("collision");
        t.insert_into_collision(&mut collision, "wheel");
        assert_eq!(collision.children_named("surface").count(), 1);
        let surface = collision.first_child("surface").unwrap();
        let mu = surface
            .first_child("friction")
            .and_then(|f| f.first_child("ode"))
            .and_then(|o| o.first_child("mu"))
            .unwrap();
        assert_eq!(mu.key_value(), "0.5");
        assert!(surface.first_child("contact").is_some());
        assert_eq!(collision.first_child("laser_retro").unwrap().key_value(), "2");
    }

    #[test]
    fn test_insert_into_joint_cfm_erp() {
        let t = table(
            r#"<robot name="r"><sdf reference="hinge"><stopCfm>0.1</stopCfm><stopErp>0.9</stopErp></sdf></robot>"#,
        );
        let mut joint = XmlElement::new("joint");
        t.insert_into_joint(&mut joint, "hinge");
        let limit = joint
            .first_child("physics")
            .and_then(|p| p.first_child("ode"))
            .and_then(|o| o.first_child("limit"))
            .unwrap();
        assert_eq!(limit.first_child("cfm").unwrap().key_value(), "0.1");
        assert_eq!(limit.first_child("erp").unwrap().key_value(), "0.9");
    }

    #[test]
    fn test_insert_into_visual_material() {
        let t = table(
            r#"<robot name="r"><sdf reference="body"><material>Gazebo/Red</material></sdf></robot>"#,
        );
        let mut visual = XmlElement::new("visual");
        t.insert_into_visual(&mut visual, "body");
        let name = visual
            .first_child("material")
            .and_then(|m| m.first_child("script"))
            .and_then(|s| s.first_child("name"))
            .unwrap();
        assert_eq!(name.key_value(), "Gazebo/Red");
    }
}
