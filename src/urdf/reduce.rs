//! Fixed-joint reduction: lumping rigidly attached links into their parents.

use super::extension::ExtensionTable;
use super::model::{JointType, LUMP_PREFIX, LinkId, UrdfInertial, UrdfModel, WORLD_LINK};
use crate::pose::Pose;
use glam::{DMat3, DQuat, DVec3};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Lumps every link attached by a fixed joint (other than to `world`) into its parent.
///
/// Mass, visuals, collisions and extension records move up; joints of the
/// lumped link's movable children are re-expressed relative to the nearest
/// ancestor that will still exist. Lumped links stay in the tree so later
/// passes can still walk through them.
pub fn reduce_fixed_joints(model: &mut UrdfModel, extensions: &mut ExtensionTable) {
    reduce_link(model, extensions, model.root);
}

fn reduce_link(model: &mut UrdfModel, extensions: &mut ExtensionTable, link: LinkId) {
    let children = model.links[link].child_links.clone();

    for &child in &children {
        if model.is_fixed_child(child) {
            reduce_link(model, extensions, child);
        }
    }

    if let Some(parent) = model.links[link].parent
        && model.links[parent].name != WORLD_LINK
        && model.is_fixed_child(link)
        && let Some(joint) = model.links[link].parent_joint
    {
        let origin = model.joints[joint].parent_to_joint;
        let link_name = model.links[link].name.clone();
        let parent_name = model.links[parent].name.clone();
        debug!(
            "lumping link [{}] into [{}] across fixed joint [{}]",
            link_name, parent_name, model.joints[joint].name
        );

        extensions.reduce_to_parent(&link_name, &parent_name, &origin);
        lump_inertial(model, link, parent, &origin);
        lump_visuals(model, link, parent, &origin);
        lump_collisions(model, link, parent, &origin);
        rehome_joints(model, link);
    }

    for &child in &children {
        if !model.is_fixed_child(child) {
            reduce_link(model, extensions, child);
        }
    }
}

/// Group a lumped item lands in: lumped groups keep their name, the rest
/// are tagged with the link they came from.
fn lump_group(group: &str, link_name: &str) -> String {
    if group.starts_with(LUMP_PREFIX) {
        group.to_string()
    } else {
        format!("{LUMP_PREFIX}{link_name}")
    }
}

fn lumped_items(groups: &BTreeMap<String, Vec<usize>>, link_name: &str) -> Vec<(String, usize)> {
    groups
        .iter()
        .flat_map(|(group, items)| {
            let target = lump_group(group, link_name);
            items.iter().map(move |&id| (target.clone(), id))
        })
        .collect()
}

fn lump_visuals(model: &mut UrdfModel, link: LinkId, parent: LinkId, origin: &Pose) {
    let link_name = model.links[link].name.clone();
    let parent_name = model.links[parent].name.clone();
    for (group, id) in lumped_items(&model.links[link].visual_groups, &link_name) {
        let items = model.links[parent].visual_groups.entry(group).or_default();
        if items.contains(&id) {
            warn!(
                "visual from link [{}] already lumped into [{}], skipping",
                link_name, parent_name
            );
            continue;
        }
        items.push(id);
        model.visuals[id].origin = model.visuals[id].origin.transform_to_parent_frame(origin);
    }
}

fn lump_collisions(model: &mut UrdfModel, link: LinkId, parent: LinkId, origin: &Pose) {
    let link_name = model.links[link].name.clone();
    let parent_name = model.links[parent].name.clone();
    for (group, id) in lumped_items(&model.links[link].collision_groups, &link_name) {
        let items = model.links[parent].collision_groups.entry(group).or_default();
        if items.contains(&id) {
            warn!(
                "collision from link [{}] already lumped into [{}], skipping",
                link_name, parent_name
            );
            continue;
        }
        items.push(id);
        model.collisions[id].origin = model.collisions[id].origin.transform_to_parent_frame(origin);
    }
}

/// Points each movable child joint of `link` at the nearest surviving ancestor.
fn rehome_joints(model: &mut UrdfModel, link: LinkId) {
    for child in model.links[link].child_links.clone() {
        let Some(joint) = model.links[child].parent_joint else {
            continue;
        };
        if model.joints[joint].joint_type == JointType::Fixed {
            continue;
        }

        let mut new_parent = link;
        while let (Some(up_joint), Some(up)) = (
            model.links[new_parent].parent_joint,
            model.links[new_parent].parent,
        ) {
            if model.links[up].name == WORLD_LINK
                || model.joints[up_joint].joint_type != JointType::Fixed
            {
                break;
            }
            let step = model.joints[up_joint].parent_to_joint;
            model.joints[joint].parent_to_joint =
                model.joints[joint].parent_to_joint.transform_to_parent_frame(&step);
            new_parent = up;
        }

        debug!(
            "joint [{}] now attaches [{}] to [{}]",
            model.joints[joint].name, model.links[child].name, model.links[new_parent].name
        );
        model.links[child].parent = Some(new_parent);
        model.joints[joint].parent_link_name = model.links[new_parent].name.clone();
    }
}

fn inertia_matrix(i: &UrdfInertial) -> DMat3 {
    DMat3::from_cols(
        DVec3::new(i.ixx, i.ixy, i.ixz),
        DVec3::new(i.ixy, i.iyy, i.iyz),
        DVec3::new(i.ixz, i.iyz, i.izz),
    )
}

/// Inertia of a point mass at offset `d`: `m (|d|^2 E - d d^T)`.
fn point_mass_inertia(mass: f64, d: DVec3) -> DMat3 {
    let outer = DMat3::from_cols(d * d.x, d * d.y, d * d.z);
    (DMat3::from_diagonal(DVec3::splat(d.length_squared())) - outer) * mass
}

/// Rotates an inertia tensor from a frame rotated by `rot` into the outer frame.
fn rotate_inertia(inertia: DMat3, rot: DQuat) -> DMat3 {
    let r = DMat3::from_quat(rot);
    r * inertia * r.transpose()
}

/// Combines two inertials given in the same frame about their joint center of mass.
pub(crate) fn combine_inertials(a: &UrdfInertial, b: &UrdfInertial) -> Option<UrdfInertial> {
    let mass = a.mass + b.mass;
    if mass <= 0.0 {
        return None;
    }
    let com = (a.origin.pos * a.mass + b.origin.pos * b.mass) / mass;

    let ia = rotate_inertia(inertia_matrix(a), a.origin.rot)
        + point_mass_inertia(a.mass, a.origin.pos - com);
    let ib = rotate_inertia(inertia_matrix(b), b.origin.rot)
        + point_mass_inertia(b.mass, b.origin.pos - com);
    let total = ia + ib;

    Some(UrdfInertial {
        origin: Pose::new(com, DQuat::IDENTITY),
        mass,
        ixx: total.x_axis.x,
        ixy: total.y_axis.x,
        ixz: total.z_axis.x,
        iyy: total.y_axis.y,
        iyz: total.z_axis.y,
        izz: total.z_axis.z,
    })
}

/// Adds the child's mass properties to the parent, expressed in the parent frame.
fn lump_inertial(model: &mut UrdfModel, link: LinkId, parent: LinkId, origin: &Pose) {
    let Some(child) = model.links[link].inertial else {
        return;
    };
    let child_in_parent = UrdfInertial {
        origin: child.origin.transform_to_parent_frame(origin),
        ..child
    };
    let combined = match &model.links[parent].inertial {
        Some(own) => combine_inertials(own, &child_in_parent),
        None => Some(child_in_parent),
    };
    if let Some(combined) = combined {
        model.links[parent].inertial = Some(combined);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit(pos: DVec3) -> UrdfInertial {
        UrdfInertial {
            origin: Pose::new(pos, DQuat::IDENTITY),
            mass: 1.0,
            ixx: 1.0,
            iyy: 1.0,
            izz: 1.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_parallel_axis() {
        let combined = combine_inertials(&unit(DVec3::ZERO), &unit(DVec3::X)).unwrap();
        assert_relative_eq!(combined.mass, 2.0);
        assert_relative_eq!(combined.origin.pos.x, 0.5);
        assert_relative_eq!(combined.ixx, 2.0);
        assert_relative_eq!(combined.iyy, 2.5);
        assert_relative_eq!(combined.izz, 2.5);
        assert_relative_eq!(combined.ixy, 0.0);
    }

    #[test]
    fn test_rotated_inertia() {
        let mut slab = unit(DVec3::ZERO);
        slab.ixx = 3.0;
        slab.origin.rot = DQuat::from_rotation_z(std::f64::consts::FRAC_PI_2);
        let massless = UrdfInertial::default();
        let combined = combine_inertials(&slab, &massless).unwrap();
        assert_relative_eq!(combined.ixx, 1.0, epsilon = 1e-12);
        assert_relative_eq!(combined.iyy, 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_lump_moves_visuals_and_rehomes() {
        let mut model = UrdfModel::parse(
            r#"<robot name="r">
                 <link name="base"><inertial><mass value="1"/></inertial></link>
                 <link name="bracket">
                   <inertial><mass value="1"/></inertial>
                   <visual><geometry><sphere radius="0.1"/></geometry></visual>
                 </link>
                 <link name="wheel"><inertial><mass value="1"/></inertial></link>
                 <joint name="mount" type="fixed">
                   <parent link="base"/><child link="bracket"/><origin xyz="0 0 1"/>
                 </joint>
                 <joint name="axle" type="continuous">
                   <parent link="bracket"/><child link="wheel"/><origin xyz="1 0 0"/>
                 </joint>
               </robot>"#,
        )
        .unwrap();
        let mut extensions = ExtensionTable::new();
        reduce_fixed_joints(&mut model, &mut extensions);

        let base = model.link_by_name("base").unwrap();
        let wheel = model.link_by_name("wheel").unwrap();
        let lumped = &model.links[base].visual_groups["lump::bracket"];
        assert_eq!(lumped.len(), 1);
        assert_relative_eq!(model.visuals[lumped[0]].origin.pos.z, 1.0);

        assert_eq!(model.links[wheel].parent, Some(base));
        let axle = model.parent_joint(wheel).unwrap();
        assert_eq!(axle.parent_link_name, "base");
        assert_relative_eq!(axle.parent_to_joint.pos.x, 1.0);
        assert_relative_eq!(axle.parent_to_joint.pos.z, 1.0);

        assert_relative_eq!(model.links[base].inertial.unwrap().mass, 2.0);
    }

    #[test]
    fn test_world_attachment_kept() {
        let mut model = UrdfModel::parse(
            r#"<robot name="r">
                 <link name="world"/>
                 <link name="base"><inertial><mass value="1"/></inertial></link>
                 <joint name="anchor" type="fixed"><parent link="world"/><child link="base"/></joint>
               </robot>"#,
        )
        .unwrap();
        let before = model.clone();
        reduce_fixed_joints(&mut model, &mut ExtensionTable::new());
        assert_eq!(model, before);
    }
}
