// tests/fixed_joint_reduction.rs
use approx::assert_relative_eq;
use glam::{DQuat, DVec3};
use sdformat_tree::urdf::{ExtensionTable, UrdfModel, reduce_fixed_joints};
use sdformat_tree::{ConversionConfig, Pose, UrdfConverter, XmlElement};
use std::f64::consts::FRAC_PI_2;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Registry;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

struct WarnCounter(Arc<AtomicUsize>);

impl<S: Subscriber> Layer<S> for WarnCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::WARN {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

fn count_warnings<T>(f: impl FnOnce() -> T) -> (T, usize) {
    let count = Arc::new(AtomicUsize::new(0));
    let subscriber = Registry::default().with(WarnCounter(count.clone()));
    let out = tracing::subscriber::with_default(subscriber, f);
    (out, count.load(Ordering::SeqCst))
}

fn reduced(urdf: &str) -> UrdfModel {
    let mut model = UrdfModel::parse(urdf).unwrap();
    reduce_fixed_joints(&mut model, &mut ExtensionTable::new());
    model
}

fn children<'a>(elem: &'a XmlElement, name: &'a str) -> Vec<&'a XmlElement> {
    elem.children_named(name).collect()
}

fn model_of(doc: &sdformat_tree::XmlDocument) -> &XmlElement {
    doc.root.as_ref().unwrap().first_child("model").unwrap()
}

const INERTIAL: &str = r#"<inertial><mass value="1"/><inertia ixx="1" ixy="0" ixz="0" iyy="1" iyz="0" izz="1"/></inertial>"#;

#[test]
fn test_lump_group_name_is_stable() {
    let urdf = format!(
        r#"<robot name="rover">
             <link name="base">{INERTIAL}</link>
             <link name="chassis">{INERTIAL}<collision><geometry><box size="1 1 1"/></geometry></collision></link>
             <link name="wheel">{INERTIAL}<collision><geometry><sphere radius="0.2"/></geometry></collision></link>
             <joint name="deck" type="fixed"><parent link="base"/><child link="chassis"/></joint>
             <joint name="hub" type="fixed"><parent link="chassis"/><child link="wheel"/></joint>
           </robot>"#
    );
    let model = reduced(&urdf);

    let chassis = &model.links[model.link_by_name("chassis").unwrap()];
    assert!(chassis.collision_groups.contains_key("lump::wheel"));

    let base = &model.links[model.link_by_name("base").unwrap()];
    let groups: Vec<&str> = base.collision_groups.keys().map(String::as_str).collect();
    assert_eq!(groups, vec!["lump::chassis", "lump::wheel"]);
    assert_relative_eq!(base.inertial.unwrap().mass, 3.0);
}

#[test]
fn test_transform_composition_order() {
    let joint = Pose::new(DVec3::new(1.0, 0.0, 0.0), DQuat::from_rotation_z(FRAC_PI_2));
    let child = Pose::new(DVec3::new(1.0, 0.0, 0.0), DQuat::IDENTITY);
    let result = child.transform_to_parent_frame(&joint);
    assert_relative_eq!(result.pos.x, 1.0, epsilon = 1e-12);
    assert_relative_eq!(result.pos.y, 1.0, epsilon = 1e-12);
    assert_relative_eq!(result.pos.z, 0.0, epsilon = 1e-12);
    assert_relative_eq!(result.rpy().z, FRAC_PI_2, epsilon = 1e-12);

    // the same numbers through an actual lump
    let urdf = format!(
        r#"<robot name="r">
             <link name="body">{INERTIAL}</link>
             <link name="lamp">{INERTIAL}
               <visual><origin xyz="1 0 0"/><geometry><sphere radius="0.1"/></geometry></visual>
             </link>
             <joint name="mount" type="fixed">
               <parent link="body"/><child link="lamp"/>
               <origin xyz="1 0 0" rpy="0 0 1.5707963267948966"/>
             </joint>
           </robot>"#
    );
    let model = reduced(&urdf);
    let body = &model.links[model.link_by_name("body").unwrap()];
    let id = body.visual_groups["lump::lamp"][0];
    let origin = model.visuals[id].origin;
    assert_relative_eq!(origin.pos.x, 1.0, epsilon = 1e-12);
    assert_relative_eq!(origin.pos.y, 1.0, epsilon = 1e-12);
    assert_relative_eq!(origin.rpy().z, FRAC_PI_2, epsilon = 1e-12);
}

#[test]
fn test_world_child_never_lumped() {
    let urdf = format!(
        r#"<robot name="r">
             <link name="world"/>
             <link name="base">{INERTIAL}<visual><geometry><box size="1 1 1"/></geometry></visual></link>
             <joint name="anchor" type="fixed"><parent link="world"/><child link="base"/></joint>
           </robot>"#
    );
    let model = reduced(&urdf);
    let world = &model.links[model.link_by_name("world").unwrap()];
    assert!(world.visual_groups.is_empty());
    assert!(world.inertial.is_none());

    let doc = UrdfConverter::default().init_model_string(&urdf);
    let sdf_model = model_of(&doc);
    let links = children(sdf_model, "link");
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].attribute("name"), Some("base"));

    let joint = sdf_model.first_child("joint").unwrap();
    assert_eq!(joint.attribute("type"), Some("revolute"));
    assert_eq!(joint.first_child("parent").unwrap().key_value(), "world");
    let limit = joint
        .first_child("axis")
        .and_then(|a| a.first_child("limit"))
        .unwrap();
    assert_eq!(limit.first_child("lower").unwrap().key_value(), "0");
    assert_eq!(limit.first_child("upper").unwrap().key_value(), "0");
}

#[test]
fn test_massless_link_pruned_with_one_warning() {
    let urdf = format!(
        r#"<robot name="r">
             <link name="chassis">{INERTIAL}</link>
             <link name="frame"/>
             <link name="left">{INERTIAL}</link>
             <link name="right">{INERTIAL}</link>
             <joint name="j0" type="revolute"><parent link="chassis"/><child link="frame"/></joint>
             <joint name="j1" type="revolute"><parent link="frame"/><child link="left"/></joint>
             <joint name="j2" type="revolute"><parent link="frame"/><child link="right"/></joint>
           </robot>"#
    );
    let (doc, warnings) =
        count_warnings(|| UrdfConverter::default().init_model_string(&urdf));
    assert_eq!(warnings, 1);

    let sdf_model = model_of(&doc);
    let links: Vec<&str> = children(sdf_model, "link")
        .iter()
        .filter_map(|l| l.attribute("name"))
        .collect();
    assert_eq!(links, vec!["chassis"]);
    assert!(sdf_model.first_child("joint").is_none());
}

const CHAIN: &str = r#"
    <robot name="chain">
      <link name="world"/>
      <link name="base">
        <inertial><mass value="2"/><inertia ixx="1" ixy="0" ixz="0" iyy="1" iyz="0" izz="1"/></inertial>
      </link>
      <link name="link1">
        <inertial><mass value="1"/><inertia ixx="1" ixy="0" ixz="0" iyy="1" iyz="0" izz="1"/></inertial>
        <collision><geometry><box size="0.1 0.1 1"/></geometry></collision>
      </link>
      <link name="link2">
        <inertial><mass value="0.5"/><inertia ixx="0.1" ixy="0" ixz="0" iyy="0.1" iyz="0" izz="0.1"/></inertial>
        <visual><origin xyz="0 0 0.1"/><geometry><cylinder radius="0.05" length="0.2"/></geometry></visual>
        <collision><origin xyz="0 0 0.1"/><geometry><cylinder radius="0.05" length="0.2"/></geometry></collision>
      </link>
      <joint name="anchor" type="fixed"><parent link="world"/><child link="base"/></joint>
      <joint name="shoulder" type="revolute">
        <parent link="base"/><child link="link1"/>
        <origin xyz="0 0 0.5"/><axis xyz="0 1 0"/>
        <limit lower="-1.5" upper="1.5" effort="20" velocity="3"/>
      </joint>
      <joint name="wrist" type="fixed">
        <parent link="link1"/><child link="link2"/><origin xyz="0 0 1"/>
      </joint>
      <sdf reference="link2">
        <sensor name="tip_cam" type="camera"><pose>0 0 0.2 0 0 0</pose></sensor>
      </sdf>
    </robot>"#;

#[test]
fn test_chain_end_to_end() {
    let (doc, warnings) =
        count_warnings(|| UrdfConverter::default().init_model_string(CHAIN));
    assert_eq!(warnings, 0);

    let sdf_model = model_of(&doc);
    let links = children(sdf_model, "link");
    let names: Vec<&str> = links.iter().filter_map(|l| l.attribute("name")).collect();
    assert_eq!(names, vec!["base", "link1"]);

    let joints = children(sdf_model, "joint");
    assert_eq!(joints.len(), 2);
    let shoulder = joints
        .iter()
        .find(|j| j.attribute("name") == Some("shoulder"))
        .unwrap();
    assert_eq!(shoulder.attribute("type"), Some("revolute"));
    assert_eq!(shoulder.first_child("parent").unwrap().key_value(), "base");
    assert_eq!(shoulder.first_child("child").unwrap().key_value(), "link1");
    assert!(joints.iter().all(|j| j.attribute("name") != Some("wrist")));

    let link1 = links[1];
    assert_eq!(link1.first_child("pose").unwrap().key_value(), "0 0 0.5 0 0 0");

    let visuals: Vec<&str> = link1
        .children_named("visual")
        .filter_map(|v| v.attribute("name"))
        .collect();
    assert_eq!(visuals, vec!["link1_vis_link2"]);
    let collisions: Vec<&str> = link1
        .children_named("collision")
        .filter_map(|c| c.attribute("name"))
        .collect();
    assert_eq!(collisions, vec!["link1_collision", "link1_collision_link2"]);

    let lumped = link1
        .children_named("visual")
        .next()
        .and_then(|v| v.first_child("pose"))
        .unwrap();
    assert_eq!(lumped.key_value(), "0 0 1.1 0 0 0");

    let mass: f64 = link1
        .first_child("inertial")
        .and_then(|i| i.first_child("mass"))
        .unwrap()
        .key_value()
        .parse()
        .unwrap();
    assert_relative_eq!(mass, 1.5);

    // the sensor followed link2 into link1, carried across the wrist
    let sensor = link1.first_child("sensor").unwrap();
    let pose: Pose = sensor.first_child("pose").unwrap().key_value().parse().unwrap();
    assert_relative_eq!(pose.pos.z, 1.2, epsilon = 1e-12);
}

#[test]
fn test_chain_reads_into_document() {
    let doc = UrdfConverter::default().to_sdf_document(CHAIN).unwrap();
    let model = doc.root().find_element("model").unwrap();
    assert_eq!(model.get::<String>("name"), "chain");

    let link1 = model
        .elements()
        .into_iter()
        .find(|e| e.name() == "link" && e.get::<String>("name") == "link1")
        .unwrap();
    assert_relative_eq!(link1.get::<Pose>("pose").pos.z, 0.5);
    let limit = model
        .find_element("joint")
        .and_then(|j| j.next_element("joint"))
        .and_then(|j| j.find_element("axis"))
        .and_then(|a| a.find_element("limit"))
        .unwrap();
    assert_relative_eq!(limit.get::<f64>("upper"), 1.5);
}

#[test]
fn test_reduction_disabled_keeps_fixed_links() {
    let converter = UrdfConverter::new(ConversionConfig {
        reduce_fixed_joints: false,
        ..Default::default()
    });
    let doc = converter.init_model_string(CHAIN);
    let sdf_model = model_of(&doc);
    let names: Vec<&str> = children(sdf_model, "link")
        .iter()
        .filter_map(|l| l.attribute("name"))
        .collect();
    assert_eq!(names, vec!["base", "link1", "link2"]);

    let wrist = children(sdf_model, "joint")
        .into_iter()
        .find(|j| j.attribute("name") == Some("wrist"))
        .unwrap();
    assert_eq!(wrist.attribute("type"), Some("revolute"));
}
