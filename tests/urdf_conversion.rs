// tests/urdf_conversion.rs
use sdformat_tree::{ConversionConfig, SdfDocument, UrdfConverter, XmlElement};

fn convert(urdf: &str) -> XmlElement {
    let doc = UrdfConverter::default().init_model_string(urdf);
    doc.root
        .and_then(|sdf| sdf.first_child("model").cloned())
        .expect("conversion produced a model")
}

fn path<'a>(elem: &'a XmlElement, names: &[&str]) -> Option<&'a XmlElement> {
    names
        .iter()
        .try_fold(elem, |e, name| e.first_child(name))
}

const WHEELED: &str = r#"
    <robot name="cart">
      <material name="grey"><color rgba="0.5 0.5 0.5 1"/></material>
      <link name="body">
        <inertial><mass value="5"/><inertia ixx="1" ixy="0" ixz="0" iyy="1" iyz="0" izz="1"/></inertial>
        <visual>
          <geometry><mesh filename="package://cart/meshes/body.stl" scale="0.001 0.001 0.001"/></geometry>
          <material name="grey"/>
        </visual>
      </link>
      <link name="wheel">
        <inertial><mass value="1"/><inertia ixx="1" ixy="0" ixz="0" iyy="1" iyz="0" izz="1"/></inertial>
        <collision><geometry><cylinder radius="0.1" length="0.05"/></geometry></collision>
      </link>
      <link name="lift">
        <inertial><mass value="1"/><inertia ixx="1" ixy="0" ixz="0" iyy="1" iyz="0" izz="1"/></inertial>
      </link>
      <joint name="axle" type="continuous">
        <parent link="body"/><child link="wheel"/>
        <origin xyz="0 0.3 0" rpy="0 0 1.5707963267948966"/>
        <axis xyz="1 0 0"/>
        <limit lower="0" upper="0" effort="5" velocity="10"/>
        <dynamics damping="0.2" friction="0.1"/>
      </joint>
      <joint name="mast" type="prismatic">
        <parent link="body"/><child link="lift"/>
        <axis xyz="0 0 1"/>
        <limit lower="0.5" upper="-0.5" effort="100" velocity="0.1"/>
      </joint>
      <sdf reference="wheel"><mu1>0.9</mu1><kd>10</kd></sdf>
      <sdf reference="axle"><stopCfm>0.01</stopCfm><stopErp>0.5</stopErp><provideFeedback>true</provideFeedback></sdf>
      <sdf reference="body"><material>Gazebo/Grey</material><gravity>false</gravity></sdf>
      <sdf><static>true</static><plugin name="diff" filename="libdiff.so"><bodyName>body</bodyName></plugin></sdf>
    </robot>"#;

#[test]
fn test_continuous_joint_has_no_limit() {
    let model = convert(WHEELED);
    let axle = model
        .children_named("joint")
        .find(|j| j.attribute("name") == Some("axle"))
        .unwrap();
    assert_eq!(axle.attribute("type"), Some("revolute"));
    assert!(path(axle, &["axis", "limit"]).is_none());
    assert_eq!(
        path(axle, &["axis", "dynamics", "damping"]).unwrap().key_value(),
        "0.2"
    );
    assert_eq!(
        path(axle, &["axis", "dynamics", "friction"]).unwrap().key_value(),
        "0.1"
    );

    // the axis is expressed in the model frame, rotated with the joint
    let xyz: Vec<f64> = path(axle, &["axis", "xyz"])
        .unwrap()
        .key_value()
        .split_whitespace()
        .map(|v| v.parse().unwrap())
        .collect();
    assert!(xyz[0].abs() < 1e-12);
    assert!((xyz[1] - 1.0).abs() < 1e-12);
}

#[test]
fn test_inverted_limits_swapped() {
    let model = convert(WHEELED);
    let mast = model
        .children_named("joint")
        .find(|j| j.attribute("name") == Some("mast"))
        .unwrap();
    assert_eq!(mast.attribute("type"), Some("prismatic"));
    assert_eq!(path(mast, &["axis", "limit", "lower"]).unwrap().key_value(), "-0.5");
    assert_eq!(path(mast, &["axis", "limit", "upper"]).unwrap().key_value(), "0.5");
    assert_eq!(path(mast, &["axis", "limit", "effort"]).unwrap().key_value(), "100");
}

#[test]
fn test_limits_not_enforced() {
    let converter = UrdfConverter::new(ConversionConfig {
        enforce_limits: false,
        ..Default::default()
    });
    let doc = converter.init_model_string(WHEELED);
    let model = doc.root.unwrap();
    let model = model.first_child("model").unwrap();
    assert!(
        model
            .children_named("joint")
            .all(|j| path(j, &["axis", "limit"]).is_none())
    );
}

#[test]
fn test_mesh_and_materials() {
    let model = convert(WHEELED);
    let body = model.first_child("link").unwrap();
    let visual = body.first_child("visual").unwrap();
    assert_eq!(visual.attribute("name"), Some("body_vis"));
    assert_eq!(
        path(visual, &["geometry", "mesh", "uri"]).unwrap().key_value(),
        "model://cart/meshes/body.stl"
    );
    assert_eq!(
        path(visual, &["material", "script", "name"]).unwrap().key_value(),
        "Gazebo/Grey"
    );
    assert_eq!(body.first_child("gravity").unwrap().key_value(), "false");
}

#[test]
fn test_collision_surface_from_extension() {
    let model = convert(WHEELED);
    let wheel = model
        .children_named("link")
        .find(|l| l.attribute("name") == Some("wheel"))
        .unwrap();
    let collision = wheel.first_child("collision").unwrap();
    assert_eq!(collision.attribute("name"), Some("wheel_collision"));
    assert_eq!(
        path(collision, &["surface", "friction", "ode", "mu"]).unwrap().key_value(),
        "0.9"
    );
    assert_eq!(
        path(collision, &["surface", "contact", "ode", "kd"]).unwrap().key_value(),
        "10"
    );
}

#[test]
fn test_joint_and_robot_extensions() {
    let model = convert(WHEELED);
    let axle = model
        .children_named("joint")
        .find(|j| j.attribute("name") == Some("axle"))
        .unwrap();
    let ode = path(axle, &["physics", "ode"]).unwrap();
    assert_eq!(ode.first_child("provide_feedback").unwrap().key_value(), "true");
    assert_eq!(path(ode, &["limit", "cfm"]).unwrap().key_value(), "0.01");
    assert_eq!(path(ode, &["limit", "erp"]).unwrap().key_value(), "0.5");

    assert_eq!(model.first_child("static").unwrap().key_value(), "true");
    let plugin = model.first_child("plugin").unwrap();
    assert_eq!(plugin.attribute("filename"), Some("libdiff.so"));
}

#[test]
fn test_invalid_urdf_gives_empty_document() {
    let converter = UrdfConverter::default();
    assert!(!converter.init_model_string("<robot name='r'><link").is_valid());
    assert!(
        !converter
            .init_model_string("<robot name='r'><link name='a'/><link name='a'/></robot>")
            .is_valid()
    );
    assert!(converter.to_sdf_document("<robot/>").is_err());
}

#[test]
fn test_document_accepts_urdf_text() {
    let mut doc = SdfDocument::new().unwrap();
    doc.set_from_string(WHEELED).unwrap();
    assert_eq!(doc.version(), "1.3");

    let model = doc.root().find_element("model").unwrap();
    assert_eq!(model.get::<String>("name"), "cart");
    assert!(model.get::<bool>("static"));

    let text = doc.to_string();
    assert!(text.contains("<link name='wheel'>"));
    assert!(text.contains("<plugin name='diff' filename='libdiff.so'>"));
}

#[test]
fn test_conversion_output_serializes() {
    let doc = UrdfConverter::default().init_model_string(WHEELED);
    let text = doc.to_xml_string().unwrap();
    assert!(text.starts_with("<?xml version='1.0' ?>"));
    let back = XmlElement::parse(&text).unwrap();
    assert_eq!(Some(back), doc.root);
}

const LEGGED: &str = r#"
    <robot name="walker">
      <link name="leg">
        <inertial><mass value="2"/><inertia ixx="1" ixy="0" ixz="0" iyy="1" iyz="0" izz="1"/></inertial>
        <collision><geometry><box size="0.1 0.1 0.5"/></geometry></collision>
      </link>
      <link name="foot">
        <inertial><mass value="0.5"/><inertia ixx="1" ixy="0" ixz="0" iyy="1" iyz="0" izz="1"/></inertial>
        <collision><geometry><sphere radius="0.05"/></geometry></collision>
      </link>
      <joint name="ankle" type="fixed">
        <parent link="leg"/><child link="foot"/>
        <origin xyz="0 0 -0.25"/>
      </joint>
      <sdf reference="foot">
        <sensor name="touch" type="contact"><contact><collision>foot_collision</collision></contact></sensor>
      </sdf>
    </robot>"#;

#[test]
fn test_contact_sensor_follows_lumped_collision() {
    let model = convert(LEGGED);
    let leg = model.first_child("link").unwrap();
    assert_eq!(leg.attribute("name"), Some("leg"));

    let collisions: Vec<_> = leg
        .children_named("collision")
        .filter_map(|c| c.attribute("name"))
        .collect();
    assert_eq!(collisions, vec!["leg_collision", "leg_collision_foot"]);

    let watched = path(leg, &["sensor", "contact", "collision"])
        .unwrap()
        .key_value();
    assert_eq!(watched, "leg_collision_foot");
    assert!(collisions.contains(&watched.as_str()));
}

#[test]
fn test_extension_flags_ignore_case() {
    let model = convert(
        r#"<robot name="arm">
             <link name="arm">
               <inertial><mass value="1"/><inertia ixx="1" ixy="0" ixz="0" iyy="1" iyz="0" izz="1"/></inertial>
             </link>
             <sdf reference="arm"><gravity>False</gravity><selfCollide>TRUE</selfCollide></sdf>
             <sdf><static>Yes</static></sdf>
           </robot>"#,
    );
    let arm = model.first_child("link").unwrap();
    assert_eq!(arm.first_child("gravity").unwrap().key_value(), "false");
    assert_eq!(arm.first_child("self_collide").unwrap().key_value(), "true");
    assert_eq!(model.first_child("static").unwrap().key_value(), "true");
}
