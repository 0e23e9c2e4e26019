//! Composite value types carried by parameters: poses, colors and times.
//!
//! All geometry is double precision. Rotations are stored as [`DQuat`] and
//! written as roll/pitch/yaw triples, the convention shared by both SDF and URDF.

use crate::error::ParamError;
use glam::{DQuat, DVec3, EulerRot};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Splits whitespace separated text into floats. `None` if any token is not a number.
pub(crate) fn parse_f64s(text: &str) -> Option<Vec<f64>> {
    text.split_whitespace()
        .map(|tok| tok.parse::<f64>().ok())
        .collect()
}

/// Builds a quaternion from fixed-axis roll, pitch, yaw (radians).
pub fn quat_from_rpy(roll: f64, pitch: f64, yaw: f64) -> DQuat {
    DQuat::from_euler(EulerRot::ZYX, yaw, pitch, roll)
}

/// Returns `(roll, pitch, yaw)` of a quaternion.
pub fn quat_to_rpy(q: DQuat) -> DVec3 {
    let (yaw, pitch, roll) = q.normalize().to_euler(EulerRot::ZYX);
    // Adding zero folds -0.0 into 0.0 so text output stays stable.
    DVec3::new(roll + 0.0, pitch + 0.0, yaw + 0.0)
}

/// Roll, pitch and yaw of `q` as text, rounded to 1e-12 rad. Printed text re-reads to itself.
pub fn rpy_text(q: DQuat) -> String {
    let rpy = quat_to_rpy(q);
    let tidy = |a: f64| (a * 1e12).round() / 1e12 + 0.0;
    format!("{} {} {}", tidy(rpy.x), tidy(rpy.y), tidy(rpy.z))
}

/// A rigid transform: translation followed by rotation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Translation.
    pub pos: DVec3,
    /// Orientation.
    pub rot: DQuat,
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Pose {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        pos: DVec3::ZERO,
        rot: DQuat::IDENTITY,
    };

    pub fn new(pos: DVec3, rot: DQuat) -> Self {
        Self { pos, rot }
    }

    /// Builds a pose from a position and roll/pitch/yaw angles in radians.
    pub fn from_xyz_rpy(xyz: DVec3, rpy: DVec3) -> Self {
        Self {
            pos: xyz,
            rot: quat_from_rpy(rpy.x, rpy.y, rpy.z),
        }
    }

    /// Roll, pitch and yaw of the orientation.
    pub fn rpy(&self) -> DVec3 {
        quat_to_rpy(self.rot)
    }

    /// Re-expresses this pose, given in a child frame, in the parent frame.
    ///
    /// `parent_to_child` is the child frame's pose in the parent. The result is
    /// `R * pos + t` for the position and `R * rot` for the orientation.
    pub fn transform_to_parent_frame(&self, parent_to_child: &Pose) -> Pose {
        Pose {
            pos: parent_to_child.rot * self.pos + parent_to_child.pos,
            rot: (parent_to_child.rot * self.rot).normalize(),
        }
    }

    /// Composes `self` (outer) with `child`, i.e. `child` expressed in `self`'s parent.
    pub fn compose(&self, child: &Pose) -> Pose {
        child.transform_to_parent_frame(self)
    }

    /// The inverse transform.
    pub fn inverse(&self) -> Pose {
        let inv = self.rot.inverse();
        Pose {
            pos: -(inv * self.pos),
            rot: inv,
        }
    }

    /// True when the orientation carries no rotation.
    pub fn has_rotation(&self) -> bool {
        self.rpy().abs().max_element() > 1e-12
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.pos.x,
            self.pos.y,
            self.pos.z,
            rpy_text(self.rot)
        )
    }
}

impl FromStr for Pose {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match parse_f64s(s).as_deref() {
            Some([x, y, z, r, p, yaw]) => Ok(Pose::from_xyz_rpy(
                DVec3::new(*x, *y, *z),
                DVec3::new(*r, *p, *yaw),
            )),
            _ => Err(ParamError::decode("", "pose", s)),
        }
    }
}

/// An RGBA color with components in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Default for Color {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0, 1.0)
    }
}

impl Color {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.r, self.g, self.b, self.a)
    }
}

impl FromStr for Color {
    type Err = ParamError;

    /// Accepts `r g b` or `r g b a`; alpha defaults to 1.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let vals: Option<Vec<f32>> = s
            .split_whitespace()
            .map(|tok| tok.parse::<f32>().ok())
            .collect();
        match vals.as_deref() {
            Some([r, g, b]) => Ok(Color::new(*r, *g, *b, 1.0)),
            Some([r, g, b, a]) => Ok(Color::new(*r, *g, *b, *a)),
            _ => Err(ParamError::decode("", "color", s)),
        }
    }
}

/// Simulation time as whole seconds plus nanoseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Time {
    pub sec: i32,
    pub nsec: i32,
}

impl Time {
    pub const fn new(sec: i32, nsec: i32) -> Self {
        Self { sec, nsec }
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.sec, self.nsec)
    }
}

impl FromStr for Time {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut toks = s.split_whitespace();
        let sec = toks.next().and_then(|t| t.parse::<i32>().ok());
        let nsec = toks.next().map(|t| t.parse::<i32>().ok()).unwrap_or(Some(0));
        match (sec, nsec, toks.next()) {
            (Some(sec), Some(nsec), None) => Ok(Time::new(sec, nsec)),
            _ => Err(ParamError::decode("", "time", s)),
        }
    }
}
