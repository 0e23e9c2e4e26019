//! Typed parameter cells.
//!
//! A [`Param`] holds a declared [`ParamKind`], a default and a current
//! [`ParamValue`]. Values always round-trip through their text encoding, which
//! is also how conversions between kinds are performed.

use crate::error::ParamError;
use crate::pose::{parse_f64s, quat_from_rpy, rpy_text, Color, Pose, Time};
use glam::{DQuat, DVec2, DVec3, IVec2};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Shared handle to a parameter owned by an element.
pub type ParamPtr = Arc<RwLock<Param>>;

/// The closed set of value kinds a parameter may declare.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamKind {
    Bool,
    Char,
    Int,
    UnsignedInt,
    Float,
    Double,
    String,
    Vector2i,
    Vector2d,
    Vector3,
    Quaternion,
    Pose,
    Color,
    Time,
}

impl ParamKind {
    /// Resolves a type tag as written in description files.
    pub fn from_type_name(name: &str) -> Result<Self, ParamError> {
        let kind = match name.trim() {
            "bool" => Self::Bool,
            "char" => Self::Char,
            "int" => Self::Int,
            "unsigned int" | "uint" => Self::UnsignedInt,
            "float" => Self::Float,
            "double" => Self::Double,
            "string" | "std::string" => Self::String,
            "vector2i" => Self::Vector2i,
            "vector2d" => Self::Vector2d,
            "vector3" => Self::Vector3,
            "quaternion" => Self::Quaternion,
            "pose" => Self::Pose,
            "color" => Self::Color,
            "time" => Self::Time,
            other => return Err(ParamError::UnknownType(other.to_string())),
        };
        Ok(kind)
    }

    /// The canonical type tag.
    pub fn type_name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Char => "char",
            Self::Int => "int",
            Self::UnsignedInt => "unsigned int",
            Self::Float => "float",
            Self::Double => "double",
            Self::String => "string",
            Self::Vector2i => "vector2i",
            Self::Vector2d => "vector2d",
            Self::Vector3 => "vector3",
            Self::Quaternion => "quaternion",
            Self::Pose => "pose",
            Self::Color => "color",
            Self::Time => "time",
        }
    }

    /// Decodes `text` as a value of this kind.
    ///
    /// Strings are kept verbatim; every other kind ignores surrounding whitespace.
    pub fn parse(self, text: &str) -> Option<ParamValue> {
        let raw = text;
        let text = text.trim();
        let value = match self {
            Self::Bool => ParamValue::Bool(parse_bool(text)?),
            Self::Char => {
                let mut chars = text.chars();
                let c = chars.next()?;
                if chars.next().is_some() {
                    return None;
                }
                ParamValue::Char(c)
            }
            Self::Int => ParamValue::Int(text.parse().ok()?),
            Self::UnsignedInt => ParamValue::UnsignedInt(text.parse().ok()?),
            Self::Float => ParamValue::Float(text.parse().ok()?),
            Self::Double => ParamValue::Double(text.parse().ok()?),
            Self::String => ParamValue::String(raw.to_string()),
            Self::Vector2i => {
                let vals: Vec<i32> = text
                    .split_whitespace()
                    .map(|t| t.parse().ok())
                    .collect::<Option<_>>()?;
                match vals.as_slice() {
                    [x, y] => ParamValue::Vector2i(IVec2::new(*x, *y)),
                    _ => return None,
                }
            }
            Self::Vector2d => match parse_f64s(text)?.as_slice() {
                [x, y] => ParamValue::Vector2d(DVec2::new(*x, *y)),
                _ => return None,
            },
            Self::Vector3 => match parse_f64s(text)?.as_slice() {
                [x, y, z] => ParamValue::Vector3(DVec3::new(*x, *y, *z)),
                _ => return None,
            },
            Self::Quaternion => match parse_f64s(text)?.as_slice() {
                [r, p, y] => ParamValue::Quaternion(quat_from_rpy(*r, *p, *y)),
                _ => return None,
            },
            Self::Pose => ParamValue::Pose(text.parse().ok()?),
            Self::Color => ParamValue::Color(text.parse().ok()?),
            Self::Time => ParamValue::Time(text.parse().ok()?),
        };
        Some(value)
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    if text == "1" || text.eq_ignore_ascii_case("true") {
        Some(true)
    } else if text == "0" || text.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// A decoded parameter value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Bool(bool),
    Char(char),
    Int(i32),
    UnsignedInt(u32),
    Float(f32),
    Double(f64),
    String(String),
    Vector2i(IVec2),
    Vector2d(DVec2),
    Vector3(DVec3),
    /// Written as roll pitch yaw.
    Quaternion(DQuat),
    Pose(Pose),
    Color(Color),
    Time(Time),
}

impl ParamValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            Self::Bool(_) => ParamKind::Bool,
            Self::Char(_) => ParamKind::Char,
            Self::Int(_) => ParamKind::Int,
            Self::UnsignedInt(_) => ParamKind::UnsignedInt,
            Self::Float(_) => ParamKind::Float,
            Self::Double(_) => ParamKind::Double,
            Self::String(_) => ParamKind::String,
            Self::Vector2i(_) => ParamKind::Vector2i,
            Self::Vector2d(_) => ParamKind::Vector2d,
            Self::Vector3(_) => ParamKind::Vector3,
            Self::Quaternion(_) => ParamKind::Quaternion,
            Self::Pose(_) => ParamKind::Pose,
            Self::Color(_) => ParamKind::Color,
            Self::Time(_) => ParamKind::Time,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Char(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::UnsignedInt(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::String(v) => f.write_str(v),
            Self::Vector2i(v) => write!(f, "{} {}", v.x, v.y),
            Self::Vector2d(v) => write!(f, "{} {}", v.x, v.y),
            Self::Vector3(v) => write!(f, "{} {} {}", v.x, v.y, v.z),
            Self::Quaternion(q) => f.write_str(&rpy_text(*q)),
            Self::Pose(v) => write!(f, "{v}"),
            Self::Color(v) => write!(f, "{v}"),
            Self::Time(v) => write!(f, "{v}"),
        }
    }
}

/// Rust types that can be stored in and read from a [`Param`].
pub trait ParamData: Sized {
    /// The kind this type decodes from natively.
    const KIND: ParamKind;

    /// Extracts the value when `value` is exactly this type's variant.
    fn from_value(value: &ParamValue) -> Option<Self>;

    fn into_value(self) -> ParamValue;
}

macro_rules! impl_param_data {
    ($ty:ty, $variant:ident) => {
        impl ParamData for $ty {
            const KIND: ParamKind = ParamKind::$variant;

            fn from_value(value: &ParamValue) -> Option<Self> {
                match value {
                    ParamValue::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }

            fn into_value(self) -> ParamValue {
                ParamValue::$variant(self)
            }
        }
    };
}

impl_param_data!(bool, Bool);
impl_param_data!(char, Char);
impl_param_data!(i32, Int);
impl_param_data!(u32, UnsignedInt);
impl_param_data!(f32, Float);
impl_param_data!(f64, Double);
impl_param_data!(String, String);
impl_param_data!(IVec2, Vector2i);
impl_param_data!(DVec2, Vector2d);
impl_param_data!(DVec3, Vector3);
impl_param_data!(DQuat, Quaternion);
impl_param_data!(Pose, Pose);
impl_param_data!(Color, Color);
impl_param_data!(Time, Time);

/// A named, typed value cell with a default.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Param {
    key: String,
    kind: ParamKind,
    default: ParamValue,
    value: ParamValue,
    required: bool,
    set: bool,
    description: String,
}

impl Param {
    /// Creates a parameter whose current value is its default.
    ///
    /// Fails when `type_name` is unknown or `default` does not decode as that type.
    pub fn new(
        key: impl Into<String>,
        type_name: &str,
        default: &str,
        required: bool,
        description: impl Into<String>,
    ) -> Result<Self, ParamError> {
        let key = key.into();
        let kind = ParamKind::from_type_name(type_name)?;
        let default = kind
            .parse(default)
            .ok_or_else(|| ParamError::decode(key.clone(), kind.type_name(), default))?;
        Ok(Self {
            key,
            kind,
            value: default.clone(),
            default,
            required,
            set: false,
            description: description.into(),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> ParamKind {
        self.kind
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    pub fn required(&self) -> bool {
        self.required
    }

    /// True once a value has been assigned explicitly.
    pub fn is_set(&self) -> bool {
        self.set
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    /// The current value encoded as text.
    pub fn as_string(&self) -> String {
        self.value.to_string()
    }

    pub fn default_as_string(&self) -> String {
        self.default.to_string()
    }

    /// The current decoded value.
    pub fn value(&self) -> &ParamValue {
        &self.value
    }

    /// Decodes `text` into the declared kind and marks the parameter set.
    ///
    /// On failure the current value is left untouched.
    pub fn set_from_string(&mut self, text: &str) -> Result<(), ParamError> {
        let value = self
            .kind
            .parse(text)
            .ok_or_else(|| ParamError::decode(self.key.clone(), self.kind.type_name(), text))?;
        self.value = value;
        self.set = true;
        Ok(())
    }

    /// Reads the current value as `T`, converting through text if the kinds differ.
    pub fn get<T: ParamData>(&self) -> Result<T, ParamError> {
        self.convert(&self.value)
    }

    /// Reads the default value as `T`.
    pub fn get_default<T: ParamData>(&self) -> Result<T, ParamError> {
        self.convert(&self.default)
    }

    fn convert<T: ParamData>(&self, value: &ParamValue) -> Result<T, ParamError> {
        if let Some(v) = T::from_value(value) {
            return Ok(v);
        }
        T::KIND
            .parse(&value.to_string())
            .and_then(|v| T::from_value(&v))
            .ok_or_else(|| ParamError::TypeMismatch {
                key: self.key.clone(),
                expected: T::KIND.type_name(),
                found: self.kind.type_name(),
            })
    }

    /// Stores `value`, coercing it to the declared kind, and marks the parameter set.
    pub fn set<T: ParamData>(&mut self, value: T) -> Result<(), ParamError> {
        let value = value.into_value();
        if value.kind() == self.kind {
            self.value = value;
            self.set = true;
            Ok(())
        } else {
            self.set_from_string(&value.to_string())
        }
    }

    /// Restores the default and clears the set flag.
    pub fn reset(&mut self) {
        self.value = self.default.clone();
        self.set = false;
    }

    /// Wraps the parameter in a fresh shared handle.
    pub fn into_ptr(self) -> ParamPtr {
        Arc::new(RwLock::new(self))
    }
}
