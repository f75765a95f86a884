//! Field schemas and runtime values.
//!
//! Components and system configurations are described by a [`Schema`]: an
//! ordered list of named fields, each with a [`FieldKind`], a default
//! [`Value`], and optional constraints (an inclusive numeric range, or the
//! admitted set of an enum field). The schema fixes the column layout of a
//! component at registration time and never changes afterwards.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::entity::Entity;
use crate::error::EcsError;

/// The storage type of a single schema field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Int8,
    Int16,
    Float32,
    Float64,
    Bool,
    Str,
    Vec2,
    Vec3,
    Vec4,
    Entity,
    Object,
    /// A string-valued enumeration with an explicit admitted set.
    Enum(Vec<String>),
}

impl FieldKind {
    /// Number of f32 lanes a vector field occupies per entity slot.
    pub(crate) fn stride(&self) -> usize {
        match self {
            FieldKind::Vec2 => 2,
            FieldKind::Vec3 => 3,
            FieldKind::Vec4 => 4,
            _ => 1,
        }
    }

    /// Whether this kind is a numeric scalar (range-constrainable, orderable).
    pub(crate) fn is_numeric(&self) -> bool {
        matches!(
            self,
            FieldKind::Int8 | FieldKind::Int16 | FieldKind::Float32 | FieldKind::Float64
        )
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            FieldKind::Int8 => "int8",
            FieldKind::Int16 => "int16",
            FieldKind::Float32 => "float32",
            FieldKind::Float64 => "float64",
            FieldKind::Bool => "bool",
            FieldKind::Str => "string",
            FieldKind::Vec2 => "vec2",
            FieldKind::Vec3 => "vec3",
            FieldKind::Vec4 => "vec4",
            FieldKind::Entity => "entity",
            FieldKind::Object => "object",
            FieldKind::Enum(_) => "enum",
        }
    }
}

/// A runtime value written to or read from a field.
///
/// Enum fields read and write [`Value::Str`]; admission against the declared
/// set happens at the schema boundary.
#[derive(Clone)]
pub enum Value {
    Int8(i8),
    Int16(i16),
    Float32(f32),
    Float64(f64),
    Bool(bool),
    Str(String),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    /// A reference to another entity, or none.
    Entity(Option<Entity>),
    /// An opaque shared reference, compared by pointer identity.
    Object(Option<Rc<dyn Any>>),
}

impl Value {
    /// Shorthand for a string value.
    pub fn str(value: impl Into<String>) -> Self {
        Value::Str(value.into())
    }

    /// Wrap an arbitrary value as an opaque object reference.
    pub fn object<T: 'static>(value: T) -> Self {
        Value::Object(Some(Rc::new(value)))
    }

    /// Downcast an object value to a concrete type.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        match self {
            Value::Object(Some(object)) => object.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// The numeric scalar as f64, if this is one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int8(v) => Some(f64::from(*v)),
            Value::Int16(v) => Some(f64::from(*v)),
            Value::Float32(v) => Some(f64::from(*v)),
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }

    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            Value::Int8(_) => "int8",
            Value::Int16(_) => "int16",
            Value::Float32(_) => "float32",
            Value::Float64(_) => "float64",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
            Value::Vec2(_) => "vec2",
            Value::Vec3(_) => "vec3",
            Value::Vec4(_) => "vec4",
            Value::Entity(_) => "entity",
            Value::Object(_) => "object",
        }
    }

    /// Stable textual rendering used for canonical query identities.
    pub(crate) fn canonical(&self) -> String {
        match self {
            Value::Int8(v) => format!("i8:{v}"),
            Value::Int16(v) => format!("i16:{v}"),
            Value::Float32(v) => format!("f32:{v}"),
            Value::Float64(v) => format!("f64:{v}"),
            Value::Bool(v) => format!("bool:{v}"),
            Value::Str(v) => format!("str:{v}"),
            Value::Vec2(v) => format!("vec2:{},{}", v[0], v[1]),
            Value::Vec3(v) => format!("vec3:{},{},{}", v[0], v[1], v[2]),
            Value::Vec4(v) => format!("vec4:{},{},{},{}", v[0], v[1], v[2], v[3]),
            Value::Entity(Some(e)) => format!("ent:{}", e.index()),
            Value::Entity(None) => "ent:none".to_string(),
            Value::Object(_) => "obj".to_string(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int8(a), Value::Int8(b)) => a == b,
            (Value::Int16(a), Value::Int16(b)) => a == b,
            (Value::Float32(a), Value::Float32(b)) => a == b,
            (Value::Float64(a), Value::Float64(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Vec2(a), Value::Vec2(b)) => a == b,
            (Value::Vec3(a), Value::Vec3(b)) => a == b,
            (Value::Vec4(a), Value::Vec4(b)) => a == b,
            (Value::Entity(a), Value::Entity(b)) => a == b,
            // Objects compare by pointer identity.
            (Value::Object(None), Value::Object(None)) => true,
            (Value::Object(Some(a)), Value::Object(Some(b))) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int8(v) => write!(f, "Int8({v})"),
            Value::Int16(v) => write!(f, "Int16({v})"),
            Value::Float32(v) => write!(f, "Float32({v})"),
            Value::Float64(v) => write!(f, "Float64({v})"),
            Value::Bool(v) => write!(f, "Bool({v})"),
            Value::Str(v) => write!(f, "Str({v:?})"),
            Value::Vec2(v) => write!(f, "Vec2({v:?})"),
            Value::Vec3(v) => write!(f, "Vec3({v:?})"),
            Value::Vec4(v) => write!(f, "Vec4({v:?})"),
            Value::Entity(v) => write!(f, "Entity({v:?})"),
            Value::Object(Some(_)) => write!(f, "Object(..)"),
            Value::Object(None) => write!(f, "Object(none)"),
        }
    }
}

/// An inclusive numeric range constraint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

/// A single field of a schema: type, default, and optional constraints.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub kind: FieldKind,
    pub default: Value,
    pub range: Option<Range>,
}

impl FieldSpec {
    fn new(kind: FieldKind, default: Value) -> Self {
        Self {
            kind,
            default,
            range: None,
        }
    }

    pub fn int8(default: i8) -> Self {
        Self::new(FieldKind::Int8, Value::Int8(default))
    }

    pub fn int16(default: i16) -> Self {
        Self::new(FieldKind::Int16, Value::Int16(default))
    }

    pub fn float32(default: f32) -> Self {
        Self::new(FieldKind::Float32, Value::Float32(default))
    }

    pub fn float64(default: f64) -> Self {
        Self::new(FieldKind::Float64, Value::Float64(default))
    }

    pub fn boolean(default: bool) -> Self {
        Self::new(FieldKind::Bool, Value::Bool(default))
    }

    pub fn string(default: impl Into<String>) -> Self {
        Self::new(FieldKind::Str, Value::Str(default.into()))
    }

    pub fn vec2(default: [f32; 2]) -> Self {
        Self::new(FieldKind::Vec2, Value::Vec2(default))
    }

    pub fn vec3(default: [f32; 3]) -> Self {
        Self::new(FieldKind::Vec3, Value::Vec3(default))
    }

    pub fn vec4(default: [f32; 4]) -> Self {
        Self::new(FieldKind::Vec4, Value::Vec4(default))
    }

    /// An entity-reference field defaulting to none.
    pub fn entity() -> Self {
        Self::new(FieldKind::Entity, Value::Entity(None))
    }

    /// An opaque-reference field defaulting to none.
    pub fn object() -> Self {
        Self::new(FieldKind::Object, Value::Object(None))
    }

    /// A string enumeration over an explicit admitted set.
    pub fn enumeration<I, S>(values: I, default: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values.into_iter().map(Into::into).collect();
        Self::new(FieldKind::Enum(values), Value::Str(default.into()))
    }

    /// Constrain a numeric field to an inclusive range.
    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.range = Some(Range { min, max });
        self
    }

    /// Check that `value` has this field's type.
    pub(crate) fn type_check(&self, field: &str, value: &Value) -> Result<(), EcsError> {
        let ok = match (&self.kind, value) {
            (FieldKind::Int8, Value::Int8(_)) => true,
            (FieldKind::Int16, Value::Int16(_)) => true,
            (FieldKind::Float32, Value::Float32(_)) => true,
            (FieldKind::Float64, Value::Float64(_)) => true,
            (FieldKind::Bool, Value::Bool(_)) => true,
            (FieldKind::Str, Value::Str(_)) => true,
            (FieldKind::Enum(_), Value::Str(_)) => true,
            (FieldKind::Vec2, Value::Vec2(_)) => true,
            (FieldKind::Vec3, Value::Vec3(_)) => true,
            (FieldKind::Vec4, Value::Vec4(_)) => true,
            (FieldKind::Entity, Value::Entity(_)) => true,
            (FieldKind::Object, Value::Object(_)) => true,
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(EcsError::TypeNotSupported {
                field: field.to_string(),
                expected: self.kind.name(),
                got: value.type_name(),
            })
        }
    }

    /// Check that `value` is admitted by this field: type, range, enum set.
    pub(crate) fn admit(&self, field: &str, value: &Value) -> Result<(), EcsError> {
        self.type_check(field, value)?;

        if let (Some(range), Some(v)) = (self.range, value.as_f64()) {
            if v < range.min || v > range.max {
                return Err(EcsError::InvalidRangeValue {
                    field: field.to_string(),
                    value: v,
                    min: range.min,
                    max: range.max,
                });
            }
        }

        if let (FieldKind::Enum(admitted), Value::Str(v)) = (&self.kind, value) {
            if !admitted.iter().any(|a| a == v) {
                return Err(EcsError::InvalidEnumValue {
                    field: field.to_string(),
                    value: v.clone(),
                });
            }
        }

        Ok(())
    }
}

/// An ordered mapping from field name to [`FieldSpec`].
///
/// Field order is the column order of the component. Field names are
/// unique; declaring one twice is rejected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    fields: Vec<(String, FieldSpec)>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field. Fails with [`EcsError::DuplicateField`] when the name
    /// is already declared.
    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Result<Self, EcsError> {
        let name = name.into();
        if self.fields.iter().any(|(n, _)| *n == name) {
            return Err(EcsError::DuplicateField { field: name });
        }
        self.fields.push((name, spec));
        Ok(self)
    }

    /// The fields in declaration order.
    pub fn fields(&self) -> &[(String, FieldSpec)] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Position of a field in column order.
    pub(crate) fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|(n, _)| n == name)
    }

    /// The spec for a named field.
    pub(crate) fn spec(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    /// Validate that every default is admitted by its own field.
    pub(crate) fn validate(&self) -> Result<(), EcsError> {
        for (name, spec) in &self.fields {
            spec.admit(name, &spec.default)
                .map_err(|source| EcsError::InvalidDefaultValue {
                    field: name.clone(),
                    source: Box::new(source),
                })?;
        }
        Ok(())
    }
}
