use std::any::Any;
use std::rc::Rc;

use crate::entity::Entities;
use crate::error::{EcsError, checks_enabled};
use crate::field::{FieldKind, FieldSpec, Schema, Value};

/// One field's storage across every entity slot.
///
/// Numeric and boolean fields use contiguous typed buffers; vector fields
/// use a flat f32 buffer with the field's stride; the remaining kinds use
/// plain slot arrays. The element for slot `i` of a strided column starts at
/// `i * stride`.
enum Column {
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    /// Booleans packed as 0/1 bytes.
    Bool(Vec<u8>),
    /// Strings and enum values (enums are admitted strings).
    Str(Vec<String>),
    /// Vec2/Vec3/Vec4 lanes, flattened.
    Vector { stride: usize, lanes: Vec<f32> },
    /// Entity references stored as slot indices, -1 meaning none.
    EntityRef(Vec<i32>),
    /// Opaque shared references.
    Object(Vec<Option<Rc<dyn Any>>>),
}

impl std::fmt::Debug for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Column::Int8(v) => write!(f, "Int8[{}]", v.len()),
            Column::Int16(v) => write!(f, "Int16[{}]", v.len()),
            Column::Float32(v) => write!(f, "Float32[{}]", v.len()),
            Column::Float64(v) => write!(f, "Float64[{}]", v.len()),
            Column::Bool(v) => write!(f, "Bool[{}]", v.len()),
            Column::Str(v) => write!(f, "Str[{}]", v.len()),
            Column::Vector { stride, lanes } => write!(f, "Vector{}[{}]", stride, lanes.len()),
            Column::EntityRef(v) => write!(f, "EntityRef[{}]", v.len()),
            Column::Object(v) => write!(f, "Object[{}]", v.len()),
        }
    }
}

impl Column {
    /// Allocate a column for `spec` with `capacity` slots, every slot
    /// holding the field default.
    fn new(spec: &FieldSpec, capacity: usize) -> Self {
        match &spec.kind {
            FieldKind::Int8 => Column::Int8(vec![default_i8(spec); capacity]),
            FieldKind::Int16 => Column::Int16(vec![default_i16(spec); capacity]),
            FieldKind::Float32 => Column::Float32(vec![default_f32(spec); capacity]),
            FieldKind::Float64 => Column::Float64(vec![default_f64(spec); capacity]),
            FieldKind::Bool => Column::Bool(vec![default_bool(spec); capacity]),
            FieldKind::Str | FieldKind::Enum(_) => {
                Column::Str(vec![default_str(spec); capacity])
            }
            FieldKind::Vec2 | FieldKind::Vec3 | FieldKind::Vec4 => {
                let stride = spec.kind.stride();
                let default = default_lanes(spec);
                let mut lanes = Vec::with_capacity(capacity * stride);
                for _ in 0..capacity {
                    lanes.extend_from_slice(&default);
                }
                Column::Vector { stride, lanes }
            }
            FieldKind::Entity => Column::EntityRef(vec![default_entity(spec); capacity]),
            FieldKind::Object => Column::Object(vec![default_object(spec); capacity]),
        }
    }

    /// Extend the column to `capacity` slots, filling new slots with the
    /// field default. Existing slots are untouched.
    fn grow(&mut self, spec: &FieldSpec, capacity: usize) {
        match self {
            Column::Int8(buf) => buf.resize(capacity, default_i8(spec)),
            Column::Int16(buf) => buf.resize(capacity, default_i16(spec)),
            Column::Float32(buf) => buf.resize(capacity, default_f32(spec)),
            Column::Float64(buf) => buf.resize(capacity, default_f64(spec)),
            Column::Bool(buf) => buf.resize(capacity, default_bool(spec)),
            Column::Str(buf) => buf.resize(capacity, default_str(spec)),
            Column::Vector { stride, lanes } => {
                let default = default_lanes(spec);
                let current = lanes.len() / *stride;
                for _ in current..capacity {
                    lanes.extend_from_slice(&default);
                }
            }
            Column::EntityRef(buf) => buf.resize(capacity, default_entity(spec)),
            Column::Object(buf) => buf.resize(capacity, default_object(spec)),
        }
    }

    /// Write an already-admitted value into a slot.
    fn write(&mut self, index: usize, value: &Value) {
        match (self, value) {
            (Column::Int8(buf), Value::Int8(v)) => buf[index] = *v,
            (Column::Int16(buf), Value::Int16(v)) => buf[index] = *v,
            (Column::Float32(buf), Value::Float32(v)) => buf[index] = *v,
            (Column::Float64(buf), Value::Float64(v)) => buf[index] = *v,
            (Column::Bool(buf), Value::Bool(v)) => buf[index] = u8::from(*v),
            (Column::Str(buf), Value::Str(v)) => buf[index] = v.clone(),
            (Column::Vector { stride, lanes }, value) => {
                let src = match value {
                    Value::Vec2(v) => &v[..],
                    Value::Vec3(v) => &v[..],
                    Value::Vec4(v) => &v[..],
                    _ => {
                        debug_assert!(false, "column/value kind mismatch");
                        return;
                    }
                };
                debug_assert_eq!(src.len(), *stride);
                lanes[index * *stride..(index + 1) * *stride].copy_from_slice(src);
            }
            (Column::EntityRef(buf), Value::Entity(v)) => {
                buf[index] = v.map_or(-1, |entity| entity.index() as i32);
            }
            (Column::Object(buf), Value::Object(v)) => buf[index] = v.clone(),
            _ => debug_assert!(false, "column/value kind mismatch"),
        }
    }

    /// Read a slot back as a [`Value`].
    ///
    /// Booleans are normalized from their 0/1 encoding; entity references
    /// resolve through the slot table, so a dead or never-filled reference
    /// reads as none.
    fn read(&self, index: usize, entities: &Entities) -> Value {
        match self {
            Column::Int8(buf) => Value::Int8(buf[index]),
            Column::Int16(buf) => Value::Int16(buf[index]),
            Column::Float32(buf) => Value::Float32(buf[index]),
            Column::Float64(buf) => Value::Float64(buf[index]),
            Column::Bool(buf) => Value::Bool(buf[index] != 0),
            Column::Str(buf) => Value::Str(buf[index].clone()),
            Column::Vector { stride, lanes } => {
                let at = index * stride;
                match stride {
                    2 => Value::Vec2([lanes[at], lanes[at + 1]]),
                    3 => Value::Vec3([lanes[at], lanes[at + 1], lanes[at + 2]]),
                    _ => Value::Vec4([lanes[at], lanes[at + 1], lanes[at + 2], lanes[at + 3]]),
                }
            }
            Column::EntityRef(buf) => {
                let raw = buf[index];
                if raw < 0 {
                    Value::Entity(None)
                } else {
                    Value::Entity(entities.at(raw as usize))
                }
            }
            Column::Object(buf) => Value::Object(buf[index].clone()),
        }
    }
}

/// The columns of one component, parallel to its schema's field order.
#[derive(Debug)]
pub(crate) struct ColumnSet {
    columns: Vec<Column>,
}

impl ColumnSet {
    pub fn new(schema: &Schema, capacity: usize) -> Self {
        Self {
            columns: schema
                .fields()
                .iter()
                .map(|(_, spec)| Column::new(spec, capacity))
                .collect(),
        }
    }

    pub fn grow(&mut self, schema: &Schema, capacity: usize) {
        for (column, (_, spec)) in self.columns.iter_mut().zip(schema.fields()) {
            column.grow(spec, capacity);
        }
    }

    /// Write a full row for one entity: each field takes its override when
    /// present, else the schema default. Overrides are validated up front so
    /// a rejected attach leaves the row untouched.
    pub fn attach(
        &mut self,
        index: usize,
        schema: &Schema,
        component: &str,
        overrides: &[(&str, Value)],
    ) -> Result<(), EcsError> {
        for (name, value) in overrides {
            let spec = schema.spec(name).ok_or_else(|| EcsError::UnknownField {
                component: component.to_string(),
                field: name.to_string(),
            })?;
            if checks_enabled() {
                spec.admit(name, value)?;
            }
        }

        for (position, (name, spec)) in schema.fields().iter().enumerate() {
            let value = overrides
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v)
                .unwrap_or(&spec.default);
            self.columns[position].write(index, value);
        }
        Ok(())
    }

    pub fn value(
        &self,
        index: usize,
        schema: &Schema,
        component: &str,
        field: &str,
        entities: &Entities,
    ) -> Result<Value, EcsError> {
        let position = schema.position(field).ok_or_else(|| EcsError::UnknownField {
            component: component.to_string(),
            field: field.to_string(),
        })?;
        Ok(self.columns[position].read(index, entities))
    }

    pub fn set_value(
        &mut self,
        index: usize,
        schema: &Schema,
        component: &str,
        field: &str,
        value: &Value,
    ) -> Result<(), EcsError> {
        let position = schema.position(field).ok_or_else(|| EcsError::UnknownField {
            component: component.to_string(),
            field: field.to_string(),
        })?;
        if checks_enabled() {
            let (_, spec) = &schema.fields()[position];
            spec.admit(field, value)?;
        }
        self.columns[position].write(index, value);
        Ok(())
    }

    /// Borrow one entity's lanes of a vector field.
    pub fn vector_view(
        &self,
        index: usize,
        schema: &Schema,
        component: &str,
        field: &str,
    ) -> Result<&[f32], EcsError> {
        let position = self.vector_position(schema, component, field)?;
        match &self.columns[position] {
            Column::Vector { stride, lanes } => Ok(&lanes[index * stride..(index + 1) * stride]),
            _ => unreachable!("vector_position only admits vector columns"),
        }
    }

    /// Mutably borrow one entity's lanes of a vector field. Writes through
    /// the returned slice are immediately visible to reads.
    pub fn vector_view_mut(
        &mut self,
        index: usize,
        schema: &Schema,
        component: &str,
        field: &str,
    ) -> Result<&mut [f32], EcsError> {
        let position = self.vector_position(schema, component, field)?;
        match &mut self.columns[position] {
            Column::Vector { stride, lanes } => {
                Ok(&mut lanes[index * *stride..(index + 1) * *stride])
            }
            _ => unreachable!("vector_position only admits vector columns"),
        }
    }

    fn vector_position(
        &self,
        schema: &Schema,
        component: &str,
        field: &str,
    ) -> Result<usize, EcsError> {
        let position = schema.position(field).ok_or_else(|| EcsError::UnknownField {
            component: component.to_string(),
            field: field.to_string(),
        })?;
        let (_, spec) = &schema.fields()[position];
        if spec.kind.stride() == 1 {
            return Err(EcsError::TypeNotSupported {
                field: field.to_string(),
                expected: "vec2, vec3 or vec4",
                got: spec.kind.name(),
            });
        }
        Ok(position)
    }
}

fn default_i8(spec: &FieldSpec) -> i8 {
    match spec.default {
        Value::Int8(v) => v,
        _ => 0,
    }
}

fn default_i16(spec: &FieldSpec) -> i16 {
    match spec.default {
        Value::Int16(v) => v,
        _ => 0,
    }
}

fn default_f32(spec: &FieldSpec) -> f32 {
    match spec.default {
        Value::Float32(v) => v,
        _ => 0.0,
    }
}

fn default_f64(spec: &FieldSpec) -> f64 {
    match spec.default {
        Value::Float64(v) => v,
        _ => 0.0,
    }
}

fn default_bool(spec: &FieldSpec) -> u8 {
    match spec.default {
        Value::Bool(v) => u8::from(v),
        _ => 0,
    }
}

fn default_str(spec: &FieldSpec) -> String {
    match &spec.default {
        Value::Str(v) => v.clone(),
        _ => String::new(),
    }
}

fn default_lanes(spec: &FieldSpec) -> Vec<f32> {
    match &spec.default {
        Value::Vec2(v) => v.to_vec(),
        Value::Vec3(v) => v.to_vec(),
        Value::Vec4(v) => v.to_vec(),
        _ => vec![0.0; spec.kind.stride()],
    }
}

fn default_entity(spec: &FieldSpec) -> i32 {
    match spec.default {
        Value::Entity(Some(entity)) => entity.index() as i32,
        _ => -1,
    }
}

fn default_object(spec: &FieldSpec) -> Option<Rc<dyn Any>> {
    match &spec.default {
        Value::Object(v) => v.clone(),
        _ => None,
    }
}
