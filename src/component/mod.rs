//! Component definitions and identifiers.
//!
//! A component is declared by a [`ComponentDescriptor`]: a stable string
//! name plus a [`Schema`](crate::field::Schema) of typed fields. Registering
//! the descriptor in a world assigns it a dense [`ComponentId`] (the bit
//! position it occupies in every entity's mask) and allocates its columnar
//! storage. Id, bit, and column layout are immutable from then on.

mod registry;

pub use registry::Components;
pub(crate) use registry::ComponentRecord;

use crate::error::EcsError;
use crate::field::{FieldSpec, Schema};

/// A dense component type identifier.
///
/// The id doubles as the component's bit position in entity masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentId(u32);

impl ComponentId {
    #[inline]
    pub(crate) const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the index of this id if it were to live in indexable storage.
    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// A component declaration: name plus field schema.
#[derive(Debug, Clone)]
pub struct ComponentDescriptor {
    name: String,
    schema: Schema,
}

impl ComponentDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: Schema::new(),
        }
    }

    /// Add a field to the schema. Fails with
    /// [`EcsError::DuplicateField`] when the name is already declared.
    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Result<Self, EcsError> {
        self.schema = self.schema.field(name, spec)?;
        Ok(self)
    }

    /// The stable string identifier of the component.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub(crate) fn into_parts(self) -> (String, Schema) {
        (self.name, self.schema)
    }
}
