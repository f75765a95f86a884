use std::collections::HashMap;

use log::debug;

use crate::component::{ComponentDescriptor, ComponentId};
use crate::entity::Entities;
use crate::error::{EcsError, checks_enabled};
use crate::field::{Schema, Value};
use crate::mask::Mask;
use crate::storage::ColumnSet;

/// A registered component: schema, identity, and columns.
pub(crate) struct ComponentRecord {
    name: String,
    schema: Schema,
    mask: Mask,
    columns: ColumnSet,
}

impl ComponentRecord {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The single-bit mask of this component.
    pub fn mask(&self) -> &Mask {
        &self.mask
    }

    pub fn attach(&mut self, index: usize, overrides: &[(&str, Value)]) -> Result<(), EcsError> {
        self.columns.attach(index, &self.schema, &self.name, overrides)
    }

    pub fn value(
        &self,
        index: usize,
        field: &str,
        entities: &Entities,
    ) -> Result<Value, EcsError> {
        self.columns
            .value(index, &self.schema, &self.name, field, entities)
    }

    pub fn set_value(&mut self, index: usize, field: &str, value: &Value) -> Result<(), EcsError> {
        self.columns
            .set_value(index, &self.schema, &self.name, field, value)
    }

    pub fn vector_view(&self, index: usize, field: &str) -> Result<&[f32], EcsError> {
        self.columns
            .vector_view(index, &self.schema, &self.name, field)
    }

    pub fn vector_view_mut(&mut self, index: usize, field: &str) -> Result<&mut [f32], EcsError> {
        self.columns
            .vector_view_mut(index, &self.schema, &self.name, field)
    }
}

/// The component registry of one world.
///
/// Assigns dense ids in registration order and owns every component's
/// columns. Registration is the only mutation; a registered component's
/// schema and layout never change.
pub struct Components {
    records: Vec<ComponentRecord>,
    by_name: HashMap<String, ComponentId>,
    capacity: usize,
}

impl Components {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            records: Vec::new(),
            by_name: HashMap::new(),
            capacity,
        }
    }

    /// Register a component and get its dense id.
    ///
    /// Fails when the name is taken or a schema default is not admitted by
    /// its own field.
    pub(crate) fn register(
        &mut self,
        descriptor: ComponentDescriptor,
    ) -> Result<ComponentId, EcsError> {
        if checks_enabled() {
            if self.by_name.contains_key(descriptor.name()) {
                return Err(EcsError::ComponentAlreadyRegistered(
                    descriptor.name().to_string(),
                ));
            }
            descriptor.schema().validate()?;
        }

        let id = ComponentId::new(self.records.len() as u32);
        let (name, schema) = descriptor.into_parts();
        let columns = ColumnSet::new(&schema, self.capacity);

        debug!("registered component `{name}` as {id:?}");

        self.by_name.insert(name.clone(), id);
        self.records.push(ComponentRecord {
            name,
            schema,
            mask: Mask::with_bit(id.index()),
            columns,
        });

        Ok(id)
    }

    /// Look up a component id by its stable name.
    pub fn id_of(&self, name: &str) -> Option<ComponentId> {
        self.by_name.get(name).copied()
    }

    /// The stable name of a registered id.
    pub fn name_of(&self, id: ComponentId) -> Option<&str> {
        self.records.get(id.index()).map(|r| r.name.as_str())
    }

    pub fn contains(&self, id: ComponentId) -> bool {
        id.index() < self.records.len()
    }

    /// Number of registered components.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Every registered id, in registration order.
    pub fn ids(&self) -> impl Iterator<Item = ComponentId> + '_ {
        (0..self.records.len() as u32).map(ComponentId::new)
    }

    /// Fail with [`EcsError::ComponentNotRegistered`] unless the id belongs
    /// to this world. Skipped when checks are disabled.
    pub(crate) fn ensure(&self, id: ComponentId) -> Result<(), EcsError> {
        if checks_enabled() && !self.contains(id) {
            return Err(EcsError::ComponentNotRegistered(format!(
                "#{}",
                id.index()
            )));
        }
        Ok(())
    }

    pub(crate) fn record(&self, id: ComponentId) -> &ComponentRecord {
        &self.records[id.index()]
    }

    pub(crate) fn record_mut(&mut self, id: ComponentId) -> &mut ComponentRecord {
        &mut self.records[id.index()]
    }

    /// Resize every component's columns to a new entity capacity.
    pub(crate) fn grow(&mut self, capacity: usize) {
        self.capacity = capacity;
        for record in &mut self.records {
            record.columns.grow(&record.schema, capacity);
        }
    }
}
