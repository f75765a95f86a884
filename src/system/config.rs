//! Reactive per-system configuration.
//!
//! Each field of a system's configuration schema is exposed as a
//! [`ReactiveCell`]: a value container with synchronous change subscribers.
//! Cells are how a system reacts to external reconfiguration between ticks
//! without polling. The reactive layer is orthogonal to entities and
//! queries; it carries per-system state only.

use crate::error::{EcsError, checks_enabled};
use crate::field::{Schema, Value};

/// A handle for removing a previously registered cell subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellSubscription(u64);

/// A value container with synchronous change notification.
///
/// Writes that leave the value unchanged are coalesced: the stored value is
/// compared first and subscribers are not notified.
pub struct ReactiveCell {
    value: Value,
    next: u64,
    subscribers: Vec<(CellSubscription, Box<dyn FnMut(&Value)>)>,
}

impl ReactiveCell {
    fn new(value: Value) -> Self {
        Self {
            value,
            next: 0,
            subscribers: Vec::new(),
        }
    }

    /// The current value.
    #[inline]
    pub fn read(&self) -> &Value {
        &self.value
    }

    /// Store a new value and notify subscribers. Returns false (and stays
    /// silent) when the value is unchanged.
    pub fn write(&mut self, value: Value) -> bool {
        if self.value == value {
            return false;
        }
        self.value = value;
        for (_, callback) in &mut self.subscribers {
            callback(&self.value);
        }
        true
    }

    /// Register a subscriber invoked synchronously on every change.
    pub fn subscribe(&mut self, callback: impl FnMut(&Value) + 'static) -> CellSubscription {
        let id = CellSubscription(self.next);
        self.next += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    pub fn unsubscribe(&mut self, subscription: CellSubscription) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(id, _)| *id != subscription);
        self.subscribers.len() != before
    }
}

/// The reactive configuration of one system: a cell per schema field,
/// initialized to the schema defaults.
pub struct Config {
    schema: Schema,
    cells: Vec<(String, ReactiveCell)>,
}

impl Config {
    pub(crate) fn from_schema(schema: Schema) -> Self {
        let cells = schema
            .fields()
            .iter()
            .map(|(name, spec)| (name.clone(), ReactiveCell::new(spec.default.clone())))
            .collect();
        Self { schema, cells }
    }

    /// The cell for a named field.
    pub fn cell(&self, field: &str) -> Option<&ReactiveCell> {
        self.cells.iter().find(|(n, _)| n == field).map(|(_, c)| c)
    }

    pub fn cell_mut(&mut self, field: &str) -> Option<&mut ReactiveCell> {
        self.cells
            .iter_mut()
            .find(|(n, _)| n == field)
            .map(|(_, c)| c)
    }

    /// Shorthand for reading a field's current value.
    pub fn read(&self, field: &str) -> Option<&Value> {
        self.cell(field).map(ReactiveCell::read)
    }

    /// Write a field after validating the value against the schema. `owner`
    /// names the system for error reporting.
    pub(crate) fn write_validated(
        &mut self,
        owner: &str,
        field: &str,
        value: Value,
    ) -> Result<bool, EcsError> {
        let Some(spec) = self.schema.spec(field) else {
            return Err(EcsError::UnknownField {
                component: owner.to_string(),
                field: field.to_string(),
            });
        };
        if checks_enabled() {
            spec.admit(field, &value)?;
        }
        // The field exists, so the cell does too.
        Ok(self
            .cell_mut(field)
            .map(|cell| cell.write(value))
            .unwrap_or(false))
    }
}
